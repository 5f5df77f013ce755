use starhold_core::config::ConfigError;
use starhold_core::worldgen::WorldGenError;
use starhold_data::DataLoadError;

/// Failures of the server runtime. Business-rule rejections are not errors
/// here; they travel back to the caller inside a `CommandResponse`.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Data(#[from] DataLoadError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    WorldGen(#[from] WorldGenError),

    #[error("failed to spawn tick thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("universe lock poisoned")]
    Poisoned,

    #[error("tick driver is not running")]
    Stopped,

    #[error("tick thread panicked")]
    Panicked,
}
