//! Data-driven configuration for Starhold.
//!
//! Loads a [`GameConfig`](starhold_core::config::GameConfig) and building
//! overrides from RON, TOML or JSON files in a directory.

pub mod loader;
pub mod schema;

pub use loader::{DataLoadError, GameData, load_game_data};
