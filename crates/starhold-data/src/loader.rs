//! Reads a data directory into a validated config and building catalog.
//!
//! Layout:
//!
//! - `config.{ron,toml,json}` -- required, a [`GameConfig`]. Missing fields
//!   take their defaults.
//! - `buildings.{ron,toml,json}` -- optional, a list of building overrides.
//!
//! Only one format per base name may be present.

use crate::schema::{BuildingData, TomlBuildings};
use serde::de::DeserializeOwned;
use starhold_core::catalog::{BuildingType, Catalog, CatalogError};
use starhold_core::config::{ConfigError, GameConfig};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

// ===========================================================================
// Errors
// ===========================================================================

#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: String, dir: PathBuf },

    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    #[error("unresolved {expected_kind} reference '{name}' in {file}")]
    UnresolvedRef {
        file: PathBuf,
        name: String,
        expected_kind: &'static str,
    },

    #[error("duplicate name '{name}' in {file}")]
    DuplicateName { file: PathBuf, name: String },

    #[error("invalid config in {file}: {source}")]
    Config {
        file: PathBuf,
        #[source]
        source: ConfigError,
    },

    #[error("invalid building table in {file}: {source}")]
    Catalog {
        file: PathBuf,
        #[source]
        source: CatalogError,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file from its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Look for `{base_name}.ron`, `.toml` or `.json` in `dir`.
///
/// `Ok(None)` if none exists, `ConflictingFormats` if more than one does.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;
    for ext in ["ron", "toml", "json"] {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if !candidate.exists() {
            continue;
        }
        if let Some(existing) = &found {
            return Err(DataLoadError::ConflictingFormats {
                a: existing.clone(),
                b: candidate,
            });
        }
        found = Some(candidate);
    }
    Ok(found)
}

/// Like [`find_data_file`], but a missing file is an error.
pub fn require_data_file(dir: &Path, base_name: &str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name.to_string(),
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

fn parse_error(path: &Path, detail: impl ToString) -> DataLoadError {
    DataLoadError::Parse {
        file: path.to_path_buf(),
        detail: detail.to_string(),
    }
}

/// Read and deserialize a file in whatever format its extension names.
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Toml => toml::from_str(&content).map_err(|e| parse_error(path, e)),
    }
}

/// Deserialize a list. TOML has no top-level arrays, so there the list is
/// read from the array at `toml_key`.
pub fn deserialize_list<T: DeserializeOwned>(
    path: &Path,
    toml_key: &str,
) -> Result<Vec<T>, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Toml => {
            let table: toml::Value = toml::from_str(&content).map_err(|e| parse_error(path, e))?;
            let array = table
                .get(toml_key)
                .ok_or_else(|| parse_error(path, format!("missing key '{toml_key}' in TOML file")))?
                .clone();
            array
                .try_into()
                .map_err(|e: toml::de::Error| parse_error(path, e))
        }
    }
}

// ===========================================================================
// Loading
// ===========================================================================

/// Everything read from a data directory.
#[derive(Debug, Clone)]
pub struct GameData {
    pub config: GameConfig,
    pub catalog: Catalog,
}

/// Load and validate `config` and the optional `buildings` file from `dir`.
pub fn load_game_data(dir: &Path) -> Result<GameData, DataLoadError> {
    let config_path = require_data_file(dir, "config")?;
    let config: GameConfig = deserialize_file(&config_path)?;
    config.validate().map_err(|source| DataLoadError::Config {
        file: config_path.clone(),
        source,
    })?;
    debug!(target: "starhold::data", file = %config_path.display(), "config loaded");

    let catalog = match find_data_file(dir, "buildings")? {
        Some(path) => {
            let entries: Vec<BuildingData> = if detect_format(&path)? == Format::Toml {
                deserialize_file::<TomlBuildings>(&path)?.buildings
            } else {
                deserialize_list(&path, "buildings")?
            };
            let count = entries.len();
            let catalog = build_catalog(&path, &entries)?;
            info!(target: "starhold::data", file = %path.display(), overrides = count, "building table loaded");
            catalog
        }
        None => Catalog::default(),
    };

    Ok(GameData { config, catalog })
}

/// Apply `entries` over the built-in table and validate the result.
pub fn build_catalog(file: &Path, entries: &[BuildingData]) -> Result<Catalog, DataLoadError> {
    let mut seen: HashMap<String, BuildingType> = HashMap::new();
    let mut builder = Catalog::default_builder();

    for entry in entries {
        check_duplicate(&seen, &entry.name, file)?;
        let kind = resolve_building(&entry.name, file)?;
        let prerequisites = entry
            .prerequisites
            .iter()
            .map(|(name, level)| resolve_building(name, file).map(|k| (k, *level)))
            .collect::<Result<Vec<_>, _>>()?;
        let spec = entry.to_spec(kind, prerequisites);
        builder
            .mutate(kind, |slot| *slot = spec)
            .map_err(|source| DataLoadError::Catalog {
                file: file.to_path_buf(),
                source,
            })?;
        seen.insert(entry.name.clone(), kind);
    }

    builder.build().map_err(|source| DataLoadError::Catalog {
        file: file.to_path_buf(),
        source,
    })
}

// ===========================================================================
// Name resolution helpers
// ===========================================================================

fn resolve_building(name: &str, file: &Path) -> Result<BuildingType, DataLoadError> {
    BuildingType::from_name(name).ok_or_else(|| DataLoadError::UnresolvedRef {
        file: file.to_path_buf(),
        name: name.to_string(),
        expected_kind: "building",
    })
}

fn check_duplicate<V>(map: &HashMap<String, V>, name: &str, file: &Path) -> Result<(), DataLoadError> {
    if map.contains_key(name) {
        return Err(DataLoadError::DuplicateName {
            file: file.to_path_buf(),
            name: name.to_string(),
        });
    }
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================
