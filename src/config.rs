// Configuration loading and parsing (ratings.toml).

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::ratings::attribute::PositionGroup;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// ratings.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct RatingsConfig {
    pub run: RunConfig,
    pub imputation: ImputationConfig,
    pub data_paths: DataPaths,
    pub database: DatabaseSection,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    pub first_season: u16,
    pub last_season: u16,
    /// Position groups to orchestrate, by long name (e.g. "quarterback").
    pub position_groups: Vec<String>,
    /// Weight of the season view in the season/form blend; the form weight
    /// is its complement.
    pub season_weight: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImputationConfig {
    /// Seed for the deterministic imputer. Identical seeds over identical
    /// inputs reproduce runs exactly.
    pub seed: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataPaths {
    pub players: String,
    pub player_weeks: String,
    pub weekly_stats: String,
    pub baselines: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSection {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    /// Entries per side of the weekly movement report.
    pub top_n: usize,
}

impl RatingsConfig {
    /// Parsed position groups, in configured order.
    pub fn position_groups(&self) -> Vec<PositionGroup> {
        self.run
            .position_groups
            .iter()
            .filter_map(|name| PositionGroup::parse(name))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/ratings.toml` relative to
/// the given base directory.
///
/// This is the lower-level loading primitive that does not auto-copy
/// defaults. Prefer `load_config()` which handles default initialization.
pub(crate) fn load_config_from(base_dir: &Path) -> Result<RatingsConfig, ConfigError> {
    let path = base_dir.join("config").join("ratings.toml");
    let text = std::fs::read_to_string(&path).map_err(|_| ConfigError::FileNotFound {
        path: path.clone(),
    })?;
    let config: RatingsConfig = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.clone(),
        source: e,
    })?;
    validate(&config)?;
    Ok(config)
}

/// Ensure config files exist by copying missing ones from `defaults/`.
/// Returns the list of files that were copied.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}; \
                     run from the project root or ensure defaults/ is present",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let mut copied = Vec::new();
    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;
    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read defaults entry: {e}"),
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };
        let target = config_dir.join(file_name);

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(mut dest) => {
                let content = std::fs::read(&path).map_err(|e| ConfigError::DefaultsCopyError {
                    message: format!("failed to read {}: {e}", path.display()),
                })?;
                std::io::Write::write_all(&mut dest, &content).map_err(|e| {
                    ConfigError::DefaultsCopyError {
                        message: format!("failed to write {}: {e}", target.display()),
                    }
                })?;
                copied.push(target);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                // Already customized; leave it alone.
            }
            Err(e) => {
                return Err(ConfigError::DefaultsCopyError {
                    message: format!("failed to create {}: {e}", target.display()),
                });
            }
        }
    }
    Ok(copied)
}

/// Convenience wrapper: copies defaults if needed and loads config relative
/// to the given base directory.
pub fn load_config(base_dir: &Path) -> Result<RatingsConfig, ConfigError> {
    ensure_config_files(base_dir)?;
    load_config_from(base_dir)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &RatingsConfig) -> Result<(), ConfigError> {
    if config.run.first_season > config.run.last_season {
        return Err(ConfigError::ValidationError {
            field: "run.first_season".into(),
            message: format!(
                "must not exceed last_season ({} > {})",
                config.run.first_season, config.run.last_season
            ),
        });
    }

    let weight = config.run.season_weight;
    if !(0.0..=1.0).contains(&weight) {
        return Err(ConfigError::ValidationError {
            field: "run.season_weight".into(),
            message: format!("must be between 0.0 and 1.0 inclusive, got {weight}"),
        });
    }

    if config.run.position_groups.is_empty() {
        return Err(ConfigError::ValidationError {
            field: "run.position_groups".into(),
            message: "must name at least one position group".into(),
        });
    }
    for name in &config.run.position_groups {
        if PositionGroup::parse(name).is_none() {
            return Err(ConfigError::ValidationError {
                field: "run.position_groups".into(),
                message: format!("unknown position group `{name}`"),
            });
        }
    }

    if config.report.top_n == 0 {
        return Err(ConfigError::ValidationError {
            field: "report.top_n".into(),
            message: "must be > 0".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
