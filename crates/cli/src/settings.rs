//! Runtime settings
//!
//! Sources, lowest priority first: built-in defaults, a TOML file
//! (`--config`, else the per-user config dir), `STAGEWISE_*` environment
//! variables.

use anyhow::{ensure, Context, Result};
use config::{Config, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::Deserialize;
use stagewise_core::application::worker::constants::DEFAULT_QUEUE_CAPACITY;
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "STAGEWISE";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Development: pretty formatting with colors
    Pretty,
    /// Production: JSON structured logging
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    pub queue_capacity: usize,
    pub parse_workers: usize,
    pub validate_workers: usize,
    pub persist_workers: usize,
    pub diagnostics: bool,
    pub log_format: LogFormat,
}

impl Settings {
    /// Load settings from defaults, file and process environment
    ///
    /// An explicit `path` must exist; the default per-user file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, Environment::with_prefix(ENV_PREFIX).try_parsing(true))
    }

    fn load_with_env(path: Option<&Path>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("queue_capacity", DEFAULT_QUEUE_CAPACITY as i64)?
            .set_default("parse_workers", 4_i64)?
            .set_default("validate_workers", 2_i64)?
            .set_default("persist_workers", 1_i64)?
            .set_default("diagnostics", false)?
            .set_default("log_format", "pretty")?;

        match path {
            Some(path) => {
                builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
            }
            None => {
                if let Some(default_path) = default_config_path() {
                    builder = builder.add_source(
                        File::from(default_path)
                            .format(FileFormat::Toml)
                            .required(false),
                    );
                }
            }
        }

        let settings: Settings = builder
            .add_source(env)
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.queue_capacity > 0, "queue_capacity must be at least 1");
        for (key, count) in [
            ("parse_workers", self.parse_workers),
            ("validate_workers", self.validate_workers),
            ("persist_workers", self.persist_workers),
        ] {
            ensure!(count > 0, "{key} must be at least 1");
        }
        Ok(())
    }
}

/// `<config_dir>/stagewise/config.toml`, if the platform has a config dir
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("dev", "stagewise", "stagewise")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}
