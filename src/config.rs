use crate::core::db::{ConnectionOptions, DatabaseFile, TableSchema};
use crate::core::{Result, TablekitError};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level configuration structure parsed from a TOML file.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub sqlite: ConnectionOptions,
    #[serde(default)]
    pub tables: Vec<TableSchema>,
}

/// Database file settings.
#[derive(Debug, Deserialize)]
pub struct DatabaseConfig {
    /// Database file; relative paths are resolved against the config file
    pub path: PathBuf,
    /// Name of the environment variable holding the passphrase
    pub passphrase_env: Option<String>,
}

impl Config {
    /// Builds the database file description, reading the passphrase from
    /// the configured environment variable.
    pub fn database_file(&self) -> Result<DatabaseFile> {
        let file = DatabaseFile::new(&self.database.path);

        match &self.database.passphrase_env {
            Some(var) => {
                let passphrase = std::env::var(var).map_err(|_| {
                    TablekitError::Config(format!("environment variable '{}' is not set", var))
                })?;
                Ok(file.with_passphrase(passphrase))
            }
            None => Ok(file),
        }
    }
}

/// Loads configuration from a TOML file at the given path.
///
/// # Example
///
/// ```no_run
/// let config = tablekit::config::load_config("tablekit.toml").expect("Failed to load config");
/// println!("{:?}", config);
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let mut config = parse_config(&content)?;

    if config.database.path.is_relative() {
        if let Some(dir) = path.parent() {
            config.database.path = dir.join(&config.database.path);
        }
    }

    Ok(config)
}

/// Parses and validates configuration text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config =
        toml::from_str(content).map_err(|e| TablekitError::Config(e.to_string()))?;

    for table in &config.tables {
        table.validate()?;
    }

    Ok(config)
}

/// Default location: `<config dir>/tablekit/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tablekit").join("config.toml"))
}
