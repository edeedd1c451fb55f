use crate::config::Config;
use anyhow::{anyhow, Result};
use std::fs;
use std::path::PathBuf;

/// Hidden directory for snapshots and snippets, under the home directory
pub const HIDDEN_DIR_NAME: &str = ".termsql";

pub struct AppPaths;

impl AppPaths {
    pub fn log_dir() -> Result<PathBuf> {
        let log_dir = dirs::data_local_dir()
            .ok_or_else(|| anyhow!("Cannot determine data directory"))?
            .join("termsql")
            .join("logs");

        fs::create_dir_all(&log_dir)?;
        Ok(log_dir)
    }

    /// Snapshot directory: the configured one, else `~/.termsql`
    pub fn temp_dir(config: &Config) -> Result<PathBuf> {
        let temp_dir = match &config.paths.temp_dir {
            Some(dir) => dir.clone(),
            None => dirs::home_dir()
                .ok_or_else(|| anyhow!("Cannot determine home directory"))?
                .join(HIDDEN_DIR_NAME),
        };

        fs::create_dir_all(&temp_dir)?;
        Ok(temp_dir)
    }
}
