use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::history::DEFAULT_MAX_UNDO_DEPTH;
use crate::ui::format_buffer::{DEFAULT_JSON_INDENT, DEFAULT_TAB_WIDTH};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub display: DisplayConfig,
    pub behavior: BehaviorConfig,
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Plain rendering without colors, for terminals that can't do them
    pub ascii: bool,

    /// Draw borders around cells
    pub border: bool,

    /// Rows reserved above the table body
    pub header_height: usize,

    /// Rows reserved below the table body
    pub footer_height: usize,

    /// Narrowest a column is allowed to get before columns scroll instead
    pub min_column_width: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Snapshots kept for undo; each one is a full copy of the database file
    pub max_undo_depth: usize,

    /// Spaces inserted by Tab in format mode
    pub tab_width: usize,

    /// Indentation used when pretty-printing JSON cells
    pub json_indent: usize,

    /// Remove snapshot files left by a previous session at startup
    pub clear_temp_on_start: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory for snapshots and snippets (defaults to ~/.termsql)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_dir: Option<PathBuf>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            ascii: false,
            border: false,
            header_height: 3,
            footer_height: 3,
            min_column_width: 20,
        }
    }
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            max_undo_depth: DEFAULT_MAX_UNDO_DEPTH,
            tab_width: DEFAULT_TAB_WIDTH,
            json_indent: DEFAULT_JSON_INDENT,
            clear_temp_on_start: true,
        }
    }
}

impl Config {
    /// Load config from the default location, writing defaults if missing
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            let default_config = Self::default();
            default_config.save_to(config_path)?;
            return Ok(default_config);
        }

        let contents = fs::read_to_string(config_path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;

        Ok(())
    }

    /// Get the default config file path
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("termsql").join("config.toml"))
    }

    /// Create a default config file with comments
    pub fn create_default_with_comments() -> String {
        r#"# termsql Configuration File
# Location: ~/.config/termsql/config.toml (Linux)
#           ~/Library/Application Support/termsql/config.toml (macOS)

[display]
# Plain rendering without colors (same as --ascii)
ascii = false

# Draw borders around cells (toggle at runtime with 'b')
border = false

# Rows above and below the table body
header_height = 3
footer_height = 3

# Columns narrower than this scroll horizontally instead of squeezing
min_column_width = 20

[behavior]
# Number of undo snapshots; each one is a full copy of the database file
max_undo_depth = 10

# Spaces inserted by Tab in format mode
tab_width = 4

# Indentation for pretty-printed JSON cells
json_indent = 4

# Delete snapshot files left by a previous session at startup
clear_temp_on_start = true

[paths]
# Where snapshots and SQL snippets are kept (default ~/.termsql)
# temp_dir = "/path/to/dir"
"#
        .to_string()
    }
}
