//! Configuration module
//!
//! Settings are read from a TOML file in the user's config directory;
//! every section falls back to defaults for keys it doesn't set.

pub mod config;

pub use config::Config;
