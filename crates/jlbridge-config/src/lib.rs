//! jlbridge Configuration System
//!
//! Provides configuration management for hosts embedding Julia through
//! jlbridge:
//! - Project configuration (jlbridge.toml)
//! - Global user configuration (~/.jlbridge/config.toml)
//! - Configuration precedence and merging
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded and merged in the following order (later overrides earlier):
//! 1. Global config (~/.jlbridge/config.toml)
//! 2. Project config (./jlbridge.toml)
//! 3. Environment variables (JLBRIDGE_*, JULIA_DIR)
//! 4. CLI flags
//!
//! # Example
//!
//! ```no_run
//! use jlbridge_config::ConfigLoader;
//! use std::path::Path;
//!
//! let mut loader = ConfigLoader::new();
//! let config = loader.load_from_directory(Path::new(".")).unwrap();
//! println!("backend: {}", config.bridge.backend());
//! ```

pub mod bridge;
pub mod loader;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Home directory not found")]
    HomeNotFound,
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Name of the per-project configuration file
pub const CONFIG_FILE_NAME: &str = "jlbridge.toml";

// Re-export main types
pub use bridge::{BackendKind, BridgeConfig, JuliaConfig, RuntimeConfig};
pub use loader::{ConfigLoader, LoadedConfig};
