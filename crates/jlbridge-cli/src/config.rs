//! CLI configuration via environment variables
//!
//! Backend selection lives in jlbridge.toml; the variables here only change
//! how the CLI presents results.

use std::env;

/// CLI configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Default to JSON output (JLBRIDGE_OUTPUT=json)
    pub default_json: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            default_json: env::var("JLBRIDGE_OUTPUT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
