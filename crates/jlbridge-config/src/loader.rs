//! Configuration Loader
//!
//! Handles loading and merging configuration from multiple sources with proper precedence.

use crate::bridge::{BackendKind, BridgeConfig};
use crate::{ConfigResult, CONFIG_FILE_NAME};
use std::env;
use std::path::{Path, PathBuf};

/// Configuration loader
///
/// Loads configuration from multiple sources and merges them with proper precedence:
/// 1. Global config (~/.jlbridge/config.toml) - lowest priority
/// 2. Project config (./jlbridge.toml) - overrides global
/// 3. Environment variables - overrides project
/// 4. CLI flags - highest priority (handled by caller)
pub struct ConfigLoader {
    /// Cached global config path
    global_config_path: Option<PathBuf>,
}

/// Merged configuration result
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    /// Effective configuration after merging all sources
    pub bridge: BridgeConfig,

    /// Directory where jlbridge.toml was found
    pub project_root: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            global_config_path: None,
        }
    }

    /// Use an explicit global config path instead of ~/.jlbridge/config.toml
    pub fn with_global_config_path(path: PathBuf) -> Self {
        Self {
            global_config_path: Some(path),
        }
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to find jlbridge.toml, then merges it over
    /// the global config and applies environment overrides.
    pub fn load_from_directory(&mut self, start_dir: &Path) -> ConfigResult<LoadedConfig> {
        let (project_root, project_config) = self.find_project_config(start_dir)?;

        let mut bridge = self.load_global_config()?;
        bridge.merge(&project_config);
        let bridge = apply_env_overrides(bridge)?;

        Ok(LoadedConfig {
            bridge,
            project_root,
        })
    }

    /// Load configuration from a specific project config file
    pub fn load_from_file(&mut self, config_path: &Path) -> ConfigResult<LoadedConfig> {
        let project_config = BridgeConfig::load_from_file(config_path)?;

        let mut bridge = self.load_global_config()?;
        bridge.merge(&project_config);
        let bridge = apply_env_overrides(bridge)?;

        Ok(LoadedConfig {
            bridge,
            project_root: config_path.parent().map(|p| p.to_path_buf()),
        })
    }

    /// Find project configuration by walking up directory tree
    fn find_project_config(
        &self,
        start_dir: &Path,
    ) -> ConfigResult<(Option<PathBuf>, BridgeConfig)> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);

            if config_path.exists() {
                let config = BridgeConfig::load_from_file(&config_path)?;
                return Ok((Some(current), config));
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Ok((None, BridgeConfig::default())),
            }
        }
    }

    /// Load global configuration, defaulting when the file is absent
    fn load_global_config(&mut self) -> ConfigResult<BridgeConfig> {
        let path = match &self.global_config_path {
            Some(path) => path.clone(),
            None => match BridgeConfig::global_config_path() {
                Ok(path) => {
                    self.global_config_path = Some(path.clone());
                    path
                }
                // No home directory means no global config
                Err(_) => return Ok(BridgeConfig::default()),
            },
        };

        if !path.exists() {
            return Ok(BridgeConfig::default());
        }

        BridgeConfig::load_from_file(&path)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply environment variable overrides
///
/// - JLBRIDGE_BACKEND: emulated | libjulia
/// - JULIA_DIR: Julia install root
/// - JLBRIDGE_JULIA_LIBRARY: library name or path
/// - JLBRIDGE_JULIA_IMAGE: system image path
pub fn apply_env_overrides(mut config: BridgeConfig) -> ConfigResult<BridgeConfig> {
    if let Ok(backend) = env::var("JLBRIDGE_BACKEND") {
        config.set_backend(backend.parse::<BackendKind>()?);
    }

    if let Ok(dir) = env::var("JULIA_DIR") {
        if !dir.is_empty() {
            config.set_julia_dir(PathBuf::from(dir));
        }
    }

    if let Ok(library) = env::var("JLBRIDGE_JULIA_LIBRARY") {
        config.julia.get_or_insert_with(Default::default).library = Some(library);
    }

    if let Ok(image) = env::var("JLBRIDGE_JULIA_IMAGE") {
        config.julia.get_or_insert_with(Default::default).image = Some(PathBuf::from(image));
    }

    config.validate()?;
    Ok(config)
}

impl LoadedConfig {
    /// Check if a jlbridge.toml was found
    pub fn is_project(&self) -> bool {
        self.project_root.is_some()
    }

    /// Get the project root directory
    pub fn project_root(&self) -> Option<&Path> {
        self.project_root.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    fn loader_without_global(dir: &TempDir) -> ConfigLoader {
        ConfigLoader::with_global_config_path(dir.path().join("no-global.toml"))
    }

    #[test]
    #[serial]
    fn test_find_config_in_parent() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join(CONFIG_FILE_NAME),
            "[runtime]\nbackend = \"libjulia\"\n",
        )
        .unwrap();

        let sub_dir = temp_dir.path().join("subdir");
        fs::create_dir(&sub_dir).unwrap();

        let mut loader = loader_without_global(&temp_dir);
        let config = loader.load_from_directory(&sub_dir).unwrap();

        assert_eq!(config.bridge.backend(), BackendKind::LibJulia);
        assert_eq!(config.project_root(), Some(temp_dir.path()));
    }

    #[test]
    #[serial]
    fn test_env_override_backend() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join(CONFIG_FILE_NAME),
            "[runtime]\nbackend = \"libjulia\"\n",
        )
        .unwrap();

        env::set_var("JLBRIDGE_BACKEND", "emulated");
        let mut loader = loader_without_global(&temp_dir);
        let config = loader.load_from_directory(temp_dir.path());
        env::remove_var("JLBRIDGE_BACKEND");

        assert_eq!(config.unwrap().bridge.backend(), BackendKind::Emulated);
    }

    #[test]
    #[serial]
    fn test_env_override_invalid_backend() {
        let temp_dir = TempDir::new().unwrap();

        env::set_var("JLBRIDGE_BACKEND", "octave");
        let mut loader = loader_without_global(&temp_dir);
        let result = loader.load_from_directory(temp_dir.path());
        env::remove_var("JLBRIDGE_BACKEND");

        assert!(result.is_err());
    }
}
