//! Bridge configuration (jlbridge.toml and ~/.jlbridge/config.toml)
//!
//! Both files share one schema. The global file supplies defaults, the
//! project file overrides them section by section.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Which foreign runtime implementation a session talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process stand-in for the Julia runtime
    #[default]
    Emulated,
    /// A real libjulia loaded at run time
    #[serde(rename = "libjulia")]
    LibJulia,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Emulated => write!(f, "emulated"),
            BackendKind::LibJulia => write!(f, "libjulia"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "emulated" | "emulator" => Ok(BackendKind::Emulated),
            "libjulia" | "julia" => Ok(BackendKind::LibJulia),
            other => Err(ConfigError::InvalidValue {
                field: "runtime.backend".to_string(),
                reason: format!("must be 'emulated' or 'libjulia', got '{}'", other),
            }),
        }
    }
}

/// Full bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    /// Runtime selection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime: Option<RuntimeConfig>,

    /// Julia installation settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub julia: Option<JuliaConfig>,
}

/// `[runtime]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct RuntimeConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<BackendKind>,
}

/// `[julia]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct JuliaConfig {
    /// Julia install root; `<dir>/lib` is searched for the shared library
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    /// Library short name ("julia") or absolute path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library: Option<String>,

    /// Absolute path to a system image
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<PathBuf>,
}

impl BridgeConfig {
    /// Parse a configuration from TOML text without validating it
    pub fn parse(content: &str, file: &Path) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::TomlParseError {
            file: file.to_path_buf(),
            error: e,
        })
    }

    /// Load and validate configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config = Self::parse(&content, path)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate field values
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(julia) = &self.julia {
            if let Some(library) = &julia.library {
                if library.trim().is_empty() {
                    return Err(ConfigError::InvalidValue {
                        field: "julia.library".to_string(),
                        reason: "library name cannot be empty".to_string(),
                    });
                }
            }
            if let Some(image) = &julia.image {
                if !image.is_absolute() {
                    return Err(ConfigError::InvalidValue {
                        field: "julia.image".to_string(),
                        reason: format!("must be an absolute path, got '{}'", image.display()),
                    });
                }
            }
        }
        Ok(())
    }

    /// Get the global config file path (~/.jlbridge/config.toml)
    pub fn global_config_path() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".jlbridge").join("config.toml"))
    }

    /// Effective backend (defaults to the emulated runtime)
    pub fn backend(&self) -> BackendKind {
        self.runtime
            .as_ref()
            .and_then(|r| r.backend)
            .unwrap_or_default()
    }

    /// Julia install root, if configured
    pub fn julia_dir(&self) -> Option<&Path> {
        self.julia.as_ref().and_then(|j| j.dir.as_deref())
    }

    /// Library name or path (defaults to "julia")
    pub fn julia_library(&self) -> &str {
        self.julia
            .as_ref()
            .and_then(|j| j.library.as_deref())
            .unwrap_or("julia")
    }

    /// System image path, if configured
    pub fn julia_image(&self) -> Option<&Path> {
        self.julia.as_ref().and_then(|j| j.image.as_deref())
    }

    pub fn set_backend(&mut self, backend: BackendKind) {
        self.runtime.get_or_insert_with(Default::default).backend = Some(backend);
    }

    pub fn set_julia_dir(&mut self, dir: PathBuf) {
        self.julia.get_or_insert_with(Default::default).dir = Some(dir);
    }

    /// Merge another config into this one
    /// Other config takes precedence field by field
    pub fn merge(&mut self, other: &BridgeConfig) {
        if let Some(runtime) = &other.runtime {
            if let Some(backend) = runtime.backend {
                self.set_backend(backend);
            }
        }
        if let Some(julia) = &other.julia {
            let target = self.julia.get_or_insert_with(Default::default);
            if julia.dir.is_some() {
                target.dir = julia.dir.clone();
            }
            if julia.library.is_some() {
                target.library = julia.library.clone();
            }
            if julia.image.is_some() {
                target.image = julia.image.clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
[runtime]
backend = "libjulia"
"#;
        let config: BridgeConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.backend(), BackendKind::LibJulia);
        assert_eq!(config.julia_library(), "julia");
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[runtime]
backend = "emulated"

[julia]
dir = "/opt/julia-1.10"
library = "julia"
image = "/opt/julia-1.10/lib/julia/sys.so"
"#;
        let config: BridgeConfig = toml::from_str(toml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.julia_dir(), Some(Path::new("/opt/julia-1.10")));
        assert_eq!(
            config.julia_image(),
            Some(Path::new("/opt/julia-1.10/lib/julia/sys.so"))
        );
    }

    #[test]
    fn test_default_backend_is_emulated() {
        assert_eq!(BridgeConfig::default().backend(), BackendKind::Emulated);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let toml = r#"
[julia]
path = "/opt/julia"
"#;
        let result: Result<BridgeConfig, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_library_invalid() {
        let config = BridgeConfig {
            julia: Some(JuliaConfig {
                library: Some("  ".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_relative_image_invalid() {
        let config = BridgeConfig {
            julia: Some(JuliaConfig {
                image: Some(PathBuf::from("sys.so")),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!("LibJulia".parse::<BackendKind>().unwrap(), BackendKind::LibJulia);
        assert_eq!("emulated".parse::<BackendKind>().unwrap(), BackendKind::Emulated);
        assert!("python".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_merge_configs() {
        let mut base = BridgeConfig {
            julia: Some(JuliaConfig {
                dir: Some(PathBuf::from("/usr/local/julia")),
                library: Some("julia".to_string()),
                image: None,
            }),
            ..Default::default()
        };
        let other = BridgeConfig {
            runtime: Some(RuntimeConfig {
                backend: Some(BackendKind::LibJulia),
            }),
            julia: Some(JuliaConfig {
                dir: Some(PathBuf::from("/opt/julia")),
                ..Default::default()
            }),
        };

        base.merge(&other);
        assert_eq!(base.backend(), BackendKind::LibJulia);
        assert_eq!(base.julia_dir(), Some(Path::new("/opt/julia")));
        assert_eq!(base.julia_library(), "julia");
    }
}
