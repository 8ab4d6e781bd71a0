//! Configuration system for adhesive.
//!
//! Load compiler, registry and logging settings from TOML or YAML so that a
//! host can tune the bridge without code changes.
//!
//! # Examples
//!
//! Load configuration from TOML string:
//!
//! ```
//! use adhesive_config::{AdhesiveConfig, ExecutionMode};
//!
//! let config = AdhesiveConfig::from_toml_str(r#"
//!     [compiler]
//!     execution = "interpreted"
//!     generated_namespace = "acme.units"
//!
//!     [registry]
//!     max_artifacts = 64
//! "#).unwrap();
//!
//! assert_eq!(config.compiler.execution, ExecutionMode::Interpreted);
//! assert_eq!(config.registry.max_artifacts, Some(64));
//! ```
//!
//! Use default config when file is missing:
//!
//! ```
//! use adhesive_config::AdhesiveConfig;
//!
//! let config = AdhesiveConfig::load("adhesive.toml").unwrap_or_default();
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Namespace used for generated unit packages unless configured otherwise.
pub const DEFAULT_GENERATED_NAMESPACE: &str = "adhesive.generated";

/// Default `tracing` filter directive.
pub const DEFAULT_LOG_FILTER: &str = "adhesive=info";

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main adhesive configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct AdhesiveConfig {
    /// Dynamic compiler settings.
    #[serde(default)]
    pub compiler: CompilerConfig,

    /// Artifact registry settings.
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AdhesiveConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if file doesn't exist, contains invalid TOML or fails
    /// validation.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml_file(path)
    }

    /// Loads configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Parses configuration from a YAML string.
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values serde cannot check on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.registry.max_artifacts == Some(0) {
            return Err(ConfigError::Invalid(
                "registry.max_artifacts must be at least 1".to_string(),
            ));
        }
        if !is_qualified_name(&self.compiler.generated_namespace) {
            return Err(ConfigError::Invalid(format!(
                "compiler.generated_namespace `{}` is not a dotted identifier",
                self.compiler.generated_namespace
            )));
        }
        Ok(())
    }

    /// Sets the execution backend.
    pub fn with_execution(mut self, execution: ExecutionMode) -> Self {
        self.compiler.execution = execution;
        self
    }

    /// Sets the namespace for generated packages.
    pub fn with_generated_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.compiler.generated_namespace = namespace.into();
        self
    }

    /// Bounds the number of registered artifacts.
    pub fn with_max_artifacts(mut self, max: usize) -> Self {
        self.registry.max_artifacts = Some(max);
        self
    }

    /// Promotes compiler warnings to errors.
    pub fn with_warnings_as_errors(mut self, enabled: bool) -> Self {
        self.compiler.warnings_as_errors = enabled;
        self
    }

    /// Sets the logging filter directive.
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.logging.filter = filter.into();
        self
    }
}

/// Compiler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct CompilerConfig {
    /// How loaded units execute.
    #[serde(default)]
    pub execution: ExecutionMode,

    /// Cranelift optimization level for the JIT backend.
    #[serde(default)]
    pub opt_level: OptLevel,

    /// Package prefix for units compiled without an explicit name.
    #[serde(default = "default_generated_namespace")]
    pub generated_namespace: String,

    /// Whether warnings fail a compilation.
    #[serde(default)]
    pub warnings_as_errors: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            execution: ExecutionMode::default(),
            opt_level: OptLevel::default(),
            generated_namespace: default_generated_namespace(),
            warnings_as_errors: false,
        }
    }
}

/// Execution backend for loaded units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Native code generated with Cranelift.
    #[default]
    Jit,

    /// Tree-walking interpreter.
    Interpreted,
}

/// Cranelift optimization level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OptLevel {
    None,

    #[default]
    Speed,

    SpeedAndSize,
}

impl OptLevel {
    /// The value of Cranelift's `opt_level` setting.
    pub fn as_cranelift_setting(&self) -> &'static str {
        match self {
            OptLevel::None => "none",
            OptLevel::Speed => "speed",
            OptLevel::SpeedAndSize => "speed_and_size",
        }
    }
}

/// Artifact registry configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct RegistryConfig {
    /// Maximum number of registered artifacts; the oldest are evicted first.
    /// Unbounded when absent.
    #[serde(default)]
    pub max_artifacts: Option<usize>,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_generated_namespace() -> String {
    DEFAULT_GENERATED_NAMESPACE.to_string()
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

/// Returns true for dot-separated identifiers such as `com.acme.units`.
pub fn is_qualified_name(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|segment| {
            let mut chars = segment.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}
