//! # Configuration
//!
//! Optional TOML file supplying defaults for the CLI commands. Every key is
//! optional; command-line flags take precedence over the file.
//!
//! ```toml
//! [build]
//! strict = false
//!
//! [compare]
//! mode = "canonical"
//!
//! [score]
//! check_values = true
//!
//! [limits]
//! max_file_size = 10485760
//! ```

use codebook_core::{BuildOptions, CodebookError, EqualityMode, MAX_DOCUMENT_SIZE};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub build: BuildConfig,
    pub compare: CompareConfig,
    pub score: ScoreConfig,
    pub limits: LimitsConfig,
}

/// Defaults for `codebook build` and for extracted predictions in `score`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    pub strict: bool,
}

/// Defaults for `codebook compare`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompareConfig {
    pub mode: EqualityMode,
}

/// Defaults for `codebook score`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScoreConfig {
    pub check_values: bool,
}

/// Input limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Largest input file accepted, in bytes.
    pub max_file_size: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size: MAX_DOCUMENT_SIZE as u64,
        }
    }
}

impl Config {
    /// Parse configuration from TOML text and validate it.
    pub fn from_toml_str(content: &str) -> Result<Self, CodebookError> {
        let config: Config = toml::from_str(content).map_err(|e| {
            CodebookError::DeserializationError(format!("Failed to parse config file: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, CodebookError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CodebookError::IoError(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Load from `path` if given, otherwise return the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, CodebookError> {
        match path {
            Some(path) => {
                let config = Self::from_file(path)?;
                tracing::debug!("Loaded configuration from {}", path.display());
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }

    /// Reject limits that would make every input unreadable or exceed the
    /// document size the engine accepts.
    pub fn validate(&self) -> Result<(), CodebookError> {
        let max = self.limits.max_file_size;
        if max == 0 || max > MAX_DOCUMENT_SIZE as u64 {
            return Err(CodebookError::DeserializationError(format!(
                "limits.max_file_size must be between 1 and {} bytes, got {}",
                MAX_DOCUMENT_SIZE, max
            )));
        }
        Ok(())
    }

    /// Build options after applying `--strict` / `--no-strict`.
    pub fn build_options(&self, strict_flag: Option<bool>) -> BuildOptions {
        BuildOptions {
            strict: strict_flag.unwrap_or(self.build.strict),
        }
    }

    /// Equality mode after applying the `--mode` flag.
    pub fn equality_mode(&self, flag: Option<EqualityMode>) -> EqualityMode {
        flag.unwrap_or(self.compare.mode)
    }

    /// Value checking after applying `--check-values` / `--no-check-values`.
    pub fn check_values(&self, flag: Option<bool>) -> bool {
        flag.unwrap_or(self.score.check_values)
    }
}

// =============================================================================
// TESTS
// =============================================================================
