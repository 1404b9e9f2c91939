#![forbid(unsafe_code)]

//! Runtime tuning knobs.
//!
//! With the `policy-config` feature a [`RuntimeConfig`] can be loaded from a
//! TOML or JSON document; every field is optional and falls back to its
//! default.
//!
//! ```toml
//! compare = "left_keys"
//! max_pass_depth = 16
//! ```

use crate::dirty::DEFAULT_MAX_PASS_DEPTH;
use crate::error::ConfigError;
use crate::shallow::CompareMode;

/// Settings shared by every binding of an [`App`](crate::app::App).
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "policy-config",
    derive(serde::Serialize, serde::Deserialize),
    serde(default, deny_unknown_fields)
)]
pub struct RuntimeConfig {
    /// How derived states are compared by update decisions.
    pub compare: CompareMode,
    /// Maximum nesting of re-entrant tracker passes before panicking.
    pub max_pass_depth: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            compare: CompareMode::default(),
            max_pass_depth: DEFAULT_MAX_PASS_DEPTH,
        }
    }
}

impl RuntimeConfig {
    /// Set the compare mode.
    #[must_use]
    pub fn with_compare(mut self, compare: CompareMode) -> Self {
        self.compare = compare;
        self
    }

    /// Set the pass depth limit.
    #[must_use]
    pub fn with_max_pass_depth(mut self, depth: usize) -> Self {
        self.max_pass_depth = depth;
        self
    }

    /// Check field ranges.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] if `max_pass_depth` is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_pass_depth == 0 {
            return Err(ConfigError::Invalid {
                field: "max_pass_depth",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

#[cfg(feature = "policy-config")]
impl RuntimeConfig {
    /// Parse and validate a TOML document.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] or [`ConfigError::Invalid`].
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON document.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] or [`ConfigError::Invalid`].
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.toml` or `.json` file, chosen by extension.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`], [`ConfigError::UnsupportedFormat`], or any
    /// parse/validation error.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let text = std::fs::read_to_string(path)?;
        let config = match ext.as_str() {
            "toml" => Self::from_toml_str(&text),
            "json" => Self::from_json_str(&text),
            other => Err(ConfigError::UnsupportedFormat(other.to_owned())),
        }?;
        tracing::debug!(path = %path.display(), ?config, "runtime config loaded");
        Ok(config)
    }
}
