//! Shared value types.

use serde::{Deserialize, Serialize};

/// A configuration value together with where it came from.
///
/// ```rust
/// use draftsmith_utils::types::{ConfigValue, ConfigSource};
/// use serde_json::json;
///
/// let value = ConfigValue {
///     value: json!("anthropic"),
///     source: ConfigSource::Config,
/// };
/// assert_eq!(value.source.to_string(), "config");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigValue {
    pub value: serde_json::Value,
    pub source: ConfigSource,
}

/// Source of a configuration value.
///
/// Precedence: CLI arguments > environment > config file > programmatic
/// overrides > built-in defaults.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    /// Value provided via CLI argument (highest precedence).
    Cli,
    /// Value read from a `DRAFTSMITH_*` environment variable.
    Env,
    /// Value loaded from configuration file.
    Config,
    /// Value provided programmatically (e.g., `Config::builder()`).
    Programmatic,
    /// Built-in default value (lowest precedence).
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Cli => "cli",
            Self::Env => "env",
            Self::Config => "config",
            Self::Programmatic => "programmatic",
            Self::Default => "default",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_source_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ConfigSource::Cli).unwrap(), r#""cli""#);
        assert_eq!(serde_json::to_string(&ConfigSource::Env).unwrap(), r#""env""#);
        let back: ConfigSource = serde_json::from_str(r#""default""#).unwrap();
        assert_eq!(back, ConfigSource::Default);
    }
}
