//! Serializable run configuration.
//!
//! A `RunConfig` bundles the engine parameters with the data, session and
//! signal-log settings the runner needs. It loads from TOML and carries a
//! content hash so two runs over identical settings can be recognized.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use confluence_core::EngineConfig;

/// Errors from loading or validating a run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Engine(#[from] confluence_core::ConfigError),

    #[error("{field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Complete configuration for the runner and CLI.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunConfig {
    pub engine: EngineConfig,
    pub data: DataConfig,
    pub session: SessionConfig,
}

/// Where bars come from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DataConfig {
    /// Directory holding `{SYMBOL}_{interval}.csv` files.
    pub dir: PathBuf,
    /// Generate deterministic synthetic bars when the directory has none.
    pub synthetic_fallback: bool,
    /// Most recent bars requested per fetch.
    pub fetch_period: usize,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
            synthetic_fallback: false,
            fetch_period: 500,
        }
    }
}

/// Lifetime of memoized reports and the duplicate-signal window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    pub cache_ttl_secs: u64,
    pub signal_cooldown_secs: i64,
    /// Append emitted signals to this JSONL file when set.
    pub signal_log: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 300,
            signal_cooldown_secs: 300,
            signal_log: None,
        }
    }
}

impl RunConfig {
    /// Parse, validate and normalize a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(s)?;
        config.engine.validate()?;
        config.engine = config.engine.normalized();
        config.validate_runner()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    fn validate_runner(&self) -> Result<(), ConfigError> {
        if self.data.fetch_period == 0 {
            return Err(ConfigError::InvalidValue {
                field: "data.fetch_period",
                reason: "must be positive".into(),
            });
        }
        if self.session.signal_cooldown_secs < 0 {
            return Err(ConfigError::InvalidValue {
                field: "session.signal_cooldown_secs",
                reason: "must not be negative".into(),
            });
        }
        Ok(())
    }

    /// Deterministic BLAKE3 hash of the engine parameters.
    ///
    /// Data location and session settings do not change analysis output and
    /// are left out, so the same engine settings hash identically across
    /// machines.
    pub fn config_hash(&self) -> Result<String, ConfigError> {
        let text = toml::to_string(&self.engine)?;
        Ok(blake3::hash(text.as_bytes()).to_hex().to_string())
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default() {
        let config = RunConfig::from_toml_str("").unwrap();
        assert_eq!(config, RunConfig::default());
        assert_eq!(config.session.cache_ttl_secs, 300);
        assert_eq!(config.data.dir, PathBuf::from("data"));
    }

    #[test]
    fn nested_engine_section_parses() {
        let config = RunConfig::from_toml_str(
            r#"
[engine.averages]
periods = [50, 20]

[data]
dir = "bars"
synthetic_fallback = true
"#,
        )
        .unwrap();
        assert_eq!(config.engine.averages.periods, vec![20, 50]);
        assert!(config.data.synthetic_fallback);
        assert_eq!(config.data.dir, PathBuf::from("bars"));
    }

    #[test]
    fn engine_validation_errors_surface() {
        let err = RunConfig::from_toml_str("[engine.averages]\nperiods = [0, 5]\n").unwrap_err();
        assert!(matches!(err, ConfigError::Engine(_)));
    }

    #[test]
    fn zero_fetch_period_rejected() {
        let err = RunConfig::from_toml_str("[data]\nfetch_period = 0\n").unwrap_err();
        assert!(err.to_string().contains("data.fetch_period"));
    }

    #[test]
    fn config_hash_tracks_engine_only() {
        let base = RunConfig::default();
        let mut moved = base.clone();
        moved.data.dir = PathBuf::from("elsewhere");
        assert_eq!(base.config_hash().unwrap(), moved.config_hash().unwrap());

        let mut tuned = base.clone();
        tuned.engine.gaps.min_gap_pct = 0.1;
        assert_ne!(base.config_hash().unwrap(), tuned.config_hash().unwrap());
        assert_eq!(base.config_hash().unwrap().len(), 64);
    }

    #[test]
    fn toml_output_parses_back() {
        let mut config = RunConfig::default();
        config.data.synthetic_fallback = true;
        config.session.signal_log = Some(PathBuf::from("signals.jsonl"));
        let text = config.to_toml_string().unwrap();
        assert_eq!(RunConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.toml");
        std::fs::write(&path, "[session]\ncache_ttl_secs = 60\n").unwrap();
        let config = RunConfig::load(&path).unwrap();
        assert_eq!(config.session.cache_ttl_secs, 60);

        let missing = RunConfig::load(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Io { .. }));
    }
}
