//! Runtime configuration: template location, equation defaults, converter
//! command and generation concurrency.
//!
//! Values come from `Default`, from `TYPIST_*` environment variables, or from
//! a YAML file. Missing keys keep their defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

/// External LaTeX-to-native equation converter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    pub program: String,
    pub args: Vec<String>,
    pub timeout_ms: u64,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            program: "node".to_string(),
            args: vec!["hwp_eqn_cli.js".to_string()],
            timeout_ms: 10_000,
        }
    }
}

impl ConverterConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypistConfig {
    /// Directory holding the template fragments.
    pub template_dir: PathBuf,
    /// Concurrent script generations.
    pub max_workers: usize,
    pub equation_font: String,
    pub equation_size_pt: f64,
    /// Text size inside containers.
    pub box_font_size_pt: f64,
    pub converter: ConverterConfig,
}

impl Default for TypistConfig {
    fn default() -> Self {
        Self {
            template_dir: PathBuf::from("templates"),
            max_workers: 3,
            equation_font: "HyhwpEQ".to_string(),
            equation_size_pt: 8.0,
            box_font_size_pt: 8.0,
            converter: ConverterConfig::default(),
        }
    }
}

fn parsed<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue { key, value })
}

impl TypistConfig {
    /// Defaults overridden by `TYPIST_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(dir) = lookup("TYPIST_TEMPLATE_DIR") {
            config.template_dir = PathBuf::from(dir);
        }
        if let Some(value) = lookup("TYPIST_MAX_WORKERS") {
            config.max_workers = parsed("TYPIST_MAX_WORKERS", value)?;
        }
        if let Some(font) = lookup("TYPIST_EQUATION_FONT") {
            config.equation_font = font;
        }
        if let Some(value) = lookup("TYPIST_EQUATION_SIZE_PT") {
            config.equation_size_pt = parsed("TYPIST_EQUATION_SIZE_PT", value)?;
        }
        if let Some(value) = lookup("TYPIST_BOX_FONT_SIZE_PT") {
            config.box_font_size_pt = parsed("TYPIST_BOX_FONT_SIZE_PT", value)?;
        }
        if let Some(command) = lookup("TYPIST_EQN_CONVERTER") {
            let mut words = command.split_whitespace().map(str::to_string);
            let Some(program) = words.next() else {
                return Err(ConfigError::InvalidValue {
                    key: "TYPIST_EQN_CONVERTER",
                    value: command,
                });
            };
            config.converter.program = program;
            config.converter.args = words.collect();
        }
        if let Some(value) = lookup("TYPIST_EQN_TIMEOUT_MS") {
            config.converter.timeout_ms = parsed("TYPIST_EQN_TIMEOUT_MS", value)?;
        }
        Ok(config.clamped())
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(config.clamped())
    }

    fn clamped(mut self) -> Self {
        self.max_workers = self.max_workers.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_overrides() {
        let config = TypistConfig::from_lookup(lookup(&[
            ("TYPIST_TEMPLATE_DIR", "/opt/templates"),
            ("TYPIST_MAX_WORKERS", "8"),
            ("TYPIST_EQN_CONVERTER", "python3 -m eqn_convert"),
            ("TYPIST_EQN_TIMEOUT_MS", "2500"),
        ]))
        .unwrap();
        assert_eq!(config.template_dir, PathBuf::from("/opt/templates"));
        assert_eq!(config.max_workers, 8);
        assert_eq!(config.converter.program, "python3");
        assert_eq!(config.converter.args, vec!["-m", "eqn_convert"]);
        assert_eq!(config.converter.timeout(), Duration::from_millis(2500));
        assert_eq!(config.equation_font, "HyhwpEQ");
    }

    #[test]
    fn test_zero_workers_clamped() {
        let config = TypistConfig::from_lookup(lookup(&[("TYPIST_MAX_WORKERS", "0")])).unwrap();
        assert_eq!(config.max_workers, 1);
    }

    #[test]
    fn test_invalid_number_rejected() {
        let err = TypistConfig::from_lookup(lookup(&[("TYPIST_EQUATION_SIZE_PT", "large")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "TYPIST_EQUATION_SIZE_PT", .. }));
    }

    #[test]
    fn test_yaml_file_partial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("typist.yaml");
        std::fs::write(&path, "max_workers: 5\nconverter:\n  timeout_ms: 500\n").unwrap();
        let config = TypistConfig::from_yaml_file(&path).unwrap();
        assert_eq!(config.max_workers, 5);
        assert_eq!(config.converter.timeout_ms, 500);
        assert_eq!(config.converter.program, "node");
        assert_eq!(config.box_font_size_pt, 8.0);
    }

    #[test]
    fn test_yaml_file_missing() {
        let err = TypistConfig::from_yaml_file(Path::new("/nonexistent/typist.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
