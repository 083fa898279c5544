use crate::aggregate::RankingDedup;
use crate::reader::Compression;
use crate::render::{OutputFormat, DEFAULT_DISPLAY_LIMIT};
use crate::window::DEFAULT_WINDOW_MINUTES;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration loaded from sessionize.toml.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub input: InputConfig,
    pub session: SessionConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct InputConfig {
    pub path: PathBuf,
    pub compression: Compression,
    pub has_header: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    pub window_minutes: u32,
    pub ranking_dedup: RankingDedup,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    /// Rows shown per table; 0 shows everything.
    pub display_limit: usize,
}

// --- Default implementations ---

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/2015_07_22_mktplace_shop_web_log_sample.log.gz"),
            compression: Compression::Auto,
            has_header: false,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            window_minutes: DEFAULT_WINDOW_MINUTES,
            ranking_dedup: RankingDedup::Row,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Table,
            display_limit: DEFAULT_DISPLAY_LIMIT,
        }
    }
}

impl AnalyzerConfig {
    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };
        let config: Self = toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session.window_minutes == 0 {
            return Err(ConfigError::Invalid(
                "session.window_minutes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Errors from loading the configuration.
#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read config {}: {source}", path.display())
            }
            ConfigError::Parse { path, source } => {
                write!(f, "failed to parse config {}: {source}", path.display())
            }
            ConfigError::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::Invalid(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_is_default() {
        let cfg = AnalyzerConfig::load(Path::new("/nonexistent/sessionize.toml")).unwrap();
        assert_eq!(cfg, AnalyzerConfig::default());
        assert_eq!(cfg.session.window_minutes, 15);
        assert_eq!(cfg.output.display_limit, 20);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sessionize.toml");
        std::fs::write(
            &path,
            "[session]\nwindow_minutes = 30\nranking_dedup = \"session\"\n\n[output]\nformat = \"json\"\n",
        )
        .unwrap();

        let cfg = AnalyzerConfig::load(&path).unwrap();
        assert_eq!(cfg.session.window_minutes, 30);
        assert_eq!(cfg.session.ranking_dedup, RankingDedup::Session);
        assert_eq!(cfg.output.format, OutputFormat::Json);
        assert_eq!(cfg.output.display_limit, 20);
        assert_eq!(cfg.input, InputConfig::default());
    }

    #[test]
    fn input_section() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sessionize.toml");
        std::fs::write(
            &path,
            "[input]\npath = \"logs/elb.log.zst\"\ncompression = \"zstd\"\nhas_header = true\n",
        )
        .unwrap();

        let cfg = AnalyzerConfig::load(&path).unwrap();
        assert_eq!(cfg.input.path, PathBuf::from("logs/elb.log.zst"));
        assert_eq!(cfg.input.compression, Compression::Zstd);
        assert!(cfg.input.has_header);
    }

    #[test]
    fn parse_error_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sessionize.toml");
        std::fs::write(&path, "[session]\nwindow_minutes = \"soon\"\n").unwrap();
        let err = AnalyzerConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn zero_window_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sessionize.toml");
        std::fs::write(&path, "[session]\nwindow_minutes = 0\n").unwrap();
        let err = AnalyzerConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn example_config_matches_defaults() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("sessionize.example.toml");
        let cfg = AnalyzerConfig::load(&path).unwrap();
        assert_eq!(cfg, AnalyzerConfig::default());
    }

    #[test]
    fn resolved_config_serializes() {
        let text = toml::to_string(&AnalyzerConfig::default()).unwrap();
        assert!(text.contains("window_minutes = 15"));
        assert!(text.contains("compression = \"auto\""));
    }
}
