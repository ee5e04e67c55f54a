use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::search::{PreviewWindow, SearchOptions};

/// Directory name under the platform config dir
pub const CONFIG_DIR_NAME: &str = "treatise-search";

/// Config file name inside [`CONFIG_DIR_NAME`]
pub const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Root of the corpus on disk
    pub data_dir: PathBuf,

    /// Sub-directory of `data_dir` holding one YAML file per treatise
    pub treatise_dir: String,

    /// Glossary file inside `data_dir`
    pub glossary_file: String,

    /// Context kept around the first match of each result
    pub preview: PreviewWindow,

    /// Options applied when a request does not override them
    pub default_options: SearchOptions,

    /// Result cap used by the MCP search tool when no limit is given
    pub default_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            treatise_dir: "treatises".to_string(),
            glossary_file: "glossary.yaml".to_string(),
            preview: PreviewWindow::default(),
            default_options: SearchOptions::default(),
            default_limit: 20,
        }
    }
}

impl Config {
    /// Default location of the config file, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, the default location is
    /// used when present and built-in defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(default) if default.exists() => Self::from_file(&default),
                _ => {
                    debug!("No config file found, using defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn treatise_path(&self) -> PathBuf {
        self.data_dir.join(&self.treatise_dir)
    }

    pub fn glossary_path(&self) -> PathBuf {
        self.data_dir.join(&self.glossary_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.treatise_path(), PathBuf::from("./data/treatises"));
        assert_eq!(config.glossary_path(), PathBuf::from("./data/glossary.yaml"));
        assert_eq!(config.preview.before, 50);
        assert_eq!(config.preview.after, 100);
        assert_eq!(config.default_limit, 20);
        assert!(config.default_options.include_variants);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"data_dir": "/srv/corpus", "default_options": {{"match_case": true}}}}"#
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/corpus"));
        assert_eq!(config.glossary_file, "glossary.yaml");
        assert!(config.default_options.match_case);
        assert!(config.default_options.include_cross_language);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(Some(&dir.path().join("absent.json")));
        assert!(result.is_err());
    }

    #[test]
    fn test_malformed_file_is_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(Config::load(Some(file.path())).is_err());
    }
}
