//! Persistent CLI configuration
//!
//! Stored as `config.json` in the XDG config directory. A missing or
//! unreadable file yields [`AppConfig::default`]; command-line flags override
//! whatever the file says.

use crate::core::firewall::RangeOrder;
use crate::core::loader::LoadOptions;
use crate::core::rule::FieldMatching;
use crate::utils::{ensure_config_dir, get_config_dir};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

/// How `check` prints verdicts
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// `> query` followed by `true`/`false`
    #[default]
    #[strum(serialize = "text")]
    Text,
    #[strum(serialize = "json")]
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub field_matching: FieldMatching,
    #[serde(default)]
    pub range_order: RangeOrder,
    #[serde(default)]
    pub output_format: OutputFormat,
    /// `error`, `warn`, `info`, `debug` or `trace`
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            field_matching: FieldMatching::default(),
            range_order: RangeOrder::default(),
            output_format: OutputFormat::default(),
            log_level: default_log_level(),
        }
    }
}

impl AppConfig {
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            matching: self.field_matching,
            range_order: self.range_order,
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

pub fn config_path() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join("config.json"))
}

/// Loads the config from `path`, or returns the default if the file is
/// missing or invalid.
pub fn load_config_from(path: &Path) -> AppConfig {
    if let Ok(json) = std::fs::read_to_string(path)
        && let Ok(config) = serde_json::from_str::<AppConfig>(&json)
    {
        return config;
    }
    AppConfig::default()
}

/// Loads the config from the XDG config directory.
pub fn load_config() -> AppConfig {
    config_path().map_or_else(AppConfig::default, |path| load_config_from(&path))
}

/// Writes `config` to `path` atomically: temp file (0o600 on Unix), fsync,
/// rename.
pub fn save_config_to(config: &AppConfig, path: &Path) -> crate::Result<()> {
    let json = serde_json::to_string_pretty(config)?;
    let temp_path = path.with_extension("json.tmp");

    #[cfg(unix)]
    let mut file = {
        use std::os::unix::fs::OpenOptionsExt;

        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .mode(0o600)
            .open(&temp_path)?
    };

    #[cfg(not(unix))]
    let mut file = std::fs::File::create(&temp_path)?;

    file.write_all(json.as_bytes())?;
    file.sync_all()?;
    std::fs::rename(&temp_path, path)?;
    Ok(())
}

/// Writes `config` to the XDG config directory and returns the path used.
pub fn save_config(config: &AppConfig) -> crate::Result<Option<PathBuf>> {
    let Some(dir) = ensure_config_dir()? else {
        return Ok(None);
    };
    let path = dir.join("config.json");
    save_config_to(config, &path)?;
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("absent.json"));
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "range_order": "insertion", "field_matching": "lenient" }"#)
            .unwrap();

        let config = load_config_from(&path);
        assert_eq!(config.range_order, RangeOrder::Insertion);
        assert_eq!(config.field_matching, FieldMatching::Lenient);
        assert_eq!(config.output_format, OutputFormat::Text);
        assert_eq!(
            config.load_options(),
            LoadOptions {
                matching: FieldMatching::Lenient,
                range_order: RangeOrder::Insertion,
            }
        );
    }

    #[test]
    fn test_invalid_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(load_config_from(&path), AppConfig::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = AppConfig {
            output_format: OutputFormat::Json,
            log_level: "debug".to_string(),
            ..AppConfig::default()
        };
        save_config_to(&config, &path).unwrap();
        assert_eq!(load_config_from(&path), config);
        assert!(!path.with_extension("json.tmp").exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }
}
