//! Optional TOML configuration file.
//!
//! ```toml
//! [codec]
//! standards = ["dvb", "isdb"]
//! strict = false
//! fix_pds = true
//! default_pds = 0x28
//!
//! [logging]
//! level = "info"
//! log_dir = "logs"
//! retention_days = 7
//! ```

use std::path::{Path, PathBuf};

use psitool_codec::standards::UnknownStandard;
use psitool_codec::Standards;
use serde::Deserialize;

/// Looked up in the current directory when `--config` is not given.
pub(crate) const DEFAULT_CONFIG_FILE: &str = "psitool.toml";
pub(crate) const DEFAULT_RETENTION_DAYS: u64 = 7;

#[derive(Debug, Deserialize, Default)]
pub(crate) struct ConfigFile {
    #[serde(default)]
    pub codec: CodecSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Deserialize, Default)]
pub(crate) struct CodecSection {
    #[serde(default)]
    pub standards: Vec<String>,
    pub strict: Option<bool>,
    pub fix_pds: Option<bool>,
    pub default_pds: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
pub(crate) struct LoggingSection {
    pub level: Option<String>,
    pub log_dir: Option<PathBuf>,
    pub retention_days: Option<u64>,
}

impl CodecSection {
    pub fn standards(&self) -> Result<Standards, UnknownStandard> {
        self.standards.iter().try_fold(Standards::empty(), |all, name| {
            Ok(all | name.parse::<Standards>()?)
        })
    }
}

pub(crate) fn load_config(path: &Path) -> Result<ConfigFile, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)?;
    let config: ConfigFile = toml::from_str(&contents)?;
    Ok(config)
}

/// Explicit path, else the default file if present, else defaults.
pub(crate) fn resolve_config(explicit: Option<&Path>) -> Result<ConfigFile, Box<dyn std::error::Error>> {
    let path = explicit.map(Path::to_path_buf).or_else(|| {
        let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
        default_path.exists().then_some(default_path)
    });
    match path {
        Some(path) => {
            let config = load_config(&path)
                .map_err(|e| format!("Failed to load config file {}: {}", path.display(), e))?;
            eprintln!("Loaded config from: {}", path.display());
            Ok(config)
        }
        None => Ok(ConfigFile::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_file() {
        let config: ConfigFile = toml::from_str(
            r#"
            [codec]
            standards = ["dvb", "japan"]
            strict = true
            default_pds = 0x28

            [logging]
            log_dir = "/var/log/psitool"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.codec.standards().unwrap(),
            Standards::DVB | Standards::JAPAN
        );
        assert_eq!(config.codec.strict, Some(true));
        assert_eq!(config.codec.fix_pds, None);
        assert_eq!(config.codec.default_pds, Some(0x28));
        assert_eq!(config.logging.log_dir, Some(PathBuf::from("/var/log/psitool")));
        assert_eq!(config.logging.retention_days, None);
    }

    #[test]
    fn test_empty_file() {
        let config: ConfigFile = toml::from_str("").unwrap();
        assert_eq!(config.codec.standards().unwrap(), Standards::empty());
        assert!(config.logging.level.is_none());
    }

    #[test]
    fn test_unknown_standard() {
        let config: ConfigFile = toml::from_str("[codec]\nstandards = [\"dab\"]").unwrap();
        assert!(config.codec.standards().is_err());
    }
}
