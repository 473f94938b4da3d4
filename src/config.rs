use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

pub const DEFAULT_USER: &str = "user-iqa-1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    #[default]
    Markdown,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives applied on top of `RUST_LOG`.
    pub directives: Vec<String>,
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            directives: Vec::new(),
            ansi: true,
        }
    }
}

/// Optional TOML file. Command-line flags win over anything set here.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub data_dir: Option<PathBuf>,
    pub user: Option<String>,
    pub format: Option<OutputFormat>,
    pub logging: LoggingConfig,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Config::load(path),
            None => Ok(Config::default()),
        }
    }
}

/// Settings after merging flags, the config file and defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub data_dir: Option<PathBuf>,
    pub user: String,
    pub format: OutputFormat,
}

impl Settings {
    pub fn resolve(
        config: &Config,
        data_dir: Option<PathBuf>,
        user: Option<String>,
        format: Option<OutputFormat>,
    ) -> Self {
        Settings {
            data_dir: data_dir.or_else(|| config.data_dir.clone()),
            user: user
                .or_else(|| config.user.clone())
                .unwrap_or_else(|| DEFAULT_USER.to_string()),
            format: format.or(config.format).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_full_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
dataDir = "/srv/attendance"
user = "user-hod-1"
format = "json"

[logging]
directives = ["college_attendance_reports=debug"]
ansi = false
"#
        )
        .unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.data_dir, Some(PathBuf::from("/srv/attendance")));
        assert_eq!(config.format, Some(OutputFormat::Json));
        assert_eq!(config.logging.directives.len(), 1);
        assert!(!config.logging.ansi);
    }

    #[test]
    fn missing_sections_use_defaults() {
        let config: Config = toml::from_str("user = \"trainer-1\"").unwrap();
        assert!(config.logging.ansi);
        assert!(config.data_dir.is_none());
        assert!(toml::from_str::<Config>("format = \"pdf\"").is_err());
    }

    #[test]
    fn flags_override_config_file() {
        let config = Config {
            data_dir: Some(PathBuf::from("from-file")),
            user: Some("user-hod-1".to_string()),
            format: Some(OutputFormat::Json),
            logging: LoggingConfig::default(),
        };
        let settings = Settings::resolve(&config, None, Some("trainer-1".to_string()), None);
        assert_eq!(settings.user, "trainer-1");
        assert_eq!(settings.format, OutputFormat::Json);
        assert_eq!(settings.data_dir, Some(PathBuf::from("from-file")));

        let defaults = Settings::resolve(&Config::default(), None, None, None);
        assert_eq!(defaults.user, DEFAULT_USER);
        assert_eq!(defaults.format, OutputFormat::Markdown);
        assert!(Config::load_or_default(None).unwrap().data_dir.is_none());
    }
}
