use crate::types::{PartialFilePolicy, ReadOptions, WriteOptions};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub codec: CodecConfig,
    pub logging: LoggingConfig,
    pub plot: PlotConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct CodecConfig {
    /// Appended to paths given without an extension
    pub extension: String,
    pub remove_partial_on_error: bool,
    /// Default device name for rewritten files with none stored
    pub device_name: String,
    pub squeeze_channels: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct PlotConfig {
    pub width: usize,
    pub height: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            extension: "scan".to_string(),
            remove_partial_on_error: false,
            device_name: String::new(),
            squeeze_channels: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            width: 140,
            height: 60,
        }
    }
}

impl CodecConfig {
    pub fn write_options(&self) -> WriteOptions {
        WriteOptions {
            partial_file: if self.remove_partial_on_error {
                PartialFilePolicy::Remove
            } else {
                PartialFilePolicy::Keep
            },
            extension: Some(self.extension.clone()),
        }
    }

    pub fn read_options(&self) -> ReadOptions {
        ReadOptions {
            squeeze_channels: self.squeeze_channels,
            extension: Some(self.extension.clone()),
            ..Default::default()
        }
    }
}

/// Load configuration from file with layered fallbacks
pub fn load_config(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    load_config_with(config_path, environment())
}

// Environment overrides, e.g. RUSTY_SCAN__CODEC__EXTENSION=dat
fn environment() -> Environment {
    Environment::with_prefix("RUSTY_SCAN")
        .separator("__")
        .try_parsing(true)
}

fn load_config_with(
    config_path: Option<&Path>,
    environment: Environment,
) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder().add_source(Config::try_from(&AppConfig::default())?);

    if let Some(path) = config_path {
        if path.exists() {
            builder = builder.add_source(File::from(path));
        } else {
            return Err(ConfigError::Message(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
    } else {
        let possible_paths = ["scan.toml", "config.toml"];

        for path in &possible_paths {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
                break;
            }
        }
    }

    let config = builder.add_source(environment).build()?;
    config.try_deserialize::<AppConfig>()
}

/// Load configuration, falling back to defaults on any error
pub fn load_config_or_default(config_path: Option<&Path>) -> AppConfig {
    match load_config(config_path) {
        Ok(config) => {
            log::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            log::warn!("Failed to load config ({}), using defaults", e);
            AppConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_explicit_path_is_error() {
        let result = load_config(Some(Path::new("/nonexistent/scan.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_explicit_path_falls_back() {
        let config = load_config_or_default(Some(Path::new("/nonexistent/scan.toml")));
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[codec]\nextension = \"dat\"\nremove_partial_on_error = true\n\n[plot]\nwidth = 80"
        )
        .unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.codec.extension, "dat");
        assert!(config.codec.remove_partial_on_error);
        assert_eq!(config.plot.width, 80);
        assert_eq!(config.plot.height, 60);
        assert_eq!(config.logging.log_level, "info");
    }

    #[test]
    fn test_environment_overrides_need_double_separator() {
        let mut vars = config::Map::new();
        vars.insert(
            "RUSTY_SCAN__CODEC__DEVICE_NAME".to_string(),
            "bench".to_string(),
        );
        vars.insert("RUSTY_SCAN__PLOT__WIDTH".to_string(), "72".to_string());
        vars.insert("RUSTY_SCAN_CODEC__EXTENSION".to_string(), "one".to_string());

        let config = load_config_with(
            Some(Path::new("/nonexistent/scan.toml")),
            environment().source(Some(vars.clone())),
        );
        assert!(config.is_err());

        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[logging]\nlog_level = \"debug\"").unwrap();

        let config = load_config_with(Some(file.path()), environment().source(Some(vars))).unwrap();
        assert_eq!(config.codec.device_name, "bench");
        assert_eq!(config.plot.width, 72);
        assert_eq!(config.codec.extension, "scan");
        assert_eq!(config.logging.log_level, "debug");
    }

    #[test]
    fn test_codec_options() {
        let codec = CodecConfig {
            remove_partial_on_error: true,
            squeeze_channels: true,
            ..Default::default()
        };

        let write = codec.write_options();
        assert_eq!(write.partial_file, PartialFilePolicy::Remove);
        assert_eq!(write.extension.as_deref(), Some("scan"));

        let read = codec.read_options();
        assert!(read.squeeze_channels);
        assert_eq!(read.output_dims, Default::default());
    }
}
