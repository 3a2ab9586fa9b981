use serde::Deserialize;
use std::env;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

use crate::error::{AppError, Result};

const DEFAULT_CONFIG_PATH: &str = "config.toml";
const DEFAULT_YANDEX_API_URL: &str =
    "https://llm.api.cloud.yandex.net/foundationModels/v1/completion";
const DEFAULT_DRIVE_FOLDER_ID: &str = "18EEp2MBw9ClfZ8fSEdI72ekl2BnYFQMO";

/// Service settings: `config.toml` first, then environment variables on top.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub app_name: String,
    pub debug: bool,
    pub api_v1_prefix: String,
    pub http_port: u16,
    pub yandex: YandexSettings,
    pub output_data_folder: PathBuf,
    pub drive: DriveSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct YandexSettings {
    pub api_key: Option<String>,
    pub model_uri: Option<String>,
    pub api_url: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DriveSettings {
    pub access_token: Option<String>,
    pub service_account_key: Option<PathBuf>,
    pub folder_id: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_name: "agro_reports".to_string(),
            debug: false,
            api_v1_prefix: "/api/v1".to_string(),
            http_port: 8080,
            yandex: YandexSettings::default(),
            output_data_folder: PathBuf::from("output"),
            drive: DriveSettings::default(),
        }
    }
}

impl Default for YandexSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model_uri: None,
            api_url: DEFAULT_YANDEX_API_URL.to_string(),
            timeout_seconds: 60,
        }
    }
}

impl Default for DriveSettings {
    fn default() -> Self {
        Self {
            access_token: None,
            service_account_key: None,
            folder_id: DEFAULT_DRIVE_FOLDER_ID.to_string(),
        }
    }
}

impl Settings {
    /// Load `.env`, the optional config file (`AGRO_CONFIG` or `config.toml`)
    /// and environment overrides.
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let config_path = env::var("AGRO_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut settings = match fs::read_to_string(&config_path) {
            Ok(content) => Self::from_toml(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config file at '{}', using defaults", config_path);
                Settings::default()
            }
            Err(e) => {
                return Err(AppError::Config(format!(
                    "Failed to read config file '{}': {}",
                    config_path, e
                )))
            }
        };

        settings.apply_env(|key| env::var(key).ok())?;
        Ok(settings)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Override fields from `lookup` (the process environment in production).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("APP_NAME") {
            self.app_name = v;
        }
        if let Some(v) = lookup("DEBUG") {
            self.debug = matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(v) = lookup("API_V1_PREFIX") {
            self.api_v1_prefix = v;
        }
        if let Some(v) = lookup("AGRO_HTTP_PORT") {
            self.http_port = parse_env("AGRO_HTTP_PORT", &v)?;
        }
        if let Some(v) = lookup("YANDEX_API_KEY") {
            self.yandex.api_key = Some(v);
        }
        if let Some(v) = lookup("YANDEX_MODEL_URI") {
            self.yandex.model_uri = Some(v);
        }
        if let Some(v) = lookup("YANDEX_API_URL") {
            self.yandex.api_url = v;
        }
        if let Some(v) = lookup("MODEL_TIMEOUT_SECONDS") {
            self.yandex.timeout_seconds = parse_env("MODEL_TIMEOUT_SECONDS", &v)?;
        }
        if let Some(v) = lookup("OUTPUT_DATA_FOLDER") {
            self.output_data_folder = PathBuf::from(v);
        }
        if let Some(v) = lookup("GOOGLE_DRIVE_TOKEN") {
            self.drive.access_token = Some(v);
        }
        if let Some(v) = lookup("GOOGLE_SERVICE_ACCOUNT_KEY") {
            self.drive.service_account_key = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("GOOGLE_DRIVE_FOLDER_ID") {
            self.drive.folder_id = v;
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| AppError::Config(format!("Invalid value '{}' for {}: {}", value, key, e)))
}
