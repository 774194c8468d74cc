//! config/app_config.rs
//! Configuración del proceso leída del entorno (primero se carga .env).

use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.sms-activate.org/stubs/handler_api.php";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub port: u16,
    pub data_dir: PathBuf,
    /// Key del entorno; si no hay, se usa la guardada en `api_config`.
    pub api_key: Option<String>,
    pub provider_base_url: String,
    pub provider_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            bind_addr: "0.0.0.0".to_string(),
            port: 5022,
            data_dir: PathBuf::from("data"),
            api_key: None,
            provider_base_url: DEFAULT_BASE_URL.to_string(),
            provider_timeout: Duration::from_secs(30),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = AppConfig::default();

        AppConfig {
            bind_addr: std::env::var("SMS_BIND_ADDR").unwrap_or(defaults.bind_addr),
            port: env_parse("SMS_PORT").unwrap_or(defaults.port),
            data_dir: std::env::var("SMS_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            api_key: std::env::var("SMS_ACTIVATE_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            provider_base_url: std::env::var("SMS_ACTIVATE_BASE_URL")
                .unwrap_or(defaults.provider_base_url),
            provider_timeout: env_parse("SMS_ACTIVATE_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.provider_timeout),
        }
    }

    pub fn database_url(&self) -> String {
        let db_path = self.data_dir.join("sms_manager.db");
        format!("sqlite:{}?mode=rwc", db_path.to_string_lossy())
    }
}

/// Lee y parsea una variable; valores vacíos o inválidos se ignoran con un warning.
pub(crate) fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("Ignorando valor inválido para {}: {:?}", name, raw);
            None
        }
    }
}
