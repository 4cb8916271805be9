use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the importer CLI and admin service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub import: ImportConfig,
    pub notifications: NotificationConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let store_path = env::var("IMPORT_STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("pt_jobs_store.json"));
        let default_currency = env::var("IMPORT_DEFAULT_CURRENCY")
            .map(|value| value.trim().to_ascii_uppercase())
            .unwrap_or_else(|_| "CAD".to_string());
        if default_currency.is_empty() || default_currency.len() > 10 {
            return Err(ConfigError::InvalidCurrency(default_currency));
        }
        let bulk_enabled = env::var("BULK_IMPORT_ENABLED")
            .map(|value| env_flag(&value))
            .unwrap_or(false);
        let bulk_base = env::var("BULK_IMPORT_BASE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("board/data"));

        let admin_email = env::var("ADMIN_NOTIFY_EMAIL")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            import: ImportConfig {
                store_path,
                default_currency,
                bulk_enabled,
                bulk_base,
            },
            notifications: NotificationConfig { admin_email },
        })
    }
}

fn env_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Record store location and bulk import defaults.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    pub store_path: PathBuf,
    pub default_currency: String,
    /// Run the standard bulk plan when the service starts.
    pub bulk_enabled: bool,
    pub bulk_base: PathBuf,
}

/// Where admin notifications go. No address disables them.
#[derive(Debug, Clone, Default)]
pub struct NotificationConfig {
    pub admin_email: Option<String>,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidCurrency(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidCurrency(value) => write!(
                f,
                "IMPORT_DEFAULT_CURRENCY must be 1-10 characters, got '{value}'"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidCurrency(_) => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
