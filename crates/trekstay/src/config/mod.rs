use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

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

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub chapa: ChapaConfig,
    pub notifications: NotificationConfig,
    /// Base URL this service is reachable on; used to build the gateway
    /// webhook callback and payment return URLs.
    pub public_base_url: String,
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

        let secret_key =
            env::var("CHAPA_SECRET_KEY").map_err(|_| ConfigError::MissingChapaSecret)?;
        let api_base =
            env::var("CHAPA_API_URL").unwrap_or_else(|_| "https://api.chapa.co".to_string());
        let currency = env::var("CHAPA_CURRENCY").unwrap_or_else(|_| "ETB".to_string());

        let from_address = env::var("DEFAULT_FROM_EMAIL")
            .unwrap_or_else(|_| "bookings@trekstay.example".to_string());

        let public_base_url =
            env::var("APP_PUBLIC_BASE_URL").unwrap_or_else(|_| format!("http://{host}:{port}"));

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            chapa: ChapaConfig {
                secret_key,
                api_base,
                currency,
            },
            notifications: NotificationConfig { from_address },
            public_base_url,
        })
    }
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

/// Credentials and endpoints for the Chapa payment gateway.
#[derive(Debug, Clone)]
pub struct ChapaConfig {
    pub secret_key: String,
    pub api_base: String,
    /// Currency applied to newly created payments.
    pub currency: String,
}

/// Outbound email settings for the notification worker.
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub from_address: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    MissingChapaSecret,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::MissingChapaSecret => {
                write!(
                    f,
                    "CHAPA_SECRET_KEY must be set to reach the payment gateway"
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::MissingChapaSecret => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        env::remove_var("APP_ENV");
        env::remove_var("APP_HOST");
        env::remove_var("APP_PORT");
        env::remove_var("APP_LOG_LEVEL");
        env::remove_var("CHAPA_SECRET_KEY");
        env::remove_var("CHAPA_API_URL");
        env::remove_var("CHAPA_CURRENCY");
        env::remove_var("DEFAULT_FROM_EMAIL");
        env::remove_var("APP_PUBLIC_BASE_URL");
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("CHAPA_SECRET_KEY", "CHASECK_TEST-xyz");
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.chapa.api_base, "https://api.chapa.co");
        assert_eq!(config.chapa.currency, "ETB");
        assert_eq!(config.public_base_url, "http://127.0.0.1:3000");
    }

    #[test]
    fn load_requires_chapa_secret() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        match AppConfig::load() {
            Err(ConfigError::MissingChapaSecret) => {}
            other => panic!("expected missing secret error, got {other:?}"),
        }
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("CHAPA_SECRET_KEY", "CHASECK_TEST-xyz");
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        assert_eq!(config.public_base_url, "http://localhost:3000");
    }
}
