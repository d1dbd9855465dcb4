use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

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
    pub forms: FormsConfig,
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
        let log_format = LogFormat::from_str(
            &env::var("APP_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string()),
        );

        let share_base_url = env::var("HAIRFLOW_SHARE_BASE_URL")
            .unwrap_or_else(|_| FormsConfig::DEFAULT_SHARE_BASE_URL.to_string());
        let share_base_url = share_base_url.trim().trim_end_matches('/').to_string();
        if !(share_base_url.starts_with("http://") || share_base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidShareBaseUrl(share_base_url));
        }

        let invite_ttl_days = env::var("HAIRFLOW_INVITE_TTL_DAYS")
            .unwrap_or_else(|_| "7".to_string())
            .parse::<u32>()
            .ok()
            .filter(|days| *days > 0)
            .ok_or(ConfigError::InvalidInviteTtl)?;

        let upload_timeout_secs = env::var("HAIRFLOW_UPLOAD_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or(ConfigError::InvalidUploadTimeout)?;

        let session_ttl_mins = env::var("HAIRFLOW_SESSION_TTL_MINS")
            .unwrap_or_else(|_| "120".to_string())
            .parse::<u64>()
            .ok()
            .filter(|mins| *mins > 0)
            .ok_or(ConfigError::InvalidSessionTtl)?;

        let max_intake_sessions = env::var("HAIRFLOW_MAX_INTAKE_SESSIONS")
            .unwrap_or_else(|_| "10000".to_string())
            .parse::<usize>()
            .ok()
            .filter(|limit| *limit > 0)
            .ok_or(ConfigError::InvalidSessionLimit)?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                log_format,
            },
            forms: FormsConfig {
                share_base_url,
                invite_ttl_days,
                upload_timeout: Duration::from_secs(upload_timeout_secs),
                session_ttl: Duration::from_secs(session_ttl_mins * 60),
                max_intake_sessions,
            },
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

/// Output layout for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Compact,
        }
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub log_format: LogFormat,
}

/// Knobs for template distribution and patient uploads.
#[derive(Debug, Clone)]
pub struct FormsConfig {
    /// Origin that distribution URLs are minted under, without a trailing slash.
    pub share_base_url: String,
    /// Days a sent invitation stays valid before it can be expired.
    pub invite_ttl_days: u32,
    pub upload_timeout: Duration,
    /// Idle intake sessions older than this are evicted.
    pub session_ttl: Duration,
    pub max_intake_sessions: usize,
}

impl FormsConfig {
    pub const DEFAULT_SHARE_BASE_URL: &'static str = "https://forms.hairflow.com";
}

impl Default for FormsConfig {
    fn default() -> Self {
        Self {
            share_base_url: Self::DEFAULT_SHARE_BASE_URL.to_string(),
            invite_ttl_days: 7,
            upload_timeout: Duration::from_secs(30),
            session_ttl: Duration::from_secs(120 * 60),
            max_intake_sessions: 10_000,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidShareBaseUrl(String),
    InvalidInviteTtl,
    InvalidUploadTimeout,
    InvalidSessionTtl,
    InvalidSessionLimit,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidShareBaseUrl(value) => write!(
                f,
                "HAIRFLOW_SHARE_BASE_URL must be an http(s) origin, found '{}'",
                value
            ),
            ConfigError::InvalidInviteTtl => {
                write!(f, "HAIRFLOW_INVITE_TTL_DAYS must be a positive integer")
            }
            ConfigError::InvalidUploadTimeout => {
                write!(f, "HAIRFLOW_UPLOAD_TIMEOUT_SECS must be a positive integer")
            }
            ConfigError::InvalidSessionTtl => {
                write!(f, "HAIRFLOW_SESSION_TTL_MINS must be a positive integer")
            }
            ConfigError::InvalidSessionLimit => {
                write!(f, "HAIRFLOW_MAX_INTAKE_SESSIONS must be a positive integer")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidShareBaseUrl(_)
            | ConfigError::InvalidInviteTtl
            | ConfigError::InvalidUploadTimeout
            | ConfigError::InvalidSessionTtl
            | ConfigError::InvalidSessionLimit => None,
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
        env::remove_var("APP_LOG_FORMAT");
        env::remove_var("HAIRFLOW_SHARE_BASE_URL");
        env::remove_var("HAIRFLOW_INVITE_TTL_DAYS");
        env::remove_var("HAIRFLOW_UPLOAD_TIMEOUT_SECS");
        env::remove_var("HAIRFLOW_SESSION_TTL_MINS");
        env::remove_var("HAIRFLOW_MAX_INTAKE_SESSIONS");
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.telemetry.log_format, LogFormat::Compact);
        assert_eq!(config.forms.share_base_url, "https://forms.hairflow.com");
        assert_eq!(config.forms.invite_ttl_days, 7);
        assert_eq!(config.forms.upload_timeout, Duration::from_secs(30));
        assert_eq!(config.forms.session_ttl, Duration::from_secs(7200));
        assert_eq!(config.forms.max_intake_sessions, 10_000);
    }

    #[test]
    fn session_limits_come_from_env() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("HAIRFLOW_SESSION_TTL_MINS", "15");
        env::set_var("HAIRFLOW_MAX_INTAKE_SESSIONS", "50");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.forms.session_ttl, Duration::from_secs(900));
        assert_eq!(config.forms.max_intake_sessions, 50);

        env::set_var("HAIRFLOW_SESSION_TTL_MINS", "0");
        let err = AppConfig::load().expect_err("zero ttl rejected");
        assert!(matches!(err, ConfigError::InvalidSessionTtl));
        reset_env();
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn share_base_url_drops_trailing_slash() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("HAIRFLOW_SHARE_BASE_URL", "https://intake.example.com/");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.forms.share_base_url, "https://intake.example.com");
        reset_env();
    }

    #[test]
    fn rejects_zero_upload_timeout() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("HAIRFLOW_UPLOAD_TIMEOUT_SECS", "0");
        let err = AppConfig::load().expect_err("zero timeout rejected");
        assert!(matches!(err, ConfigError::InvalidUploadTimeout));
        reset_env();
    }
}
