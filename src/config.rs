//! Application configuration module
//! Handles environment variable loading, configuration validation, and application settings

use std::env;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
    pub airalo: AiraloConfig,
    pub tappay: TapPayConfig,
    pub invoice: InvoiceConfig,
    pub line: LineConfig,
    pub gemini: GeminiConfig,
    pub price_book_path: Option<String>,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout: u64,   // seconds
    pub idle_timeout: Option<u64>, // seconds
}

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub redis_url: String,
    pub default_ttl: u64, // seconds
    pub usage_ttl: u64,   // seconds, data-usage snapshots
    pub max_connections: u32,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log format options
#[derive(Debug, Clone)]
pub enum LogFormat {
    Json,
    Plain,
}

/// Wholesale eSIM provider (Airalo partner API) configuration
#[derive(Debug, Clone)]
pub struct AiraloConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub request_timeout: u64, // seconds
}

/// Card gateway (TapPay) configuration
#[derive(Debug, Clone)]
pub struct TapPayConfig {
    pub base_url: String,
    pub partner_key: String,
    pub merchant_id: String,
    pub currency: String,
    pub request_timeout: u64, // seconds
}

/// E-invoice service configuration
#[derive(Debug, Clone)]
pub struct InvoiceConfig {
    pub base_url: String,
    pub partner_key: String,
    pub seller_name: String,
    pub notify_url: String,
    pub enabled: bool,
    pub request_timeout: u64, // seconds
}

/// LINE messaging configuration
#[derive(Debug, Clone)]
pub struct LineConfig {
    pub channel_secret: String,
    pub channel_access_token: String,
    pub reply_url: String,
    pub request_timeout: u64, // seconds
}

/// Chat completion (Gemini) configuration
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub request_timeout: u64, // seconds
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenv::dotenv().ok();

        Ok(AppConfig {
            server: ServerConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            cache: CacheConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
            airalo: AiraloConfig::from_env()?,
            tappay: TapPayConfig::from_env()?,
            invoice: InvoiceConfig::from_env()?,
            line: LineConfig::from_env()?,
            gemini: GeminiConfig::from_env()?,
            price_book_path: env::var("PRICE_BOOK_PATH").ok(),
        })
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.database.validate()?;
        self.cache.validate()?;
        self.logging.validate()?;
        self.airalo.validate()?;
        self.tappay.validate()?;
        self.invoice.validate()?;
        self.line.validate()?;
        self.gemini.validate()?;

        Ok(())
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(ServerConfig {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".to_string()))?,
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "*".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue(
                "SERVER_PORT cannot be 0".to_string(),
            ));
        }

        if self.host.is_empty() {
            return Err(ConfigError::InvalidValue(
                "SERVER_HOST cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(DatabaseConfig {
            url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::MissingVariable("DATABASE_URL".to_string()))?,
            max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()))?,
            min_connections: env::var("DB_MIN_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MIN_CONNECTIONS".to_string()))?,
            connection_timeout: env::var("DB_CONNECTION_TIMEOUT")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_CONNECTION_TIMEOUT".to_string()))?,
            idle_timeout: env::var("DB_IDLE_TIMEOUT")
                .ok()
                .and_then(|val| val.parse().ok()),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::InvalidValue("DATABASE_URL".to_string()));
        }

        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()));
        }

        if self.min_connections > self.max_connections {
            return Err(ConfigError::InvalidValue(
                "DB_MIN_CONNECTIONS must be <= DB_MAX_CONNECTIONS".to_string(),
            ));
        }

        Ok(())
    }
}

impl CacheConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(CacheConfig {
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            default_ttl: env::var("CACHE_DEFAULT_TTL")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("CACHE_DEFAULT_TTL".to_string()))?,
            usage_ttl: env::var("CACHE_USAGE_TTL")
                .unwrap_or_else(|_| "120".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("CACHE_USAGE_TTL".to_string()))?,
            max_connections: env::var("CACHE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("CACHE_MAX_CONNECTIONS".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.redis_url.is_empty() {
            return Err(ConfigError::InvalidValue("REDIS_URL".to_string()));
        }

        // Basic validation of Redis URL format
        if !self.redis_url.starts_with("redis://") && !self.redis_url.starts_with("rediss://") {
            return Err(ConfigError::InvalidValue(
                "REDIS_URL must start with redis:// or rediss://".to_string(),
            ));
        }

        Ok(())
    }
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "plain".to_string())
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Plain,
            },
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];
        if !valid_levels.contains(&self.level.to_uppercase().as_str()) {
            return Err(ConfigError::InvalidValue("LOG_LEVEL".to_string()));
        }

        Ok(())
    }
}

impl AiraloConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(AiraloConfig {
            base_url: env::var("AIRALO_BASE_URL")
                .unwrap_or_else(|_| "https://sandbox-partners-api.airalo.com".to_string()),
            client_id: env::var("AIRALO_CLIENT_ID")
                .map_err(|_| ConfigError::MissingVariable("AIRALO_CLIENT_ID".to_string()))?,
            client_secret: env::var("AIRALO_CLIENT_SECRET")
                .map_err(|_| ConfigError::MissingVariable("AIRALO_CLIENT_SECRET".to_string()))?,
            request_timeout: env::var("AIRALO_REQUEST_TIMEOUT")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("AIRALO_REQUEST_TIMEOUT".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client_id.is_empty() || self.client_secret.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "Airalo credentials cannot be empty".to_string(),
            ));
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "AIRALO_BASE_URL must be a valid URL".to_string(),
            ));
        }

        // Outbound calls must stay inside the 10-30s band
        if self.request_timeout < 10 || self.request_timeout > 30 {
            return Err(ConfigError::InvalidValue(
                "AIRALO_REQUEST_TIMEOUT must be between 10 and 30".to_string(),
            ));
        }

        Ok(())
    }
}

impl TapPayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(TapPayConfig {
            base_url: env::var("TAPPAY_BASE_URL")
                .unwrap_or_else(|_| "https://sandbox.tappaysdk.com".to_string()),
            partner_key: env::var("TAPPAY_PARTNER_KEY")
                .map_err(|_| ConfigError::MissingVariable("TAPPAY_PARTNER_KEY".to_string()))?,
            merchant_id: env::var("TAPPAY_MERCHANT_ID")
                .map_err(|_| ConfigError::MissingVariable("TAPPAY_MERCHANT_ID".to_string()))?,
            currency: env::var("TAPPAY_CURRENCY").unwrap_or_else(|_| "TWD".to_string()),
            request_timeout: env::var("TAPPAY_REQUEST_TIMEOUT")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("TAPPAY_REQUEST_TIMEOUT".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.partner_key.is_empty() || self.merchant_id.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "TapPay credentials cannot be empty".to_string(),
            ));
        }

        if self.request_timeout < 10 || self.request_timeout > 30 {
            return Err(ConfigError::InvalidValue(
                "TAPPAY_REQUEST_TIMEOUT must be between 10 and 30".to_string(),
            ));
        }

        Ok(())
    }
}

impl InvoiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(InvoiceConfig {
            base_url: env::var("INVOICE_BASE_URL")
                .unwrap_or_else(|_| "https://sandbox.tappaysdk.com".to_string()),
            partner_key: env::var("INVOICE_PARTNER_KEY")
                .map_err(|_| ConfigError::MissingVariable("INVOICE_PARTNER_KEY".to_string()))?,
            seller_name: env::var("INVOICE_SELLER_NAME")
                .unwrap_or_else(|_| "eSIM Storefront".to_string()),
            notify_url: env::var("INVOICE_NOTIFY_URL")
                .map_err(|_| ConfigError::MissingVariable("INVOICE_NOTIFY_URL".to_string()))?,
            enabled: env::var("INVOICE_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("INVOICE_ENABLED".to_string()))?,
            request_timeout: env::var("INVOICE_REQUEST_TIMEOUT")
                .unwrap_or_else(|_| "15".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("INVOICE_REQUEST_TIMEOUT".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.partner_key.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "Invoice partner key cannot be empty".to_string(),
            ));
        }

        if !self.notify_url.starts_with("http://") && !self.notify_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "INVOICE_NOTIFY_URL must be a valid URL".to_string(),
            ));
        }

        Ok(())
    }
}

impl LineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(LineConfig {
            channel_secret: env::var("LINE_CHANNEL_SECRET")
                .map_err(|_| ConfigError::MissingVariable("LINE_CHANNEL_SECRET".to_string()))?,
            channel_access_token: env::var("LINE_CHANNEL_ACCESS_TOKEN").map_err(|_| {
                ConfigError::MissingVariable("LINE_CHANNEL_ACCESS_TOKEN".to_string())
            })?,
            reply_url: env::var("LINE_REPLY_URL")
                .unwrap_or_else(|_| "https://api.line.me/v2/bot/message/reply".to_string()),
            request_timeout: env::var("LINE_REQUEST_TIMEOUT")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("LINE_REQUEST_TIMEOUT".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel_secret.is_empty() || self.channel_access_token.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "LINE channel credentials cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

impl GeminiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(GeminiConfig {
            base_url: env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string()),
            api_key: env::var("GEMINI_API_KEY")
                .map_err(|_| ConfigError::MissingVariable("GEMINI_API_KEY".to_string()))?,
            model: env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-2.0-flash".to_string()),
            request_timeout: env::var("GEMINI_REQUEST_TIMEOUT")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("GEMINI_REQUEST_TIMEOUT".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "Gemini API key cannot be empty".to_string(),
            ));
        }

        if self.model.is_empty() {
            return Err(ConfigError::InvalidValue("GEMINI_MODEL".to_string()));
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),

    #[error("Invalid value for configuration: {0}")]
    InvalidValue(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

impl From<std::num::ParseIntError> for ConfigError {
    fn from(_: std::num::ParseIntError) -> Self {
        ConfigError::InvalidValue("Failed to parse integer value".to_string())
    }
}

impl From<ConfigError> for crate::error::AppError {
    fn from(err: ConfigError) -> Self {
        crate::error::AppError::new(crate::error::AppErrorKind::Infrastructure(
            crate::error::InfrastructureError::Configuration {
                message: err.to_string(),
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_validation() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cors_allowed_origins: vec!["*".to_string()],
        };

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_port_validation() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0, // Invalid port
            cors_allowed_origins: vec![],
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_airalo_config_requires_credentials() {
        let config = AiraloConfig {
            base_url: "https://sandbox-partners-api.airalo.com".to_string(),
            client_id: "".to_string(),
            client_secret: "secret".to_string(),
            request_timeout: 20,
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_airalo_timeout_band() {
        let mut config = AiraloConfig {
            base_url: "https://sandbox-partners-api.airalo.com".to_string(),
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            request_timeout: 20,
        };
        assert!(config.validate().is_ok());

        config.request_timeout = 5;
        assert!(config.validate().is_err());

        config.request_timeout = 31;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invoice_notify_url_must_be_url() {
        let config = InvoiceConfig {
            base_url: "https://sandbox.tappaysdk.com".to_string(),
            partner_key: "pk".to_string(),
            seller_name: "eSIM Storefront".to_string(),
            notify_url: "not-a-url".to_string(),
            enabled: true,
            request_timeout: 15,
        };

        assert!(config.validate().is_err());
    }
}
