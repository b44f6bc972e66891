use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_api_url: String,
    pub database_api_key: String,
    pub jwt_secret: String,
    pub redis_url: Option<String>,
    pub sms_gateway_url: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            database_api_url: env::var("DATABASE_API_URL")
                .unwrap_or_else(|_| {
                    warn!("DATABASE_API_URL not set, using empty value");
                    String::new()
                }),
            database_api_key: env::var("DATABASE_API_KEY")
                .unwrap_or_else(|_| {
                    warn!("DATABASE_API_KEY not set, using empty value");
                    String::new()
                }),
            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("JWT_SECRET not set, using empty value");
                    String::new()
                }),
            redis_url: env::var("REDIS_URL").ok(),
            sms_gateway_url: env::var("SMS_GATEWAY_URL").ok(),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }
        if config.redis_url.is_none() {
            warn!("REDIS_URL not set, OTP challenges will be kept in process memory");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.database_api_url.is_empty()
            && !self.database_api_key.is_empty()
            && !self.jwt_secret.is_empty()
    }

    pub fn is_sms_configured(&self) -> bool {
        self.sms_gateway_url
            .as_ref()
            .map(|url| !url.is_empty())
            .unwrap_or(false)
    }
}
