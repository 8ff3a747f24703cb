use std::env;
use url::Url;

/// Runtime configuration for the drive service
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Maximum upload size in bytes (default: 50 MB)
    pub max_file_size: usize,

    /// Public origin used to build blob view/download URLs (default: "http://localhost:3000")
    pub public_base_url: String,

    /// Avatar assigned to newly created users
    pub avatar_placeholder_url: String,

    /// Lifetime of an email passcode in minutes (default: 15)
    pub otp_ttl_minutes: i64,

    /// Lifetime of a login session in days (default: 30)
    pub session_ttl_days: i64,

    /// Webhook receiving `{email, code}` for passcode delivery. Passcodes are logged when unset.
    pub otp_webhook_url: Option<String>,

    /// Allowed CORS Origins (comma separated)
    pub allowed_origins: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_file_size: 50 * 1024 * 1024, // 50 MB
            public_base_url: "http://localhost:3000".to_string(),
            avatar_placeholder_url:
                "https://img.freepik.com/free-psd/3d-illustration-person-with-sunglasses_23-2149436188.jpg"
                    .to_string(),
            otp_ttl_minutes: 15,
            session_ttl_days: 30,
            otp_webhook_url: None,
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(), // Vite default
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

fn parse_url(value: &str) -> Option<String> {
    match Url::parse(value) {
        Ok(url) => Some(url.as_str().trim_end_matches('/').to_string()),
        Err(e) => {
            tracing::warn!("Ignoring invalid URL '{}': {}", value, e);
            None
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            public_base_url: env::var("PUBLIC_BASE_URL")
                .ok()
                .and_then(|v| parse_url(&v))
                .unwrap_or(default.public_base_url),

            avatar_placeholder_url: env::var("AVATAR_PLACEHOLDER_URL")
                .unwrap_or(default.avatar_placeholder_url),

            otp_ttl_minutes: env::var("OTP_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v: &i64| *v > 0)
                .unwrap_or(default.otp_ttl_minutes),

            session_ttl_days: env::var("SESSION_TTL_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v: &i64| *v > 0)
                .unwrap_or(default.session_ttl_days),

            otp_webhook_url: env::var("OTP_WEBHOOK_URL")
                .ok()
                .and_then(|v| parse_url(&v)),

            allowed_origins: env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(default.allowed_origins),
        }
    }

    /// Create config for development (bigger uploads, short sessions)
    pub fn development() -> Self {
        Self {
            max_file_size: 256 * 1024 * 1024,
            session_ttl_days: 1,
            ..Self::default()
        }
    }

    pub fn otp_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.otp_ttl_minutes)
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.session_ttl_days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.max_file_size, 50 * 1024 * 1024);
        assert_eq!(config.otp_ttl_minutes, 15);
        assert_eq!(config.public_base_url, "http://localhost:3000");
        assert!(config.otp_webhook_url.is_none());
    }

    #[test]
    fn test_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.max_file_size, 256 * 1024 * 1024);
        assert_eq!(config.session_ttl(), chrono::Duration::days(1));
    }

    #[test]
    fn test_parse_url() {
        assert_eq!(
            parse_url("https://drive.example.com/").as_deref(),
            Some("https://drive.example.com")
        );
        assert!(parse_url("not a url").is_none());
    }

    #[test]
    fn test_from_env_cors_fallback() {
        unsafe { env::remove_var("ALLOWED_ORIGINS") };
        let config = AppConfig::from_env();
        let default_config = AppConfig::default();
        assert_eq!(config.allowed_origins, default_config.allowed_origins);
        assert!(!config.allowed_origins.contains(&"*".to_string()));
    }
}
