use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct GeocoderConfig {
    pub base_url: String,
    pub user_agent: String,
    pub language: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    pub db_path: String,
    pub upload_dir: String,
    pub geocoder: GeocoderConfig,
    pub jpeg_quality: u8,
    pub max_upload_mb: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let jpeg_quality: u8 = env::var("PHOTOBLOG_JPEG_QUALITY")
            .unwrap_or_else(|_| "95".to_string())
            .parse()?;

        Ok(Config {
            port: env::var("PHOTOBLOG_PORT")
                .unwrap_or_else(|_| "18480".to_string())
                .parse()?,
            host: env::var("PHOTOBLOG_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            db_path: env::var("PHOTOBLOG_DB_PATH")
                .unwrap_or_else(|_| "./data/database/photoblog.db".to_string()),
            upload_dir: env::var("PHOTOBLOG_UPLOAD_DIR")
                .unwrap_or_else(|_| "./data/uploads".to_string()),
            geocoder: GeocoderConfig {
                base_url: env::var("PHOTOBLOG_GEOCODER_URL")
                    .unwrap_or_else(|_| "https://nominatim.openstreetmap.org".to_string()),
                user_agent: env::var("PHOTOBLOG_GEOCODER_USER_AGENT")
                    .unwrap_or_else(|_| format!("photoblog/{}", env!("CARGO_PKG_VERSION"))),
                language: env::var("PHOTOBLOG_GEOCODER_LANGUAGE")
                    .unwrap_or_else(|_| "en".to_string()),
                timeout: Duration::from_secs(
                    env::var("PHOTOBLOG_GEOCODER_TIMEOUT_SECS")
                        .unwrap_or_else(|_| "5".to_string())
                        .parse()?,
                ),
            },
            jpeg_quality: jpeg_quality.clamp(1, 100),
            max_upload_mb: env::var("PHOTOBLOG_MAX_UPLOAD_MB")
                .unwrap_or_else(|_| "50".to_string())
                .parse()?,
        })
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_env() {
        // Only asserts on variables no other test sets
        let config = Config::from_env().unwrap();
        assert_eq!(config.geocoder.language, "en");
        assert_eq!(config.geocoder.timeout, Duration::from_secs(5));
        assert_eq!(config.jpeg_quality, 95);
        assert_eq!(config.max_upload_bytes(), 50 * 1024 * 1024);
        assert!(config.geocoder.user_agent.starts_with("photoblog/"));
    }

    #[test]
    fn test_huge_upload_limit_saturates() {
        let mut config = Config::from_env().unwrap();
        config.max_upload_mb = u64::MAX / 2;
        assert_eq!(config.max_upload_bytes(), u64::MAX);
    }
}
