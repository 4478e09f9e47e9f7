use std::path::PathBuf;
use std::time::Duration;

pub const MAX_MESSAGE_LENGTH: usize = 5000;
pub const MAX_COMMENT_LENGTH: usize = 1000;
pub const MAX_BIO_LENGTH: usize = 500;
pub const MAX_NAME_LENGTH: usize = 50;
pub const MIN_PASSWORD_LENGTH: usize = 3;
pub const MESSAGES_PER_PAGE: usize = 20;
pub const DEFAULT_SUBREDDIT: &str = "technology";
pub const FEED_USER_AGENT: &str = "SocialApp/1.0";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub token_expiration_hours: i64,
    pub feed_base_url: String,
    pub feed_timeout: Duration,
    pub seed_demo_data: bool,
    pub log_format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 7000,
            data_dir: PathBuf::from("data"),
            token_expiration_hours: 24,
            feed_base_url: "https://www.reddit.com".to_string(),
            feed_timeout: Duration::from_secs(10),
            seed_demo_data: false,
            log_format: "pretty".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: env_string("SOCIALBEE_HOST").unwrap_or(defaults.host),
            port: env_parse("PORT").unwrap_or(defaults.port),
            data_dir: env_string("SOCIALBEE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            token_expiration_hours: env_parse("SOCIALBEE_TOKEN_EXPIRATION_HOURS")
                .unwrap_or(defaults.token_expiration_hours),
            feed_base_url: env_string("SOCIALBEE_FEED_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.feed_base_url),
            feed_timeout: env_parse("SOCIALBEE_FEED_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.feed_timeout),
            seed_demo_data: env_string("SOCIALBEE_SEED_DEMO")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.seed_demo_data),
            log_format: env_string("SOCIALBEE_LOG_FORMAT").unwrap_or(defaults.log_format),
        }
    }

    pub fn bind_addr(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_string(key).and_then(|v| v.parse::<T>().ok())
}
