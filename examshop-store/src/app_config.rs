use examshop_catalog::CatalogSettings;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub paystack: PaystackConfig,
    pub sms: SmsConfig,
    pub shop: ShopConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
    /// Lifetime of an idle browser session.
    #[serde(default = "default_session_ttl")]
    pub session_ttl_seconds: u64,
}

fn default_session_ttl() -> u64 {
    1_209_600
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaystackConfig {
    /// Authenticates API calls and signs inbound webhooks.
    pub secret_key: String,
    #[serde(default = "default_paystack_url")]
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_paystack_url() -> String {
    "https://api.paystack.co".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SmsConfig {
    /// Without a key every send fails with `NotConfigured`.
    pub api_key: Option<String>,
    pub base_url: String,
    /// Number the messages are sent from.
    pub sender: String,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_timeout() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct ShopConfig {
    /// Externally visible base URL, used to build the payment callback.
    pub public_url: String,
    #[serde(default = "default_password_prefix")]
    pub password_prefix: String,
    #[serde(default = "default_reference_attempts")]
    pub reference_attempts: u32,
    #[serde(default = "default_slug_attempts")]
    pub slug_attempts: u32,
    #[serde(default = "default_country_code")]
    pub country_code: String,
    #[serde(default = "default_session_cookie")]
    pub session_cookie: String,
}

impl ShopConfig {
    pub fn callback_url(&self) -> String {
        format!("{}/order/callback", self.public_url.trim_end_matches('/'))
    }

    pub fn catalog_settings(&self) -> CatalogSettings {
        CatalogSettings {
            password_prefix: self.password_prefix.clone(),
            max_slug_attempts: self.slug_attempts,
        }
    }
}

fn default_password_prefix() -> String {
    "EXAM".to_string()
}

fn default_reference_attempts() -> u32 {
    5
}

fn default_slug_attempts() -> u32 {
    50
}

fn default_country_code() -> String {
    "233".to_string()
}

fn default_session_cookie() -> String {
    "sessionid".to_string()
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Untracked developer overrides
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `EXAMSHOP__PAYSTACK__SECRET_KEY=sk_live_...`
            .add_source(config::Environment::with_prefix("EXAMSHOP").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_optional_keys() {
        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                [server]
                port = 3000
                [database]
                url = "postgres://localhost/examshop"
                [redis]
                url = "redis://127.0.0.1/"
                [paystack]
                secret_key = "sk_test_x"
                [sms]
                base_url = "https://sms.example.com"
                sender = "+233200000000"
                [shop]
                public_url = "http://localhost:3000/"
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.shop.reference_attempts, 5);
        assert_eq!(config.shop.session_cookie, "sessionid");
        assert_eq!(config.shop.callback_url(), "http://localhost:3000/order/callback");
        assert_eq!(config.shop.catalog_settings().max_slug_attempts, 50);
        assert_eq!(config.shop.catalog_settings().password_prefix, "EXAM");
        assert_eq!(config.paystack.base_url, "https://api.paystack.co");
        assert_eq!(config.paystack.secret_key, "sk_test_x");
        assert!(config.sms.api_key.is_none());
    }
}
