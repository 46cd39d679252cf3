use devtrust_channel::ChannelConfig;
use devtrust_database::DatabaseConfig;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub database: DatabaseConfig,
    pub channel: ChannelConfig,
    pub jwt_secret: String,
    pub ip_hash_salt: String,
    pub sweep_interval: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            server_host: std::env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: std::env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database: DatabaseConfig::from_env(),
            channel: ChannelConfig::from_env(),
            jwt_secret: std::env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
            ip_hash_salt: std::env::var("IP_HASH_SALT").expect("IP_HASH_SALT must be set"),
            sweep_interval: Duration::from_secs(
                std::env::var("SWEEP_INTERVAL_SECONDS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(60),
            ),
        }
    }
}
