use anyhow::{anyhow, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::net::SocketAddr;
use std::str::FromStr;

const MAX_RETENTION_DAYS: i64 = 36_500;
const MAX_TOKEN_TTL_DAYS: u64 = 3_650;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub http_addr: String,
    pub app_mode: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_connect_timeout_seconds: u64,
    pub db_idle_timeout_seconds: u64,
    pub db_max_lifetime_seconds: u64,
    pub run_migrations: bool,
    pub s3_endpoint: String,
    pub s3_region: String,
    pub s3_bucket: String,
    pub queue_endpoint: String,
    pub queue_region: String,
    pub queue_name: String,
    pub token_key: [u8; 32],
    pub token_ttl_days: u64,
    pub purge_retention_days: i64,
    pub purge_batch_size: i64,
    pub purge_sweep_interval_seconds: u64,
    pub picture_max_bytes: usize,
    pub max_body_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let http_addr = env_or("HTTP_ADDR", "0.0.0.0:8080");
        let _parsed_http_addr = SocketAddr::from_str(&http_addr)
            .map_err(|err| anyhow!("invalid HTTP_ADDR: {}", err))?;
        let app_mode = env_or("APP_MODE", "api");

        let s3_region = env_or("S3_REGION", "fr-par");
        let queue_region = std::env::var("QUEUE_REGION").unwrap_or_else(|_| s3_region.clone());

        let purge_retention_days: i64 = env_or_parse("PURGE_RETENTION_DAYS", "10")?;
        check_range("PURGE_RETENTION_DAYS", purge_retention_days, 0, MAX_RETENTION_DAYS)?;
        let token_ttl_days: u64 = env_or_parse("TOKEN_TTL_DAYS", "30")?;
        check_range("TOKEN_TTL_DAYS", token_ttl_days, 1, MAX_TOKEN_TTL_DAYS)?;
        let purge_batch_size: i64 = env_or_parse("PURGE_BATCH_SIZE", "500")?;
        if purge_batch_size < 1 {
            return Err(anyhow!("invalid PURGE_BATCH_SIZE: must be positive"));
        }

        Ok(Self {
            http_addr,
            app_mode,
            database_url: env_or_err("DATABASE_URL")?,
            db_max_connections: env_or_parse("DB_MAX_CONNECTIONS", "25")?,
            db_connect_timeout_seconds: env_or_parse("DB_CONNECT_TIMEOUT_SECONDS", "5")?,
            db_idle_timeout_seconds: env_or_parse("DB_IDLE_TIMEOUT_SECONDS", "300")?,
            db_max_lifetime_seconds: env_or_parse("DB_MAX_LIFETIME_SECONDS", "1800")?,
            run_migrations: env_or_parse("RUN_MIGRATIONS", "false")?,
            s3_endpoint: env_or_err("S3_ENDPOINT")?,
            s3_region,
            s3_bucket: env_or_err("S3_BUCKET")?,
            queue_endpoint: env_or_err("QUEUE_ENDPOINT")?,
            queue_region,
            queue_name: env_or_err("QUEUE_NAME")?,
            token_key: decode_key_32("TOKEN_KEY", &env_or_err("TOKEN_KEY")?)?,
            token_ttl_days,
            purge_retention_days,
            purge_batch_size,
            purge_sweep_interval_seconds: env_or_parse("PURGE_SWEEP_INTERVAL_SECONDS", "86400")?,
            picture_max_bytes: env_or_parse("PICTURE_MAX_BYTES", "2097152")?,
            max_body_bytes: env_or_parse("MAX_BODY_BYTES", "4194304")?,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_err(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| anyhow!("missing required env var: {}", key))
}

fn env_or_parse<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    let value = std::env::var(key).unwrap_or_else(|_| default.to_string());
    value
        .parse::<T>()
        .map_err(|err| anyhow!("invalid {}: {}", key, err))
}

fn check_range<T>(key: &str, value: T, min: T, max: T) -> Result<()>
where
    T: PartialOrd + std::fmt::Display,
{
    if value < min || value > max {
        return Err(anyhow!("invalid {}: must be between {} and {}", key, min, max));
    }
    Ok(())
}

fn decode_key_32(key: &str, value: &str) -> Result<[u8; 32]> {
    let decoded = STANDARD
        .decode(value.trim().as_bytes())
        .map_err(|err| anyhow!("invalid {}: {}", key, err))?;
    if decoded.len() != 32 {
        return Err(anyhow!("invalid {}: expected 32 bytes", key));
    }
    let mut key_bytes = [0u8; 32];
    key_bytes.copy_from_slice(&decoded);
    Ok(key_bytes)
}
