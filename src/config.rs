use anyhow::{Context, anyhow, bail};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    MySql { database_url: String },
    /// Process-local store; data is lost on restart.
    Memory,
}

/// Credentials for the super user bootstrap guarantees.
#[derive(Clone, Debug)]
pub struct SuperUserSeed {
    pub username: String,
    pub password: String,
}

#[derive(Clone)]
pub struct Config {
    pub server_addr: String,
    pub store: StoreBackend,
    pub jwt_secret: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,
    pub page_size: u64,

    pub log_dir: String,
    pub log_level: tracing::Level,

    pub username_warmup_batch: usize,
    pub bootstrap_super: Option<SuperUserSeed>,
}

fn var_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("{key} has invalid value '{raw}': {e}")),
        Err(_) => Ok(default),
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();

        let store = match env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "mysql".to_string())
            .to_lowercase()
            .as_str()
        {
            "mysql" => StoreBackend::MySql {
                database_url: required("DATABASE_URL")?,
            },
            "memory" => StoreBackend::Memory,
            other => bail!("STORE_BACKEND must be 'mysql' or 'memory', got '{other}'"),
        };

        let bootstrap_super = match (
            env::var("BOOTSTRAP_SUPER_USERNAME").ok(),
            env::var("BOOTSTRAP_SUPER_PASSWORD").ok(),
        ) {
            (Some(username), Some(password)) => Some(SuperUserSeed { username, password }),
            (None, None) => None,
            _ => bail!("BOOTSTRAP_SUPER_USERNAME and BOOTSTRAP_SUPER_PASSWORD must be set together"),
        };

        let page_size: u64 = var_or("PAGE_SIZE", 8)?;
        if page_size == 0 {
            bail!("PAGE_SIZE must be at least 1");
        }

        Ok(Self {
            server_addr: var_or("SERVER_ADDR", "127.0.0.1:8080".to_string())?,
            store,
            jwt_secret: required("JWT_SECRET")?,
            access_token_ttl: var_or("ACCESS_TOKEN_TTL", 900)?, // 15 min
            refresh_token_ttl: var_or("REFRESH_TOKEN_TTL", 604_800)?, // 7 days

            rate_login_per_min: var_or("RATE_LOGIN_PER_MIN", 60)?,
            rate_refresh_per_min: var_or("RATE_REFRESH_PER_MIN", 30)?,
            rate_protected_per_min: var_or("RATE_PROTECTED_PER_MIN", 1000)?,

            api_prefix: var_or("API_PREFIX", "/api".to_string())?,
            page_size,

            log_dir: var_or("LOG_DIR", "logs".to_string())?,
            log_level: var_or("LOG_LEVEL", tracing::Level::DEBUG)?,

            username_warmup_batch: var_or("USERNAME_WARMUP_BATCH", 250)?,
            bootstrap_super,
        })
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Self {
            server_addr: "127.0.0.1:0".into(),
            store: StoreBackend::Memory,
            jwt_secret: "test-secret".into(),
            access_token_ttl: 900,
            refresh_token_ttl: 3600,
            rate_login_per_min: 60,
            rate_refresh_per_min: 30,
            rate_protected_per_min: 1000,
            api_prefix: "/api".into(),
            page_size: 8,
            log_dir: "logs".into(),
            log_level: tracing::Level::DEBUG,
            username_warmup_batch: 10,
            bootstrap_super: None,
        }
    }
}
