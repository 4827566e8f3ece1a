use accounts::{Accounts, AccountsConfig};
use auth::JwtKeys;
use serde::Deserialize;

/// Selects the in-memory store instead of Postgres.
pub const MEMORY_DATABASE_URL: &str = "memory";

#[derive(Clone)]
pub struct AppState {
    pub accounts: Accounts,
    pub jwt: JwtKeys,
    pub access_ttl: i64,
    pub refresh_ttl: i64,
    pub cookie_domain: String,
    pub cookie_secure: bool,
}

impl AppState {
    pub fn new(accounts: Accounts, settings: &Settings) -> Self {
        Self {
            jwt: accounts.jwt_keys().clone(),
            accounts,
            access_ttl: settings.access_ttl(),
            refresh_ttl: settings.refresh_ttl(),
            cookie_domain: settings
                .cookie_domain
                .clone()
                .unwrap_or_else(|| "localhost".into()),
            cookie_secure: settings.cookie_secure.unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database_url: String,
    pub jwt_secret: String,
    pub access_ttl_seconds: Option<i64>,
    pub refresh_ttl_seconds: Option<i64>,
    pub cookie_domain: Option<String>,
    pub cookie_secure: Option<bool>,
    pub bind_addr: Option<String>,
    pub db_max_connections: Option<u32>,
    pub rate_limit_burst: Option<u32>,
    pub enforce_patient_ownership: Option<bool>,
}

impl Settings {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::default().try_parsing(true))
            .build()?
            .try_deserialize::<Settings>()
    }

    pub fn access_ttl(&self) -> i64 {
        self.access_ttl_seconds.unwrap_or(900)
    }

    pub fn refresh_ttl(&self) -> i64 {
        self.refresh_ttl_seconds.unwrap_or(60 * 60 * 24 * 7)
    }

    pub fn bind_addr(&self) -> &str {
        self.bind_addr.as_deref().unwrap_or("0.0.0.0:8080")
    }

    pub fn db_max_connections(&self) -> u32 {
        self.db_max_connections.unwrap_or(10)
    }

    pub fn rate_limit_burst(&self) -> u32 {
        self.rate_limit_burst.unwrap_or(10)
    }

    pub fn uses_memory_store(&self) -> bool {
        self.database_url == MEMORY_DATABASE_URL
    }

    pub fn accounts_config(&self) -> AccountsConfig {
        let mut config = AccountsConfig::new(JwtKeys::from_secret(&self.jwt_secret));
        config.access_ttl = self.access_ttl();
        config.refresh_ttl = self.refresh_ttl();
        config.enforce_patient_ownership = self.enforce_patient_ownership.unwrap_or(false);
        config
    }
}
