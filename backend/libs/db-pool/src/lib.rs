//! Database connection pool management
//!
//! Builds the PostgreSQL pool used by the events consumer. Connection targets
//! come from `DATABASE_URL` when set, otherwise from the libpq-style `PG*`
//! variables with local-development defaults.

mod env_utils;
mod metrics;

pub use env_utils::{env_string_or, parse_env_with_default};

use metrics::update_pool_metrics;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, error, info};

/// Database connection pool configuration
#[derive(Clone)]
pub struct DbConfig {
    /// Service name for metrics labeling
    pub service_name: String,
    /// Full connection URL; takes precedence over the discrete fields
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    /// Maximum number of connections
    pub max_connections: u32,
    /// Minimum number of connections
    pub min_connections: u32,
    /// Timeout for the startup `SELECT 1` verification
    pub connect_timeout_secs: u64,
    /// Connection acquisition timeout (get connection from pool)
    pub acquire_timeout_secs: u64,
    /// Connection idle timeout
    pub idle_timeout_secs: u64,
    /// Connection maximum lifetime
    pub max_lifetime_secs: u64,
    /// Server-side `statement_timeout` for every connection; 0 disables it
    pub statement_timeout_ms: u64,
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("service_name", &self.service_name)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[REDACTED]"),
            )
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("max_connections", &self.max_connections)
            .field("min_connections", &self.min_connections)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("acquire_timeout_secs", &self.acquire_timeout_secs)
            .field("idle_timeout_secs", &self.idle_timeout_secs)
            .field("max_lifetime_secs", &self.max_lifetime_secs)
            .field("statement_timeout_ms", &self.statement_timeout_ms)
            .finish()
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            service_name: String::from("unknown"),
            database_url: None,
            host: String::from("localhost"),
            port: 5432,
            database: String::from("customersignal"),
            user: String::from("customersignal"),
            password: String::from("devpassword"),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 5,
            acquire_timeout_secs: 10,
            idle_timeout_secs: 600,
            max_lifetime_secs: 1800,
            statement_timeout_ms: 30_000,
        }
    }
}

impl DbConfig {
    /// Build the configuration from environment variables
    pub fn from_env(service_name: &str) -> Self {
        let defaults = Self::default();
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty());

        Self {
            service_name: service_name.to_string(),
            database_url,
            host: env_string_or("PGHOST", &defaults.host),
            port: parse_env_with_default("PGPORT", defaults.port),
            database: env_string_or("PGDATABASE", &defaults.database),
            user: env_string_or("PGUSER", &defaults.user),
            password: env_string_or("PGPASSWORD", &defaults.password),
            max_connections: parse_env_with_default("DB_MAX_CONNECTIONS", defaults.max_connections),
            min_connections: parse_env_with_default("DB_MIN_CONNECTIONS", defaults.min_connections),
            connect_timeout_secs: parse_env_with_default(
                "DB_CONNECT_TIMEOUT_SECS",
                defaults.connect_timeout_secs,
            ),
            acquire_timeout_secs: parse_env_with_default(
                "DB_ACQUIRE_TIMEOUT_SECS",
                defaults.acquire_timeout_secs,
            ),
            idle_timeout_secs: parse_env_with_default(
                "DB_IDLE_TIMEOUT_SECS",
                defaults.idle_timeout_secs,
            ),
            max_lifetime_secs: parse_env_with_default(
                "DB_MAX_LIFETIME_SECS",
                defaults.max_lifetime_secs,
            ),
            statement_timeout_ms: parse_env_with_default(
                "DB_STATEMENT_TIMEOUT_MS",
                defaults.statement_timeout_ms,
            ),
        }
    }

    /// Connection options for sqlx. The password is passed out-of-band so it
    /// needs no URL escaping.
    pub fn connect_options(&self) -> Result<PgConnectOptions, sqlx::Error> {
        let options = match &self.database_url {
            Some(url) => PgConnectOptions::from_str(url)?,
            None => PgConnectOptions::new()
                .host(&self.host)
                .port(self.port)
                .database(&self.database)
                .username(&self.user)
                .password(&self.password),
        };

        Ok(match self.statement_timeout_setting() {
            Some(timeout) => options.options([("statement_timeout", timeout)]),
            None => options,
        })
    }

    /// Value sent as the `statement_timeout` startup parameter
    pub fn statement_timeout_setting(&self) -> Option<String> {
        (self.statement_timeout_ms > 0).then(|| format!("{}ms", self.statement_timeout_ms))
    }

    /// Log pool configuration details
    pub fn log_config(&self) {
        info!(
            service = %self.service_name,
            target = %self.target_description(),
            "Database Pool Configuration: \
             max_connections={}, min_connections={}, \
             connect_timeout={}s, acquire_timeout={}s, idle_timeout={}s, max_lifetime={}s, \
             statement_timeout={}ms",
            self.max_connections,
            self.min_connections,
            self.connect_timeout_secs,
            self.acquire_timeout_secs,
            self.idle_timeout_secs,
            self.max_lifetime_secs,
            self.statement_timeout_ms
        );
    }

    fn target_description(&self) -> String {
        match &self.database_url {
            Some(_) => "DATABASE_URL".to_string(),
            None => format!("{}@{}:{}/{}", self.user, self.host, self.port, self.database),
        }
    }
}

/// Create a PostgreSQL connection pool and verify it with `SELECT 1`.
pub async fn create_pool(config: DbConfig) -> Result<PgPool, sqlx::Error> {
    debug!(
        "Creating database pool: service={}, max={}, min={}, \
         acquire_timeout={}s, verify_timeout={}s, idle_timeout={}s",
        config.service_name,
        config.max_connections,
        config.min_connections,
        config.acquire_timeout_secs,
        config.connect_timeout_secs,
        config.idle_timeout_secs
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
        .test_before_acquire(true)
        .connect_with(config.connect_options()?)
        .await?;

    match tokio::time::timeout(
        Duration::from_secs(config.connect_timeout_secs),
        sqlx::query("SELECT 1").execute(&pool),
    )
    .await
    {
        Ok(Ok(_)) => {
            info!(
                service = %config.service_name,
                "Database pool created and verified successfully"
            );

            update_pool_metrics(&pool, &config.service_name);

            // Stops on its own once the pool is closed during shutdown
            let pool_clone = pool.clone();
            let service = config.service_name.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(30));
                loop {
                    interval.tick().await;
                    if pool_clone.is_closed() {
                        break;
                    }
                    update_pool_metrics(&pool_clone, &service);
                }
            });

            Ok(pool)
        }
        Ok(Err(e)) => {
            error!(
                service = %config.service_name,
                error = %e,
                "Database connection verification failed"
            );
            Err(e)
        }
        Err(_) => {
            error!(
                service = %config.service_name,
                timeout_secs = config.connect_timeout_secs,
                "Database connection verification timeout"
            );
            Err(sqlx::Error::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "Database verification timeout",
            )))
        }
    }
}
