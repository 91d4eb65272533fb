//! Server configuration, from command-line arguments with environment fallbacks.

use clap::Parser;
use sqlx::postgres::{PgConnectOptions, PgSslMode};

use crate::codec::DEFAULT_MAX_LINE_LENGTH;
use crate::store::seed::DEFAULT_ITEM_COUNT;

const PORT: u16 = 8080;

#[derive(Parser, Debug, Clone)]
#[command(name = "itemwire", version)]
#[command(about = "Line-oriented TCP server for item dumps and client record uploads", long_about = None)]
pub struct Config {
    /// The address to listen on
    #[arg(long, env = "LISTEN_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// The port to listen on
    #[arg(short, long, env = "PORT", default_value_t = PORT)]
    pub port: u16,

    /// PostgreSQL connection URL, takes precedence over the DB_* settings
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    #[arg(long, env = "DB_HOST", default_value = "localhost")]
    pub db_host: String,

    #[arg(long, env = "DB_PORT", default_value_t = 5432)]
    pub db_port: u16,

    #[arg(long, env = "DB_USER")]
    pub db_user: Option<String>,

    #[arg(long, env = "DB_PASSWORD", hide_env_values = true)]
    pub db_password: Option<String>,

    /// Database name; without it (and without a URL) records are kept in memory
    #[arg(long, env = "DB_NAME")]
    pub db_name: Option<String>,

    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value_t = 10)]
    pub db_max_connections: u32,

    /// Number of catalog items to make sure exist on startup
    #[arg(long, env = "SEED_ITEMS", default_value_t = DEFAULT_ITEM_COUNT)]
    pub seed_items: usize,

    /// Longest accepted client line in bytes; longer lines close the connection
    #[arg(long, env = "MAX_LINE_LENGTH", default_value_t = DEFAULT_MAX_LINE_LENGTH)]
    pub max_line_length: usize,
}

/// Where items and records are kept.
#[derive(Debug)]
pub enum Backend {
    Memory,
    Postgres(PgConnectOptions),
}

impl Config {
    pub fn backend(&self) -> Result<Backend, sqlx::Error> {
        if let Some(url) = &self.database_url {
            return Ok(Backend::Postgres(url.parse()?));
        }

        let Some(db_name) = &self.db_name else {
            return Ok(Backend::Memory);
        };

        let mut options = PgConnectOptions::new()
            .host(&self.db_host)
            .port(self.db_port)
            .database(db_name)
            .ssl_mode(PgSslMode::Disable);

        if let Some(user) = &self.db_user {
            options = options.username(user);
        }
        if let Some(password) = &self.db_password {
            options = options.password(password);
        }

        Ok(Backend::Postgres(options))
    }
}
