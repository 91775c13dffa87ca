//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The file path
//! defaults to `config.yaml` and can be changed with `-f` or `CAMPUS_AUTH_CONFIG`.
//!
//! ## Loading Priority
//!
//! 1. **YAML config file** - base configuration (default: `config.yaml`)
//! 2. **Environment variables** - variables prefixed with `CAMPUS_AUTH_` override YAML values
//!
//! Nested values use double underscores, e.g. `CAMPUS_AUTH_DATABASE__HOST=db.internal`.
//!
//! ## Secrets
//!
//! The database password is never part of [`Config`]. It is read separately into a
//! [`DatabaseSecret`], from `--password-file` if given, otherwise from
//! `CAMPUS_AUTH_DB_PASSWORD`.
//!
//! ```yaml
//! database:
//!   dialect: mysql
//!   host: localhost
//!   port: 3306
//!   user: campus
//!   name: campus
//!   pool:
//!     max_connections: 10
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::errors::Error;

/// Environment variable holding the database password when no password file is given.
pub const PASSWORD_ENV: &str = "CAMPUS_AUTH_DB_PASSWORD";

/// CLI args
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "CAMPUS_AUTH_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without connecting to the database.
    #[arg(long)]
    pub validate: bool,

    /// File containing the database password. Trailing newlines are ignored.
    #[arg(long)]
    pub password_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub database: DatabaseConfig,
}

/// Connection parameters for the account database.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// SQL dialect. Only `mysql` is supported.
    pub dialect: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    /// Database (schema) name
    pub name: String,
    pub pool: PoolSettings,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            dialect: "mysql".to_string(),
            host: "localhost".to_string(),
            port: 3306,
            user: "campus".to_string(),
            name: "campus".to_string(),
            pool: PoolSettings::default(),
        }
    }
}

/// Connection pool configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct PoolSettings {
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of idle connections to maintain
    pub min_connections: u32,
    /// Maximum time to wait for a connection (seconds)
    pub acquire_timeout_secs: u64,
    /// Time before idle connections are closed (seconds, 0 = never)
    pub idle_timeout_secs: u64,
    /// Maximum lifetime of a connection (seconds, 0 = never)
    pub max_lifetime_secs: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 0,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 600,  // 10 minutes
            max_lifetime_secs: 1800, // 30 minutes
        }
    }
}

impl Config {
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        Self::figment(args).extract()
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new().merge(Yaml::file(&args.config)).merge(
            Env::prefixed("CAMPUS_AUTH_")
                // Consumed by clap and DatabaseSecret respectively
                .ignore(&["config", "db_password"])
                .split("__"),
        )
    }

    pub fn validate(&self) -> Result<(), Error> {
        let db = &self.database;

        if !db.dialect.eq_ignore_ascii_case("mysql") {
            return Err(Error::Config {
                message: format!("unsupported database dialect {:?}, only mysql is supported", db.dialect),
            });
        }

        for (field, value) in [("host", &db.host), ("user", &db.user), ("name", &db.name)] {
            if value.trim().is_empty() {
                return Err(Error::Config {
                    message: format!("database.{field} must not be empty"),
                });
            }
        }

        if db.port == 0 {
            return Err(Error::Config {
                message: "database.port must not be 0".to_string(),
            });
        }

        if db.pool.max_connections == 0 {
            return Err(Error::Config {
                message: "database.pool.max_connections must be at least 1".to_string(),
            });
        }

        if db.pool.min_connections > db.pool.max_connections {
            return Err(Error::Config {
                message: format!(
                    "database.pool.min_connections ({}) cannot be greater than max_connections ({})",
                    db.pool.min_connections, db.pool.max_connections
                ),
            });
        }

        Ok(())
    }
}

/// The database password. Its `Debug` output is redacted.
#[derive(Clone)]
pub struct DatabaseSecret(String);

impl DatabaseSecret {
    pub fn new(password: impl Into<String>) -> Self {
        Self(password.into())
    }

    /// Read the password from `args.password_file`, or from [`PASSWORD_ENV`].
    pub fn load(args: &Args) -> Result<Self, Error> {
        let password = match &args.password_file {
            Some(path) => std::fs::read_to_string(path)
                .map_err(|e| Error::Config {
                    message: format!("cannot read password file {}: {e}", path.display()),
                })?
                .trim_end_matches(['\r', '\n'])
                .to_string(),
            None => std::env::var(PASSWORD_ENV).map_err(|_| Error::Config {
                message: format!("no database password: pass --password-file or set {PASSWORD_ENV}"),
            })?,
        };
        Ok(Self(password))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for DatabaseSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DatabaseSecret(<redacted>)")
    }
}
