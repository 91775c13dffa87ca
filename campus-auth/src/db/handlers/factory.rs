//! Per-request accessor construction.

use sqlx::MySqlPool;
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};
use std::time::Duration;
use tracing::instrument;

use super::Accessor;
use crate::config::{DatabaseConfig, DatabaseSecret};
use crate::db::backends::{MemoryStore, MemoryTx, MySqlTx, TxHandle};
use crate::db::errors::Result;

/// Hands out a fresh [`Accessor`] bound to a fresh transaction on every call.
///
/// Implementations hold only shared, immutable handles (a pool, a store), so one factory can
/// serve any number of concurrent requests.
#[async_trait::async_trait]
pub trait AccessorFactory: Send + Sync {
    type Tx: TxHandle;

    async fn begin_tx(&self) -> Result<Accessor<Self::Tx>>;
}

#[derive(Clone, Debug)]
pub struct MySqlAccessorFactory {
    pool: MySqlPool,
}

impl MySqlAccessorFactory {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Open a pool for `config`, authenticating with `secret`.
    #[instrument(skip(config, secret), fields(host = %config.host, database = %config.name), err)]
    pub async fn connect(config: &DatabaseConfig, secret: &DatabaseSecret) -> Result<Self> {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(secret.expose())
            .database(&config.name);

        let settings = &config.pool;
        let mut pool = MySqlPoolOptions::new()
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections)
            .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs));
        if settings.idle_timeout_secs > 0 {
            pool = pool.idle_timeout(Duration::from_secs(settings.idle_timeout_secs));
        }
        if settings.max_lifetime_secs > 0 {
            pool = pool.max_lifetime(Duration::from_secs(settings.max_lifetime_secs));
        }

        let pool = pool.connect_with(options).await?;
        tracing::info!(max_connections = settings.max_connections, "database pool ready");
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl AccessorFactory for MySqlAccessorFactory {
    type Tx = MySqlTx;

    async fn begin_tx(&self) -> Result<Accessor<MySqlTx>> {
        let tx = self.pool.begin().await?;
        Ok(Accessor::new(MySqlTx::new(tx)))
    }
}

#[async_trait::async_trait]
impl AccessorFactory for MemoryStore {
    type Tx = MemoryTx;

    async fn begin_tx(&self) -> Result<Accessor<MemoryTx>> {
        Ok(Accessor::new(self.begin()))
    }
}
