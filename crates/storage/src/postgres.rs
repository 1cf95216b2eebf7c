use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use pgmount_core::{ConnectionSettings, SslSetting};
use sqlx::Connection;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgPool, PgPoolOptions, PgSslMode};
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};

use crate::driver::{Driver, DriverError};

/// Pool size when `max` is not configured.
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Build connect options from plugin settings.
///
/// A connection string takes precedence over the `host`/`port`/`database`/
/// `user`/`password` fields; the remaining fields apply either way. Without
/// either, libpq environment variables (`PGHOST`, ...) are used.
pub fn connect_options(settings: &ConnectionSettings) -> Result<PgConnectOptions, DriverError> {
    let mut options = match settings.connection_string() {
        Some(url) => PgConnectOptions::from_str(url).map_err(|e| DriverError::Settings(e.to_string()))?,
        None => PgConnectOptions::new(),
    };

    let Some(fields) = settings.fields() else {
        return Ok(options);
    };

    if settings.connection_string().is_none() {
        if let Some(host) = &fields.host {
            options = options.host(host);
        }
        if let Some(port) = fields.port {
            options = options.port(port);
        }
        if let Some(database) = &fields.database {
            options = options.database(database);
        }
        if let Some(user) = &fields.user {
            options = options.username(user);
        }
        if let Some(password) = &fields.password {
            options = options.password(password);
        }
    }

    if let Some(name) = &fields.application_name {
        options = options.application_name(name);
    }
    if let Some(timeout) = fields.statement_timeout() {
        options = options.options([("statement_timeout", format!("{}ms", timeout.as_millis()))]);
    }

    match &fields.ssl {
        Some(SslSetting::Enabled(true)) => options = options.ssl_mode(PgSslMode::Require),
        Some(SslSetting::Enabled(false)) => options = options.ssl_mode(PgSslMode::Disable),
        Some(SslSetting::Options(ssl)) => {
            let mode = match ssl.reject_unauthorized {
                Some(false) => PgSslMode::Require,
                _ => PgSslMode::VerifyFull,
            };
            options = options.ssl_mode(mode);
            if let Some(ca) = &ssl.ca {
                options = options.ssl_root_cert_from_pem(ca.as_bytes().to_vec());
            }
        }
        None => {}
    }

    Ok(options)
}

/// Build pool sizing and timeouts from plugin settings.
pub fn pool_options(settings: &ConnectionSettings) -> PgPoolOptions {
    let mut pool = PgPoolOptions::new().max_connections(DEFAULT_MAX_CONNECTIONS);

    let Some(fields) = settings.fields() else {
        return pool;
    };

    if let Some(max) = fields.max_connections() {
        pool = pool.max_connections(max);
    }
    if let Some(min) = fields.min {
        pool = pool.min_connections(min);
    }
    if let Some(idle) = fields.idle_timeout() {
        pool = pool.idle_timeout(idle);
    }
    if let Some(timeout) = fields.connection_timeout() {
        pool = pool.acquire_timeout(timeout);
    }
    pool
}

// ─── Client ─────────────────────────────────────────────────────────────────

/// A single persistent connection shared behind a lock.
///
/// Closing takes the connection out; later use fails with
/// [`DriverError::ClientClosed`].
#[derive(Debug, Clone)]
pub struct PgClient {
    conn: Arc<Mutex<Option<PgConnection>>>,
    query_timeout: Option<Duration>,
}

impl PgClient {
    fn new(conn: PgConnection, query_timeout: Option<Duration>) -> Self {
        Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            query_timeout,
        }
    }

    /// Exclusive access to the connection until the guard is dropped.
    pub async fn lock(&self) -> Result<MappedMutexGuard<'_, PgConnection>, DriverError> {
        let guard = self.conn.lock().await;
        MutexGuard::try_map(guard, Option::as_mut).map_err(|_| DriverError::ClientClosed)
    }

    /// Run `f` against the connection, bounded by `queryTimeoutMillis`.
    pub async fn with<T, F>(&self, f: F) -> Result<T, DriverError>
    where
        F: for<'c> FnOnce(&'c mut PgConnection) -> BoxFuture<'c, Result<T, sqlx::Error>>,
    {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or(DriverError::ClientClosed)?;
        let fut = f(conn);
        match self.query_timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| DriverError::Timeout(limit))?
                .map_err(DriverError::from),
            None => fut.await.map_err(DriverError::from),
        }
    }

    pub async fn is_closed(&self) -> bool {
        self.conn.lock().await.is_none()
    }

    async fn close(&self) -> Result<(), DriverError> {
        let conn = self.conn.lock().await.take();
        match conn {
            Some(conn) => conn.close().await.map_err(DriverError::from),
            None => Ok(()),
        }
    }
}

// ─── Driver ─────────────────────────────────────────────────────────────────

/// PostgreSQL through `sqlx`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlxDriver;

#[async_trait]
impl Driver for SqlxDriver {
    type Pool = PgPool;
    type Client = PgClient;

    fn create_pool(&self, settings: &ConnectionSettings) -> Result<PgPool, DriverError> {
        if let Some(fields) = settings.fields() {
            for key in fields.extra.keys() {
                tracing::warn!(setting = %key, "Ignoring unsupported connection setting");
            }
        }
        let options = connect_options(settings)?;
        Ok(pool_options(settings).connect_lazy_with(options))
    }

    async fn connect(&self, settings: &ConnectionSettings) -> Result<PgClient, DriverError> {
        let options = connect_options(settings)?;
        let fields = settings.fields();

        let conn = match fields.and_then(|f| f.connection_timeout()) {
            Some(limit) => tokio::time::timeout(limit, PgConnection::connect_with(&options))
                .await
                .map_err(|_| DriverError::Timeout(limit))??,
            None => PgConnection::connect_with(&options).await?,
        };

        Ok(PgClient::new(conn, fields.and_then(|f| f.query_timeout())))
    }

    async fn close_client(&self, client: &PgClient) -> Result<(), DriverError> {
        client.close().await
    }

    async fn close_pool(&self, pool: &PgPool) -> Result<(), DriverError> {
        pool.close().await;
        Ok(())
    }
}
