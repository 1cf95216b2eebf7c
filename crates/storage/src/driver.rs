use std::time::Duration;

use async_trait::async_trait;
use pgmount_core::ConnectionSettings;
use thiserror::Error;

/// Errors raised by a [`Driver`] while building, connecting or closing.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("invalid connection settings: {0}")]
    Settings(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error("client was closed and is not queryable")]
    ClientClosed,

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// The database library the plugin hands connections off to.
///
/// Handles are cheap to clone and shared by every request once registered;
/// the plugin only ever creates and closes them.
#[async_trait]
pub trait Driver: Send + Sync + 'static {
    type Pool: Clone + Send + Sync + 'static;
    type Client: Clone + Send + Sync + 'static;

    /// Build a pool. Must not need a reachable server: pools connect on first use.
    fn create_pool(&self, settings: &ConnectionSettings) -> Result<Self::Pool, DriverError>;

    /// Open a single persistent connection.
    async fn connect(&self, settings: &ConnectionSettings) -> Result<Self::Client, DriverError>;

    async fn close_client(&self, client: &Self::Client) -> Result<(), DriverError>;

    async fn close_pool(&self, pool: &Self::Pool) -> Result<(), DriverError>;

    /// Display string used when logging about `settings`.
    fn identity(&self, settings: &ConnectionSettings) -> String {
        settings.identity()
    }
}
