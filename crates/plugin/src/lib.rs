//! Attach PostgreSQL pools and clients to a server's lifecycle.
//!
//! Registration validates the options, resolves how the connections are
//! attached, opens them concurrently, attaches them to the [`Host`], and
//! registers a stop hook that closes them again.

mod connector;
pub mod error;
pub mod host;
mod lifecycle;
pub mod mode;
pub mod resources;

use std::sync::Arc;

use pgmount_core::PluginOptions;
use pgmount_storage::Driver;
use serde_json::Value;

pub use error::{CloseError, PluginError, ResourceKind};
pub use host::{DecorationTarget, Decorations, Host, HostError, RequestDecorations, Server, Shared, StopHook};
pub use mode::{DEFAULT_DECORATION, DecorationMode};
pub use resources::{ConnectionResult, ExposedResourceSet, Resources};

/// Default exposure namespace and log tag.
pub const PLUGIN_NAME: &str = "pgmount";

/// The plugin, configured once and registered on a host.
pub struct Plugin<D: Driver> {
    driver: Arc<D>,
    name: String,
    with_clients: bool,
}

impl<D: Driver> Plugin<D> {
    pub fn new(driver: D) -> Self {
        Self {
            driver: Arc::new(driver),
            name: PLUGIN_NAME.to_owned(),
            with_clients: true,
        }
    }

    /// Namespace for exposed values and the first tag of every log event.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Whether to open a persistent client next to each pool. On by default.
    pub fn with_clients(mut self, enabled: bool) -> Self {
        self.with_clients = enabled;
        self
    }

    pub fn driver(&self) -> &Arc<D> {
        &self.driver
    }

    /// Register on `host` with options given as JSON.
    pub async fn register_value<H>(&self, host: &mut H, options: &Value) -> Result<Registration<D>, PluginError>
    where
        H: Host + ?Sized,
    {
        self.register(host, PluginOptions::from_value(options)?).await
    }

    /// Open the configured connections and attach them to `host`.
    ///
    /// Configuration and decoration conflicts are reported before anything is
    /// opened. A connection failure closes whatever was already opened.
    pub async fn register<H>(
        &self,
        host: &mut H,
        options: impl Into<PluginOptions>,
    ) -> Result<Registration<D>, PluginError>
    where
        H: Host + ?Sized,
    {
        let config = options.into().normalize()?;
        let mode = DecorationMode::resolve(&config)?;
        mode.check_available(&*host)?;

        tracing::debug!(
            plugin = %self.name,
            connections = config.descriptors().len(),
            mode = ?mode,
            "Registering connections"
        );

        let sink = host.sink();
        let connections =
            connector::connect_all(&*self.driver, &config, self.with_clients, &self.name, &*sink).await?;
        let resources = Arc::new(ExposedResourceSet::new(self.driver.clone(), connections));

        if let Err(err) = lifecycle::bind(&mut *host, &self.name, &mode, &resources) {
            lifecycle::close_all(&*self.driver, resources.connections(), &self.name, &*sink).await;
            return Err(err.into());
        }
        lifecycle::close_on_stop(host, &self.name, resources.clone());

        Ok(Registration { resources, mode })
    }
}

/// The outcome of a successful registration.
pub struct Registration<D: Driver> {
    /// Every opened resource, whatever the mode.
    pub resources: Arc<ExposedResourceSet<D>>,
    pub mode: DecorationMode,
}

impl Server {
    /// Register `plugin` on this server.
    pub async fn register<D: Driver>(
        &mut self,
        plugin: &Plugin<D>,
        options: impl Into<PluginOptions>,
    ) -> Result<Registration<D>, PluginError> {
        plugin.register(self, options).await
    }
}
