//! The web server the plugin attaches to.
//!
//! [`Host`] is the seam: logging, decoration, exposure and a stop hook.
//! [`Server`] implements it in-process and hands request-level decorations
//! to an axum [`Router`] as an extension.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use axum::{Extension, Router};
use futures::future::BoxFuture;
use pgmount_core::{LogSink, TracingSink};
use thiserror::Error;

/// A value attached to the host, read back by type.
pub type Shared = Arc<dyn Any + Send + Sync>;

/// Work to run when the server stops. Awaited by [`Server::stop`].
pub type StopHook = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecorationTarget {
    /// The server object itself.
    Server,
    /// Every request handled by the server.
    Request,
}

impl fmt::Display for DecorationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server => f.write_str("server"),
            Self::Request => f.write_str("request"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("{target} decoration `{name}` already exists")]
    DecorationExists {
        target: DecorationTarget,
        name: String,
    },
}

pub trait Host: Send {
    /// Where plugin log events go, for now and for stop hooks.
    fn sink(&self) -> Arc<dyn LogSink>;

    fn has_decoration(&self, target: DecorationTarget, name: &str) -> bool;

    /// Attach `value` under `name`. Names are unique per target; a name
    /// [`Host::has_decoration`] reports free must be accepted.
    fn decorate(
        &mut self,
        target: DecorationTarget,
        name: &str,
        value: Shared,
    ) -> Result<(), HostError>;

    /// Publish `value` under `key` in the `plugin` namespace.
    fn expose(&mut self, plugin: &str, key: &str, value: Shared);

    fn on_stop(&mut self, hook: StopHook);
}

// ─── Decorations ────────────────────────────────────────────────────────────

/// Named values of arbitrary type.
#[derive(Debug, Clone, Default)]
pub struct Decorations {
    values: HashMap<String, Shared>,
}

impl Decorations {
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.values.get(name).cloned()?.downcast().ok()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn insert(&mut self, name: &str, value: Shared) {
        self.values.insert(name.to_owned(), value);
    }
}

/// Request-level decorations, available to handlers as
/// `Extension<RequestDecorations>`.
#[derive(Debug, Clone, Default)]
pub struct RequestDecorations(Arc<Decorations>);

impl RequestDecorations {
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }
}

// ─── Server ─────────────────────────────────────────────────────────────────

pub struct Server {
    sink: Arc<dyn LogSink>,
    server: Decorations,
    request: Decorations,
    plugins: HashMap<String, Decorations>,
    stop_hooks: Vec<StopHook>,
}

impl Server {
    /// A server logging through `tracing`.
    pub fn new() -> Self {
        Self::with_sink(Arc::new(TracingSink))
    }

    pub fn with_sink(sink: Arc<dyn LogSink>) -> Self {
        Self {
            sink,
            server: Decorations::default(),
            request: Decorations::default(),
            plugins: HashMap::new(),
            stop_hooks: Vec::new(),
        }
    }

    /// A server-level decoration.
    pub fn decoration<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.server.get(name)
    }

    pub fn server_decorations(&self) -> &Decorations {
        &self.server
    }

    /// Snapshot of the request-level decorations registered so far.
    pub fn request_decorations(&self) -> RequestDecorations {
        RequestDecorations(Arc::new(self.request.clone()))
    }

    /// Values a plugin exposed, by plugin name.
    pub fn plugin(&self, name: &str) -> Option<&Decorations> {
        self.plugins.get(name)
    }

    /// Attach request-level decorations to `router`.
    ///
    /// Decorations registered after this call are not seen by the router.
    pub fn router<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.layer(Extension(self.request_decorations()))
    }

    /// Run every stop hook in registration order, awaiting each.
    ///
    /// Hooks run once; stopping again does nothing.
    pub async fn stop(&mut self) {
        let hooks = std::mem::take(&mut self.stop_hooks);
        tracing::debug!(hooks = hooks.len(), "Stopping server");
        for hook in hooks {
            hook().await;
        }
    }

    fn decorations_mut(&mut self, target: DecorationTarget) -> &mut Decorations {
        match target {
            DecorationTarget::Server => &mut self.server,
            DecorationTarget::Request => &mut self.request,
        }
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for Server {
    fn sink(&self) -> Arc<dyn LogSink> {
        self.sink.clone()
    }

    fn has_decoration(&self, target: DecorationTarget, name: &str) -> bool {
        match target {
            DecorationTarget::Server => self.server.contains(name),
            DecorationTarget::Request => self.request.contains(name),
        }
    }

    fn decorate(
        &mut self,
        target: DecorationTarget,
        name: &str,
        value: Shared,
    ) -> Result<(), HostError> {
        let decorations = self.decorations_mut(target);
        if decorations.contains(name) {
            return Err(HostError::DecorationExists {
                target,
                name: name.to_owned(),
            });
        }
        decorations.insert(name, value);
        Ok(())
    }

    fn expose(&mut self, plugin: &str, key: &str, value: Shared) {
        self.plugins
            .entry(plugin.to_owned())
            .or_default()
            .insert(key, value);
    }

    fn on_stop(&mut self, hook: StopHook) {
        self.stop_hooks.push(hook);
    }
}
