use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::join_all;
use pgmount_core::{LogEvent, LogSink};
use pgmount_storage::{Driver, DriverError};

use crate::error::{CloseError, ResourceKind};
use crate::host::{DecorationTarget, Host, HostError, Shared};
use crate::mode::{DEFAULT_DECORATION, DecorationMode};
use crate::resources::{ConnectionResult, ExposedResourceSet};

/// Attach `set` to `host` the way `mode` says.
///
/// Every name is checked on both targets before the first one is taken, so
/// a conflict leaves the host as it was.
pub(crate) fn bind<D, H>(
    host: &mut H,
    scope: &str,
    mode: &DecorationMode,
    set: &Arc<ExposedResourceSet<D>>,
) -> Result<(), HostError>
where
    D: Driver,
    H: Host + ?Sized,
{
    mode.check_available(&*host)?;
    match mode {
        DecorationMode::Named(names) => {
            for (index, name) in names.iter().enumerate() {
                let Some(entry) = set.entry(index) else {
                    continue;
                };
                decorate_both(host, name, Arc::new(entry))?;
            }
        }
        DecorationMode::Boolean => {
            decorate_both(host, DEFAULT_DECORATION, set.clone())?;
        }
        DecorationMode::Default => {
            host.expose(scope, "lib", set.lib.clone());
            host.expose(scope, "pool", Arc::new(set.pool.clone()));
            if let Some(client) = &set.client {
                host.expose(scope, "client", Arc::new(client.clone()));
            }
        }
    }
    Ok(())
}

fn decorate_both<H: Host + ?Sized>(host: &mut H, name: &str, value: Shared) -> Result<(), HostError> {
    host.decorate(DecorationTarget::Server, name, value.clone())?;
    host.decorate(DecorationTarget::Request, name, value)
}

/// Register the hook that closes `set` when `host` stops.
pub(crate) fn close_on_stop<D, H>(host: &mut H, scope: &str, set: Arc<ExposedResourceSet<D>>)
where
    D: Driver,
    H: Host + ?Sized,
{
    let sink = host.sink();
    let scope = scope.to_owned();
    host.on_stop(Box::new(move || {
        async move {
            close_all(&*set.lib, set.connections(), &scope, &*sink).await;
        }
        .boxed()
    }));
}

/// Close every client, then every pool.
///
/// Closes within a group run concurrently. A failure is logged under
/// `[scope, kind, "error"]` and does not stop the others.
pub(crate) async fn close_all<D: Driver>(
    driver: &D,
    connections: &[ConnectionResult<D>],
    scope: &str,
    sink: &dyn LogSink,
) {
    join_all(connections.iter().filter_map(|c| {
        let client = c.client.as_ref()?;
        Some(close_one(ResourceKind::Client, &c.identity, driver.close_client(client), scope, sink))
    }))
    .await;

    join_all(
        connections
            .iter()
            .map(|c| close_one(ResourceKind::Pool, &c.identity, driver.close_pool(&c.pool), scope, sink)),
    )
    .await;
}

async fn close_one<F>(kind: ResourceKind, identity: &str, close: F, scope: &str, sink: &dyn LogSink)
where
    F: Future<Output = Result<(), DriverError>>,
{
    match close.await {
        Ok(()) => sink.log(LogEvent::info(scope, format!("{kind} closed for {identity}"))),
        Err(source) => {
            let err = CloseError {
                kind,
                identity: identity.to_owned(),
                source,
            };
            sink.log(LogEvent::error(&[scope, kind.tag()], &err));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Server;
    use async_trait::async_trait;
    use pgmount_core::ConnectionSettings;

    struct NoopDriver;

    #[async_trait]
    impl Driver for NoopDriver {
        type Pool = ();
        type Client = ();

        fn create_pool(&self, _: &ConnectionSettings) -> Result<(), DriverError> {
            Ok(())
        }

        async fn connect(&self, _: &ConnectionSettings) -> Result<(), DriverError> {
            Ok(())
        }

        async fn close_client(&self, _: &()) -> Result<(), DriverError> {
            Ok(())
        }

        async fn close_pool(&self, _: &()) -> Result<(), DriverError> {
            Ok(())
        }
    }

    fn set(count: usize) -> Arc<ExposedResourceSet<NoopDriver>> {
        let connections = (0..count)
            .map(|i| ConnectionResult {
                pool: (),
                client: Some(()),
                identity: format!("app@db{i}/orders"),
            })
            .collect();
        Arc::new(ExposedResourceSet::new(Arc::new(NoopDriver), connections))
    }

    #[test]
    fn conflict_on_request_target_leaves_server_target_untouched() {
        let mut server = Server::new();
        server
            .decorate(DecorationTarget::Request, DEFAULT_DECORATION, Arc::new(0u8))
            .unwrap();

        let err = bind(&mut server, "pgmount", &DecorationMode::Boolean, &set(1)).unwrap_err();

        assert_eq!(
            err,
            HostError::DecorationExists {
                target: DecorationTarget::Request,
                name: DEFAULT_DECORATION.to_owned(),
            }
        );
        assert!(!server.has_decoration(DecorationTarget::Server, DEFAULT_DECORATION));
    }

    #[test]
    fn conflict_on_a_later_name_attaches_none() {
        let mut server = Server::new();
        server
            .decorate(DecorationTarget::Server, "users", Arc::new(0u8))
            .unwrap();
        let mode = DecorationMode::Named(vec!["orders".into(), "users".into()]);

        assert!(bind(&mut server, "pgmount", &mode, &set(2)).is_err());
        assert!(!server.has_decoration(DecorationTarget::Server, "orders"));
        assert!(!server.has_decoration(DecorationTarget::Request, "orders"));
    }
}
