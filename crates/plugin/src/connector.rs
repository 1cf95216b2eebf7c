use futures::future::join_all;
use pgmount_core::{ConnectionDescriptor, LogEvent, LogSink, NormalizedConfig};
use pgmount_storage::Driver;

use crate::error::PluginError;
use crate::lifecycle;
use crate::resources::ConnectionResult;

/// Open every descriptor's resources concurrently.
///
/// Results keep descriptor order. If any descriptor fails, the ones that
/// succeeded are closed before the first failure (in descriptor order) is
/// returned.
pub(crate) async fn connect_all<D: Driver>(
    driver: &D,
    config: &NormalizedConfig,
    with_clients: bool,
    scope: &str,
    sink: &dyn LogSink,
) -> Result<Vec<ConnectionResult<D>>, PluginError> {
    let attempts = join_all(
        config
            .iter()
            .enumerate()
            .map(|(index, descriptor)| connect_one(driver, index, descriptor, with_clients, scope, sink)),
    )
    .await;

    let mut opened = Vec::with_capacity(attempts.len());
    let mut failure = None;
    for attempt in attempts {
        match attempt {
            Ok(connection) => opened.push(connection),
            Err(err) => {
                failure.get_or_insert(err);
            }
        }
    }

    let Some(err) = failure else {
        return Ok(opened);
    };

    sink.log(LogEvent::error(&[scope], &err));
    if !opened.is_empty() {
        tracing::debug!(count = opened.len(), "Closing connections opened before the failure");
        lifecycle::close_all(driver, &opened, scope, sink).await;
    }
    Err(err)
}

async fn connect_one<D: Driver>(
    driver: &D,
    index: usize,
    descriptor: &ConnectionDescriptor,
    with_clients: bool,
    scope: &str,
    sink: &dyn LogSink,
) -> Result<ConnectionResult<D>, PluginError> {
    let identity = driver.identity(&descriptor.settings);
    let failed = |source| PluginError::Connection {
        index,
        identity: identity.clone(),
        source,
    };

    let pool = driver.create_pool(&descriptor.settings).map_err(failed)?;

    let client = if with_clients {
        match driver.connect(&descriptor.settings).await {
            Ok(client) => Some(client),
            Err(source) => {
                // The sibling pool never reaches the resource set; close it here.
                if let Err(close) = driver.close_pool(&pool).await {
                    tracing::debug!(error = %close, "Closing pool of failed connection");
                }
                return Err(failed(source));
            }
        }
    } else {
        None
    };

    sink.log(LogEvent::info(scope, format!("connection created for {identity}")));

    Ok(ConnectionResult {
        pool,
        client,
        identity,
    })
}
