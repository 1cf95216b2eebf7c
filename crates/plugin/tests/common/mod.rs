#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pgmount::Server;
use pgmount_core::{ConnectionSettings, LogEvent, LogSink};
use pgmount_storage::{Driver, DriverError, sqlx};

pub const PLUGIN: &str = "pgmount";

/// `postgres://app@<host>/orders`
pub fn url(host: &str) -> String {
    format!("postgres://app:secret@{host}/orders")
}

/// Collects every log event.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<LogEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<LogEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn with_tags(&self, tags: &[&str]) -> Vec<LogEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.tags == tags)
            .collect()
    }

    pub fn messages(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.message).collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl LogSink for RecordingSink {
    fn log(&self, event: LogEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub fn server() -> (Server, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    (Server::with_sink(sink.clone()), sink)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreatePool(String),
    Connect(String),
    CloseClient(String),
    ClosePool(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockPool {
    pub host: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockClient {
    pub host: String,
}

/// A driver that records calls and fails on request, keyed by host name.
#[derive(Default)]
pub struct MockDriver {
    refuse: HashSet<String>,
    fail_client_close: HashSet<String>,
    fail_pool_close: HashSet<String>,
    delays: HashMap<String, Duration>,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl MockDriver {
    pub fn refusing(mut self, host: &str) -> Self {
        self.refuse.insert(host.to_owned());
        self
    }

    pub fn failing_client_close(mut self, host: &str) -> Self {
        self.fail_client_close.insert(host.to_owned());
        self
    }

    pub fn failing_pool_close(mut self, host: &str) -> Self {
        self.fail_pool_close.insert(host.to_owned());
        self
    }

    /// Delay connects and closes for `host`.
    pub fn delaying(mut self, host: &str, delay: Duration) -> Self {
        self.delays.insert(host.to_owned(), delay);
        self
    }

    /// Shared view of the call log, valid after the driver moves into a plugin.
    pub fn calls(&self) -> Arc<Mutex<Vec<Call>>> {
        self.calls.clone()
    }

    fn host(settings: &ConnectionSettings) -> String {
        settings
            .identity()
            .split(['@', '/'])
            .nth(1)
            .unwrap_or_default()
            .to_owned()
    }

    async fn pause(&self, host: &str) {
        if let Some(delay) = self.delays.get(host) {
            tokio::time::sleep(*delay).await;
        }
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

pub fn count(calls: &Mutex<Vec<Call>>, pred: impl Fn(&Call) -> bool) -> usize {
    calls.lock().unwrap().iter().filter(|c| pred(c)).count()
}

fn oops() -> DriverError {
    DriverError::Database(sqlx::Error::Protocol("Oops".into()))
}

#[async_trait]
impl Driver for MockDriver {
    type Pool = MockPool;
    type Client = MockClient;

    fn create_pool(&self, settings: &ConnectionSettings) -> Result<MockPool, DriverError> {
        let host = Self::host(settings);
        self.record(Call::CreatePool(host.clone()));
        Ok(MockPool { host })
    }

    async fn connect(&self, settings: &ConnectionSettings) -> Result<MockClient, DriverError> {
        let host = Self::host(settings);
        self.pause(&host).await;
        self.record(Call::Connect(host.clone()));
        if self.refuse.contains(&host) {
            return Err(DriverError::Database(sqlx::Error::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused",
            ))));
        }
        Ok(MockClient { host })
    }

    async fn close_client(&self, client: &MockClient) -> Result<(), DriverError> {
        self.pause(&client.host).await;
        self.record(Call::CloseClient(client.host.clone()));
        if self.fail_client_close.contains(&client.host) {
            return Err(oops());
        }
        Ok(())
    }

    async fn close_pool(&self, pool: &MockPool) -> Result<(), DriverError> {
        self.pause(&pool.host).await;
        self.record(Call::ClosePool(pool.host.clone()));
        if self.fail_pool_close.contains(&pool.host) {
            return Err(oops());
        }
        Ok(())
    }
}
