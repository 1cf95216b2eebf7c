use std::fmt;

use tracing_subscriber::{EnvFilter, fmt as subscriber};

/// Initialise the global tracing subscriber.
///
/// Respects `RUST_LOG` env var; defaults to `info` level.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    subscriber().with_env_filter(filter).with_target(true).init();
}

/// A structured log entry: ordered tags, a message and an optional error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub tags: Vec<String>,
    pub message: String,
    pub error: Option<String>,
}

impl LogEvent {
    pub fn new<I, T>(tags: I, message: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            tags: tags.into_iter().map(Into::into).collect(),
            message: message.into(),
            error: None,
        }
    }

    /// Informational event tagged `[scope, "info"]`.
    pub fn info(scope: &str, message: impl Into<String>) -> Self {
        Self::new([scope, "info"], message)
    }

    /// Error event; `tags` are followed by `"error"`.
    pub fn error<E>(tags: &[&str], error: &E) -> Self
    where
        E: fmt::Display + ?Sized,
    {
        let mut event = Self::new(tags.iter().copied().chain(["error"]), error.to_string());
        event.error = Some(error.to_string());
        event
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Receiver of plugin log events.
pub trait LogSink: Send + Sync {
    fn log(&self, event: LogEvent);
}

/// Forwards events to `tracing`, at `error`/`warn` when tagged so.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, event: LogEvent) {
        let tags = event.tags.join(",");
        if event.has_tag("error") {
            tracing::error!(
                tags = %tags,
                error = event.error.as_deref().unwrap_or_default(),
                "{}",
                event.message
            );
        } else if event.has_tag("warn") {
            tracing::warn!(tags = %tags, "{}", event.message);
        } else {
            tracing::info!(tags = %tags, "{}", event.message);
        }
    }
}
