use std::fmt;

use pgmount_core::ConfigError;
use pgmount_storage::DriverError;
use thiserror::Error;

use crate::host::HostError;

/// Reasons a registration is refused. Nothing stays open or attached.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("You cannot mix different types of decorate options")]
    MixedDecoration,

    #[error("decoration `{0}` is requested by more than one connection")]
    DuplicateDecoration(String),

    #[error("connection {index} ({identity}) failed: {source}")]
    Connection {
        index: usize,
        identity: String,
        #[source]
        source: DriverError,
    },

    #[error(transparent)]
    Host(#[from] HostError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Client,
    Pool,
}

impl ResourceKind {
    pub fn tag(self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Pool => "pool",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A resource that failed to close. Only ever logged.
#[derive(Debug, Error)]
#[error("failed to close {kind} for {identity}: {source}")]
pub struct CloseError {
    pub kind: ResourceKind,
    pub identity: String,
    #[source]
    pub source: DriverError,
}
