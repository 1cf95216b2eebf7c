use thiserror::Error;

/// Rejection of malformed plugin options.
///
/// Raised before any connection is attempted; `index` is the position of the
/// offending descriptor in the normalized list.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("plugin options must contain at least one connection descriptor")]
    Empty,

    #[error("descriptor {index}: expected an object")]
    NotAnObject { index: usize },

    #[error("descriptor {index}: {reason}")]
    Invalid { index: usize, reason: String },

    #[error("descriptor {index}: `settings` is required")]
    MissingSettings { index: usize },

    #[error("descriptor {index}: `settings` does not identify a database")]
    EmptySettings { index: usize },

    #[error("descriptor {index}: `decorate` must be `true` or a non-empty string")]
    InvalidDecorate { index: usize },
}

impl ConfigError {
    /// Position of the offending descriptor, if the error concerns one.
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::Empty => None,
            Self::NotAnObject { index }
            | Self::Invalid { index, .. }
            | Self::MissingSettings { index }
            | Self::EmptySettings { index }
            | Self::InvalidDecorate { index } => Some(*index),
        }
    }
}
