pub mod config;
pub mod error;
pub mod options;
pub mod telemetry;

pub use config::Settings;
pub use error::ConfigError;
pub use options::{
    ConnectionDescriptor, ConnectionFields, ConnectionSettings, Decorate, NormalizedConfig,
    PluginOptions, SslOptions, SslSetting,
};
pub use telemetry::{LogEvent, LogSink, TracingSink};
