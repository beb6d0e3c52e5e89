mod loader;
mod types;

pub use types::{ApiConfig, Config, ProbeConfig, SessionDefaults, TelemetryConfig};
