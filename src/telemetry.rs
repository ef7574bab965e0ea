// rams-generation-client/src/telemetry.rs

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ServiceConfig;

/// Installs the global JSON subscriber. Call once from the host before
/// constructing a controller; `RUST_LOG` overrides the configured level.
pub fn init(config: &ServiceConfig) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!(
        service = %config.name,
        version = env!("CARGO_PKG_VERSION"),
        "Telemetry initialised"
    );
}
