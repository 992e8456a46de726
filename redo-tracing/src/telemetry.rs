use redo_types::tracing;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

const DEFAULT_FILTER: &str = "info";

fn env_filter(filter: Option<&str>) -> EnvFilter {
    match filter {
        Some(filter) => EnvFilter::try_new(filter).ok(),
        None => EnvFilter::try_from_default_env().ok(),
    }
    .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

// Init telemetry by setting a global handler
pub fn init_telemetry(app_name: Option<&str>, filter: Option<&str>) {
    let app_name = app_name.unwrap_or("redo");

    let fmt_layer = fmt::layer().with_target(false);
    // `log` records from the connectors are forwarded to `tracing` by the `tracing-log` feature.
    if tracing_subscriber::registry()
        .with(fmt_layer.with_filter(env_filter(filter)))
        .try_init()
        .is_err()
    {
        eprintln!("Telemetry for {app_name} is already initialized");
    }
}

// Init telemetry with a closure without setting a global subscriber
pub fn init_telemetry_closure<T>(filter: Option<&str>, closure: impl FnOnce() -> T) -> T {
    let fmt_layer = fmt::layer().with_target(false);
    let subscriber = tracing_subscriber::registry().with(fmt_layer.with_filter(env_filter(filter)));

    tracing::subscriber::with_default(subscriber, closure)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_returns_value() {
        let value = init_telemetry_closure(Some("debug"), || {
            tracing::debug!("inside scoped subscriber");
            42
        });
        assert_eq!(value, 42);
    }
}
