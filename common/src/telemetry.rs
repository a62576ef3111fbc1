// Telemetry module for structured logging and metrics

use anyhow::Result;
use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::{LogFormat, ObservabilityConfig};

/// Initialize structured logging.
///
/// `RUST_LOG` takes precedence over the configured level. JSON output carries
/// span context so request spans from the HTTP layer show up on every line.
pub fn init_logging(config: &ObservabilityConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| anyhow::anyhow!("Failed to create env filter: {}", e))?;

    let layer = match config.log_format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_filter(env_filter)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_target(false)
            .with_filter(env_filter)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {}", e))?;

    tracing::info!(
        log_level = %config.log_level,
        log_format = ?config.log_format,
        "Structured logging initialized"
    );

    Ok(())
}

/// Install the Prometheus recorder and describe the service metrics.
///
/// The returned handle renders the exposition text for the `/metrics` route.
pub fn init_metrics() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;

    describe_counter!(
        "db_connect_attempts_total",
        "Database connection attempts made during startup, by outcome"
    );
    describe_counter!(
        "entity_mutations_total",
        "Rows created, updated or deleted through the API"
    );

    tracing::info!("Prometheus metrics recorder installed");
    Ok(handle)
}

/// Count one connection attempt
#[inline]
pub fn record_db_connect_attempt(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!("db_connect_attempts_total", "outcome" => outcome).increment(1);
}

/// Count one successful mutation of `entity` (`"todo"`, `"user"`)
#[inline]
pub fn record_entity_mutation(entity: &'static str, operation: &'static str) {
    counter!("entity_mutations_total", "entity" => entity, "operation" => operation).increment(1);
}
