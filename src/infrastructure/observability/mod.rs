//! Log, trace and metric wiring for the relay.
//!
//! Logs go to stdout. Spans are exported over OTLP only when
//! `OTEL_EXPORTER_OTLP_ENDPOINT` is set. Relay counters are scraped from
//! the Prometheus listener on `METRICS_PORT`.

use anyhow::Context;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{runtime, trace as sdktrace, Resource};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::config::Config;
use crate::shared::metrics::{
    CONNECTIONS_ACTIVE, CONNECTIONS_REJECTED, EVENT_ERRORS, MESSAGES_PERSISTED,
};

const DEFAULT_LOG_FILTER: &str = "relaydesk=debug,tower_http=debug";

/// Flushes pending spans when the server exits.
pub struct ObservabilityGuard;

impl Drop for ObservabilityGuard {
    fn drop(&mut self) {
        global::shutdown_tracer_provider();
    }
}

pub fn init(config: &Config) -> anyhow::Result<ObservabilityGuard> {
    init_tracing(config)?;
    init_metrics(config)?;
    Ok(ObservabilityGuard)
}

fn init_tracing(config: &Config) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_thread_ids(true)
        .with_target(true);

    let otel_layer = match &config.otel_exporter_endpoint {
        Some(endpoint) => Some(
            tracing_opentelemetry::layer().with_tracer(otlp_tracer(endpoint, &config.service_name)?),
        ),
        None => None,
    };

    Registry::default()
        .with(env_filter)
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()
        .context("Failed to install the tracing subscriber")?;

    Ok(())
}

fn otlp_tracer(endpoint: &str, service_name: &str) -> anyhow::Result<sdktrace::Tracer> {
    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(endpoint);

    opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(exporter)
        .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
            KeyValue::new("service.name", service_name.to_string()),
        ])))
        .install_batch(runtime::Tokio)
        .with_context(|| format!("Failed to start OTLP exporter for {}", endpoint))
}

fn init_metrics(config: &Config) -> anyhow::Result<()> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], config.metrics_port))
        .install()
        .context("Failed to install Prometheus exporter")?;

    describe_relay_metrics();

    tracing::info!("Relay metrics served on port {}", config.metrics_port);
    Ok(())
}

fn describe_relay_metrics() {
    metrics::describe_gauge!(
        CONNECTIONS_ACTIVE,
        "Admitted WebSocket connections currently open"
    );
    metrics::describe_counter!(
        CONNECTIONS_REJECTED,
        "Connections refused by the tenant gate, by error code"
    );
    metrics::describe_counter!(MESSAGES_PERSISTED, "Messages persisted, by sender type");
    metrics::describe_counter!(
        EVENT_ERRORS,
        "Client events answered with an error, by error code"
    );
}
