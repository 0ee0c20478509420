//! Tracing pipeline for a teaforge process.
//!
//! Call [`init_tracing`] once at startup, before the first cycle, and keep
//! the returned guard alive until the process exits.
//!
//! ```rust,no_run
//! use teaforge_runtime::{LoggingConfig, telemetry};
//!
//! let _guard = telemetry::init_tracing("teaforge", &LoggingConfig::default());
//! ```
//!
//! `RUST_LOG`, when set, takes precedence over the configured filter.

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{Resource, trace::SdkTracerProvider};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LogFormat, LoggingConfig};

/// Install the global subscriber: an `EnvFilter`, a compact or JSON console
/// formatter and, when `config.otlp_endpoint` is set, an OTLP/HTTP span
/// exporter.
///
/// A second call leaves the first subscriber in place.
pub fn init_tracing(service_name: &str, config: &LoggingConfig) -> TracerProviderGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(&config.filter).unwrap_or_else(|e| {
            eprintln!("[teaforge] invalid log filter {:?}: {e}", config.filter);
            EnvFilter::new("info")
        })
    });

    let provider = config
        .otlp_endpoint
        .as_deref()
        .and_then(|endpoint| build_provider(service_name, endpoint));
    let otel = provider
        .as_ref()
        .map(|p| tracing_opentelemetry::layer().with_tracer(p.tracer("teaforge")));

    let json = config.format == LogFormat::Json;
    let json_layer = json.then(|| tracing_subscriber::fmt::layer().json());
    let compact_layer = (!json).then(|| tracing_subscriber::fmt::layer().compact());

    if let Err(e) = tracing_subscriber::registry()
        .with(filter)
        .with(otel)
        .with(json_layer)
        .with(compact_layer)
        .try_init()
    {
        eprintln!("[teaforge] tracing already initialised: {e}");
    }

    TracerProviderGuard(provider)
}

/// Shuts the span exporter down on drop, flushing pending spans.
pub struct TracerProviderGuard(Option<SdkTracerProvider>);

impl TracerProviderGuard {
    /// `true` when spans are exported.
    pub fn is_exporting(&self) -> bool {
        self.0.is_some()
    }
}

impl Drop for TracerProviderGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.0.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("[teaforge] OpenTelemetry provider shutdown error: {e}");
            }
        }
    }
}

fn build_provider(service_name: &str, endpoint: &str) -> Option<SdkTracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| eprintln!("[teaforge] OTLP exporter init failed: {e}"))
        .ok()?;

    let resource = Resource::builder()
        .with_service_name(service_name.to_string())
        .build();

    Some(
        SdkTracerProvider::builder()
            .with_resource(resource)
            // The cycle loop is synchronous; a batch exporter would need a
            // running async runtime.
            .with_simple_exporter(exporter)
            .build(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_endpoint_means_no_exporter() {
        let guard = init_tracing("teaforge-test", &LoggingConfig::default());
        assert!(!guard.is_exporting());
    }

    #[test]
    fn repeated_init_does_not_panic() {
        let config = LoggingConfig {
            format: LogFormat::Json,
            ..LoggingConfig::default()
        };
        let _first = init_tracing("teaforge-test", &config);
        let _second = init_tracing("teaforge-test", &config);
    }

    #[test]
    fn empty_guard_drops_cleanly() {
        drop(TracerProviderGuard(None));
    }
}
