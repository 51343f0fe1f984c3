use opentelemetry::{
    global,
    metrics::{Counter, Histogram, MeterProvider},
    KeyValue,
};
use prometheus::Registry;

pub struct Metrics {
    request_counter: Counter<u64>,
    translation_counter: Counter<u64>,
    translation_duration: Histogram<u64>,
    pub registry: Registry,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();
        let exporter = opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .build()?;

        let provider = opentelemetry_sdk::metrics::SdkMeterProvider::builder()
            .with_reader(exporter)
            .build();

        let meter = provider.meter("sign_translator");
        global::set_meter_provider(provider);

        let request_counter = meter
            .u64_counter("requests_total")
            .with_description("Total number of requests")
            .build();

        let translation_counter = meter
            .u64_counter("translations_total")
            .with_description("Translations by outcome")
            .build();

        let translation_duration = meter
            .u64_histogram("translation_duration_ms")
            .with_boundaries(latency_boundaries(50, 30_000))
            .with_description("Duration of translations in milliseconds")
            .build();

        Ok(Metrics {
            request_counter,
            translation_counter,
            translation_duration,
            registry,
        })
    }

    pub fn record_request(&self, route: &str) {
        let attributes = [KeyValue::new("route", route.to_string())];
        self.request_counter.add(1, &attributes);
    }

    pub fn record_translation(&self, outcome: &str, duration_ms: u64) {
        let attributes = [KeyValue::new("outcome", outcome.to_string())];
        self.translation_counter.add(1, &attributes);
        self.translation_duration.record(duration_ms, &attributes);
    }
}

/// Doubling bucket bounds from `start` up to and including `end`.
fn latency_boundaries(start: u64, end: u64) -> Vec<f64> {
    std::iter::successors(Some(start.max(1)), |&b| Some(b * 2))
        .take_while(|&b| b < end)
        .chain(std::iter::once(end))
        .map(|b| b as f64)
        .collect()
}
