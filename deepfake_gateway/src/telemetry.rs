use opentelemetry::{
    global,
    metrics::{Counter, Histogram, MeterProvider},
    KeyValue,
};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::Registry;
use std::collections::HashSet;

pub struct Metrics {
    request_counter: Counter<u64>,
    prediction_duration: Histogram<u64>,
    sampled_frames: Counter<u64>,
    pub registry: Registry,
    _provider: SdkMeterProvider,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();
        let exporter = opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .build()?;

        let provider = SdkMeterProvider::builder().with_reader(exporter).build();

        let meter = provider.meter("deepfake_gateway");
        global::set_meter_provider(provider.clone());

        let request_counter = meter
            .u64_counter("requests_total")
            .with_description("Total number of prediction requests")
            .build();

        let boundaries = generate_boundaries([10, 100, 1000, 5000, 30000], [10, 100, 1000, 5000]);

        let prediction_duration = meter
            .u64_histogram("prediction_duration_ms")
            .with_boundaries(boundaries)
            .with_description("Duration of prediction operations in milliseconds")
            .build();

        let sampled_frames = meter
            .u64_counter("sampled_frames_total")
            .with_description("Video frames extracted for inference")
            .build();

        Ok(Metrics {
            request_counter,
            prediction_duration,
            sampled_frames,
            registry,
            _provider: provider,
        })
    }

    pub fn record_request(&self, route: &str) {
        let attributes = vec![KeyValue::new("route", route.to_string())];
        self.request_counter.add(1, &attributes);
    }

    pub fn record_prediction_duration(&self, duration_ms: u64, route: &str) {
        let attributes = vec![KeyValue::new("route", route.to_string())];
        self.prediction_duration.record(duration_ms, &attributes);
    }

    pub fn record_sampled_frames(&self, frames: usize) {
        self.sampled_frames.add(frames as u64, &[]);
    }
}

/// Histogram bucket edges: consecutive ranges `parts[i]..=parts[i + 1]`
/// walked with `steps[i]`, deduplicated.
fn generate_boundaries(parts: [u64; 5], steps: [usize; 4]) -> Vec<f64> {
    let mut seen = HashSet::new();
    parts
        .windows(2)
        .zip(steps)
        .flat_map(|(range, step)| (range[0]..=range[1]).step_by(step))
        .filter(|&x| seen.insert(x))
        .map(|x| x as f64)
        .collect()
}
