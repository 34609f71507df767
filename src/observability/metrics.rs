use prometheus::{Encoder, Histogram, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub pings_total: IntCounter,
    pub transitions_total: IntCounterVec,
    pub ingest_latency_seconds: Histogram,
    pub revoked_tokens: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let pings_total = IntCounter::new("pings_total", "Total location pings ingested")
            .expect("valid pings_total metric");

        let transitions_total = IntCounterVec::new(
            Opts::new("transitions_total", "Order status transitions by target and outcome"),
            &["target", "outcome"],
        )
        .expect("valid transitions_total metric");

        let ingest_latency_seconds = Histogram::with_opts(prometheus::HistogramOpts::new(
            "ingest_latency_seconds",
            "Latency of ping ingestion in seconds",
        ))
        .expect("valid ingest_latency_seconds metric");

        let revoked_tokens = IntGauge::new(
            "revoked_tokens",
            "Current number of tokens in the revocation set",
        )
        .expect("valid revoked_tokens metric");

        registry
            .register(Box::new(pings_total.clone()))
            .expect("register pings_total");
        registry
            .register(Box::new(transitions_total.clone()))
            .expect("register transitions_total");
        registry
            .register(Box::new(ingest_latency_seconds.clone()))
            .expect("register ingest_latency_seconds");
        registry
            .register(Box::new(revoked_tokens.clone()))
            .expect("register revoked_tokens");

        Self {
            registry,
            pings_total,
            transitions_total,
            ingest_latency_seconds,
            revoked_tokens,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
