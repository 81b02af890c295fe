use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub orders_created_total: IntCounter,
    pub acceptances_total: IntCounterVec,
    pub accept_latency_seconds: HistogramVec,
    pub orders_expired_total: IntCounter,
    pub open_dispatch_entries: IntGauge,
    pub settlements_total: IntCounterVec,
    pub fanout_events_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let orders_created_total =
            IntCounter::new("orders_created_total", "Orders accepted into dispatch")
                .expect("valid orders_created_total metric");

        let acceptances_total = IntCounterVec::new(
            Opts::new("acceptances_total", "Courier acceptance attempts by outcome"),
            &["outcome"],
        )
        .expect("valid acceptances_total metric");

        let accept_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "accept_latency_seconds",
                "Latency of acceptance processing in seconds",
            ),
            &["outcome"],
        )
        .expect("valid accept_latency_seconds metric");

        let orders_expired_total = IntCounter::new(
            "orders_expired_total",
            "Orders moved to no_couriers_available by the expiry sweep",
        )
        .expect("valid orders_expired_total metric");

        let open_dispatch_entries = IntGauge::new(
            "open_dispatch_entries",
            "Dispatch queue entries still open for courier response",
        )
        .expect("valid open_dispatch_entries metric");

        let settlements_total = IntCounterVec::new(
            Opts::new("settlements_total", "Earnings settlements by outcome"),
            &["outcome"],
        )
        .expect("valid settlements_total metric");

        let fanout_events_total = IntCounterVec::new(
            Opts::new("fanout_events_total", "Events published to the fanout by type"),
            &["type"],
        )
        .expect("valid fanout_events_total metric");

        registry
            .register(Box::new(orders_created_total.clone()))
            .expect("register orders_created_total");
        registry
            .register(Box::new(acceptances_total.clone()))
            .expect("register acceptances_total");
        registry
            .register(Box::new(accept_latency_seconds.clone()))
            .expect("register accept_latency_seconds");
        registry
            .register(Box::new(orders_expired_total.clone()))
            .expect("register orders_expired_total");
        registry
            .register(Box::new(open_dispatch_entries.clone()))
            .expect("register open_dispatch_entries");
        registry
            .register(Box::new(settlements_total.clone()))
            .expect("register settlements_total");
        registry
            .register(Box::new(fanout_events_total.clone()))
            .expect("register fanout_events_total");

        Self {
            registry,
            orders_created_total,
            acceptances_total,
            accept_latency_seconds,
            orders_expired_total,
            open_dispatch_entries,
            settlements_total,
            fanout_events_total,
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
