use prometheus::{
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub booking_transitions_total: IntCounterVec,
    pub otp_issued_total: IntCounter,
    pub route_resolutions_total: IntCounterVec,
    pub route_resolve_seconds: HistogramVec,
    pub stale_location_drops_total: IntCounter,
    pub active_tracking_sessions: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let booking_transitions_total = IntCounterVec::new(
            Opts::new(
                "booking_transitions_total",
                "Booking status transitions by target state",
            ),
            &["to"],
        )
        .expect("valid booking_transitions_total metric");

        let otp_issued_total = IntCounter::new("otp_issued_total", "Arrival codes issued")
            .expect("valid otp_issued_total metric");

        let route_resolutions_total = IntCounterVec::new(
            Opts::new(
                "route_resolutions_total",
                "Route computations by outcome (road vs fallback)",
            ),
            &["outcome"],
        )
        .expect("valid route_resolutions_total metric");

        let route_resolve_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "route_resolve_seconds",
                "Latency of route resolution in seconds",
            ),
            &["outcome"],
        )
        .expect("valid route_resolve_seconds metric");

        let stale_location_drops_total = IntCounter::new(
            "stale_location_drops_total",
            "Out-of-order live location writes dropped",
        )
        .expect("valid stale_location_drops_total metric");

        let active_tracking_sessions = IntGauge::new(
            "active_tracking_sessions",
            "Currently open live tracking sessions",
        )
        .expect("valid active_tracking_sessions metric");

        registry
            .register(Box::new(booking_transitions_total.clone()))
            .expect("register booking_transitions_total");
        registry
            .register(Box::new(otp_issued_total.clone()))
            .expect("register otp_issued_total");
        registry
            .register(Box::new(route_resolutions_total.clone()))
            .expect("register route_resolutions_total");
        registry
            .register(Box::new(route_resolve_seconds.clone()))
            .expect("register route_resolve_seconds");
        registry
            .register(Box::new(stale_location_drops_total.clone()))
            .expect("register stale_location_drops_total");
        registry
            .register(Box::new(active_tracking_sessions.clone()))
            .expect("register active_tracking_sessions");

        Self {
            registry,
            booking_transitions_total,
            otp_issued_total,
            route_resolutions_total,
            route_resolve_seconds,
            stale_location_drops_total,
            active_tracking_sessions,
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
