use prometheus::{
    register_int_counter_vec_with_registry, register_int_counter_with_registry, IntCounter, IntCounterVec, Registry,
};

#[derive(Clone)]
pub struct ReporterMetrics {
    pub(crate) sent: IntCounter,
    pub(crate) deferred: IntCounter,
    pub(crate) replayed: IntCounter,
    pub(crate) failed: IntCounterVec,
}

impl ReporterMetrics {
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        Ok(Self {
            sent: register_int_counter_with_registry!(
                "walletmetrics_events_sent_total",
                "Events forwarded to the analytics transport",
                registry
            )?,
            deferred: register_int_counter_with_registry!(
                "walletmetrics_events_deferred_total",
                "Events parked in the deferred store, waiting for consent",
                registry
            )?,
            replayed: register_int_counter_with_registry!(
                "walletmetrics_events_replayed_total",
                "Deferred events forwarded after consent was granted",
                registry
            )?,
            failed: register_int_counter_vec_with_registry!(
                "walletmetrics_events_failed_total",
                "Events which failed to be sent or deferred",
                &["stage"],
                registry
            )?,
        })
    }

    pub(crate) fn send_failed(&self) {
        self.failed.with_label_values(&["send"]).inc();
    }

    pub(crate) fn defer_failed(&self) {
        self.failed.with_label_values(&["defer"]).inc();
    }
}
