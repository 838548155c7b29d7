use crate::deferred::{DeferredEvent, DeferredEventStore};
use crate::metrics::ReporterMetrics;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use walletmetrics_analytics::{AnalyticsTransport, TrackedEvent};
use walletmetrics_preferences::{PreferenceStore, METRICS_OPT_IN};

/// What happened to a reported event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Disposition {
    /// Handed to the analytics transport
    Sent,
    /// Parked in the deferred store, waiting for consent
    Deferred,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaySummary {
    /// Deferred events delivered, and removed from the store
    pub sent: usize,
    /// Deferred events which could not be delivered, and stay in the store
    pub remaining: usize,
}

/// Forwards tracked events to the analytics transport, if the user opted in to metrics.
///
/// Until then, events are parked in the deferred store. Every event takes exactly one of the two
/// paths, it is neither dropped nor sent twice.
#[derive(Clone)]
pub struct ConsentGatedReporter {
    preferences: Arc<dyn PreferenceStore>,
    transport: Arc<dyn AnalyticsTransport>,
    deferred: Arc<dyn DeferredEventStore>,
    metrics: ReporterMetrics,
    replaying: Arc<Mutex<()>>,
}

impl ConsentGatedReporter {
    pub fn new(
        preferences: Arc<dyn PreferenceStore>,
        transport: Arc<dyn AnalyticsTransport>,
        deferred: Arc<dyn DeferredEventStore>,
        metrics: ReporterMetrics,
    ) -> Self {
        Self {
            preferences,
            transport,
            deferred,
            metrics,
            replaying: Default::default(),
        }
    }

    /// Read the consent flag, `None` if the user was never asked.
    pub async fn consent(&self) -> anyhow::Result<Option<bool>> {
        self.preferences.get(METRICS_OPT_IN).await
    }

    async fn opted_in(&self) -> bool {
        match self.consent().await {
            Ok(consent) => consent.unwrap_or_default(),
            Err(err) => {
                log::warn!("Failed to read metrics consent, treating as not granted: {err}");
                false
            }
        }
    }

    pub async fn report(&self, event: TrackedEvent) -> Disposition {
        if self.opted_in().await {
            log::debug!("Sending event: {}", event.name());
            match self.transport.send(&event).await {
                Ok(()) => self.metrics.sent.inc(),
                Err(err) => {
                    log::warn!("Failed to send event '{}': {err}", event.name());
                    self.metrics.send_failed();
                }
            }
            Disposition::Sent
        } else {
            log::debug!("No metrics consent, deferring event: {}", event.name());
            self.defer(event).await;
            Disposition::Deferred
        }
    }

    /// Report an event in the background.
    ///
    /// Dropping the returned handle does not cancel the report.
    pub fn report_detached(&self, event: TrackedEvent) -> JoinHandle<Disposition> {
        let reporter = self.clone();
        tokio::spawn(async move { reporter.report(event).await })
    }

    async fn defer(&self, event: TrackedEvent) {
        let name = event.name().to_string();
        match self.deferred.enqueue(event).await {
            Ok(()) => self.metrics.deferred.inc(),
            Err(err) => {
                log::error!("Failed to defer event '{name}': {err}");
                self.metrics.defer_failed();
            }
        }
    }

    /// Forward all deferred events, if the user opted in to metrics.
    ///
    /// An event is removed from the deferred store only after the transport delivered it. Events
    /// which fail stay deferred, and so does everything not yet delivered when the replay gets
    /// interrupted.
    pub async fn replay(&self) -> anyhow::Result<ReplaySummary> {
        let mut summary = ReplaySummary::default();

        if !self.opted_in().await {
            log::debug!("No metrics consent, not replaying deferred events");
            return Ok(summary);
        }

        // a second replay would see the same pending events
        let _replaying = self.replaying.lock().await;

        let events = self.deferred.pending().await?;
        if events.is_empty() {
            return Ok(summary);
        }

        log::info!("Replaying {} deferred events", events.len());

        for DeferredEvent { id, event } in events {
            match self.deliver(&event).await {
                Ok(()) => {
                    self.deferred.acknowledge(id).await?;
                    self.metrics.replayed.inc();
                    summary.sent += 1;
                }
                Err(err) => {
                    log::warn!("Failed to replay event '{}', keeping it deferred: {err}", event.name());
                    self.metrics.send_failed();
                    summary.remaining += 1;
                }
            }
        }

        Ok(summary)
    }

    async fn deliver(&self, event: &TrackedEvent) -> anyhow::Result<()> {
        self.transport.send(event).await?;
        self.transport.flush().await
    }

    /// Record the user's consent and forward everything collected so far.
    pub async fn grant_consent(&self) -> anyhow::Result<ReplaySummary> {
        log::info!("Metrics consent granted");
        self.preferences.set(METRICS_OPT_IN, true).await?;
        self.replay().await
    }

    pub async fn revoke_consent(&self) -> anyhow::Result<()> {
        log::info!("Metrics consent revoked");
        self.preferences.set(METRICS_OPT_IN, false).await
    }

    /// Deferred events, oldest first.
    pub async fn deferred_events(&self) -> anyhow::Result<Vec<TrackedEvent>> {
        self.deferred.list().await
    }
}
