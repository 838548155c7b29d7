//! Consent gated reporting of tracked events.
//!
//! Before the user opted in to metrics, events are kept in a [`deferred::DeferredEventStore`].
//! Afterwards, they are forwarded to the analytics transport directly, and whatever was deferred
//! gets replayed.

pub mod deferred;
pub mod onboarding;

mod gate;
mod metrics;

pub use gate::*;
pub use metrics::ReporterMetrics;

use deferred::SqliteDeferredStore;
use prometheus::Registry;
use std::sync::Arc;
use walletmetrics_analytics::{AnalyticsConfig, FlusherFut, Tracker};
use walletmetrics_preferences::{SqlitePreferences, StoreConfig};

/// A reporter, wired up with the segment.io tracker and the SQLite stores.
pub struct Reporting {
    pub reporter: ConsentGatedReporter,
    pub tracker: Arc<Tracker>,
    /// Must be run for batched events to be flushed periodically
    pub flusher: Option<FlusherFut>,
    /// Kept for health checks
    pub preferences: Arc<SqlitePreferences>,
}

impl Reporting {
    pub async fn new(analytics: AnalyticsConfig, store: &StoreConfig, registry: &Registry) -> anyhow::Result<Self> {
        let (tracker, flusher) = Tracker::new(analytics);
        let preferences = Arc::new(SqlitePreferences::new(store).await?);
        let deferred = Arc::new(SqliteDeferredStore::new(store).await?);
        let metrics = ReporterMetrics::register(registry)?;

        let reporter = ConsentGatedReporter::new(preferences.clone(), tracker.clone(), deferred, metrics);

        Ok(Self {
            reporter,
            tracker,
            flusher,
            preferences,
        })
    }
}
