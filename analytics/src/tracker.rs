use crate::{segment::SegmentTracker, AnalyticsTransport, TrackedEvent, TrackingEvent};
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[derive(Clone, Debug, clap::Args)]
#[command(next_help_heading = "segment.io configuration")]
pub struct AnalyticsConfig {
    /// The segment.io write key. If not present, tracking will be disabled.
    #[arg(long = "segment-write-key", env = "SEGMENT_WRITE_KEY")]
    pub write_key: Option<String>,

    /// A period on how often non-full batches will be flushed.
    #[arg(
        long = "segment-flusher-period",
        env = "SEGMENT_FLUSHER_PERIOD",
        default_value = "15s"
    )]
    pub flusher_period: humantime::Duration,

    /// The anonymous id events are reported for. A random one is used if not present.
    #[arg(long = "analytics-anonymous-id", env = "ANALYTICS_ANONYMOUS_ID")]
    pub anonymous_id: Option<Uuid>,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            write_key: None,
            flusher_period: Duration::from_secs(15).into(),
            anonymous_id: None,
        }
    }
}

pub type FlusherFut = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// Sends events to segment.io, or discards them when tracking is disabled.
pub struct Tracker {
    segment: Option<SegmentTracker>,
}

impl Tracker {
    /// Create a new tracker, and the flusher which must be run alongside it.
    ///
    /// The flusher ends once the tracker is dropped.
    pub fn new(config: AnalyticsConfig) -> (Arc<Self>, Option<FlusherFut>) {
        match config.write_key {
            Some(write_key) => {
                let anonymous_id = config.anonymous_id.unwrap_or_else(Uuid::new_v4);
                let segment = SegmentTracker::new(write_key, anonymous_id);
                let tracker = Arc::new(Self { segment: Some(segment) });

                let period: Duration = config.flusher_period.into();

                let flusher: FlusherFut = {
                    let tracker = Arc::downgrade(&tracker);
                    Box::pin(async move {
                        log::info!("Running analytics flusher: {period:?}");

                        let mut interval = tokio::time::interval(period);
                        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                        loop {
                            interval.tick().await;
                            let Some(tracker) = tracker.upgrade() else {
                                break;
                            };
                            log::debug!("Flushing analytics batcher");
                            if let Err(err) = tracker.flush().await {
                                log::warn!("Failed to flush analytics batch: {err}");
                            }
                        }

                        log::info!("Analytics tracker dropped, stopping flusher");
                        Ok(())
                    })
                };
                (tracker, Some(flusher))
            }
            None => {
                log::info!("No segment.io write key configured, analytics tracking is disabled");
                (Arc::new(Self::disabled()), None)
            }
        }
    }

    /// A tracker which accepts and discards all events.
    pub fn disabled() -> Self {
        Self { segment: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.segment.is_some()
    }

    pub async fn track(&self, event: impl TrackingEvent) -> anyhow::Result<()> {
        match &self.segment {
            Some(segment) => segment.push(&event).await,
            None => {
                log::debug!("Tracking disabled, discarding event: {}", event.name());
                Ok(())
            }
        }
    }

    pub async fn flush(&self) -> anyhow::Result<()> {
        match &self.segment {
            Some(segment) => segment.flush().await,
            None => Ok(()),
        }
    }
}

#[async_trait]
impl AnalyticsTransport for Tracker {
    async fn send(&self, event: &TrackedEvent) -> anyhow::Result<()> {
        self.track(event).await
    }

    async fn flush(&self) -> anyhow::Result<()> {
        Tracker::flush(self).await
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn disabled_without_write_key() {
        let (tracker, flusher) = Tracker::new(AnalyticsConfig::default());
        assert!(!tracker.is_enabled());
        assert!(flusher.is_none());

        tracker.send(&TrackedEvent::new("Onboarding Started")).await.unwrap();
        tracker.flush().await.unwrap();
    }

    #[tokio::test]
    async fn flusher_stops_with_tracker() {
        let (tracker, flusher) = Tracker::new(AnalyticsConfig {
            write_key: Some("test-key".into()),
            flusher_period: Duration::from_millis(10).into(),
            anonymous_id: None,
        });
        assert!(tracker.is_enabled());

        drop(tracker);

        let flusher = flusher.expect("flusher must be present with a write key");
        tokio::time::timeout(Duration::from_secs(5), flusher)
            .await
            .expect("flusher must stop")
            .unwrap();
    }
}
