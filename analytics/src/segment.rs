use crate::TrackingEvent;
use segment::{
    message::{BatchMessage, Track, User},
    AutoBatcher, Batcher,
};
use serde_json::json;
use tokio::sync::Mutex;
use uuid::Uuid;

fn convert_user(user: &super::User, anonymous_id: &Uuid) -> User {
    match user {
        super::User::Unknown => User::AnonymousId {
            anonymous_id: anonymous_id.to_string(),
        },
        super::User::Anonymous(id) => User::AnonymousId {
            anonymous_id: id.to_string(),
        },
        super::User::Known(id) => User::UserId {
            user_id: id.to_string(),
        },
    }
}

fn to_message(event: &impl TrackingEvent, anonymous_id: &Uuid) -> BatchMessage {
    BatchMessage::Track(Track {
        event: event.name().to_string(),
        user: convert_user(event.user(), anonymous_id),
        properties: event.payload(),
        ..Default::default()
    })
}

#[derive(Debug)]
pub struct SegmentTracker {
    anonymous_id: Uuid,
    batcher: Mutex<AutoBatcher>,
}

impl SegmentTracker {
    pub fn new(write_key: impl Into<String>, anonymous_id: Uuid) -> Self {
        let context = Some(json!({
            "library": {
                "name": "https://github.com/meilisearch/segment",
            },
            "app": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            }
        }));

        let batcher = Mutex::new(AutoBatcher::new(
            segment::HttpClient::default(),
            Batcher::new(context),
            write_key.into(),
        ));

        Self { anonymous_id, batcher }
    }

    pub async fn push(&self, event: &impl TrackingEvent) -> anyhow::Result<()> {
        let message = to_message(event, &self.anonymous_id);
        self.batcher.lock().await.push(message).await?;
        Ok(())
    }

    /// Send the current batch. A failed batch is discarded, it is not retried.
    pub async fn flush(&self) -> anyhow::Result<()> {
        self.batcher.lock().await.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::TrackedEvent;

    #[test]
    fn track_message() {
        let anonymous_id = Uuid::new_v4();
        let event = TrackedEvent::new("Welcome Screen Engagement").with_property("message_title", "Title1");

        match to_message(&event, &anonymous_id) {
            BatchMessage::Track(track) => {
                assert_eq!(track.event, "Welcome Screen Engagement");
                assert_eq!(track.properties, json!({"message_title": "Title1"}));
                match track.user {
                    User::AnonymousId { anonymous_id: id } => assert_eq!(id, anonymous_id.to_string()),
                    _ => panic!("expected an anonymous user"),
                }
            }
            _ => panic!("expected a track message"),
        }
    }
}
