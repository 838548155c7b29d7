use crate::TrackingEvent;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PropertyError {
    #[error("property value must be a finite number, got {0}")]
    NotFinite(f64),
}

/// The value of an event property: either text or a finite number.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Property {
    Text(String),
    Number(f64),
}

impl Property {
    /// Interpret a raw value, as typed on the command line.
    ///
    /// Anything which parses as a finite number becomes a number, everything else stays text.
    pub fn parse(value: &str) -> Self {
        match value.parse::<f64>() {
            Ok(n) if n.is_finite() => Self::Number(n),
            _ => Self::Text(value.to_string()),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Self::Text(text) => Value::String(text.clone()),
            Self::Number(n) => Number::from_f64(*n).map(Value::Number).unwrap_or(Value::Null),
        }
    }
}

impl<'de> Deserialize<'de> for Property {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(f64),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Text(text) => Ok(Self::Text(text)),
            Raw::Number(n) => Property::try_from(n).map_err(serde::de::Error::custom),
        }
    }
}

impl From<String> for Property {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for Property {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<i32> for Property {
    fn from(value: i32) -> Self {
        Self::Number(value.into())
    }
}

impl From<u32> for Property {
    fn from(value: u32) -> Self {
        Self::Number(value.into())
    }
}

impl TryFrom<f64> for Property {
    type Error = PropertyError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if value.is_finite() {
            Ok(Self::Number(value))
        } else {
            Err(PropertyError::NotFinite(value))
        }
    }
}

/// A user action worth tracking.
///
/// Events are built once, at the place the action happens, and are not modified afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackedEvent {
    name: String,
    #[serde(default)]
    properties: BTreeMap<String, Property>,
}

impl TrackedEvent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Default::default(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Property>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn properties(&self) -> &BTreeMap<String, Property> {
        &self.properties
    }
}

impl TrackingEvent for TrackedEvent {
    fn name(&self) -> &str {
        TrackedEvent::name(self)
    }

    fn payload(&self) -> Value {
        Value::Object(
            self.properties
                .iter()
                .map(|(k, v)| (k.clone(), v.to_value()))
                .collect::<Map<_, _>>(),
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_event() {
        let event: TrackedEvent = serde_json::from_value(json!({
            "name": "Welcome Screen Engagement",
            "properties": {
                "message_title": "Welcome to MetaMask",
                "tab": 2
            }
        }))
        .unwrap();

        assert_eq!(
            event,
            TrackedEvent::new("Welcome Screen Engagement")
                .with_property("message_title", "Welcome to MetaMask")
                .with_property("tab", 2)
        );
    }

    #[test]
    fn decode_without_properties() {
        let event: TrackedEvent = serde_json::from_value(json!({"name": "Onboarding Started"})).unwrap();
        assert_eq!(event.name(), "Onboarding Started");
        assert!(event.properties().is_empty());
    }

    #[test]
    fn reject_other_property_types() {
        let result = serde_json::from_value::<TrackedEvent>(json!({
            "name": "foo",
            "properties": { "flag": true }
        }));
        assert!(result.is_err());

        let result = serde_json::from_value::<TrackedEvent>(json!({
            "name": "foo",
            "properties": { "nested": { "a": 1 } }
        }));
        assert!(result.is_err());
    }

    #[test]
    fn payload() {
        let event = TrackedEvent::new("tab_changed")
            .with_property("message_title", "Title1")
            .with_property("index", 1);

        assert_eq!(
            TrackingEvent::payload(&event),
            json!({
                "message_title": "Title1",
                "index": 1.0,
            })
        );
    }

    #[test]
    fn parse_property() {
        assert_eq!(Property::parse("42"), Property::Number(42.0));
        assert_eq!(Property::parse("1.5"), Property::Number(1.5));
        assert_eq!(Property::parse("Title1"), Property::Text("Title1".into()));
        assert_eq!(Property::parse("NaN"), Property::Text("NaN".into()));
        assert_eq!(Property::parse("inf"), Property::Text("inf".into()));
    }

    #[test]
    fn reject_non_finite() {
        assert!(Property::try_from(f64::NAN).is_err());
        assert_eq!(Property::try_from(f64::INFINITY), Err(PropertyError::NotFinite(f64::INFINITY)));
    }
}
