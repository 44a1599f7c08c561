use chrono::{DateTime, Local};
use serde::ser::Error as _;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::session::domain::session_store::SessionStoreError;
use crate::shared::labels::EstimatedLabel;

pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_INACTIVE: &str = "inactive";

/// Local time with microseconds, e.g. `2024-05-01T14:03:22.120394`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Outcome of one analysis request as it is persisted.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionRecord {
    pub status: String,
    pub event: String,
    pub gender: String,
    pub skin_tone: String,
    pub body_type: String,
    pub timestamp: String,
}

impl SessionRecord {
    pub fn active(
        event: &str,
        gender: &str,
        skin_tone: &EstimatedLabel,
        body_type: &str,
        at: DateTime<Local>,
    ) -> Self {
        Self {
            status: STATUS_ACTIVE.to_string(),
            event: event.to_string(),
            gender: gender.to_string(),
            skin_tone: skin_tone.to_string(),
            body_type: body_type.to_string(),
            timestamp: at.format(TIMESTAMP_FORMAT).to_string(),
        }
    }

    /// The record as a JSON object, ready to merge.
    pub fn to_map(&self) -> Result<Map<String, Value>, SessionStoreError> {
        match serde_json::to_value(self).map_err(SessionStoreError::Serialize)? {
            Value::Object(map) => Ok(map),
            _ => Err(SessionStoreError::Serialize(serde_json::Error::custom(
                "session record did not serialize to an object",
            ))),
        }
    }
}

/// Answer to a query when nothing has been recorded.
pub fn inactive() -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("status".into(), Value::from(STATUS_INACTIVE));
    map
}
