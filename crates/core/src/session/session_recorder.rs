use std::sync::Mutex;

use serde_json::{Map, Value};

use crate::session::domain::session_record::{inactive, SessionRecord};
use crate::session::domain::session_store::{SessionStore, SessionStoreError};

/// Single writer for the persisted session object.
///
/// Each record is merged key by key onto what is already stored, so keys
/// written by someone else survive and newer values win.
pub struct SessionRecorder {
    store: Box<dyn SessionStore>,
    lock: Mutex<()>,
}

impl SessionRecorder {
    pub fn new(store: Box<dyn SessionStore>) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
        }
    }

    /// Merges `record` into the store and returns the merged object.
    pub fn record(&self, record: &SessionRecord) -> Result<Map<String, Value>, SessionStoreError> {
        let _guard = self.lock.lock().map_err(|_| SessionStoreError::Poisoned)?;
        let mut merged = self.store.load()?.unwrap_or_default();
        merged.extend(record.to_map()?);
        self.store.save(&merged)?;
        log::info!(
            "Session saved: event={} tone={} body={}",
            record.event,
            record.skin_tone,
            record.body_type
        );
        Ok(merged)
    }

    /// The stored object, or `{"status": "inactive"}` when there is none.
    pub fn query(&self) -> Result<Map<String, Value>, SessionStoreError> {
        let _guard = self.lock.lock().map_err(|_| SessionStoreError::Poisoned)?;
        Ok(self.store.load()?.unwrap_or_else(inactive))
    }
}
