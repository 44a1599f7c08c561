use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::session::domain::session_store::{SessionStore, SessionStoreError};

/// Keeps the session object as pretty-printed JSON in one file.
///
/// Writes go to a sibling `.tmp` file that is renamed over the target.
pub struct JsonFileSessionStore {
    path: PathBuf,
}

impl JsonFileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "session.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SessionStore for JsonFileSessionStore {
    fn load(&self) -> Result<Option<Map<String, Value>>, SessionStoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SessionStoreError::Read {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };
        if text.trim().is_empty() {
            return Ok(None);
        }

        let value: Value =
            serde_json::from_str(&text).map_err(|e| SessionStoreError::Corrupt {
                path: self.path.clone(),
                source: e,
            })?;
        match value {
            Value::Object(map) => Ok(Some(map)),
            _ => Err(SessionStoreError::NotAnObject(self.path.clone())),
        }
    }

    fn save(&self, object: &Map<String, Value>) -> Result<(), SessionStoreError> {
        let json = serde_json::to_string_pretty(object).map_err(SessionStoreError::Serialize)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| SessionStoreError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let temp_path = self.temp_path();
        let write_err = |e| SessionStoreError::Write {
            path: temp_path.clone(),
            source: e,
        };
        let mut file = fs::File::create(&temp_path).map_err(write_err)?;
        file.write_all(json.as_bytes()).map_err(write_err)?;
        file.sync_all().map_err(write_err)?;
        drop(file);

        fs::rename(&temp_path, &self.path).map_err(|e| SessionStoreError::Write {
            path: self.path.clone(),
            source: e,
        })
    }
}
