use std::path::PathBuf;

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionStoreError {
    #[error("cannot read session file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot write session file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("session file {path} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("session file {0} does not hold a JSON object")]
    NotAnObject(PathBuf),
    #[error("cannot serialize session record: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("session store lock poisoned")]
    Poisoned,
}

/// Durable home of the single session object.
pub trait SessionStore: Send + Sync {
    /// The persisted object, or `None` if nothing was ever saved.
    fn load(&self) -> Result<Option<Map<String, Value>>, SessionStoreError>;

    /// Replaces the persisted object. Readers see the old or new object,
    /// never a mix.
    fn save(&self, object: &Map<String, Value>) -> Result<(), SessionStoreError>;
}
