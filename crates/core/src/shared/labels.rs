use std::fmt;

use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::shared::constants::UNKNOWN_LABEL;

#[derive(Error, Debug, PartialEq)]
pub enum LabelError {
    #[error("label set is empty")]
    Empty,
    #[error("duplicate label '{0}'")]
    Duplicate(String),
    #[error("class index {index} is outside the {len}-label set")]
    UnknownIndex { index: usize, len: usize },
}

/// Ordered, immutable set of class names.
///
/// Fixed when the classifier is loaded; position `i` names output `i` of the
/// model's probability vector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelSet {
    names: Vec<String>,
}

impl LabelSet {
    pub fn new<I, S>(names: I) -> Result<Self, LabelError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(LabelError::Empty);
        }
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                return Err(LabelError::Duplicate(name.clone()));
            }
        }
        Ok(Self { names })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, index: usize) -> Result<&str, LabelError> {
        self.names
            .get(index)
            .map(String::as_str)
            .ok_or(LabelError::UnknownIndex {
                index,
                len: self.names.len(),
            })
    }
}

/// Outcome of a multi-frame estimate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EstimatedLabel {
    Known(String),
    /// No frame could be classified.
    Unknown,
}

impl EstimatedLabel {
    pub fn as_str(&self) -> &str {
        match self {
            EstimatedLabel::Known(name) => name,
            EstimatedLabel::Unknown => UNKNOWN_LABEL,
        }
    }
}

impl fmt::Display for EstimatedLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EstimatedLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::constants::TONE_LABELS;

    #[test]
    fn test_tone_labels_in_order() {
        let labels = LabelSet::new(TONE_LABELS.iter().copied()).unwrap();
        assert_eq!(labels.len(), 4);
        assert_eq!(labels.name(0).unwrap(), "dark");
        assert_eq!(labels.name(3).unwrap(), "light");
    }

    #[test]
    fn test_unknown_index_is_error() {
        let labels = LabelSet::new(["a", "b"]).unwrap();
        assert_eq!(
            labels.name(2),
            Err(LabelError::UnknownIndex { index: 2, len: 2 })
        );
    }

    #[test]
    fn test_empty_set_rejected() {
        let empty: [&str; 0] = [];
        assert_eq!(LabelSet::new(empty), Err(LabelError::Empty));
    }

    #[test]
    fn test_duplicate_rejected() {
        assert_eq!(
            LabelSet::new(["dark", "light", "dark"]),
            Err(LabelError::Duplicate("dark".into()))
        );
    }

    #[test]
    fn test_estimated_label_serializes_as_string() {
        let known = serde_json::to_string(&EstimatedLabel::Known("light".into())).unwrap();
        let unknown = serde_json::to_string(&EstimatedLabel::Unknown).unwrap();
        assert_eq!(known, "\"light\"");
        assert_eq!(unknown, "\"unknown\"");
    }
}
