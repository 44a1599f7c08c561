pub mod tone_classifier;
pub mod tone_model;
