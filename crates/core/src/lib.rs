//! Live skin-tone analysis: camera capture, face location, tone
//! classification over several frames, session persistence and an annotated
//! MJPEG preview.

pub mod camera;
pub mod classification;
pub mod detection;
pub mod estimation;
pub mod normalization;
pub mod pipeline;
pub mod session;
pub mod shared;
pub mod streaming;
