pub const TONE_LABELS: &[&str] = &["dark", "mid-dark", "mid-light", "light"];

pub const BODY_TYPES_MALE: &[&str] = &["Rectangle", "Triangle", "Inverted Triangle", "Oval"];
pub const BODY_TYPES_FEMALE: &[&str] = &["Hourglass", "Pear", "Apple", "Rectangle"];

/// Side length of the square image the tone classifier consumes.
pub const CLASSIFIER_INPUT_SIZE: u32 = 64;

/// Frames sampled per stabilized estimate.
pub const DEFAULT_FRAME_COUNT: usize = 5;

pub const DEFAULT_CONFIDENCE: f64 = 0.5;

pub const FACE_MODEL_NAME: &str = "blazeface_short_range.onnx";

/// Multipart boundary used by the live video feed.
pub const STREAM_BOUNDARY: &str = "frame";

pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Sentinel emitted for any label that could not be determined.
pub const UNKNOWN_LABEL: &str = "unknown";
