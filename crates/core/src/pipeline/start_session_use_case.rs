use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::Local;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::camera::domain::frame_source::FrameSource;
use crate::camera::frame_hub::FrameHub;
use crate::camera::fresh_frames::FreshFrames;
use crate::estimation::stabilized_estimator::{EstimationError, StabilizedEstimator};
use crate::session::domain::body_type_picker::{self, UNKNOWN_BODY_TYPE};
use crate::session::domain::session_record::SessionRecord;
use crate::session::domain::session_store::SessionStoreError;
use crate::session::session_recorder::SessionRecorder;
use crate::shared::constants::{DEFAULT_FRAME_COUNT, UNKNOWN_LABEL};

#[derive(Error, Debug)]
pub enum StartSessionError {
    #[error(transparent)]
    Estimation(#[from] EstimationError),
    #[error(transparent)]
    Store(#[from] SessionStoreError),
}

/// Body of a start request. Both fields are optional on the wire.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct StartSessionRequest {
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
}

/// Runs one analysis: body-type guess, stabilized tone estimate, record.
///
/// Frames come from a fresh hub subscription, so a concurrent live stream
/// keeps running. Frames captured before the request are discarded.
pub struct StartSessionUseCase {
    hub: Arc<FrameHub>,
    estimator: StabilizedEstimator,
    recorder: Arc<SessionRecorder>,
    frame_count: usize,
    rng: Mutex<StdRng>,
}

impl StartSessionUseCase {
    pub fn new(
        hub: Arc<FrameHub>,
        estimator: StabilizedEstimator,
        recorder: Arc<SessionRecorder>,
    ) -> Self {
        Self {
            hub,
            estimator,
            recorder,
            frame_count: DEFAULT_FRAME_COUNT,
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    pub fn with_frame_count(mut self, frame_count: usize) -> Self {
        self.frame_count = frame_count.max(1);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn execute(
        &self,
        request: &StartSessionRequest,
    ) -> Result<Map<String, Value>, StartSessionError> {
        let event = request.event.as_deref().unwrap_or(UNKNOWN_LABEL);
        let gender = request.gender.as_deref().unwrap_or(UNKNOWN_LABEL);
        log::info!("Starting session: event={event} gender={gender}");

        let requested_at = Instant::now();
        let mut subscription = FreshFrames::new(self.hub.subscribe(), requested_at);
        let body_type = match subscription.read_frame() {
            Ok(_) => self.pick_body_type(gender),
            Err(e) => {
                log::warn!("No frame for body type: {e}");
                UNKNOWN_BODY_TYPE.to_string()
            }
        };

        let skin_tone = self.estimator.estimate(&mut subscription, self.frame_count)?;
        drop(subscription);

        let record = SessionRecord::active(event, gender, &skin_tone, &body_type, Local::now());
        Ok(self.recorder.record(&record)?)
    }

    fn pick_body_type(&self, gender: &str) -> String {
        match self.rng.lock() {
            Ok(mut rng) => body_type_picker::pick(gender, &mut *rng),
            Err(_) => body_type_picker::pick(gender, &mut rand::rng()),
        }
    }
}
