pub mod domain;
pub mod frame_hub;
pub mod fresh_frames;
pub mod infrastructure;
