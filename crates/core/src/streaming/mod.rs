pub mod live_overlay_streamer;
pub mod mjpeg;
pub mod overlay;
