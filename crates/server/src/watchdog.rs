use std::sync::Arc;
use std::thread;
use std::time::Duration;

use hautfit_core::camera::frame_hub::FrameHub;

const CHECK_INTERVAL: Duration = Duration::from_millis(500);

/// Exits the process when the camera stops answering a waiting reader for
/// longer than `limit`.
pub fn spawn(hub: Arc<FrameHub>, limit: Duration) -> std::io::Result<()> {
    thread::Builder::new()
        .name("camera-watchdog".into())
        .spawn(move || loop {
            thread::sleep(CHECK_INTERVAL);
            if let Some(stalled) = is_stalled(hub.stalled_for(), limit) {
                log::error!(
                    "Camera has not delivered a frame for {:.1}s; exiting",
                    stalled.as_secs_f64()
                );
                std::process::exit(1);
            }
        })?;
    Ok(())
}

fn is_stalled(stalled_for: Option<Duration>, limit: Duration) -> Option<Duration> {
    stalled_for.filter(|d| *d > limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::idle(None, false)]
    #[case::fresh(Some(Duration::from_secs(1)), false)]
    #[case::at_limit(Some(Duration::from_secs(10)), false)]
    #[case::stalled(Some(Duration::from_secs(11)), true)]
    fn test_is_stalled(#[case] stalled_for: Option<Duration>, #[case] expected: bool) {
        assert_eq!(
            is_stalled(stalled_for, Duration::from_secs(10)).is_some(),
            expected
        );
    }
}
