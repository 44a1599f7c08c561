use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};

use crate::camera::domain::frame_source::{AcquireError, FrameSource};
use crate::shared::frame::Frame;

/// How long the reader thread sleeps between registration checks while no
/// one is subscribed.
const IDLE_POLL: Duration = Duration::from_millis(100);

type FrameEvent = Result<Arc<Frame>, AcquireError>;

#[derive(Clone, Debug)]
pub struct FrameHubConfig {
    /// Longest a subscriber waits for one frame.
    pub frame_timeout: Duration,
    /// Consecutive read failures after which the camera is declared dead.
    pub max_consecutive_failures: usize,
    /// Frames buffered per subscriber; newer frames are dropped when full.
    pub subscriber_capacity: usize,
}

impl Default for FrameHubConfig {
    fn default() -> Self {
        Self {
            frame_timeout: Duration::from_secs(2),
            max_consecutive_failures: 5,
            subscriber_capacity: 2,
        }
    }
}

struct HubState {
    alive: AtomicBool,
    stop: AtomicBool,
    subscribers: AtomicUsize,
    waiting: AtomicUsize,
    last_activity: Mutex<Instant>,
}

impl HubState {
    fn touch(&self) {
        if let Ok(mut last) = self.last_activity.lock() {
            *last = Instant::now();
        }
    }
}

/// Sole owner of the camera.
///
/// A dedicated thread performs every blocking read and fans frames out to
/// subscriptions, so the live stream and the estimator never contend for the
/// device. The thread idles while nobody is subscribed.
pub struct FrameHub {
    register_tx: Sender<Sender<FrameEvent>>,
    state: Arc<HubState>,
    config: FrameHubConfig,
    join: Option<JoinHandle<()>>,
}

impl FrameHub {
    pub fn spawn(source: Box<dyn FrameSource>, config: FrameHubConfig) -> Self {
        let (register_tx, register_rx) = crossbeam_channel::unbounded();
        let state = Arc::new(HubState {
            alive: AtomicBool::new(true),
            stop: AtomicBool::new(false),
            subscribers: AtomicUsize::new(0),
            waiting: AtomicUsize::new(0),
            last_activity: Mutex::new(Instant::now()),
        });

        let thread_state = state.clone();
        let max_failures = config.max_consecutive_failures.max(1);
        let join = thread::Builder::new()
            .name("frame-hub".into())
            .spawn(move || run_reader(source, register_rx, thread_state, max_failures))
            .ok();
        if join.is_none() {
            log::error!("Could not start the frame hub thread");
            state.alive.store(false, Ordering::SeqCst);
        }

        Self {
            register_tx,
            state,
            config,
            join,
        }
    }

    /// Opens a new subscription.
    ///
    /// On a dead hub the subscription is already closed and every read
    /// reports [`AcquireError::Disconnected`].
    pub fn subscribe(&self) -> FrameSubscription {
        let (tx, rx) = crossbeam_channel::bounded(self.config.subscriber_capacity.max(1));
        if self.is_alive() {
            // A failed send drops `tx`, leaving the subscription disconnected.
            let _ = self.register_tx.send(tx);
        }
        FrameSubscription {
            rx,
            timeout: self.config.frame_timeout,
            state: self.state.clone(),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.state.alive.load(Ordering::SeqCst)
    }

    /// How long a waiting subscriber has gone without the device responding.
    ///
    /// `None` while nobody is waiting on a frame.
    pub fn stalled_for(&self) -> Option<Duration> {
        if self.state.waiting.load(Ordering::SeqCst) == 0
            || self.state.subscribers.load(Ordering::SeqCst) == 0
        {
            return None;
        }
        self.state
            .last_activity
            .lock()
            .ok()
            .map(|last| last.elapsed())
    }

    /// Asks the reader thread to exit after its current read.
    pub fn stop(&self) {
        self.state.stop.store(true, Ordering::SeqCst);
    }
}

impl Drop for FrameHub {
    fn drop(&mut self) {
        self.stop();
        // The reader may be blocked inside the device; it is not joined here.
        drop(self.join.take());
    }
}

fn run_reader(
    mut source: Box<dyn FrameSource>,
    register_rx: Receiver<Sender<FrameEvent>>,
    state: Arc<HubState>,
    max_failures: usize,
) {
    let mut subscribers: Vec<Sender<FrameEvent>> = Vec::new();
    let mut failures = 0usize;

    loop {
        if state.stop.load(Ordering::SeqCst) {
            log::info!("Frame hub stopping");
            break;
        }

        if subscribers.is_empty() {
            state.subscribers.store(0, Ordering::SeqCst);
            match register_rx.recv_timeout(IDLE_POLL) {
                Ok(tx) => {
                    state.touch();
                    subscribers.push(tx);
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        subscribers.extend(register_rx.try_iter());
        state.subscribers.store(subscribers.len(), Ordering::SeqCst);

        let event = match source.read_frame() {
            Ok(frame) => {
                failures = 0;
                Ok(Arc::new(frame))
            }
            Err(AcquireError::Exhausted) => {
                log::warn!("Camera source exhausted; closing all subscriptions");
                break;
            }
            Err(e) => {
                failures += 1;
                log::warn!("Camera read failed ({failures}/{max_failures}): {e}");
                if failures >= max_failures {
                    log::error!("Camera failed {failures} times in a row; giving up on the device");
                    break;
                }
                Err(e)
            }
        };
        state.touch();

        let before = subscribers.len();
        subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) | Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Disconnected(_)) => false,
        });
        if subscribers.len() < before {
            log::debug!("{} subscriber(s) left the frame hub", before - subscribers.len());
        }
    }

    state.alive.store(false, Ordering::SeqCst);
    state.subscribers.store(0, Ordering::SeqCst);
    drop(subscribers);
    // Close subscriptions that raced with shutdown.
    for late in register_rx.try_iter() {
        drop(late);
    }
}

/// One consumer's view of the hub. Itself a blocking [`FrameSource`].
///
/// Dropping it unsubscribes.
pub struct FrameSubscription {
    rx: Receiver<FrameEvent>,
    timeout: Duration,
    state: Arc<HubState>,
}

impl FrameSource for FrameSubscription {
    fn read_frame(&mut self) -> Result<Frame, AcquireError> {
        self.state.waiting.fetch_add(1, Ordering::SeqCst);
        let received = self.rx.recv_timeout(self.timeout);
        self.state.waiting.fetch_sub(1, Ordering::SeqCst);

        match received {
            Ok(Ok(frame)) => Ok(Arc::try_unwrap(frame).unwrap_or_else(|shared| (*shared).clone())),
            Ok(Err(e)) => Err(e),
            Err(RecvTimeoutError::Timeout) => Err(AcquireError::Timeout(self.timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(AcquireError::Disconnected),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Plays back a fixed script, then reports exhaustion.
    struct ScriptedSource {
        script: VecDeque<Result<Frame, AcquireError>>,
    }

    impl FrameSource for ScriptedSource {
        fn read_frame(&mut self) -> Result<Frame, AcquireError> {
            self.script.pop_front().unwrap_or(Err(AcquireError::Exhausted))
        }
    }

    /// Blocks forever on the first read, like a wedged driver.
    struct StalledSource;

    impl FrameSource for StalledSource {
        fn read_frame(&mut self) -> Result<Frame, AcquireError> {
            thread::sleep(Duration::from_secs(3600));
            Err(AcquireError::Exhausted)
        }
    }

    fn frame(index: usize) -> Frame {
        Frame::new(vec![index as u8; 12], 2, 2, 3, index)
    }

    fn config() -> FrameHubConfig {
        FrameHubConfig {
            frame_timeout: Duration::from_secs(2),
            max_consecutive_failures: 3,
            subscriber_capacity: 64,
        }
    }

    fn hub(script: Vec<Result<Frame, AcquireError>>) -> FrameHub {
        FrameHub::spawn(
            Box::new(ScriptedSource {
                script: script.into(),
            }),
            config(),
        )
    }

    #[test]
    fn test_subscriber_receives_frames_in_order() {
        let hub = hub(vec![Ok(frame(0)), Ok(frame(1)), Ok(frame(2))]);
        let mut sub = hub.subscribe();
        for expected in 0..3 {
            assert_eq!(sub.read_frame().unwrap().index(), expected);
        }
        assert_eq!(sub.read_frame().unwrap_err(), AcquireError::Disconnected);
    }

    #[test]
    fn test_read_failures_are_forwarded() {
        let hub = hub(vec![
            Ok(frame(0)),
            Err(AcquireError::Device("glitch".into())),
            Ok(frame(1)),
        ]);
        let mut sub = hub.subscribe();
        assert!(sub.read_frame().is_ok());
        assert_eq!(
            sub.read_frame().unwrap_err(),
            AcquireError::Device("glitch".into())
        );
        assert_eq!(sub.read_frame().unwrap().index(), 1);
    }

    #[test]
    fn test_consecutive_failures_kill_the_hub() {
        let glitch = || Err(AcquireError::Device("unplugged".into()));
        let hub = hub(vec![glitch(), glitch(), glitch(), Ok(frame(9))]);
        let mut sub = hub.subscribe();
        // Two failures forwarded, the third closes the subscription
        assert!(matches!(sub.read_frame(), Err(AcquireError::Device(_))));
        assert!(matches!(sub.read_frame(), Err(AcquireError::Device(_))));
        assert_eq!(sub.read_frame().unwrap_err(), AcquireError::Disconnected);
        assert!(!hub.is_alive());
    }

    #[test]
    fn test_subscribe_after_death_is_disconnected() {
        let hub = hub(vec![]);
        let mut first = hub.subscribe();
        assert_eq!(first.read_frame().unwrap_err(), AcquireError::Disconnected);

        let mut late = hub.subscribe();
        assert_eq!(late.read_frame().unwrap_err(), AcquireError::Disconnected);
    }

    #[test]
    fn test_two_subscribers_see_the_same_frames() {
        let hub = hub(vec![Ok(frame(0)), Ok(frame(1))]);
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();
        // `b` may register after the first read, so it sees a suffix.
        let seen_a: Vec<usize> = (0..2).map(|_| a.read_frame().unwrap().index()).collect();
        assert_eq!(seen_a, vec![0, 1]);
        let mut seen_b = Vec::new();
        while let Ok(f) = b.read_frame() {
            seen_b.push(f.index());
        }
        assert!(seen_a.ends_with(&seen_b));
    }

    #[test]
    fn test_read_times_out_on_stalled_device() {
        let hub = FrameHub::spawn(
            Box::new(StalledSource),
            FrameHubConfig {
                frame_timeout: Duration::from_millis(150),
                ..config()
            },
        );
        let mut sub = hub.subscribe();
        assert_eq!(
            sub.read_frame().unwrap_err(),
            AcquireError::Timeout(Duration::from_millis(150))
        );
    }

    #[test]
    fn test_stalled_for_reports_waiting_subscriber() {
        let hub = FrameHub::spawn(
            Box::new(StalledSource),
            FrameHubConfig {
                frame_timeout: Duration::from_millis(600),
                ..config()
            },
        );
        assert!(hub.stalled_for().is_none());

        let mut sub = hub.subscribe();
        let reader = thread::spawn(move || sub.read_frame());
        thread::sleep(Duration::from_millis(300));
        let stalled = hub.stalled_for();
        assert!(stalled.is_some_and(|d| d >= Duration::from_millis(150)));
        assert!(reader.join().unwrap().is_err());
    }
}
