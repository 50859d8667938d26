//! Rapid-fire engine
//!
//! A dedicated thread that clicks the configured button at a fixed rate
//! while [`RapidFireState`] is enabled. It shares only the output sink and
//! two atomic flags with the router.

use crate::output::{OutputEvent, OutputSink};
use evdev::Key;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Sleep while disabled
pub const IDLE_INTERVAL: Duration = Duration::from_millis(50);

/// Longest uninterrupted sleep; flag changes are observed within this
pub const SLEEP_SLICE: Duration = Duration::from_millis(20);

/// Bounded wait for the thread at shutdown
pub const JOIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Enabled flag, written by the router and read by the engine
#[derive(Debug, Default)]
pub struct RapidFireState {
    enabled: AtomicBool,
}

impl RapidFireState {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Set the flag, returning the previous value
    pub fn set_enabled(&self, enabled: bool) -> bool {
        self.enabled.swap(enabled, Ordering::SeqCst)
    }
}

/// Timing of one rapid-fire thread
#[derive(Debug, Clone, Copy)]
pub struct RapidFireSettings {
    pub button: Key,
    pub rate_hz: f64,
}

impl RapidFireSettings {
    /// Time between the starts of two clicks, `None` if the rate is not
    /// positive or the period overflows a `Duration`
    pub fn period(&self) -> Option<Duration> {
        Duration::try_from_secs_f64(1.0 / self.rate_hz).ok()
    }
}

/// Handle to the running rapid-fire thread
pub struct RapidFireEngine {
    handle: Option<JoinHandle<()>>,
    done_rx: mpsc::Receiver<()>,
}

impl RapidFireEngine {
    /// Spawn the engine thread. It exits once `running` is cleared.
    pub fn spawn(
        sink: Arc<OutputSink>,
        state: Arc<RapidFireState>,
        running: Arc<AtomicBool>,
        settings: RapidFireSettings,
    ) -> io::Result<Self> {
        let period = settings.period().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid rapid fire rate {} Hz", settings.rate_hz),
            )
        })?;
        let (done_tx, done_rx) = mpsc::channel();
        let handle = std::thread::Builder::new()
            .name("rapid-fire".into())
            .spawn(move || {
                run_loop(&sink, &state, &running, settings.button, period);
                let _ = done_tx.send(());
            })?;
        debug!(
            "Rapid fire thread started ({:?} at {} Hz)",
            settings.button, settings.rate_hz
        );
        Ok(Self {
            handle: Some(handle),
            done_rx,
        })
    }

    /// Wait for the thread to exit, giving up after `timeout`.
    ///
    /// The caller must already have cleared the running flag. Returns true
    /// if the thread was joined; a thread that overruns the timeout is left
    /// detached. Calling again after the first stop is a no-op.
    pub fn stop(&mut self, timeout: Duration) -> bool {
        let Some(handle) = self.handle.take() else {
            return true;
        };
        match self.done_rx.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if handle.join().is_err() {
                    warn!("Rapid fire thread panicked");
                }
                debug!("Rapid fire thread stopped");
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!("Rapid fire thread did not stop within {timeout:?}, detaching");
                false
            }
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.handle.is_none()
    }
}

fn run_loop(
    sink: &OutputSink,
    state: &RapidFireState,
    running: &AtomicBool,
    button: Key,
    period: Duration,
) {
    while running.load(Ordering::SeqCst) {
        if !state.is_enabled() {
            sleep_while(IDLE_INTERVAL, || {
                running.load(Ordering::SeqCst) && !state.is_enabled()
            });
            continue;
        }

        let started = Instant::now();
        for event in [
            OutputEvent::press(button),
            OutputEvent::release(button),
        ] {
            if let Err(e) = sink.report(&[event]) {
                debug!("Rapid fire output failed: {e}");
            }
        }
        let remaining = period.saturating_sub(started.elapsed());
        sleep_while(remaining, || {
            running.load(Ordering::SeqCst) && state.is_enabled()
        });
    }
}

/// Sleep up to `duration` in slices, returning early once `keep` is false
fn sleep_while(duration: Duration, keep: impl Fn() -> bool) {
    let start = Instant::now();
    let Some(deadline) = start.checked_add(duration) else {
        // unrepresentable deadline: sleep until `keep` turns false
        while keep() {
            std::thread::sleep(SLEEP_SLICE);
        }
        return;
    };
    loop {
        let now = Instant::now();
        if now >= deadline || !keep() {
            return;
        }
        std::thread::sleep((deadline - now).min(SLEEP_SLICE));
    }
}
