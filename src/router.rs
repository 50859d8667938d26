//! Event router
//!
//! One loop polls every open source with a short timeout, drains ready
//! sources in order and dispatches each event to the button or axis
//! translator. All translator state lives here and is touched by this
//! loop only.

use crate::config::{MappingConfig, Role};
use crate::device::{EventClass, EventSource, RawEvent};
use crate::error::MapperError;
use crate::output::OutputSink;
use crate::rapid_fire::RapidFireState;
use crate::translate::{translate_axis, translate_button, Translation, TranslatorState};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Readiness wait per iteration
pub const POLL_TIMEOUT: Duration = Duration::from_millis(20);

pub struct EventRouter {
    config: Arc<MappingConfig>,
    sources: Vec<Box<dyn EventSource>>,
    state: TranslatorState,
    sink: Arc<OutputSink>,
    rapid_fire: Arc<RapidFireState>,
    running: Arc<AtomicBool>,
    events: Vec<RawEvent>,
}

impl EventRouter {
    pub fn new(
        config: Arc<MappingConfig>,
        sources: Vec<Box<dyn EventSource>>,
        sink: Arc<OutputSink>,
        rapid_fire: Arc<RapidFireState>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            config,
            sources,
            state: TranslatorState::new(),
            sink,
            rapid_fire,
            running,
            events: Vec::with_capacity(64),
        }
    }

    /// Poll until the running flag clears or the controller is lost
    pub fn run(&mut self) -> Result<(), MapperError> {
        info!("Routing events from {} source(s)", self.sources.len());
        while self.running.load(Ordering::SeqCst) {
            self.poll_once(POLL_TIMEOUT)?;
        }
        debug!("Router stopped");
        Ok(())
    }

    /// One bounded wait plus dispatch of everything that became ready
    pub fn poll_once(&mut self, timeout: Duration) -> Result<(), MapperError> {
        if !self.has_role(Role::Controller) {
            return Err(MapperError::ControllerLost);
        }

        let mut fds: Vec<libc::pollfd> = self
            .sources
            .iter()
            .map(|source| libc::pollfd {
                fd: source.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            })
            .collect();
        let timeout_ms = timeout.as_millis().min(i32::MAX as u128) as libc::c_int;

        let rc = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(());
            }
            return Err(MapperError::Poll(err));
        }
        if rc == 0 {
            return Ok(());
        }

        let mut lost = Vec::new();
        for (index, pollfd) in fds.iter().enumerate() {
            if pollfd.revents == 0 {
                continue;
            }
            let mut events = std::mem::take(&mut self.events);
            events.clear();
            let result = self.sources[index].drain(&mut events);
            let role = self.sources[index].role();
            for event in &events {
                self.dispatch(role, *event);
            }
            self.events = events;

            let source = &self.sources[index];
            match result {
                Err(e) => {
                    warn!("Read from {} ({role}) failed: {e}", source.path().display());
                    lost.push(index);
                }
                Ok(()) if pollfd.revents & (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) != 0 => {
                    warn!("{} ({role}) hung up", source.path().display());
                    lost.push(index);
                }
                Ok(()) => {}
            }
        }

        for index in lost.into_iter().rev() {
            let source = self.sources.remove(index);
            info!("Dropped {} from the poll set", source.path().display());
        }
        if !self.has_role(Role::Controller) {
            return Err(MapperError::ControllerLost);
        }
        Ok(())
    }

    /// Translate one event and apply the result
    pub fn dispatch(&mut self, role: Role, event: RawEvent) {
        let translation = match (role, event.class) {
            (Role::Controller | Role::Touchpad, EventClass::Key) => {
                match translate_button(&self.config, &mut self.state, event.code, event.value) {
                    Ok(translation) => translation,
                    Err(e) => {
                        warn!("Dropping event from {role}: {e}");
                        return;
                    }
                }
            }
            (Role::Controller, EventClass::Abs) => {
                translate_axis(&self.config, &mut self.state, event.code, event.value)
            }
            _ => return,
        };
        self.apply(translation);
    }

    fn apply(&self, translation: Translation) {
        if let Some(enabled) = translation.rapid_fire {
            if self.rapid_fire.set_enabled(enabled) != enabled {
                info!("Rapid fire {}", if enabled { "enabled" } else { "disabled" });
            }
        }
        if !translation.events.is_empty() {
            if let Err(e) = self.sink.report(&translation.events) {
                warn!("Failed to report output: {e}");
            }
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.sources.iter().any(|source| source.role() == role)
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Drop every source, releasing device grabs
    pub fn release_sources(&mut self) -> usize {
        let count = self.sources.len();
        self.sources.clear();
        count
    }
}
