//! Virtual output sink
//!
//! All output goes through one [`OutputSink`]. The router and the rapid-fire
//! thread both write to it, so every batch is emitted and flushed under a
//! single lock: a consumer never observes half of one producer's report
//! mixed into another's.

use crate::error::OutputError;
use crate::keys::OUTPUT_KEYS;
use evdev::{
    uinput::{VirtualDevice, VirtualDeviceBuilder},
    AttributeSet, BusType, EventType, InputEvent, InputId, Key, RelativeAxisType,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

/// Version reported by the virtual device
pub const DEVICE_VERSION: u16 = 0x0100;

/// One synthesized output event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputEvent {
    /// Key or button state, 1 = down, 0 = up
    Key { key: Key, value: i32 },
    /// Relative pointer motion
    Rel { axis: RelativeAxisType, value: i32 },
}

impl OutputEvent {
    pub fn press(key: Key) -> Self {
        OutputEvent::Key { key, value: 1 }
    }

    pub fn release(key: Key) -> Self {
        OutputEvent::Key { key, value: 0 }
    }

    pub fn key(key: Key, pressed: bool) -> Self {
        OutputEvent::Key {
            key,
            value: i32::from(pressed),
        }
    }

    pub fn rel(axis: RelativeAxisType, value: i32) -> Self {
        OutputEvent::Rel { axis, value }
    }

    fn to_input_event(self) -> InputEvent {
        match self {
            OutputEvent::Key { key, value } => InputEvent::new(EventType::KEY, key.code(), value),
            OutputEvent::Rel { axis, value } => {
                InputEvent::new(EventType::RELATIVE, axis.0, value)
            }
        }
    }
}

/// A backend that receives output events
pub trait VirtualOutput: Send {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Queue one event
    fn emit(&mut self, event: &OutputEvent) -> Result<(), OutputError>;

    /// Publish everything queued since the last flush as one report
    fn flush(&mut self) -> Result<(), OutputError>;
}

/// uinput-backed keyboard + mouse
pub struct UinputOutput {
    device: VirtualDevice,
    name: String,
    pending: Vec<InputEvent>,
}

impl UinputOutput {
    /// Create the virtual device.
    ///
    /// Declares every key in the output key table plus REL_X/REL_Y.
    pub fn new(name: &str) -> Result<Self, OutputError> {
        let mut keys = AttributeSet::<Key>::new();
        for spec in OUTPUT_KEYS {
            keys.insert(spec.key);
        }
        let mut rel = AttributeSet::<RelativeAxisType>::new();
        rel.insert(RelativeAxisType::REL_X);
        rel.insert(RelativeAxisType::REL_Y);

        let device = VirtualDeviceBuilder::new()
            .map_err(OutputError::Create)?
            .name(name)
            .input_id(InputId::new(BusType::BUS_USB, 0x0001, 0x0001, DEVICE_VERSION))
            .with_keys(&keys)
            .map_err(OutputError::Create)?
            .with_relative_axes(&rel)
            .map_err(OutputError::Create)?
            .build()
            .map_err(OutputError::Create)?;

        info!("Created virtual device \"{name}\"");
        Ok(Self {
            device,
            name: name.to_string(),
            pending: Vec::new(),
        })
    }
}

impl VirtualOutput for UinputOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn emit(&mut self, event: &OutputEvent) -> Result<(), OutputError> {
        self.pending.push(event.to_input_event());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), OutputError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        // emit() terminates the batch with SYN_REPORT
        let result = self.device.emit(&self.pending).map_err(OutputError::Emit);
        self.pending.clear();
        result
    }
}

#[derive(Debug, Default)]
struct Recording {
    pending: Vec<OutputEvent>,
    reports: Vec<Vec<OutputEvent>>,
}

/// In-memory backend keeping every flushed report.
///
/// Clones share the same recording, so a test can keep one clone while the
/// sink owns another.
#[derive(Debug, Clone, Default)]
pub struct RecordingOutput {
    inner: Arc<Mutex<Recording>>,
}

impl RecordingOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every flushed report, oldest first
    pub fn reports(&self) -> Vec<Vec<OutputEvent>> {
        self.inner.lock().reports.clone()
    }

    /// Every flushed event, oldest first
    pub fn events(&self) -> Vec<OutputEvent> {
        self.inner.lock().reports.concat()
    }
}

impl VirtualOutput for RecordingOutput {
    fn name(&self) -> &str {
        "recording"
    }

    fn emit(&mut self, event: &OutputEvent) -> Result<(), OutputError> {
        self.inner.lock().pending.push(*event);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), OutputError> {
        let mut inner = self.inner.lock();
        if !inner.pending.is_empty() {
            let report = std::mem::take(&mut inner.pending);
            inner.reports.push(report);
        }
        Ok(())
    }
}

/// Serialized access to every output backend
pub struct OutputSink {
    backends: Mutex<Option<Vec<Box<dyn VirtualOutput>>>>,
}

impl OutputSink {
    pub fn new(backends: Vec<Box<dyn VirtualOutput>>) -> Self {
        Self {
            backends: Mutex::new(Some(backends)),
        }
    }

    /// Queue one event on every backend
    pub fn emit(&self, event: &OutputEvent) -> Result<(), OutputError> {
        let mut guard = self.backends.lock();
        let backends = guard.as_mut().ok_or(OutputError::Closed)?;
        for backend in backends.iter_mut() {
            backend.emit(event)?;
        }
        Ok(())
    }

    /// Flush every backend
    pub fn flush(&self) -> Result<(), OutputError> {
        let mut guard = self.backends.lock();
        let backends = guard.as_mut().ok_or(OutputError::Closed)?;
        for backend in backends.iter_mut() {
            backend.flush()?;
        }
        Ok(())
    }

    /// Emit a batch and flush it as one uninterrupted unit
    pub fn report(&self, events: &[OutputEvent]) -> Result<(), OutputError> {
        let mut guard = self.backends.lock();
        let backends = guard.as_mut().ok_or(OutputError::Closed)?;
        for backend in backends.iter_mut() {
            for event in events {
                backend.emit(event)?;
            }
            backend.flush()?;
        }
        Ok(())
    }

    /// Destroy every backend. Returns false if already closed.
    pub fn close(&self) -> bool {
        let Some(backends) = self.backends.lock().take() else {
            return false;
        };
        for backend in &backends {
            debug!("Closing output {}", backend.name());
        }
        drop(backends);
        true
    }

    pub fn is_closed(&self) -> bool {
        self.backends.lock().is_none()
    }
}

impl Drop for OutputSink {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_report_is_one_flushed_batch() {
        let recording = RecordingOutput::new();
        let sink = OutputSink::new(vec![Box::new(recording.clone())]);

        sink.report(&[OutputEvent::press(Key::KEY_A), OutputEvent::release(Key::KEY_D)])
            .unwrap();
        sink.report(&[OutputEvent::rel(RelativeAxisType::REL_X, 4)])
            .unwrap();

        let reports = recording.reports();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].len(), 2);
        assert_eq!(reports[1], vec![OutputEvent::rel(RelativeAxisType::REL_X, 4)]);
    }

    #[test]
    fn test_close_is_idempotent() {
        let recording = RecordingOutput::new();
        let sink = OutputSink::new(vec![Box::new(recording.clone())]);
        sink.report(&[OutputEvent::press(Key::KEY_E)]).unwrap();

        assert!(sink.close());
        assert!(!sink.close());
        assert!(sink.is_closed());
        assert!(matches!(
            sink.report(&[OutputEvent::release(Key::KEY_E)]),
            Err(OutputError::Closed)
        ));
        assert!(matches!(sink.flush(), Err(OutputError::Closed)));
        assert_eq!(recording.reports().len(), 1);
    }

    #[test]
    fn test_concurrent_reports_never_interleave() {
        let recording = RecordingOutput::new();
        let sink = Arc::new(OutputSink::new(vec![Box::new(recording.clone())]));

        let producers: Vec<_> = [Key::KEY_A, Key::BTN_RIGHT]
            .into_iter()
            .map(|key| {
                let sink = Arc::clone(&sink);
                thread::spawn(move || {
                    for _ in 0..500 {
                        sink.report(&[OutputEvent::press(key), OutputEvent::release(key)])
                            .unwrap();
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }

        let reports = recording.reports();
        assert_eq!(reports.len(), 1000);
        for report in reports {
            let [OutputEvent::Key { key: down, value: 1 }, OutputEvent::Key { key: up, value: 0 }] =
                report[..]
            else {
                panic!("Torn report: {report:?}");
            };
            assert_eq!(down, up);
        }
    }

    #[test]
    #[ignore] // Requires uinput access (run with: cargo test -- --ignored)
    fn test_create_uinput_output() {
        let output = UinputOutput::new("DS-Mapper Test");
        assert!(output.is_ok());
    }
}
