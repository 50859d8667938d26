//! Physical input sources
//!
//! [`InputDevice`] is an evdev node opened for exclusive access. The router
//! only sees the [`EventSource`] trait, so in-process sources such as
//! [`PipeSource`] can stand in for hardware.

use crate::config::Role;
use crate::error::DiscoveryError;
use evdev::{Device, EventType, PropType};
use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Event class as far as translation is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventClass {
    /// EV_KEY
    Key,
    /// EV_ABS
    Abs,
    /// Anything else (sync, misc, ...)
    Other,
}

impl EventClass {
    pub fn from_type(event_type: EventType) -> Self {
        if event_type == EventType::KEY {
            EventClass::Key
        } else if event_type == EventType::ABSOLUTE {
            EventClass::Abs
        } else {
            EventClass::Other
        }
    }

    fn to_wire(self) -> u16 {
        match self {
            EventClass::Key => EventType::KEY.0,
            EventClass::Abs => EventType::ABSOLUTE.0,
            EventClass::Other => EventType::SYNCHRONIZATION.0,
        }
    }
}

/// One `{class, code, value}` input event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEvent {
    pub class: EventClass,
    pub code: u16,
    pub value: i32,
}

impl RawEvent {
    pub fn key(code: u16, value: i32) -> Self {
        Self {
            class: EventClass::Key,
            code,
            value,
        }
    }

    pub fn abs(code: u16, value: i32) -> Self {
        Self {
            class: EventClass::Abs,
            code,
            value,
        }
    }
}

/// An open input handle the router can poll
pub trait EventSource: Send {
    /// Logical role this source was opened for
    fn role(&self) -> Role;

    /// Path shown in logs
    fn path(&self) -> &Path;

    /// Descriptor polled for readiness
    fn as_raw_fd(&self) -> RawFd;

    /// Read every event currently queued, appending to `out`.
    ///
    /// Returns `Ok` once the queue is empty. An error means the source is
    /// unusable; events appended before the error are still valid.
    fn drain(&mut self, out: &mut Vec<RawEvent>) -> io::Result<()>;
}

/// Declared capabilities of a candidate source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub name: String,
    pub vendor: u16,
    pub product: u16,
    /// Absolute axis codes
    pub abs_axes: Vec<u16>,
    /// Key codes
    pub keys: Vec<u16>,
    /// INPUT_PROP_ACCELEROMETER
    pub accelerometer: bool,
}

impl Capabilities {
    /// Query the capability descriptor of an open device
    pub fn of(device: &Device) -> Self {
        let id = device.input_id();
        Self {
            name: device.name().unwrap_or("unknown").to_string(),
            vendor: id.vendor(),
            product: id.product(),
            abs_axes: device
                .supported_absolute_axes()
                .map(|axes| axes.iter().map(|axis| axis.0).collect())
                .unwrap_or_default(),
            keys: device
                .supported_keys()
                .map(|keys| keys.iter().map(|key| key.code()).collect())
                .unwrap_or_default(),
            accelerometer: device.properties().contains(PropType::ACCELEROMETER),
        }
    }

    pub fn has_abs(&self, code: u16) -> bool {
        self.abs_axes.contains(&code)
    }

    pub fn has_key(&self, code: u16) -> bool {
        self.keys.contains(&code)
    }
}

/// Set O_NONBLOCK on a descriptor, preserving its other flags
pub fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    let current = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if current < 0 {
        return Err(io::Error::last_os_error());
    }
    let rc = unsafe { libc::fcntl(fd, libc::F_SETFL, current | libc::O_NONBLOCK) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// An evdev node held under an exclusive grab
pub struct InputDevice {
    device: Device,
    path: PathBuf,
    role: Role,
    grabbed: bool,
}

impl InputDevice {
    /// Open, grab and switch a device to non-blocking reads
    pub fn open(path: &Path, role: Role) -> Result<Self, DiscoveryError> {
        let open_err = |source| DiscoveryError::Open {
            path: path.to_path_buf(),
            source,
        };

        let mut device = Device::open(path).map_err(open_err)?;
        set_nonblocking(device.as_raw_fd()).map_err(open_err)?;
        device.grab().map_err(open_err)?;
        debug!(
            "Grabbed {} as {role}: {}",
            path.display(),
            device.name().unwrap_or("unknown")
        );

        Ok(Self {
            device,
            path: path.to_path_buf(),
            role,
            grabbed: true,
        })
    }

    /// Release the exclusive grab. Safe to call more than once.
    pub fn release(&mut self) {
        if !self.grabbed {
            return;
        }
        self.grabbed = false;
        if let Err(e) = self.device.ungrab() {
            warn!("Failed to release {}: {e}", self.path.display());
        } else {
            debug!("Released {}", self.path.display());
        }
    }
}

impl EventSource for InputDevice {
    fn role(&self) -> Role {
        self.role
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn as_raw_fd(&self) -> RawFd {
        self.device.as_raw_fd()
    }

    fn drain(&mut self, out: &mut Vec<RawEvent>) -> io::Result<()> {
        loop {
            match self.device.fetch_events() {
                Ok(events) => {
                    let before = out.len();
                    out.extend(events.map(|ev| RawEvent {
                        class: EventClass::from_type(ev.event_type()),
                        code: ev.code(),
                        value: ev.value(),
                    }));
                    if out.len() == before {
                        return Ok(());
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }
}

impl Drop for InputDevice {
    fn drop(&mut self) {
        self.release();
    }
}

const WIRE_SIZE: usize = 8;

/// In-process event source backed by a Unix socket pair.
///
/// Events written through the paired [`PipeWriter`] are read back exactly
/// like device events, including poll readiness. Dropping the writer ends
/// the stream, which the source reports as a read error.
pub struct PipeSource {
    stream: UnixStream,
    path: PathBuf,
    role: Role,
    partial: Vec<u8>,
}

/// Feeding end of a [`PipeSource`]
pub struct PipeWriter {
    stream: UnixStream,
}

impl PipeSource {
    pub fn pair(role: Role) -> io::Result<(PipeSource, PipeWriter)> {
        let (reader, writer) = UnixStream::pair()?;
        reader.set_nonblocking(true)?;
        Ok((
            PipeSource {
                stream: reader,
                path: PathBuf::from(format!("pipe:{role}")),
                role,
                partial: Vec::with_capacity(WIRE_SIZE),
            },
            PipeWriter { stream: writer },
        ))
    }
}

impl PipeWriter {
    pub fn send(&mut self, event: RawEvent) -> io::Result<()> {
        let mut buf = [0u8; WIRE_SIZE];
        buf[0..2].copy_from_slice(&event.class.to_wire().to_le_bytes());
        buf[2..4].copy_from_slice(&event.code.to_le_bytes());
        buf[4..8].copy_from_slice(&event.value.to_le_bytes());
        self.stream.write_all(&buf)
    }

    pub fn send_all(&mut self, events: &[RawEvent]) -> io::Result<()> {
        events.iter().try_for_each(|&event| self.send(event))
    }
}

impl EventSource for PipeSource {
    fn role(&self) -> Role {
        self.role
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn as_raw_fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }

    fn drain(&mut self, out: &mut Vec<RawEvent>) -> io::Result<()> {
        let mut buf = [0u8; 256];
        loop {
            match self.stream.read(&mut buf) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "event stream closed",
                    ))
                }
                Ok(n) => {
                    self.partial.extend_from_slice(&buf[..n]);
                    let whole = self.partial.len() / WIRE_SIZE * WIRE_SIZE;
                    for chunk in self.partial[..whole].chunks_exact(WIRE_SIZE) {
                        let event_type = u16::from_le_bytes([chunk[0], chunk[1]]);
                        out.push(RawEvent {
                            class: EventClass::from_type(EventType(event_type)),
                            code: u16::from_le_bytes([chunk[2], chunk[3]]),
                            value: i32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]),
                        });
                    }
                    self.partial.drain(..whole);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipe_source_round_trips_events() {
        let (mut source, mut writer) = PipeSource::pair(Role::Controller).unwrap();
        writer
            .send_all(&[RawEvent::key(304, 1), RawEvent::abs(3, -40)])
            .unwrap();

        let mut events = Vec::new();
        source.drain(&mut events).unwrap();
        assert_eq!(events, vec![RawEvent::key(304, 1), RawEvent::abs(3, -40)]);

        // nothing queued: empty drain, not an error
        events.clear();
        source.drain(&mut events).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_pipe_source_reports_closed_writer() {
        let (mut source, writer) = PipeSource::pair(Role::Touchpad).unwrap();
        drop(writer);
        let mut events = Vec::new();
        let err = source.drain(&mut events).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_capability_queries() {
        let caps = Capabilities {
            abs_axes: vec![0, 1, 3, 4],
            keys: vec![304, 305],
            ..Default::default()
        };
        assert!(caps.has_abs(3));
        assert!(!caps.has_abs(5));
        assert!(caps.has_key(305));
        assert!(!caps.has_key(272));
    }

    #[test]
    #[ignore] // Requires an evdev node (run with: cargo test -- --ignored)
    fn test_open_missing_device() {
        let result = InputDevice::open(Path::new("/dev/input/event-missing"), Role::Motion);
        assert!(matches!(result, Err(DiscoveryError::Open { .. })));
    }
}
