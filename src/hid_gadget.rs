//! USB HID gadget report mirror
//!
//! Re-encodes output events as boot-style HID reports and writes them to a
//! gadget character device (`/dev/hidgN`):
//!
//! - keyboard, Report ID 1: `[0x01, modifiers, 0x00, k1..k6, 0x00, 0x00]`
//! - mouse, Report ID 2: `[0x02, buttons, dx, dy, 0 x 7]`
//!
//! The mirror is best effort. A write failure disables it for the rest of
//! the run instead of failing the sink.

use crate::error::OutputError;
use crate::keys::{hid_usage, HidUsage};
use crate::output::{OutputEvent, VirtualOutput};
use evdev::RelativeAxisType;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use tracing::{error, info};

pub const KEYBOARD_REPORT_ID: u8 = 0x01;
pub const MOUSE_REPORT_ID: u8 = 0x02;
pub const KEYBOARD_REPORT_LEN: usize = 11;
pub const MOUSE_REPORT_LEN: usize = 11;

/// Maximum simultaneous non-modifier keys in a boot report
const ROLLOVER: usize = 6;

/// Keyboard and mouse state as seen by the host
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HidState {
    modifiers: u8,
    /// Pressed usages, oldest first
    keys_down: Vec<u8>,
    buttons: u8,
}

impl HidState {
    /// Apply one event, returning the report it produces (if any)
    pub fn apply(&mut self, event: &OutputEvent) -> Option<Vec<u8>> {
        match *event {
            OutputEvent::Key { key, value } => {
                let pressed = value != 0;
                match hid_usage(key)? {
                    HidUsage::Mouse(bit) => {
                        set_bit(&mut self.buttons, bit, pressed);
                        Some(self.mouse_report(0, 0))
                    }
                    HidUsage::Modifier(bit) => {
                        set_bit(&mut self.modifiers, bit, pressed);
                        Some(self.keyboard_report())
                    }
                    HidUsage::Key(usage) => {
                        if pressed && !self.keys_down.contains(&usage) {
                            if self.keys_down.len() >= ROLLOVER {
                                self.keys_down.remove(0);
                            }
                            self.keys_down.push(usage);
                        } else if !pressed {
                            self.keys_down.retain(|&k| k != usage);
                        }
                        Some(self.keyboard_report())
                    }
                }
            }
            OutputEvent::Rel { axis, value } => {
                if axis == RelativeAxisType::REL_X {
                    Some(self.mouse_report(value, 0))
                } else if axis == RelativeAxisType::REL_Y {
                    Some(self.mouse_report(0, value))
                } else {
                    None
                }
            }
        }
    }

    pub fn keyboard_report(&self) -> Vec<u8> {
        let mut report = vec![0u8; KEYBOARD_REPORT_LEN];
        report[0] = KEYBOARD_REPORT_ID;
        report[1] = self.modifiers;
        report[3..3 + self.keys_down.len()].copy_from_slice(&self.keys_down);
        report
    }

    pub fn mouse_report(&self, dx: i32, dy: i32) -> Vec<u8> {
        let mut report = vec![0u8; MOUSE_REPORT_LEN];
        report[0] = MOUSE_REPORT_ID;
        report[1] = self.buttons;
        report[2] = clamp_motion(dx);
        report[3] = clamp_motion(dy);
        report
    }
}

fn set_bit(byte: &mut u8, bit: u8, on: bool) {
    if on {
        *byte |= bit;
    } else {
        *byte &= !bit;
    }
}

/// Clamp to a signed 8-bit delta, two's complement
fn clamp_motion(value: i32) -> u8 {
    value.clamp(-127, 127) as i8 as u8
}

/// Report mirror over any writer, normally the gadget device
pub struct HidGadget<W: Write + Send = File> {
    writer: Option<W>,
    state: HidState,
    pending: Vec<Vec<u8>>,
}

impl HidGadget<File> {
    /// Open a gadget device for writing
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().write(true).open(path)?;
        info!("Mirroring HID reports to {}", path.display());
        Ok(Self::new(file))
    }
}

impl<W: Write + Send> HidGadget<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Some(writer),
            state: HidState::default(),
            pending: Vec::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.writer.is_some()
    }

    pub fn writer(&self) -> Option<&W> {
        self.writer.as_ref()
    }
}

impl<W: Write + Send> VirtualOutput for HidGadget<W> {
    fn name(&self) -> &str {
        "hid-gadget"
    }

    fn emit(&mut self, event: &OutputEvent) -> Result<(), OutputError> {
        if self.writer.is_none() {
            return Ok(());
        }
        if let Some(report) = self.state.apply(event) {
            self.pending.push(report);
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), OutputError> {
        let Some(writer) = self.writer.as_mut() else {
            self.pending.clear();
            return Ok(());
        };
        let result = self
            .pending
            .drain(..)
            .try_for_each(|report| writer.write_all(&report))
            .and_then(|()| writer.flush());
        if let Err(e) = result {
            error!("Failed to write HID report, disabling gadget mirror: {e}");
            self.writer = None;
            self.pending.clear();
        }
        Ok(())
    }
}
