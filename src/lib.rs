//! DualSense to virtual keyboard/mouse mapper
//!
//! Grabs a DualSense's evdev nodes, translates sticks, triggers and buttons
//! through a TOML mapping, and replays the result on a uinput keyboard+mouse
//! (optionally mirrored to a USB HID gadget). A rapid-fire thread shares the
//! output device with the event router.

pub mod cli;
pub mod config;
pub mod device;
pub mod discovery;
pub mod error;
pub mod hid_gadget;
pub mod keys;
pub mod mapper;
pub mod output;
pub mod rapid_fire;
pub mod router;
pub mod translate;

pub use config::{DeviceSelection, MappingConfig, Role, Side, StickAxis, Trigger};
pub use device::{EventClass, EventSource, InputDevice, PipeSource, PipeWriter, RawEvent};
pub use error::{ConfigError, DiscoveryError, MapperError, OutputError, TranslateError};
pub use mapper::Mapper;
pub use output::{OutputEvent, OutputSink, RecordingOutput, UinputOutput, VirtualOutput};
pub use rapid_fire::{RapidFireEngine, RapidFireState};
pub use router::EventRouter;
pub use translate::{translate_axis, translate_button, Translation, TranslatorState, Zone};
