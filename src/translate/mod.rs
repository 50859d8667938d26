//! Physical event → output event translation
//!
//! Translators are plain functions over the immutable config and a
//! [`TranslatorState`] owned by the router. They never touch the output
//! sink or the rapid-fire flag themselves; the caller applies the returned
//! [`Translation`].

mod axis;
mod button;

pub use axis::{pointer_motion, translate_axis, zone_of};
pub use button::translate_button;

use crate::config::{MappingConfig, StickAxis, Trigger};
use crate::output::OutputEvent;
use std::collections::HashMap;

/// Zone of a discrete-pair axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Zone {
    Negative,
    #[default]
    Neutral,
    Positive,
}

/// Result of translating one physical event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Translation {
    /// Output events to report as one batch
    pub events: Vec<OutputEvent>,
    /// New rapid-fire enabled state, if this event changed it
    pub rapid_fire: Option<bool>,
}

impl Translation {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn events(events: Vec<OutputEvent>) -> Self {
        Self {
            events,
            rapid_fire: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.rapid_fire.is_none()
    }
}

/// Translation state owned by the router
#[derive(Debug, Clone, Default)]
pub struct TranslatorState {
    zones: HashMap<StickAxis, Zone>,
    l2_pressed: bool,
    r2_pressed: bool,
    /// Analog variant seen; the digital button is then ignored
    l2_analog: bool,
    r2_analog: bool,
}

impl TranslatorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last zone of a discrete-pair axis
    pub fn zone(&self, axis: StickAxis) -> Zone {
        self.zones.get(&axis).copied().unwrap_or_default()
    }

    pub fn trigger_pressed(&self, trigger: Trigger) -> bool {
        match trigger {
            Trigger::Left => self.l2_pressed,
            Trigger::Right => self.r2_pressed,
        }
    }

    fn set_zone(&mut self, axis: StickAxis, zone: Zone) {
        self.zones.insert(axis, zone);
    }

    /// Whether the trigger has reported through its analog axis
    pub fn trigger_is_analog(&self, trigger: Trigger) -> bool {
        match trigger {
            Trigger::Left => self.l2_analog,
            Trigger::Right => self.r2_analog,
        }
    }

    fn mark_analog(&mut self, trigger: Trigger) {
        match trigger {
            Trigger::Left => self.l2_analog = true,
            Trigger::Right => self.r2_analog = true,
        }
    }

    fn latch(&mut self, trigger: Trigger) -> &mut bool {
        match trigger {
            Trigger::Left => &mut self.l2_pressed,
            Trigger::Right => &mut self.r2_pressed,
        }
    }
}

/// Move a trigger latch, shared by the analog axis and the digital button.
///
/// Only a change of the latch produces output. The digital button trips at
/// light pressure, well below the analog threshold, so once a trigger has
/// reported through its axis the axis alone drives the latch.
fn trigger_transition(
    config: &MappingConfig,
    state: &mut TranslatorState,
    trigger: Trigger,
    pressed: bool,
) -> Translation {
    let latch = state.latch(trigger);
    if *latch == pressed {
        return Translation::none();
    }
    *latch = pressed;

    let events = config
        .output_key(trigger.logical_name())
        .map(|key| vec![OutputEvent::key(key, pressed)])
        .unwrap_or_default();
    let rapid_fire = (trigger == Trigger::Right).then_some(pressed);
    Translation { events, rapid_fire }
}
