//! Absolute axis translation

use super::{trigger_transition, Translation, TranslatorState, Zone};
use crate::config::{MappingConfig, StickAxis, StickConfig, Trigger};
use crate::output::OutputEvent;
use evdev::RelativeAxisType;

/// Translate one absolute axis event
pub fn translate_axis(
    config: &MappingConfig,
    state: &mut TranslatorState,
    code: u16,
    value: i32,
) -> Translation {
    if let Some(axis) = StickAxis::from_code(code) {
        let stick = config.stick(axis.side());
        if config.is_pointer_axis(axis) {
            return pointer_motion(stick, config.mouse_sensitivity, axis, value)
                .map(|event| Translation::events(vec![event]))
                .unwrap_or_default();
        }
        if let Some(pair) = config.axes.get(&axis) {
            let zone = zone_of(stick, axis, value);
            if zone == state.zone(axis) {
                return Translation::none();
            }
            state.set_zone(axis, zone);
            let events = match zone {
                Zone::Negative => vec![
                    OutputEvent::press(pair.negative),
                    OutputEvent::release(pair.positive),
                ],
                Zone::Positive => vec![
                    OutputEvent::press(pair.positive),
                    OutputEvent::release(pair.negative),
                ],
                Zone::Neutral => vec![
                    OutputEvent::release(pair.negative),
                    OutputEvent::release(pair.positive),
                ],
            };
            return Translation::events(events);
        }
        return Translation::none();
    }

    if let Some(trigger) = Trigger::from_code(code) {
        state.mark_analog(trigger);
        let pressed = value > config.trigger_threshold(trigger);
        return trigger_transition(config, state, trigger, pressed);
    }

    Translation::none()
}

fn signed_delta(stick: &StickConfig, axis: StickAxis, value: i32) -> i32 {
    let delta = value - stick.center;
    if stick.invert(axis) {
        -delta
    } else {
        delta
    }
}

/// Zone of a stick value after deadzone and invert
pub fn zone_of(stick: &StickConfig, axis: StickAxis, value: i32) -> Zone {
    let delta = signed_delta(stick, axis, value);
    if delta < -stick.deadzone {
        Zone::Negative
    } else if delta > stick.deadzone {
        Zone::Positive
    } else {
        Zone::Neutral
    }
}

/// Relative motion for a pointer stick value.
///
/// `round(delta * sensitivity * mouse_sensitivity / 128)`, rounding half
/// away from zero. Values inside the deadzone and zero magnitudes emit
/// nothing.
pub fn pointer_motion(
    stick: &StickConfig,
    mouse_sensitivity: f64,
    axis: StickAxis,
    value: i32,
) -> Option<OutputEvent> {
    let delta = signed_delta(stick, axis, value);
    if delta.abs() <= stick.deadzone {
        return None;
    }
    let magnitude = (f64::from(delta) * stick.sensitivity * mouse_sensitivity / 128.0).round();
    let magnitude = magnitude.clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32;
    if magnitude == 0 {
        return None;
    }
    let rel = if axis.is_x() {
        RelativeAxisType::REL_X
    } else {
        RelativeAxisType::REL_Y
    };
    Some(OutputEvent::rel(rel, magnitude))
}
