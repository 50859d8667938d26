//! Key event translation

use super::{trigger_transition, Translation, TranslatorState};
use crate::config::{MappingConfig, Trigger};
use crate::error::TranslateError;
use crate::output::OutputEvent;

/// Translate one key event.
///
/// Unknown codes and unmapped logical names translate to nothing. Autorepeat
/// (value 2) is dropped; any value other than 0, 1 or 2 is an error.
pub fn translate_button(
    config: &MappingConfig,
    state: &mut TranslatorState,
    code: u16,
    value: i32,
) -> Result<Translation, TranslateError> {
    let pressed = match value {
        0 => false,
        1 => true,
        2 => return Ok(Translation::none()),
        _ => return Err(TranslateError::UnexpectedValue { code, value }),
    };

    let Some(logical) = config.logical_name(code) else {
        return Ok(Translation::none());
    };

    // Digital trigger variant only counts when no analog axis reports
    if let Some(trigger) = Trigger::from_logical_name(logical) {
        if state.trigger_is_analog(trigger) {
            return Ok(Translation::none());
        }
        return Ok(trigger_transition(config, state, trigger, pressed));
    }

    Ok(config
        .output_key(logical)
        .map(|key| Translation::events(vec![OutputEvent::key(key, pressed)]))
        .unwrap_or_default())
}
