//! Key symbol tables
//!
//! Output key names are resolved once, at config load, against
//! [`OUTPUT_KEYS`]. The same table declares the virtual device's key
//! capabilities and carries the USB HID usage for the gadget mirror, so a
//! key is either fully supported or rejected up front.

use evdev::Key;

/// Logical name of the left trigger (digital and analog variants)
pub const TRIGGER_LEFT: &str = "l2";
/// Logical name of the right trigger (digital and analog variants)
pub const TRIGGER_RIGHT: &str = "r2";

/// Where a key lands in a USB HID boot report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HidUsage {
    /// Keyboard usage ID (placed in the 6-key array)
    Key(u8),
    /// Bit in the keyboard modifier byte
    Modifier(u8),
    /// Bit in the mouse button byte
    Mouse(u8),
}

/// One entry of the output key table
#[derive(Debug, Clone, Copy)]
pub struct KeySpec {
    pub name: &'static str,
    pub key: Key,
    pub hid: HidUsage,
}

macro_rules! key_table {
    ($($name:ident => $hid:expr),* $(,)?) => {
        &[$(KeySpec { name: stringify!($name), key: Key::$name, hid: $hid }),*]
    };
}

use HidUsage::{Key as K, Modifier as M, Mouse as B};

/// Every key the virtual device can emit
pub const OUTPUT_KEYS: &[KeySpec] = key_table![
    // letters
    KEY_A => K(0x04), KEY_B => K(0x05), KEY_C => K(0x06), KEY_D => K(0x07),
    KEY_E => K(0x08), KEY_F => K(0x09), KEY_G => K(0x0A), KEY_H => K(0x0B),
    KEY_I => K(0x0C), KEY_J => K(0x0D), KEY_K => K(0x0E), KEY_L => K(0x0F),
    KEY_M => K(0x10), KEY_N => K(0x11), KEY_O => K(0x12), KEY_P => K(0x13),
    KEY_Q => K(0x14), KEY_R => K(0x15), KEY_S => K(0x16), KEY_T => K(0x17),
    KEY_U => K(0x18), KEY_V => K(0x19), KEY_W => K(0x1A), KEY_X => K(0x1B),
    KEY_Y => K(0x1C), KEY_Z => K(0x1D),
    // digits
    KEY_1 => K(0x1E), KEY_2 => K(0x1F), KEY_3 => K(0x20), KEY_4 => K(0x21),
    KEY_5 => K(0x22), KEY_6 => K(0x23), KEY_7 => K(0x24), KEY_8 => K(0x25),
    KEY_9 => K(0x26), KEY_0 => K(0x27),
    // editing and symbols
    KEY_ENTER => K(0x28), KEY_ESC => K(0x29), KEY_BACKSPACE => K(0x2A),
    KEY_TAB => K(0x2B), KEY_SPACE => K(0x2C), KEY_MINUS => K(0x2D),
    KEY_EQUAL => K(0x2E), KEY_LEFTBRACE => K(0x2F), KEY_RIGHTBRACE => K(0x30),
    KEY_BACKSLASH => K(0x31), KEY_SEMICOLON => K(0x33), KEY_APOSTROPHE => K(0x34),
    KEY_GRAVE => K(0x35), KEY_COMMA => K(0x36), KEY_DOT => K(0x37),
    KEY_SLASH => K(0x38), KEY_CAPSLOCK => K(0x39),
    // function keys
    KEY_F1 => K(0x3A), KEY_F2 => K(0x3B), KEY_F3 => K(0x3C), KEY_F4 => K(0x3D),
    KEY_F5 => K(0x3E), KEY_F6 => K(0x3F), KEY_F7 => K(0x40), KEY_F8 => K(0x41),
    KEY_F9 => K(0x42), KEY_F10 => K(0x43), KEY_F11 => K(0x44), KEY_F12 => K(0x45),
    // navigation
    KEY_INSERT => K(0x49), KEY_HOME => K(0x4A), KEY_PAGEUP => K(0x4B),
    KEY_DELETE => K(0x4C), KEY_END => K(0x4D), KEY_PAGEDOWN => K(0x4E),
    KEY_RIGHT => K(0x4F), KEY_LEFT => K(0x50), KEY_DOWN => K(0x51), KEY_UP => K(0x52),
    // modifiers
    KEY_LEFTCTRL => M(0x01), KEY_LEFTSHIFT => M(0x02), KEY_LEFTALT => M(0x04),
    KEY_LEFTMETA => M(0x08), KEY_RIGHTCTRL => M(0x10), KEY_RIGHTSHIFT => M(0x20),
    KEY_RIGHTALT => M(0x40), KEY_RIGHTMETA => M(0x80),
    // mouse buttons
    BTN_LEFT => B(0x01), BTN_RIGHT => B(0x02), BTN_MIDDLE => B(0x04),
];

/// Resolve an output key name such as `"KEY_SPACE"`, `"space"` or `"BTN_RIGHT"`.
///
/// Names are case-insensitive; the `KEY_` prefix may be omitted.
pub fn key_from_name(name: &str) -> Option<Key> {
    let upper = name.trim().to_ascii_uppercase();
    let prefixed;
    let search = if upper.starts_with("KEY_") || upper.starts_with("BTN_") {
        upper.as_str()
    } else {
        prefixed = format!("KEY_{upper}");
        prefixed.as_str()
    };
    OUTPUT_KEYS
        .iter()
        .find(|spec| spec.name == search)
        .map(|spec| spec.key)
}

/// HID usage of an output key
pub fn hid_usage(key: Key) -> Option<HidUsage> {
    OUTPUT_KEYS
        .iter()
        .find(|spec| spec.key == key)
        .map(|spec| spec.hid)
}

/// Built-in native code → logical name table (hid-playstation layout)
pub fn default_code_names() -> Vec<(u16, &'static str)> {
    [
        (Key::BTN_SOUTH, "cross"),
        (Key::BTN_EAST, "circle"),
        (Key::BTN_NORTH, "triangle"),
        (Key::BTN_WEST, "square"),
        (Key::BTN_TL, "l1"),
        (Key::BTN_TR, "r1"),
        (Key::BTN_TL2, TRIGGER_LEFT),
        (Key::BTN_TR2, TRIGGER_RIGHT),
        (Key::BTN_SELECT, "create"),
        (Key::BTN_START, "options"),
        (Key::BTN_MODE, "ps"),
        (Key::BTN_THUMBL, "l3"),
        (Key::BTN_THUMBR, "r3"),
        // touchpad click, reported by the touchpad node
        (Key::BTN_LEFT, "touchpad"),
    ]
    .into_iter()
    .map(|(key, name)| (key.code(), name))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_canonical_and_short_names() {
        assert_eq!(key_from_name("KEY_SPACE"), Some(Key::KEY_SPACE));
        assert_eq!(key_from_name("space"), Some(Key::KEY_SPACE));
        assert_eq!(key_from_name("btn_right"), Some(Key::BTN_RIGHT));
        assert_eq!(key_from_name(" w "), Some(Key::KEY_W));
    }

    #[test]
    fn unknown_names_do_not_resolve() {
        assert_eq!(key_from_name("KEY_NOPE"), None);
        assert_eq!(key_from_name(""), None);
        // BTN_ names never get a KEY_ prefix
        assert_eq!(key_from_name("BTN_SOUTH"), None);
    }

    #[test]
    fn table_names_are_unique() {
        for (i, a) in OUTPUT_KEYS.iter().enumerate() {
            for b in &OUTPUT_KEYS[i + 1..] {
                assert_ne!(a.name, b.name);
                assert_ne!(a.key, b.key);
            }
        }
    }

    #[test]
    fn hid_usage_matches_boot_layout() {
        assert_eq!(hid_usage(Key::KEY_A), Some(HidUsage::Key(0x04)));
        assert_eq!(hid_usage(Key::KEY_F12), Some(HidUsage::Key(0x45)));
        assert_eq!(hid_usage(Key::KEY_LEFTSHIFT), Some(HidUsage::Modifier(0x02)));
        assert_eq!(hid_usage(Key::BTN_RIGHT), Some(HidUsage::Mouse(0x02)));
        assert_eq!(hid_usage(Key::BTN_SOUTH), None);
    }

    #[test]
    fn default_codes_cover_both_triggers() {
        let codes = default_code_names();
        assert!(codes.contains(&(Key::BTN_TL2.code(), TRIGGER_LEFT)));
        assert!(codes.contains(&(Key::BTN_TR2.code(), TRIGGER_RIGHT)));
    }
}
