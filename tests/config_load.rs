//! Integration tests for loading mapping config files from disk.

use ds_mapper::{ConfigError, DeviceSelection, MappingConfig, Role, Side, StickAxis};
use evdev::Key;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

// ── full documents ──

#[test]
fn loads_full_document() {
    let file = write_config(
        r#"
[devices]
controller = "/dev/input/event20"
touchpad = "/dev/input/event21"
motion = "/dev/input/event22"

[stick.left]
center = 127
deadzone = 12
invert_y = true

[stick.right]
sensitivity = 1.5

[mouse]
sensitivity = 4.0

[mouse.rapid_fire]
enabled_by_default = true
rate_hz = 10
button = "BTN_LEFT"

[triggers]
l2 = 80
r2 = 60

[codes]
0x13c = "home"

[mapping]
pointer = "right"

[mapping.axes]
left_x = { negative = "KEY_LEFT", positive = "KEY_RIGHT" }

[mapping.buttons]
cross = "KEY_SPACE"
home = "KEY_F1"
r2 = "KEY_R"

[output]
name = "Pad Keys"
hid_gadget = "/dev/hidg0"
"#,
    );

    let config = MappingConfig::load(file.path()).unwrap();

    let DeviceSelection::Paths(paths) = &config.devices else {
        panic!("Expected explicit device paths");
    };
    assert_eq!(paths[&Role::Motion], PathBuf::from("/dev/input/event22"));

    assert_eq!(config.left_stick.center, 127);
    assert_eq!(config.left_stick.deadzone, 12);
    assert!(config.left_stick.invert_y);
    assert_eq!(config.right_stick.sensitivity, 1.5);
    assert_eq!(config.mouse_sensitivity, 4.0);
    assert!(config.rapid_fire.enabled_by_default);
    assert_eq!(config.rapid_fire.rate_hz, 10.0);
    assert_eq!(config.rapid_fire.button, Key::BTN_LEFT);
    assert_eq!(config.l2_threshold, 80);
    assert_eq!(config.r2_threshold, 60);
    assert_eq!(config.logical_name(0x13c), Some("home"));
    assert_eq!(config.pointer, Some(Side::Right));
    assert_eq!(config.axes.len(), 1);
    assert_eq!(config.axes[&StickAxis::LeftX].negative, Key::KEY_LEFT);
    assert_eq!(config.output_key("home"), Some(Key::KEY_F1));
    assert_eq!(config.output_key("r2"), Some(Key::KEY_R));
    assert_eq!(config.output.name, "Pad Keys");
    assert_eq!(config.output.hid_gadget, Some(PathBuf::from("/dev/hidg0")));
}

#[test]
fn empty_file_uses_defaults() {
    let file = write_config("");
    let config = MappingConfig::load(file.path()).unwrap();
    assert_eq!(config.devices, DeviceSelection::Auto);
    assert_eq!(config.output_key("cross"), Some(Key::KEY_SPACE));
    assert_eq!(config.output_key("l2"), Some(Key::BTN_LEFT));
    assert_eq!(config.output_key("r2"), None);
}

#[test]
fn auto_keyword_selects_scan() {
    let file = write_config("devices = \"auto\"\n");
    let config = MappingConfig::load(file.path()).unwrap();
    assert_eq!(config.devices, DeviceSelection::Auto);
}

// ── failures ──

#[test]
fn missing_file_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    let err = MappingConfig::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::NotFound { .. }));
    assert!(err.to_string().contains("absent.toml"));
}

#[test]
fn structural_errors_are_parse_errors() {
    let file = write_config("[mouse]\nsensitivity = [1, 2]\n");
    let err = MappingConfig::load(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "{err}");

    let file = write_config("[unknown_section]\nx = 1\n");
    let err = MappingConfig::load(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "{err}");
}

#[test]
fn numeric_constraints_are_validation_errors() {
    for doc in [
        "[stick.left]\ndeadzone = -5\n",
        "[stick.right]\nsensitivity = -1.0\n",
        "[mouse]\nsensitivity = 0\n",
        "[mouse.rapid_fire]\nrate_hz = -3\n",
        "[triggers]\nr2 = -1\n",
        "[mouse.rapid_fire]\nbutton = \"BTN_NOPE\"\n",
    ] {
        let file = write_config(doc);
        let err = MappingConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)), "{doc}: {err}");
    }
}
