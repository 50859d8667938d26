//! Mapping configuration
//!
//! The TOML document is deserialized into raw `serde` structs carrying the
//! documented defaults, then validated into an immutable [`MappingConfig`].
//! Every key name is resolved here; nothing downstream looks up symbols
//! by name at runtime.

use crate::error::ConfigError;
use crate::keys::{self, TRIGGER_LEFT, TRIGGER_RIGHT};
use evdev::Key;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Logical role of a physical input source
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Controller,
    Touchpad,
    Motion,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Controller => "controller",
            Role::Touchpad => "touchpad",
            Role::Motion => "motion",
        })
    }
}

/// Stick side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

/// Stick axes, by evdev absolute axis code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StickAxis {
    LeftX,
    LeftY,
    RightX,
    RightY,
}

impl StickAxis {
    pub const ALL: [StickAxis; 4] = [
        StickAxis::LeftX,
        StickAxis::LeftY,
        StickAxis::RightX,
        StickAxis::RightY,
    ];

    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|axis| axis.code() == code)
    }

    /// ABS_X / ABS_Y / ABS_RX / ABS_RY
    pub fn code(self) -> u16 {
        match self {
            StickAxis::LeftX => 0x00,
            StickAxis::LeftY => 0x01,
            StickAxis::RightX => 0x03,
            StickAxis::RightY => 0x04,
        }
    }

    pub fn side(self) -> Side {
        match self {
            StickAxis::LeftX | StickAxis::LeftY => Side::Left,
            StickAxis::RightX | StickAxis::RightY => Side::Right,
        }
    }

    pub fn is_x(self) -> bool {
        matches!(self, StickAxis::LeftX | StickAxis::RightX)
    }
}

/// Analog triggers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    Left,
    Right,
}

impl Trigger {
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0x02 => Some(Trigger::Left),
            0x05 => Some(Trigger::Right),
            _ => None,
        }
    }

    /// ABS_Z / ABS_RZ
    pub fn code(self) -> u16 {
        match self {
            Trigger::Left => 0x02,
            Trigger::Right => 0x05,
        }
    }

    /// Logical name shared by the analog axis and the digital button
    pub fn logical_name(self) -> &'static str {
        match self {
            Trigger::Left => TRIGGER_LEFT,
            Trigger::Right => TRIGGER_RIGHT,
        }
    }

    pub fn from_logical_name(name: &str) -> Option<Self> {
        match name {
            TRIGGER_LEFT => Some(Trigger::Left),
            TRIGGER_RIGHT => Some(Trigger::Right),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Raw document
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DevicesDoc {
    Keyword(String),
    Paths(BTreeMap<Role, String>),
}

impl Default for DevicesDoc {
    fn default() -> Self {
        DevicesDoc::Keyword("auto".to_string())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StickDoc {
    #[serde(default = "default_center")]
    center: i32,
    #[serde(default = "default_deadzone")]
    deadzone: i32,
    #[serde(default = "default_sensitivity")]
    sensitivity: f64,
    #[serde(default)]
    invert_x: bool,
    #[serde(default)]
    invert_y: bool,
}

fn default_center() -> i32 {
    128
}
fn default_deadzone() -> i32 {
    10
}
fn default_sensitivity() -> f64 {
    1.0
}

impl Default for StickDoc {
    fn default() -> Self {
        Self {
            center: default_center(),
            deadzone: default_deadzone(),
            sensitivity: default_sensitivity(),
            invert_x: false,
            invert_y: false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SticksDoc {
    #[serde(default)]
    left: StickDoc,
    #[serde(default)]
    right: StickDoc,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RapidFireDoc {
    #[serde(default)]
    enabled_by_default: bool,
    #[serde(default = "default_rate_hz")]
    rate_hz: f64,
    #[serde(default = "default_rapid_fire_button")]
    button: String,
}

fn default_rate_hz() -> f64 {
    15.0
}
fn default_rapid_fire_button() -> String {
    "BTN_RIGHT".to_string()
}

impl Default for RapidFireDoc {
    fn default() -> Self {
        Self {
            enabled_by_default: false,
            rate_hz: default_rate_hz(),
            button: default_rapid_fire_button(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MouseDoc {
    #[serde(default = "default_mouse_sensitivity")]
    sensitivity: f64,
    #[serde(default)]
    rapid_fire: RapidFireDoc,
}

fn default_mouse_sensitivity() -> f64 {
    6.0
}

impl Default for MouseDoc {
    fn default() -> Self {
        Self {
            sensitivity: default_mouse_sensitivity(),
            rapid_fire: RapidFireDoc::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TriggersDoc {
    #[serde(default = "default_threshold")]
    l2: i32,
    #[serde(default = "default_threshold")]
    r2: i32,
}

fn default_threshold() -> i32 {
    100
}

impl Default for TriggersDoc {
    fn default() -> Self {
        Self {
            l2: default_threshold(),
            r2: default_threshold(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct KeyPairDoc {
    negative: String,
    positive: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum PointerDoc {
    Left,
    Right,
    None,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct MappingDoc {
    pointer: Option<PointerDoc>,
    axes: Option<HashMap<StickAxis, KeyPairDoc>>,
    buttons: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct OutputDoc {
    name: Option<String>,
    hid_gadget: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigDoc {
    #[serde(default)]
    devices: DevicesDoc,
    #[serde(default)]
    stick: SticksDoc,
    #[serde(default)]
    mouse: MouseDoc,
    #[serde(default)]
    triggers: TriggersDoc,
    #[serde(default)]
    codes: BTreeMap<String, String>,
    #[serde(default)]
    mapping: MappingDoc,
    #[serde(default)]
    output: OutputDoc,
}

// ---------------------------------------------------------------------------
// Validated model
// ---------------------------------------------------------------------------

/// Which physical sources to open
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSelection {
    /// Scan all input devices
    Auto,
    /// Explicit role → path table
    Paths(BTreeMap<Role, PathBuf>),
}

/// Per-side stick settings
#[derive(Debug, Clone, PartialEq)]
pub struct StickConfig {
    pub center: i32,
    pub deadzone: i32,
    pub sensitivity: f64,
    pub invert_x: bool,
    pub invert_y: bool,
}

impl Default for StickConfig {
    fn default() -> Self {
        Self {
            center: default_center(),
            deadzone: default_deadzone(),
            sensitivity: default_sensitivity(),
            invert_x: false,
            invert_y: false,
        }
    }
}

impl StickConfig {
    pub fn invert(&self, axis: StickAxis) -> bool {
        if axis.is_x() {
            self.invert_x
        } else {
            self.invert_y
        }
    }
}

/// Rapid-fire settings
#[derive(Debug, Clone, PartialEq)]
pub struct RapidFireConfig {
    pub enabled_by_default: bool,
    pub rate_hz: f64,
    pub button: Key,
}

/// Negative/positive output keys of a discrete-pair axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPair {
    pub negative: Key,
    pub positive: Key,
}

/// Virtual output device settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    pub name: String,
    pub hid_gadget: Option<PathBuf>,
}

/// Immutable, validated mapping configuration
#[derive(Debug, Clone)]
pub struct MappingConfig {
    pub devices: DeviceSelection,
    pub left_stick: StickConfig,
    pub right_stick: StickConfig,
    pub mouse_sensitivity: f64,
    pub rapid_fire: RapidFireConfig,
    pub l2_threshold: i32,
    pub r2_threshold: i32,
    /// Stick driving relative pointer motion
    pub pointer: Option<Side>,
    /// Native code → logical name, defaults merged with user entries
    pub codes: HashMap<u16, String>,
    /// Logical name → output key
    pub buttons: HashMap<String, Key>,
    /// Discrete-pair axes
    pub axes: HashMap<StickAxis, KeyPair>,
    pub output: OutputConfig,
}

impl Default for MappingConfig {
    fn default() -> Self {
        // The built-in document always validates
        match validate(ConfigDoc::default()) {
            Ok(config) => config,
            Err(e) => unreachable!("built-in defaults are invalid: {e}"),
        }
    }
}

impl MappingConfig {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ds-mapper")
            .join("config.toml")
    }

    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let doc: ConfigDoc = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        validate(doc)
    }

    /// Parse and validate a config document held in memory
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let doc: ConfigDoc = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<memory>"),
            source,
        })?;
        validate(doc)
    }

    pub fn stick(&self, side: Side) -> &StickConfig {
        match side {
            Side::Left => &self.left_stick,
            Side::Right => &self.right_stick,
        }
    }

    pub fn trigger_threshold(&self, trigger: Trigger) -> i32 {
        match trigger {
            Trigger::Left => self.l2_threshold,
            Trigger::Right => self.r2_threshold,
        }
    }

    /// Whether an axis drives relative pointer motion
    pub fn is_pointer_axis(&self, axis: StickAxis) -> bool {
        self.pointer == Some(axis.side())
    }

    /// Resolve a native key code to its logical name
    pub fn logical_name(&self, code: u16) -> Option<&str> {
        self.codes.get(&code).map(String::as_str)
    }

    /// Resolve a logical name to its output key
    pub fn output_key(&self, logical: &str) -> Option<Key> {
        self.buttons.get(logical).copied()
    }
}

fn resolve_key(name: &str, context: &str) -> Result<Key, ConfigError> {
    keys::key_from_name(name)
        .ok_or_else(|| ConfigError::Validation(format!("{context}: unknown key \"{name}\"")))
}

fn parse_code(raw: &str) -> Result<u16, ConfigError> {
    let trimmed = raw.trim();
    let parsed = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => trimmed.parse::<u16>(),
    };
    parsed.map_err(|_| ConfigError::Validation(format!("codes: invalid key code \"{raw}\"")))
}

fn validate_stick(doc: StickDoc, side: &str) -> Result<StickConfig, ConfigError> {
    if doc.deadzone < 0 {
        return Err(ConfigError::Validation(format!(
            "stick.{side}.deadzone must be >= 0, got {}",
            doc.deadzone
        )));
    }
    if !(doc.sensitivity.is_finite() && doc.sensitivity > 0.0) {
        return Err(ConfigError::Validation(format!(
            "stick.{side}.sensitivity must be > 0, got {}",
            doc.sensitivity
        )));
    }
    Ok(StickConfig {
        center: doc.center,
        deadzone: doc.deadzone,
        sensitivity: doc.sensitivity,
        invert_x: doc.invert_x,
        invert_y: doc.invert_y,
    })
}

fn default_buttons() -> BTreeMap<String, String> {
    [
        ("cross", "KEY_SPACE"),
        ("circle", "KEY_ENTER"),
        ("triangle", "KEY_E"),
        ("square", "KEY_Q"),
        ("options", "KEY_ESC"),
        ("create", "KEY_TAB"),
        ("l1", "KEY_LEFTSHIFT"),
        ("r1", "KEY_LEFTCTRL"),
        (TRIGGER_LEFT, "BTN_LEFT"),
        ("touchpad", "BTN_LEFT"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_axes() -> HashMap<StickAxis, KeyPairDoc> {
    [
        (StickAxis::LeftX, ("KEY_A", "KEY_D")),
        (StickAxis::LeftY, ("KEY_W", "KEY_S")),
    ]
    .into_iter()
    .map(|(axis, (negative, positive))| {
        (
            axis,
            KeyPairDoc {
                negative: negative.to_string(),
                positive: positive.to_string(),
            },
        )
    })
    .collect()
}

fn validate(doc: ConfigDoc) -> Result<MappingConfig, ConfigError> {
    let devices = match doc.devices {
        DevicesDoc::Keyword(word) if word.eq_ignore_ascii_case("auto") => DeviceSelection::Auto,
        DevicesDoc::Keyword(word) => {
            return Err(ConfigError::Validation(format!(
                "devices: expected \"auto\" or a role table, got \"{word}\""
            )))
        }
        DevicesDoc::Paths(paths) if paths.values().any(|p| p.eq_ignore_ascii_case("auto")) => {
            DeviceSelection::Auto
        }
        DevicesDoc::Paths(paths) if paths.is_empty() => DeviceSelection::Auto,
        DevicesDoc::Paths(paths) => DeviceSelection::Paths(
            paths
                .into_iter()
                .map(|(role, path)| (role, PathBuf::from(path)))
                .collect(),
        ),
    };

    let left_stick = validate_stick(doc.stick.left, "left")?;
    let right_stick = validate_stick(doc.stick.right, "right")?;

    let mouse_sensitivity = doc.mouse.sensitivity;
    if !(mouse_sensitivity.is_finite() && mouse_sensitivity > 0.0) {
        return Err(ConfigError::Validation(format!(
            "mouse.sensitivity must be > 0, got {mouse_sensitivity}"
        )));
    }

    let rf = doc.mouse.rapid_fire;
    if !(rf.rate_hz.is_finite() && rf.rate_hz > 0.0) {
        return Err(ConfigError::Validation(format!(
            "mouse.rapid_fire.rate_hz must be > 0, got {}",
            rf.rate_hz
        )));
    }
    // The click period must fit a Duration
    if Duration::try_from_secs_f64(1.0 / rf.rate_hz).is_err() {
        return Err(ConfigError::Validation(format!(
            "mouse.rapid_fire.rate_hz is too low, got {}",
            rf.rate_hz
        )));
    }
    let rapid_fire = RapidFireConfig {
        enabled_by_default: rf.enabled_by_default,
        rate_hz: rf.rate_hz,
        button: resolve_key(&rf.button, "mouse.rapid_fire.button")?,
    };

    for (name, value) in [("l2", doc.triggers.l2), ("r2", doc.triggers.r2)] {
        if value < 0 {
            return Err(ConfigError::Validation(format!(
                "triggers.{name} must be >= 0, got {value}"
            )));
        }
    }

    let mut codes: HashMap<u16, String> = keys::default_code_names()
        .into_iter()
        .map(|(code, name)| (code, name.to_string()))
        .collect();
    for (raw, name) in doc.codes {
        codes.insert(parse_code(&raw)?, name);
    }

    let pointer = match doc.mapping.pointer {
        None | Some(PointerDoc::Right) => Some(Side::Right),
        Some(PointerDoc::Left) => Some(Side::Left),
        Some(PointerDoc::None) => None,
    };

    let buttons = doc
        .mapping
        .buttons
        .unwrap_or_else(default_buttons)
        .into_iter()
        .map(|(logical, key)| {
            let key = resolve_key(&key, &format!("mapping.buttons.{logical}"))?;
            Ok((logical, key))
        })
        .collect::<Result<HashMap<_, _>, ConfigError>>()?;

    let mut axes = HashMap::new();
    for (axis, pair) in doc.mapping.axes.unwrap_or_else(default_axes) {
        if pointer == Some(axis.side()) {
            return Err(ConfigError::Validation(format!(
                "mapping.axes: {axis:?} belongs to the pointer stick"
            )));
        }
        let context = format!("mapping.axes.{axis:?}");
        axes.insert(
            axis,
            KeyPair {
                negative: resolve_key(&pair.negative, &context)?,
                positive: resolve_key(&pair.positive, &context)?,
            },
        );
    }

    Ok(MappingConfig {
        devices,
        left_stick,
        right_stick,
        mouse_sensitivity,
        rapid_fire,
        l2_threshold: doc.triggers.l2,
        r2_threshold: doc.triggers.r2,
        pointer,
        codes,
        buttons,
        axes,
        output: OutputConfig {
            name: doc.output.name.unwrap_or_else(|| "DS-Mapper".to_string()),
            hid_gadget: doc.output.hid_gadget,
        },
    })
}
