//! Input source discovery and role classification

use crate::config::{DeviceSelection, Role};
use crate::device::{Capabilities, InputDevice};
use crate::error::DiscoveryError;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Sony Interactive Entertainment
pub const SONY_VENDOR: u16 = 0x054C;

/// DualSense and DualSense Edge
pub const DUALSENSE_PRODUCTS: &[u16] = &[0x0CE6, 0x0DF2];

const ABS_X: u16 = 0x00;
const ABS_Y: u16 = 0x01;
const ABS_Z: u16 = 0x02;
const ABS_RX: u16 = 0x03;
const ABS_RY: u16 = 0x04;
const ABS_RZ: u16 = 0x05;
const BTN_LEFT: u16 = 0x110;

/// Axes a motion sensor node reports
const MOTION_AXES: &[u16] = &[ABS_X, ABS_Y, ABS_Z, ABS_RX, ABS_RY, ABS_RZ];

/// Classify one source by its declared capabilities
pub fn classify(caps: &Capabilities) -> Option<Role> {
    // Checked before the stick rule: DualSense motion nodes declare RX/RY
    // as angular rates and would otherwise classify as a controller
    if caps.accelerometer {
        return Some(Role::Motion);
    }
    let stick = caps.has_abs(ABS_RX) && caps.has_abs(ABS_RY);
    if stick {
        return Some(Role::Controller);
    }
    if caps.has_key(BTN_LEFT) && !caps.has_abs(ABS_RX) && !caps.has_abs(ABS_RY) {
        return Some(Role::Touchpad);
    }
    if MOTION_AXES.iter().any(|&axis| caps.has_abs(axis)) {
        return Some(Role::Motion);
    }
    None
}

/// Resolve roles over candidates in enumeration order. First match per role wins.
pub fn resolve_roles(
    candidates: &[(PathBuf, Capabilities)],
    vendor: u16,
    products: &[u16],
) -> BTreeMap<Role, PathBuf> {
    let mut roles = BTreeMap::new();
    for (path, caps) in candidates {
        if caps.vendor != vendor || !products.contains(&caps.product) {
            continue;
        }
        let Some(role) = classify(caps) else {
            debug!("Skipping {}: {}", path.display(), caps.name);
            continue;
        };
        roles.entry(role).or_insert_with(|| {
            info!("Found {role}: {} ({})", path.display(), caps.name);
            path.clone()
        });
    }
    roles
}

/// First gamepad-like source across all vendors
pub fn find_gamepad_like(candidates: &[(PathBuf, Capabilities)]) -> Option<PathBuf> {
    candidates
        .iter()
        .find(|(_, caps)| !caps.accelerometer && caps.keys.len() > 10 && caps.abs_axes.len() > 4)
        .map(|(path, caps)| {
            info!("Found alternative controller: {} ({})", path.display(), caps.name);
            path.clone()
        })
}

/// Numeric suffix of `/dev/input/eventN`, for a stable scan order
fn event_index(path: &Path) -> u32 {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.strip_prefix("event"))
        .and_then(|n| n.parse().ok())
        .unwrap_or(u32::MAX)
}

/// Capability descriptors of every readable input device
pub fn enumerate_candidates() -> Vec<(PathBuf, Capabilities)> {
    let mut candidates: Vec<(PathBuf, Capabilities)> = evdev::enumerate()
        .map(|(path, device)| {
            let caps = Capabilities::of(&device);
            (path, caps)
        })
        .collect();
    candidates.sort_by_key(|(path, _)| event_index(path));
    candidates
}

/// Scan input devices of one manufacturer
pub fn discover(vendor: u16, products: &[u16]) -> Result<BTreeMap<Role, PathBuf>, DiscoveryError> {
    discover_from(&enumerate_candidates(), vendor, products)
}

/// [`discover`] over an already enumerated candidate list
pub fn discover_from(
    candidates: &[(PathBuf, Capabilities)],
    vendor: u16,
    products: &[u16],
) -> Result<BTreeMap<Role, PathBuf>, DiscoveryError> {
    let roles = resolve_roles(candidates, vendor, products);
    if roles.contains_key(&Role::Controller) {
        Ok(roles)
    } else {
        Err(DiscoveryError::NoControllerFound)
    }
}

/// Scan for a DualSense, falling back to any gamepad-like device
pub fn auto_detect() -> Result<BTreeMap<Role, PathBuf>, DiscoveryError> {
    auto_detect_from(&enumerate_candidates())
}

/// [`auto_detect`] over an already enumerated candidate list
pub fn auto_detect_from(
    candidates: &[(PathBuf, Capabilities)],
) -> Result<BTreeMap<Role, PathBuf>, DiscoveryError> {
    let mut roles = resolve_roles(candidates, SONY_VENDOR, DUALSENSE_PRODUCTS);
    if !roles.contains_key(&Role::Controller) {
        warn!("No DualSense controller found, looking for any gamepad-like device");
        if let Some(path) = find_gamepad_like(candidates) {
            roles.insert(Role::Controller, path);
        }
    }
    if roles.contains_key(&Role::Controller) {
        Ok(roles)
    } else {
        Err(DiscoveryError::NoControllerFound)
    }
}

/// Pick the role table: configured paths unless `force_auto`, else `scan`.
///
/// A configured table without a controller is rejected before any scan.
pub fn select_roles(
    selection: &DeviceSelection,
    force_auto: bool,
    scan: impl FnOnce() -> Result<BTreeMap<Role, PathBuf>, DiscoveryError>,
) -> Result<BTreeMap<Role, PathBuf>, DiscoveryError> {
    match selection {
        DeviceSelection::Paths(paths) if !force_auto => {
            if !paths.contains_key(&Role::Controller) {
                return Err(DiscoveryError::NoControllerFound);
            }
            Ok(paths.clone())
        }
        _ => scan(),
    }
}

/// Open each role with `open`.
///
/// A controller that cannot be opened is fatal; other roles are skipped
/// with a warning.
pub fn open_roles<T>(
    roles: BTreeMap<Role, PathBuf>,
    mut open: impl FnMut(&Path, Role) -> Result<T, DiscoveryError>,
) -> Result<Vec<T>, DiscoveryError> {
    let mut devices = Vec::with_capacity(roles.len());
    for (role, path) in roles {
        match open(&path, role) {
            Ok(device) => devices.push(device),
            Err(e) if role == Role::Controller => return Err(e),
            Err(e) => warn!("{e}; continuing without {role}"),
        }
    }
    Ok(devices)
}

/// Select and open every input source
pub fn open_devices(
    selection: &DeviceSelection,
    force_auto: bool,
) -> Result<Vec<InputDevice>, DiscoveryError> {
    let roles = select_roles(selection, force_auto, auto_detect)?;
    open_roles(roles, InputDevice::open)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dualsense(product: u16, abs_axes: &[u16], keys: &[u16], accelerometer: bool) -> Capabilities {
        Capabilities {
            name: "DualSense Wireless Controller".to_string(),
            vendor: SONY_VENDOR,
            product,
            abs_axes: abs_axes.to_vec(),
            keys: keys.to_vec(),
            accelerometer,
        }
    }

    fn controller() -> Capabilities {
        dualsense(
            0x0CE6,
            &[ABS_X, ABS_Y, ABS_Z, ABS_RX, ABS_RY, ABS_RZ],
            &[304, 305, 307, 308, 310, 311, 312, 313, 314, 315, 316, 317, 318],
            false,
        )
    }

    fn touchpad() -> Capabilities {
        dualsense(0x0CE6, &[ABS_X, ABS_Y, 0x2f, 0x35, 0x36, 0x39], &[BTN_LEFT, 0x14a], false)
    }

    fn motion() -> Capabilities {
        dualsense(0x0CE6, &[ABS_X, ABS_Y, ABS_Z, ABS_RX, ABS_RY, ABS_RZ], &[], true)
    }

    #[test]
    fn test_classify_dualsense_nodes() {
        assert_eq!(classify(&controller()), Some(Role::Controller));
        assert_eq!(classify(&touchpad()), Some(Role::Touchpad));
        assert_eq!(classify(&motion()), Some(Role::Motion));
        assert_eq!(classify(&dualsense(0x0CE6, &[], &[], false)), None);
    }

    #[test]
    fn test_resolve_first_match_wins() {
        let candidates = vec![
            (PathBuf::from("/dev/input/event3"), motion()),
            (PathBuf::from("/dev/input/event4"), controller()),
            (PathBuf::from("/dev/input/event5"), touchpad()),
            (PathBuf::from("/dev/input/event9"), controller()),
        ];
        let roles = resolve_roles(&candidates, SONY_VENDOR, DUALSENSE_PRODUCTS);
        assert_eq!(roles.len(), 3);
        assert_eq!(roles[&Role::Controller], PathBuf::from("/dev/input/event4"));
        assert_eq!(roles[&Role::Touchpad], PathBuf::from("/dev/input/event5"));
        assert_eq!(roles[&Role::Motion], PathBuf::from("/dev/input/event3"));
    }

    #[test]
    fn test_resolve_rejects_foreign_vendor() {
        let mut foreign = controller();
        foreign.vendor = 0x045E;
        let mut edge = controller();
        edge.product = 0x0DF2;
        let candidates = vec![
            (PathBuf::from("/dev/input/event1"), foreign),
            (PathBuf::from("/dev/input/event2"), edge),
        ];
        let roles = resolve_roles(&candidates, SONY_VENDOR, DUALSENSE_PRODUCTS);
        assert_eq!(roles[&Role::Controller], PathBuf::from("/dev/input/event2"));
    }

    #[test]
    fn test_auto_detect_without_controller_fails() {
        let candidates = vec![
            (PathBuf::from("/dev/input/event5"), touchpad()),
            (PathBuf::from("/dev/input/event6"), motion()),
        ];
        assert!(matches!(
            auto_detect_from(&candidates),
            Err(DiscoveryError::NoControllerFound)
        ));
        assert!(matches!(
            auto_detect_from(&[]),
            Err(DiscoveryError::NoControllerFound)
        ));
    }

    #[test]
    fn test_auto_detect_falls_back_to_gamepad_like() {
        let mut pad = controller();
        pad.vendor = 0x045E;
        pad.product = 0x028E;
        let candidates = vec![(PathBuf::from("/dev/input/event7"), pad)];
        let roles = auto_detect_from(&candidates).unwrap();
        assert_eq!(roles[&Role::Controller], PathBuf::from("/dev/input/event7"));
    }

    #[test]
    fn test_explicit_paths_require_controller() {
        let mut paths = BTreeMap::new();
        paths.insert(Role::Touchpad, PathBuf::from("/dev/input/event5"));
        let result = open_devices(&DeviceSelection::Paths(paths), false);
        assert!(matches!(result, Err(DiscoveryError::NoControllerFound)));
    }

    #[test]
    fn test_discover_filters_by_manufacturer() {
        let mut foreign = controller();
        foreign.vendor = 0x045E;
        let candidates = vec![
            (PathBuf::from("/dev/input/event2"), foreign),
            (PathBuf::from("/dev/input/event5"), touchpad()),
        ];
        // a foreign gamepad is not a fallback for an explicit manufacturer scan
        assert!(matches!(
            discover_from(&candidates, SONY_VENDOR, DUALSENSE_PRODUCTS),
            Err(DiscoveryError::NoControllerFound)
        ));

        let roles = discover_from(&candidates, 0x045E, &[0x0CE6]).unwrap();
        assert_eq!(roles.len(), 1);
        assert_eq!(roles[&Role::Controller], PathBuf::from("/dev/input/event2"));
    }

    fn selected_paths() -> BTreeMap<Role, PathBuf> {
        BTreeMap::from([
            (Role::Controller, PathBuf::from("/dev/input/event4")),
            (Role::Touchpad, PathBuf::from("/dev/input/event5")),
            (Role::Motion, PathBuf::from("/dev/input/event6")),
        ])
    }

    fn denied(path: &Path) -> DiscoveryError {
        DiscoveryError::Open {
            path: path.to_path_buf(),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        }
    }

    #[test]
    fn test_select_roles_prefers_configured_paths() {
        let selection = DeviceSelection::Paths(selected_paths());
        let roles = select_roles(&selection, false, || panic!("no scan expected")).unwrap();
        assert_eq!(roles, selected_paths());

        let scanned = BTreeMap::from([(Role::Controller, PathBuf::from("/dev/input/event9"))]);
        let roles = select_roles(&selection, true, || Ok(scanned.clone())).unwrap();
        assert_eq!(roles, scanned);
        let roles = select_roles(&DeviceSelection::Auto, false, || Ok(scanned.clone())).unwrap();
        assert_eq!(roles, scanned);
    }

    #[test]
    fn test_unopenable_touchpad_is_skipped() {
        let opened = open_roles(selected_paths(), |path, role| {
            if role == Role::Touchpad {
                Err(denied(path))
            } else {
                Ok((role, path.to_path_buf()))
            }
        })
        .unwrap();
        assert_eq!(
            opened,
            vec![
                (Role::Controller, PathBuf::from("/dev/input/event4")),
                (Role::Motion, PathBuf::from("/dev/input/event6")),
            ]
        );
    }

    #[test]
    fn test_unopenable_controller_is_fatal() {
        let mut attempts = Vec::new();
        let result = open_roles(selected_paths(), |path, role| {
            attempts.push(role);
            if role == Role::Controller {
                Err(denied(path))
            } else {
                Ok(role)
            }
        });
        let Err(DiscoveryError::Open { path, .. }) = result else {
            panic!("Expected an open error, got {result:?}");
        };
        assert_eq!(path, PathBuf::from("/dev/input/event4"));
        // controller sorts first, so nothing else was opened
        assert_eq!(attempts, vec![Role::Controller]);
    }

    #[test]
    fn test_event_index_ordering() {
        assert_eq!(event_index(Path::new("/dev/input/event12")), 12);
        assert_eq!(event_index(Path::new("/dev/input/js0")), u32::MAX);
    }
}
