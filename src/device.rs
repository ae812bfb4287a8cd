use regex::Regex;
use std::sync::LazyLock;

pub const UNSET_ENTRY_LABEL: &str = "Select Input...";
pub const DEFAULT_INPUT_LABEL: &str = "Default Input";

static GENERIC_LABEL_PATTERNS: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        Regex::new(r"^Camera\s*\d+$").expect("valid generic label pattern"),
        Regex::new(r"^Camera$").expect("valid generic label pattern"),
    ]
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    VideoInput,
    Other,
}

/// A device as reported by the platform. Labels stay empty until permission is granted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub id: String,
    pub label: String,
    pub kind: DeviceKind,
}

impl Device {
    pub fn video_input(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind: DeviceKind::VideoInput,
        }
    }

    pub fn is_video_input(&self) -> bool {
        self.kind == DeviceKind::VideoInput
    }
}

/// Whether a label looks like a real device name.
///
/// Empty labels, `Camera`, `Camera N`, and the names this crate renders itself are generic.
/// A physical device whose vendor name is literally `Camera 2` is therefore treated as unlabelled.
pub fn is_real_label(label: &str) -> bool {
    let label = label.trim();
    if label.is_empty() || label == DEFAULT_INPUT_LABEL || label == UNSET_ENTRY_LABEL {
        return false;
    }
    !GENERIC_LABEL_PATTERNS
        .iter()
        .any(|pattern| pattern.is_match(label))
}

pub fn has_real_label(devices: &[Device]) -> bool {
    devices
        .iter()
        .any(|device| device.is_video_input() && is_real_label(&device.label))
}

/// One row of the device picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEntry {
    /// `None` for the reserved unset row.
    pub device_id: Option<String>,
    pub label: String,
}

/// Selectable device list. Index 0 is always the unset entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceList {
    entries: Vec<DeviceEntry>,
}

impl Default for DeviceList {
    fn default() -> Self {
        Self {
            entries: vec![unset_entry()],
        }
    }
}

impl DeviceList {
    pub fn from_devices(devices: &[Device]) -> Self {
        let mut entries = vec![unset_entry()];
        entries.extend(
            devices
                .iter()
                .filter(|device| device.is_video_input())
                .enumerate()
                .map(|(index, device)| DeviceEntry {
                    device_id: Some(device.id.clone()),
                    label: if device.label.trim().is_empty() {
                        format!("Camera {}", index + 1)
                    } else {
                        device.label.clone()
                    },
                }),
        );
        Self { entries }
    }

    pub fn entries(&self) -> &[DeviceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when only the unset entry is present.
    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }

    pub fn get(&self, index: usize) -> Option<&DeviceEntry> {
        self.entries.get(index)
    }

    pub fn position_of(&self, device_id: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.device_id.as_deref() == Some(device_id))
    }
}

fn unset_entry() -> DeviceEntry {
    DeviceEntry {
        device_id: None,
        label: UNSET_ENTRY_LABEL.to_string(),
    }
}
