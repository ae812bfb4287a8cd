use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ViewerError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewerConfig {
    #[serde(default)]
    pub enumeration: EnumerationSettings,
    #[serde(default)]
    pub permission: PermissionSettings,
    #[serde(default)]
    pub capture: CaptureSettings,
    #[serde(default)]
    pub overlay: OverlaySettings,
    #[serde(default)]
    pub loading: LoadingSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumerationSettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_check_interval", with = "duration_str")]
    pub check_interval: Duration,
    /// Measured from the first attempt.
    #[serde(default = "default_max_wait", with = "duration_str")]
    pub max_wait: Duration,
}

impl Default for EnumerationSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            check_interval: default_check_interval(),
            max_wait: default_max_wait(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSettings {
    #[serde(default = "default_settle_delay", with = "duration_str")]
    pub settle_delay: Duration,
}

impl Default for PermissionSettings {
    fn default() -> Self {
        Self {
            settle_delay: default_settle_delay(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureSettings {
    #[serde(default = "default_ideal_width")]
    pub ideal_width: u32,
    #[serde(default = "default_ideal_height")]
    pub ideal_height: u32,
    /// How long to wait for the surface to report it can begin playback.
    #[serde(default = "default_ready_timeout", with = "duration_str")]
    pub ready_timeout: Duration,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            ideal_width: default_ideal_width(),
            ideal_height: default_ideal_height(),
            ready_timeout: default_ready_timeout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlaySettings {
    #[serde(default = "default_hide_after", with = "duration_str")]
    pub hide_after: Duration,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            hide_after: default_hide_after(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadingSettings {
    #[serde(default = "default_init_delay", with = "duration_str")]
    pub init_delay: Duration,
    #[serde(default = "default_ui_prep_delay", with = "duration_str")]
    pub ui_prep_delay: Duration,
    #[serde(default = "default_finalize_delay", with = "duration_str")]
    pub finalize_delay: Duration,
    /// Pause between the last stage and the switch to the capture screen.
    #[serde(default = "default_transition_delay", with = "duration_str")]
    pub transition_delay: Duration,
}

impl Default for LoadingSettings {
    fn default() -> Self {
        Self {
            init_delay: default_init_delay(),
            ui_prep_delay: default_ui_prep_delay(),
            finalize_delay: default_finalize_delay(),
            transition_delay: default_transition_delay(),
        }
    }
}

fn default_max_attempts() -> u32 {
    5
}

fn default_check_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_max_wait() -> Duration {
    Duration::from_secs(15)
}

fn default_settle_delay() -> Duration {
    Duration::from_millis(300)
}

fn default_ideal_width() -> u32 {
    1920
}

fn default_ideal_height() -> u32 {
    1080
}

fn default_ready_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_hide_after() -> Duration {
    Duration::from_secs(3)
}

fn default_init_delay() -> Duration {
    Duration::from_millis(200)
}

fn default_ui_prep_delay() -> Duration {
    Duration::from_millis(200)
}

fn default_finalize_delay() -> Duration {
    Duration::from_millis(200)
}

fn default_transition_delay() -> Duration {
    Duration::from_millis(300)
}

impl ViewerConfig {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read viewer config {}", path.display()))?;

        let config: Self = toml::from_str(&text).with_context(|| {
            format!(
                "failed to parse viewer config {} (expected TOML)",
                path.display()
            )
        })?;

        config
            .validate()
            .with_context(|| format!("invalid viewer config {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> std::result::Result<(), ViewerError> {
        if self.enumeration.max_attempts == 0 {
            return Err(ViewerError::config("enumeration.max_attempts must be at least 1"));
        }
        if self.enumeration.check_interval.is_zero() {
            return Err(ViewerError::config(
                "enumeration.check_interval must be greater than 0",
            ));
        }
        if self.enumeration.max_wait.is_zero() {
            return Err(ViewerError::config("enumeration.max_wait must be greater than 0"));
        }
        if self.capture.ideal_width == 0 || self.capture.ideal_height == 0 {
            return Err(ViewerError::config("capture resolution must be non-zero"));
        }
        Ok(())
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize viewer config")
    }
}

pub fn write_sample_config(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).with_context(|| {
            format!(
                "failed to create config parent directory {}",
                parent.display()
            )
        })?;
    }

    let sample = r#"# FullCap viewer configuration (TOML)
#
# Every key is optional. Durations accept human-readable values such as "500ms" or "15s".

[enumeration]
# Device list polls until a real (non-generic) device label shows up.
max_attempts = 5
check_interval = "500ms"
max_wait = "15s"

[permission]
# Pause after the permission prompt so labels have time to populate.
settle_delay = "300ms"

[capture]
ideal_width = 1920
ideal_height = 1080
ready_timeout = "5s"

[overlay]
hide_after = "3s"

[loading]
init_delay = "200ms"
ui_prep_delay = "200ms"
finalize_delay = "200ms"
transition_delay = "300ms"
"#;

    std::fs::write(path, sample)
        .with_context(|| format!("failed to write sample config {}", path.display()))?;
    Ok(())
}

mod duration_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(raw.trim()).map_err(serde::de::Error::custom)
    }
}
