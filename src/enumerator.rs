use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, info, warn};

use crate::config::EnumerationSettings;
use crate::device::{Device, DeviceList, has_real_label};
use crate::error::ViewerError;
use crate::platform::MediaDevices;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumerationPolicy {
    pub max_attempts: u32,
    pub check_interval: Duration,
    pub max_wait: Duration,
}

impl Default for EnumerationPolicy {
    fn default() -> Self {
        Self::from(&EnumerationSettings::default())
    }
}

impl From<&EnumerationSettings> for EnumerationPolicy {
    fn from(settings: &EnumerationSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            check_interval: settings.check_interval,
            max_wait: settings.max_wait,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EnumerationOutcome {
    pub devices: DeviceList,
    /// False when no real label was seen within the budget.
    pub resolved: bool,
    pub attempts: u32,
    pub elapsed: Duration,
}

impl EnumerationOutcome {
    pub fn into_result(self) -> Result<DeviceList, ViewerError> {
        if self.resolved {
            Ok(self.devices)
        } else {
            Err(ViewerError::EnumerationIncomplete {
                attempts: self.attempts,
                elapsed: self.elapsed,
            })
        }
    }
}

/// Polls the platform until device labels look real or the budget runs out.
///
/// Holds no state between runs, so the dropdown can call it again for hot-plugged devices.
#[derive(Clone)]
pub struct DeviceEnumerator {
    devices: Arc<dyn MediaDevices>,
    policy: EnumerationPolicy,
}

impl DeviceEnumerator {
    pub fn new(devices: Arc<dyn MediaDevices>, policy: EnumerationPolicy) -> Self {
        Self { devices, policy }
    }

    pub fn policy(&self) -> EnumerationPolicy {
        self.policy
    }

    pub async fn enumerate(&self) -> EnumerationOutcome {
        let start = Instant::now();
        let deadline = start + self.policy.max_wait;
        let mut attempts: u32 = 0;
        let mut latest: Vec<Device> = Vec::new();
        let mut resolved = false;

        while attempts < self.policy.max_attempts {
            if attempts > 0 {
                if Instant::now() + self.policy.check_interval >= deadline {
                    debug!("enumeration budget exhausted before next attempt");
                    break;
                }
                sleep(self.policy.check_interval).await;
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }

            attempts += 1;
            match timeout(remaining, self.devices.enumerate_devices()).await {
                Ok(Ok(devices)) => {
                    let video_inputs = devices.iter().filter(|d| d.is_video_input()).count();
                    debug!(attempt = attempts, video_inputs, "enumerated devices");
                    latest = devices;
                    if has_real_label(&latest) {
                        resolved = true;
                        break;
                    }
                }
                Ok(Err(err)) => {
                    warn!(attempt = attempts, "device enumeration failed: {err}");
                }
                Err(_) => {
                    warn!(
                        attempt = attempts,
                        "device enumeration did not answer within {:.1}s budget",
                        self.policy.max_wait.as_secs_f32()
                    );
                    break;
                }
            }
        }

        let elapsed = start.elapsed();
        if resolved {
            info!(attempts, ?elapsed, "capture devices resolved");
        } else {
            warn!(attempts, ?elapsed, "no real device label observed");
        }

        EnumerationOutcome {
            devices: DeviceList::from_devices(&latest),
            resolved,
            attempts,
            elapsed,
        }
    }
}
