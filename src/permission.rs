use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::ViewerError;
use crate::platform::{HostEnvironment, MediaConstraints, MediaDevices, stop_all_tracks};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionOutcome {
    Granted,
    Denied(String),
    /// Labels are withheld on this host, so no prompt was shown.
    SkippedInsecureContext,
    /// The prompt was already shown earlier in this session.
    AlreadyRequested,
}

impl PermissionOutcome {
    pub fn is_granted(&self) -> bool {
        matches!(self, PermissionOutcome::Granted)
    }
}

/// Opens and immediately releases a throwaway stream so later enumerations carry labels.
pub struct PermissionGate {
    devices: Arc<dyn MediaDevices>,
    host: Arc<dyn HostEnvironment>,
    settle_delay: Duration,
    requested: AtomicBool,
}

impl PermissionGate {
    pub fn new(
        devices: Arc<dyn MediaDevices>,
        host: Arc<dyn HostEnvironment>,
        settle_delay: Duration,
    ) -> Self {
        Self {
            devices,
            host,
            settle_delay,
            requested: AtomicBool::new(false),
        }
    }

    /// Never fails. Always waits out the settle delay before returning.
    pub async fn request_permission(&self) -> PermissionOutcome {
        let outcome = self.prompt_once().await;
        tokio::time::sleep(self.settle_delay).await;
        outcome
    }

    async fn prompt_once(&self) -> PermissionOutcome {
        if self.requested.swap(true, Ordering::SeqCst) {
            debug!("permission prompt already issued this session");
            return PermissionOutcome::AlreadyRequested;
        }

        if !self.host.is_secure_context() {
            warn!(origin = ?self.host.origin(), "insecure context, skipping permission prompt");
            return PermissionOutcome::SkippedInsecureContext;
        }

        match self
            .devices
            .get_user_media(&MediaConstraints::minimal())
            .await
        {
            Ok(stream) => {
                stop_all_tracks(stream.as_ref());
                info!("capture permission granted");
                PermissionOutcome::Granted
            }
            Err(err) => {
                let err = ViewerError::PermissionDenied(err.to_string());
                warn!("{err}");
                PermissionOutcome::Denied(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{PermissionGate, PermissionOutcome};
    use crate::device::Device;
    use crate::headless::{CallLog, PlatformCall, ScriptedMediaDevices, StaticHost};
    use crate::platform::OriginKind;
    use std::sync::Arc;
    use std::time::Duration;

    fn gate(devices: ScriptedMediaDevices, origin: OriginKind) -> PermissionGate {
        PermissionGate::new(
            Arc::new(devices),
            Arc::new(StaticHost(origin)),
            Duration::from_millis(300),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn grant_releases_the_probe_stream_and_waits_to_settle() {
        let log = CallLog::new();
        let gate = gate(
            ScriptedMediaDevices::new(log.clone())
                .with_devices(vec![Device::video_input("a", "Elgato HD60")]),
            OriginKind::Secure,
        );

        let started = tokio::time::Instant::now();
        let outcome = gate.request_permission().await;

        assert!(outcome.is_granted());
        assert!(started.elapsed() >= Duration::from_millis(300));
        assert_eq!(
            log.calls(),
            vec![
                PlatformCall::GetUserMedia { device_id: None },
                PlatformCall::StreamOpened {
                    stream_id: "stream-1".to_string()
                },
                PlatformCall::TrackStopped {
                    stream_id: "stream-1".to_string()
                },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn denial_is_reported_without_failing() {
        let log = CallLog::new();
        let gate = gate(
            ScriptedMediaDevices::new(log.clone()).deny_access(),
            OriginKind::Secure,
        );

        let started = tokio::time::Instant::now();
        match gate.request_permission().await {
            PermissionOutcome::Denied(reason) => assert!(reason.contains("not allowed")),
            other => panic!("expected denial, got {other:?}"),
        }
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn prompt_is_issued_only_once() {
        let log = CallLog::new();
        let gate = gate(ScriptedMediaDevices::new(log.clone()), OriginKind::Secure);

        gate.request_permission().await;
        assert_eq!(
            gate.request_permission().await,
            PermissionOutcome::AlreadyRequested
        );
        assert_eq!(
            log.count(|call| matches!(call, PlatformCall::GetUserMedia { .. })),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn insecure_context_skips_the_prompt() {
        let log = CallLog::new();
        let gate = gate(ScriptedMediaDevices::new(log.clone()), OriginKind::LocalFile);

        assert_eq!(
            gate.request_permission().await,
            PermissionOutcome::SkippedInsecureContext
        );
        assert!(log.calls().is_empty());
    }
}
