//! Built-in startup stages and the default loading plan.

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

use crate::config::ViewerConfig;
use crate::error::Result;
use crate::orchestrator::{LoadingStage, StageAction};
use crate::state::ViewerContext;

/// Waits `init_delay`, then runs the one-time permission prompt. Never fails.
pub struct RequestPermission {
    pub init_delay: Duration,
}

#[async_trait]
impl StageAction for RequestPermission {
    async fn run(&self, ctx: &mut ViewerContext) -> Result<()> {
        sleep(self.init_delay).await;
        let outcome = ctx.permission.request_permission().await;
        debug!(?outcome, "permission stage finished");
        Ok(())
    }
}

/// Fails with `EnumerationIncomplete` when no real label shows up.
pub struct DetectDevices;

#[async_trait]
impl StageAction for DetectDevices {
    async fn run(&self, ctx: &mut ViewerContext) -> Result<()> {
        let outcome = ctx.refresh_devices().await;
        if outcome.resolved {
            ctx.presenter
                .render_device_list(ctx.devices.entries(), ctx.ui.selected_index());
        }
        outcome.into_result().map(|_| ())
    }
}

/// Opens the first stream on the platform's default device.
pub struct StartCapture;

#[async_trait]
impl StageAction for StartCapture {
    async fn run(&self, ctx: &mut ViewerContext) -> Result<()> {
        ctx.session.start(None).await.map(|_| ())
    }
}

pub struct PrepareUi {
    pub delay: Duration,
}

#[async_trait]
impl StageAction for PrepareUi {
    async fn run(&self, ctx: &mut ViewerContext) -> Result<()> {
        ctx.presenter.prepare_capture_screen();
        sleep(self.delay).await;
        Ok(())
    }
}

pub struct Pause(pub Duration);

#[async_trait]
impl StageAction for Pause {
    async fn run(&self, _ctx: &mut ViewerContext) -> Result<()> {
        sleep(self.0).await;
        Ok(())
    }
}

pub fn default_plan(config: &ViewerConfig) -> Vec<LoadingStage> {
    let loading = &config.loading;
    vec![
        LoadingStage::new(
            20,
            "Initializing Capture Card OS...",
            RequestPermission {
                init_delay: loading.init_delay,
            },
        ),
        LoadingStage::new(40, "Detecting capture devices...", DetectDevices).halting(),
        LoadingStage::new(60, "Loading capture card...", StartCapture),
        LoadingStage::new(
            80,
            "Preparing UI...",
            PrepareUi {
                delay: loading.ui_prep_delay,
            },
        ),
        LoadingStage::new(100, "Ready!", Pause(loading.finalize_delay)),
    ]
}

#[cfg(test)]
mod tests {
    use super::{DetectDevices, StartCapture, default_plan};
    use crate::config::ViewerConfig;
    use crate::device::Device;
    use crate::error::ViewerError;
    use crate::headless::HeadlessPlatform;
    use crate::orchestrator::{StageAction, StagePolicy};
    use crate::presenter::RecordingPresenter;
    use crate::session::SessionStatus;
    use crate::state::ViewerContext;
    use std::sync::Arc;

    #[test]
    fn only_detection_halts_the_plan() {
        let plan = default_plan(&ViewerConfig::default());
        let progress: Vec<u8> = plan.iter().map(|stage| stage.progress).collect();
        let halting: Vec<&str> = plan
            .iter()
            .filter(|stage| stage.policy == StagePolicy::HaltOnError)
            .map(|stage| stage.label.as_str())
            .collect();

        assert_eq!(progress, vec![20, 40, 60, 80, 100]);
        assert_eq!(halting, vec!["Detecting capture devices..."]);
    }

    #[tokio::test(start_paused = true)]
    async fn detection_reports_incomplete_enumeration() {
        let headless = HeadlessPlatform::builder()
            .devices(|d| d.with_devices(vec![Device::video_input("a", "Camera 1")]))
            .build();
        let mut ctx = ViewerContext::new(
            ViewerConfig::default(),
            headless.platform(),
            Arc::new(RecordingPresenter::new()),
        );

        let err = DetectDevices.run(&mut ctx).await.expect_err("unresolved");
        assert!(matches!(err, ViewerError::EnumerationIncomplete { attempts: 5, .. }));
        assert!(err.is_fatal());
        assert_eq!(ctx.devices.len(), 2);
    }

    #[tokio::test]
    async fn start_capture_failure_is_not_fatal() {
        let headless = HeadlessPlatform::builder()
            .devices(|d| d.deny_access())
            .build();
        let mut ctx = ViewerContext::new(
            ViewerConfig::default(),
            headless.platform(),
            Arc::new(RecordingPresenter::new()),
        );

        let err = StartCapture.run(&mut ctx).await.expect_err("denied");
        assert!(!err.is_fatal());
        assert_eq!(ctx.session.status(), SessionStatus::Failed);
    }
}
