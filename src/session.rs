use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::CaptureSettings;
use crate::error::ViewerError;
use crate::platform::{
    MediaConstraints, MediaDevices, MediaStream, VideoMetrics, VideoSurface, stop_all_tracks,
};
use crate::presenter::Presenter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Starting,
    Active,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    pub stream_id: String,
    pub device_id: Option<String>,
    /// `None` when the surface never signalled it could play.
    pub metrics: Option<VideoMetrics>,
}

/// An attached stream still waiting for the surface's "can begin playback" signal.
pub struct PendingPlayback {
    stream_id: String,
    device_id: Option<String>,
    surface: Arc<dyn VideoSurface>,
    ready_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackReady {
    pub stream_id: String,
    pub device_id: Option<String>,
    /// `None` when the surface never signalled it could play.
    pub metrics: Option<VideoMetrics>,
}

impl PendingPlayback {
    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub async fn wait(self) -> PlaybackReady {
        let metrics = match timeout(self.ready_timeout, self.surface.can_play()).await {
            Ok(Ok(metrics)) => Some(metrics),
            Ok(Err(err)) => {
                warn!(stream = %self.stream_id, "video surface failed to start playback: {err}");
                None
            }
            Err(_) => {
                warn!(
                    stream = %self.stream_id,
                    "video surface not playable after {:.1}s; keeping it hidden",
                    self.ready_timeout.as_secs_f32()
                );
                None
            }
        };
        PlaybackReady {
            stream_id: self.stream_id,
            device_id: self.device_id,
            metrics,
        }
    }
}

/// Sole owner of the live capture stream.
pub struct CaptureSessionManager {
    devices: Arc<dyn MediaDevices>,
    surface: Arc<dyn VideoSurface>,
    presenter: Arc<dyn Presenter>,
    ideal_width: u32,
    ideal_height: u32,
    ready_timeout: Duration,
    stream: Option<Box<dyn MediaStream>>,
    device_id: Option<String>,
    status: SessionStatus,
}

impl CaptureSessionManager {
    pub fn new(
        devices: Arc<dyn MediaDevices>,
        surface: Arc<dyn VideoSurface>,
        presenter: Arc<dyn Presenter>,
        settings: &CaptureSettings,
    ) -> Self {
        Self {
            devices,
            surface,
            presenter,
            ideal_width: settings.ideal_width,
            ideal_height: settings.ideal_height,
            ready_timeout: settings.ready_timeout,
            stream: None,
            device_id: None,
            status: SessionStatus::Idle,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    pub fn stream_id(&self) -> Option<&str> {
        self.stream.as_deref().map(|stream| stream.id())
    }

    pub fn constraints_for(&self, device_id: Option<&str>) -> MediaConstraints {
        MediaConstraints::ideal_resolution(self.ideal_width, self.ideal_height, device_id)
    }

    /// Acquire a stream, releasing any previous one first, and wait for it to become playable.
    ///
    /// Failures are shown as a transient overlay message and returned; they never set the
    /// sticky error flag.
    pub async fn start(&mut self, device_id: Option<&str>) -> Result<StreamInfo, ViewerError> {
        let pending = self.acquire(device_id).await?;
        let ready = pending.wait().await;
        Ok(self.reveal(ready))
    }

    /// Acquire and attach a stream without waiting for playback.
    ///
    /// The returned [`PendingPlayback`] owns everything it needs, so callers can poll it
    /// alongside other work and hand the result back through [`Self::reveal`].
    pub async fn acquire(&mut self, device_id: Option<&str>) -> Result<PendingPlayback, ViewerError> {
        self.release();
        self.status = SessionStatus::Starting;

        let constraints = self.constraints_for(device_id);
        debug!(device = ?device_id, constraints = %constraints.to_json(), "requesting capture stream");

        let stream = match self.devices.get_user_media(&constraints).await {
            Ok(stream) => stream,
            Err(reason) => {
                self.status = SessionStatus::Failed;
                self.device_id = None;
                let err = ViewerError::StreamAcquisitionFailed {
                    device_id: device_id.map(str::to_string),
                    reason,
                };
                warn!("{err}");
                self.presenter.show_transient_error(&err.user_message());
                return Err(err);
            }
        };

        self.presenter.set_video_visible(false);
        self.surface.attach(stream.as_ref());
        let stream_id = stream.id().to_string();
        self.stream = Some(stream);
        self.device_id = device_id.map(str::to_string);
        self.status = SessionStatus::Active;
        info!(stream = %stream_id, device = ?device_id, "capture stream active");

        Ok(PendingPlayback {
            stream_id,
            device_id: self.device_id.clone(),
            surface: self.surface.clone(),
            ready_timeout: self.ready_timeout,
        })
    }

    /// Fades the video in if `ready` still belongs to the current stream.
    pub fn reveal(&self, ready: PlaybackReady) -> StreamInfo {
        let current = self.stream_id() == Some(ready.stream_id.as_str());
        match ready.metrics {
            Some(metrics) if current => {
                self.presenter.set_resolution(metrics.width, metrics.height);
                self.presenter.set_video_visible(true);
            }
            Some(_) => debug!(stream = %ready.stream_id, "stream replaced before playback; not revealing"),
            None => {}
        }
        StreamInfo {
            stream_id: ready.stream_id,
            device_id: ready.device_id,
            metrics: ready.metrics,
        }
    }

    /// Stop the current stream, then start one on `device_id`.
    pub async fn switch(&mut self, device_id: &str) -> Result<StreamInfo, ViewerError> {
        let pending = self.begin_switch(device_id).await?;
        let ready = pending.wait().await;
        Ok(self.reveal(ready))
    }

    /// Like [`Self::switch`], but leaves the playback wait to the caller.
    pub async fn begin_switch(&mut self, device_id: &str) -> Result<PendingPlayback, ViewerError> {
        info!(from = ?self.device_id, to = device_id, "switching capture device");
        self.stop();
        self.acquire(Some(device_id)).await
    }

    pub fn stop(&mut self) {
        self.release();
        self.device_id = None;
        self.status = SessionStatus::Idle;
    }

    fn release(&mut self) {
        if let Some(stream) = self.stream.take() {
            debug!(stream = %stream.id(), "stopping capture tracks");
            stop_all_tracks(stream.as_ref());
            self.surface.detach();
        }
    }
}

impl Drop for CaptureSessionManager {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::{CaptureSessionManager, SessionStatus};
    use crate::config::CaptureSettings;
    use crate::device::Device;
    use crate::error::{STREAM_FAILURE_MESSAGE, ViewerError};
    use crate::headless::{HeadlessPlatform, PlatformCall};
    use crate::presenter::{PresenterCall, RecordingPresenter};
    use std::sync::Arc;

    fn manager(headless: &HeadlessPlatform, presenter: Arc<RecordingPresenter>) -> CaptureSessionManager {
        CaptureSessionManager::new(
            headless.devices.clone(),
            headless.surface.clone(),
            presenter,
            &CaptureSettings::default(),
        )
    }

    fn two_devices() -> Vec<Device> {
        vec![
            Device::video_input("a", "Elgato HD60 S+"),
            Device::video_input("b", "AVerMedia Live Gamer"),
        ]
    }

    #[tokio::test]
    async fn start_reveals_video_only_after_playback_is_possible() {
        let headless = HeadlessPlatform::builder()
            .devices(|d| d.with_devices(two_devices()))
            .surface(|s| s.with_metrics(1280, 720))
            .build();
        let presenter = Arc::new(RecordingPresenter::new());
        let mut session = manager(&headless, presenter.clone());

        let info = session.start(None).await.expect("start");

        assert_eq!(session.status(), SessionStatus::Active);
        assert_eq!(info.metrics.map(|m| (m.width, m.height)), Some((1280, 720)));
        assert_eq!(
            presenter.calls(),
            vec![
                PresenterCall::VideoVisible(false),
                PresenterCall::Resolution {
                    width: 1280,
                    height: 720
                },
                PresenterCall::VideoVisible(true),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn video_stays_hidden_when_surface_never_becomes_playable() {
        let headless = HeadlessPlatform::builder()
            .devices(|d| d.with_devices(two_devices()))
            .surface(|s| s.never_ready())
            .build();
        let presenter = Arc::new(RecordingPresenter::new());
        let mut session = manager(&headless, presenter.clone());

        let info = session.start(Some("a")).await.expect("start");

        assert_eq!(info.metrics, None);
        assert_eq!(session.status(), SessionStatus::Active);
        assert_eq!(
            presenter.count(|call| *call == PresenterCall::VideoVisible(true)),
            0
        );
    }

    #[tokio::test]
    async fn switch_stops_old_tracks_before_requesting_new_device() {
        let headless = HeadlessPlatform::builder()
            .devices(|d| d.with_devices(two_devices()))
            .build();
        let mut session = manager(&headless, Arc::new(RecordingPresenter::new()));

        session.start(Some("a")).await.expect("start a");
        session.switch("b").await.expect("switch to b");

        let log = &headless.log;
        let stopped_a = log
            .position(|call| {
                *call
                    == PlatformCall::TrackStopped {
                        stream_id: "stream-1".to_string(),
                    }
            })
            .expect("stream-1 stopped");
        let requested_b = log
            .position(|call| {
                *call
                    == PlatformCall::GetUserMedia {
                        device_id: Some("b".to_string()),
                    }
            })
            .expect("device b requested");
        assert!(stopped_a < requested_b);
        assert_eq!(session.device_id(), Some("b"));
        assert_eq!(session.stream_id(), Some("stream-2"));
    }

    #[tokio::test]
    async fn restarting_releases_the_previous_stream() {
        let headless = HeadlessPlatform::builder()
            .devices(|d| d.with_devices(two_devices()))
            .build();
        let mut session = manager(&headless, Arc::new(RecordingPresenter::new()));

        session.start(None).await.expect("first start");
        session.start(None).await.expect("second start");

        assert_eq!(
            headless
                .log
                .count(|call| matches!(call, PlatformCall::TrackStopped { .. })),
            1
        );
        assert_eq!(session.stream_id(), Some("stream-2"));
    }

    #[tokio::test]
    async fn playback_of_a_replaced_stream_is_not_revealed() {
        let headless = HeadlessPlatform::builder()
            .devices(|d| d.with_devices(two_devices()))
            .surface(|s| s.with_metrics(1920, 1080))
            .build();
        let presenter = Arc::new(RecordingPresenter::new());
        let mut session = manager(&headless, presenter.clone());

        let first = session.acquire(Some("a")).await.expect("acquire a");
        let second = session.acquire(Some("b")).await.expect("acquire b");
        assert_eq!(first.stream_id(), "stream-1");

        let stale = session.reveal(first.wait().await);
        assert_eq!(stale.stream_id, "stream-1");
        assert_eq!(
            presenter.count(|call| *call == PresenterCall::VideoVisible(true)),
            0
        );

        let info = session.reveal(second.wait().await);
        assert_eq!(info.device_id.as_deref(), Some("b"));
        assert_eq!(
            presenter.count(|call| *call == PresenterCall::VideoVisible(true)),
            1
        );
    }

    #[tokio::test]
    async fn acquisition_failure_is_transient() {
        let headless = HeadlessPlatform::builder()
            .devices(|d| d.with_devices(two_devices()).fail_device("b"))
            .build();
        let presenter = Arc::new(RecordingPresenter::new());
        let mut session = manager(&headless, presenter.clone());

        session.start(Some("a")).await.expect("start a");
        let err = session.switch("b").await.expect_err("b is busy");

        assert!(matches!(err, ViewerError::StreamAcquisitionFailed { .. }));
        assert!(!err.is_fatal());
        assert_eq!(session.status(), SessionStatus::Failed);
        assert_eq!(session.stream_id(), None);
        assert_eq!(
            presenter.count(|call| {
                *call == PresenterCall::TransientError(STREAM_FAILURE_MESSAGE.to_string())
            }),
            1
        );
    }
}
