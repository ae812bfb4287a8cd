//! Scripted in-process platform.
//!
//! Drives the viewer without a browser: enumeration results are scripted per
//! attempt, streams are plain objects whose tracks log when stopped, and every
//! platform call lands in one ordered [`CallLog`].

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::device::Device;
use crate::error::PlatformError;
use crate::platform::{
    FullscreenApi, HostEnvironment, MediaConstraints, MediaDevices, MediaStream, MediaTrack,
    OriginKind, Platform, VideoMetrics, VideoSurface,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    EnumerateDevices { attempt: u32 },
    GetUserMedia { device_id: Option<String> },
    StreamOpened { stream_id: String },
    TrackStopped { stream_id: String },
    SurfaceAttached { stream_id: String },
    SurfaceDetached,
    FullscreenRequested,
    FullscreenExited,
}

#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<PlatformCall>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, call: PlatformCall) {
        self.calls
            .lock()
            .expect("platform call log mutex poisoned")
            .push(call);
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.calls
            .lock()
            .expect("platform call log mutex poisoned")
            .clone()
    }

    pub fn position(&self, predicate: impl Fn(&PlatformCall) -> bool) -> Option<usize> {
        self.calls().iter().position(predicate)
    }

    pub fn count(&self, predicate: impl Fn(&PlatformCall) -> bool) -> usize {
        self.calls().iter().filter(|call| predicate(call)).count()
    }
}

/// Enumeration snapshots are served one per attempt; the last one repeats.
pub struct ScriptedMediaDevices {
    snapshots: Vec<Vec<Device>>,
    enumerate_delay: Duration,
    deny_access: bool,
    withhold_labels: bool,
    failing_devices: HashSet<String>,
    attempts: AtomicU32,
    next_stream: AtomicU32,
    log: CallLog,
}

impl ScriptedMediaDevices {
    pub fn new(log: CallLog) -> Self {
        Self {
            snapshots: Vec::new(),
            enumerate_delay: Duration::ZERO,
            deny_access: false,
            withhold_labels: false,
            failing_devices: HashSet::new(),
            attempts: AtomicU32::new(0),
            next_stream: AtomicU32::new(0),
            log,
        }
    }

    /// Same device set on every attempt.
    pub fn with_devices(self, devices: Vec<Device>) -> Self {
        self.with_snapshots(vec![devices])
    }

    pub fn with_snapshots(mut self, snapshots: Vec<Vec<Device>>) -> Self {
        self.snapshots = snapshots;
        self
    }

    /// Labels stay blank until the given attempt (1-based), as if permission propagated late.
    pub fn with_labels_from_attempt(self, devices: Vec<Device>, attempt: u32) -> Self {
        let blank: Vec<Device> = devices
            .iter()
            .map(|device| Device {
                label: String::new(),
                ..device.clone()
            })
            .collect();
        let mut snapshots = vec![blank; attempt.saturating_sub(1) as usize];
        snapshots.push(devices);
        self.with_snapshots(snapshots)
    }

    pub fn with_enumerate_delay(mut self, delay: Duration) -> Self {
        self.enumerate_delay = delay;
        self
    }

    pub fn deny_access(mut self) -> Self {
        self.deny_access = true;
        self
    }

    /// Blank every label, as hosts without a secure origin do.
    pub fn withhold_labels(mut self) -> Self {
        self.withhold_labels = true;
        self
    }

    pub fn fail_device(mut self, device_id: impl Into<String>) -> Self {
        self.failing_devices.insert(device_id.into());
        self
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    fn snapshot(&self, attempt: u32) -> Vec<Device> {
        let index = (attempt.saturating_sub(1) as usize).min(self.snapshots.len().saturating_sub(1));
        self.snapshots.get(index).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl MediaDevices for ScriptedMediaDevices {
    async fn enumerate_devices(&self) -> Result<Vec<Device>, PlatformError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        self.log.record(PlatformCall::EnumerateDevices { attempt });
        if !self.enumerate_delay.is_zero() {
            tokio::time::sleep(self.enumerate_delay).await;
        }
        let mut devices = self.snapshot(attempt);
        if self.withhold_labels {
            devices.iter_mut().for_each(|device| device.label.clear());
        }
        Ok(devices)
    }

    async fn get_user_media(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<Box<dyn MediaStream>, PlatformError> {
        let device_id = constraints.exact_device_id().map(str::to_string);
        self.log.record(PlatformCall::GetUserMedia {
            device_id: device_id.clone(),
        });

        if self.deny_access {
            return Err(PlatformError::NotAllowed);
        }
        if let Some(id) = &device_id {
            if self.failing_devices.contains(id) {
                return Err(PlatformError::NotReadable);
            }
            let known = self
                .snapshots
                .iter()
                .flatten()
                .any(|device| &device.id == id);
            if !known {
                return Err(PlatformError::NotFound);
            }
        }

        let index = self.next_stream.fetch_add(1, Ordering::SeqCst) + 1;
        let stream_id = format!("stream-{index}");
        self.log.record(PlatformCall::StreamOpened {
            stream_id: stream_id.clone(),
        });
        Ok(Box::new(HeadlessStream::new(stream_id, self.log.clone())))
    }
}

pub struct HeadlessStream {
    id: String,
    tracks: Vec<Arc<dyn MediaTrack>>,
}

impl HeadlessStream {
    pub fn new(id: String, log: CallLog) -> Self {
        let track: Arc<dyn MediaTrack> = Arc::new(HeadlessTrack {
            stream_id: id.clone(),
            live: AtomicBool::new(true),
            log,
        });
        Self {
            id,
            tracks: vec![track],
        }
    }
}

impl MediaStream for HeadlessStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn tracks(&self) -> Vec<Arc<dyn MediaTrack>> {
        self.tracks.clone()
    }
}

struct HeadlessTrack {
    stream_id: String,
    live: AtomicBool,
    log: CallLog,
}

impl MediaTrack for HeadlessTrack {
    fn stop(&self) {
        if self.live.swap(false, Ordering::SeqCst) {
            self.log.record(PlatformCall::TrackStopped {
                stream_id: self.stream_id.clone(),
            });
        }
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

pub struct HeadlessSurface {
    metrics: VideoMetrics,
    never_ready: bool,
    attached: Mutex<Option<String>>,
    log: CallLog,
}

impl HeadlessSurface {
    pub fn new(log: CallLog) -> Self {
        Self {
            metrics: VideoMetrics {
                width: 1920,
                height: 1080,
            },
            never_ready: false,
            attached: Mutex::new(None),
            log,
        }
    }

    pub fn with_metrics(mut self, width: u32, height: u32) -> Self {
        self.metrics = VideoMetrics { width, height };
        self
    }

    /// The "can begin playback" signal never fires.
    pub fn never_ready(mut self) -> Self {
        self.never_ready = true;
        self
    }

    pub fn attached_stream(&self) -> Option<String> {
        self.attached
            .lock()
            .expect("surface mutex poisoned")
            .clone()
    }
}

#[async_trait]
impl VideoSurface for HeadlessSurface {
    fn attach(&self, stream: &dyn MediaStream) {
        *self.attached.lock().expect("surface mutex poisoned") = Some(stream.id().to_string());
        self.log.record(PlatformCall::SurfaceAttached {
            stream_id: stream.id().to_string(),
        });
    }

    fn detach(&self) {
        if self
            .attached
            .lock()
            .expect("surface mutex poisoned")
            .take()
            .is_some()
        {
            self.log.record(PlatformCall::SurfaceDetached);
        }
    }

    async fn can_play(&self) -> Result<VideoMetrics, PlatformError> {
        if self.never_ready {
            std::future::pending::<()>().await;
        }
        if self.attached_stream().is_none() {
            return Err(PlatformError::Other("no stream attached".to_string()));
        }
        Ok(self.metrics)
    }
}

pub struct HeadlessFullscreen {
    supported: bool,
    reject: bool,
    active: AtomicBool,
    log: CallLog,
}

impl HeadlessFullscreen {
    pub fn new(log: CallLog) -> Self {
        Self {
            supported: true,
            reject: false,
            active: AtomicBool::new(false),
            log,
        }
    }

    pub fn unsupported(mut self) -> Self {
        self.supported = false;
        self
    }

    pub fn rejecting(mut self) -> Self {
        self.reject = true;
        self
    }

    /// Simulates the user leaving fullscreen through the host (not through the viewer).
    pub fn force_exit(&self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl FullscreenApi for HeadlessFullscreen {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    async fn request(&self) -> Result<(), PlatformError> {
        self.log.record(PlatformCall::FullscreenRequested);
        if !self.supported {
            return Err(PlatformError::Unsupported);
        }
        if self.reject {
            return Err(PlatformError::NotAllowed);
        }
        self.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn exit(&self) -> Result<(), PlatformError> {
        self.log.record(PlatformCall::FullscreenExited);
        self.active.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StaticHost(pub OriginKind);

impl HostEnvironment for StaticHost {
    fn origin(&self) -> OriginKind {
        self.0
    }
}

/// Bundle of headless ports sharing one call log.
pub struct HeadlessPlatform {
    pub log: CallLog,
    pub devices: Arc<ScriptedMediaDevices>,
    pub surface: Arc<HeadlessSurface>,
    pub fullscreen: Arc<HeadlessFullscreen>,
    pub host: Arc<StaticHost>,
}

impl HeadlessPlatform {
    pub fn builder() -> HeadlessPlatformBuilder {
        HeadlessPlatformBuilder::default()
    }

    pub fn platform(&self) -> Platform {
        Platform {
            devices: self.devices.clone(),
            surface: self.surface.clone(),
            fullscreen: self.fullscreen.clone(),
            host: self.host.clone(),
        }
    }
}

#[derive(Default)]
pub struct HeadlessPlatformBuilder {
    log: CallLog,
    devices: Option<Box<dyn FnOnce(ScriptedMediaDevices) -> ScriptedMediaDevices>>,
    surface: Option<Box<dyn FnOnce(HeadlessSurface) -> HeadlessSurface>>,
    fullscreen: Option<Box<dyn FnOnce(HeadlessFullscreen) -> HeadlessFullscreen>>,
    origin: Option<OriginKind>,
}

impl HeadlessPlatformBuilder {
    pub fn devices(
        mut self,
        configure: impl FnOnce(ScriptedMediaDevices) -> ScriptedMediaDevices + 'static,
    ) -> Self {
        self.devices = Some(Box::new(configure));
        self
    }

    pub fn surface(
        mut self,
        configure: impl FnOnce(HeadlessSurface) -> HeadlessSurface + 'static,
    ) -> Self {
        self.surface = Some(Box::new(configure));
        self
    }

    pub fn fullscreen(
        mut self,
        configure: impl FnOnce(HeadlessFullscreen) -> HeadlessFullscreen + 'static,
    ) -> Self {
        self.fullscreen = Some(Box::new(configure));
        self
    }

    pub fn origin(mut self, origin: OriginKind) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn build(self) -> HeadlessPlatform {
        let log = self.log;
        let origin = self.origin.unwrap_or(OriginKind::Secure);
        let devices = ScriptedMediaDevices::new(log.clone());
        let surface = HeadlessSurface::new(log.clone());
        let fullscreen = HeadlessFullscreen::new(log.clone());

        let devices = match self.devices {
            Some(configure) => configure(devices),
            None => devices,
        };
        let devices = if origin == OriginKind::Secure {
            devices
        } else {
            devices.withhold_labels()
        };

        HeadlessPlatform {
            devices: Arc::new(devices),
            surface: Arc::new(match self.surface {
                Some(configure) => configure(surface),
                None => surface,
            }),
            fullscreen: Arc::new(match self.fullscreen {
                Some(configure) => configure(fullscreen),
                None => fullscreen,
            }),
            host: Arc::new(StaticHost(origin)),
            log,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CallLog, HeadlessPlatform, PlatformCall, ScriptedMediaDevices};
    use crate::device::Device;
    use crate::error::PlatformError;
    use crate::platform::{MediaConstraints, MediaDevices, OriginKind, stop_all_tracks};

    #[tokio::test]
    async fn labels_appear_on_the_scripted_attempt() {
        let devices = ScriptedMediaDevices::new(CallLog::new())
            .with_labels_from_attempt(vec![Device::video_input("a", "Elgato HD60")], 3);

        let first = devices.enumerate_devices().await.expect("enumerate");
        let second = devices.enumerate_devices().await.expect("enumerate");
        let third = devices.enumerate_devices().await.expect("enumerate");
        let fourth = devices.enumerate_devices().await.expect("enumerate");

        assert_eq!(first[0].label, "");
        assert_eq!(second[0].label, "");
        assert_eq!(third[0].label, "Elgato HD60");
        assert_eq!(fourth[0].label, "Elgato HD60");
        assert_eq!(devices.attempts(), 4);
    }

    #[tokio::test]
    async fn stopping_tracks_is_logged_once() {
        let log = CallLog::new();
        let devices = ScriptedMediaDevices::new(log.clone())
            .with_devices(vec![Device::video_input("a", "Elgato HD60")]);

        let stream = devices
            .get_user_media(&MediaConstraints::ideal_resolution(1920, 1080, Some("a")))
            .await
            .expect("stream");
        stop_all_tracks(stream.as_ref());
        stop_all_tracks(stream.as_ref());

        assert_eq!(
            log.count(|call| matches!(call, PlatformCall::TrackStopped { .. })),
            1
        );
    }

    #[tokio::test]
    async fn unknown_and_failing_devices_are_rejected() {
        let devices = ScriptedMediaDevices::new(CallLog::new())
            .with_devices(vec![Device::video_input("a", "Elgato HD60")])
            .fail_device("a");

        let busy = devices
            .get_user_media(&MediaConstraints::ideal_resolution(1920, 1080, Some("a")))
            .await;
        assert_eq!(busy.err(), Some(PlatformError::NotReadable));

        let missing = devices
            .get_user_media(&MediaConstraints::ideal_resolution(1920, 1080, Some("zzz")))
            .await;
        assert_eq!(missing.err(), Some(PlatformError::NotFound));
    }

    #[tokio::test]
    async fn labels_are_withheld_unless_the_origin_is_secure() {
        let cards = || vec![Device::video_input("a", "Elgato HD60")];
        let secure = HeadlessPlatform::builder()
            .devices(move |d| d.with_devices(cards()))
            .build();
        let local_file = HeadlessPlatform::builder()
            .devices(move |d| d.with_devices(cards()))
            .origin(OriginKind::LocalFile)
            .build();

        let listed = secure.devices.enumerate_devices().await.expect("enumerate");
        assert_eq!(listed[0].label, "Elgato HD60");

        let blanked = local_file
            .devices
            .enumerate_devices()
            .await
            .expect("enumerate");
        assert_eq!(blanked[0].id, "a");
        assert_eq!(blanked[0].label, "");
    }
}
