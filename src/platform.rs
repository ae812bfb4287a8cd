//! Ports onto the hosting media platform.
//!
//! The viewer core never talks to a concrete browser or OS API. Everything it
//! consumes (device enumeration, stream acquisition, the video surface,
//! fullscreen primitives, and the secure-context check) goes through the traits
//! below so the state machines can run headless.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

use crate::device::Device;
use crate::error::PlatformError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstrainValue<T> {
    Ideal(T),
    Exact(T),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoConstraints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<ConstrainValue<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<ConstrainValue<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<ConstrainValue<String>>,
}

/// Stream request in the shape `{video: {width, height, deviceId?}, audio: false}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaConstraints {
    pub video: VideoConstraints,
    pub audio: bool,
}

impl MediaConstraints {
    /// Any video, no audio. Used only to trigger the permission prompt.
    pub fn minimal() -> Self {
        Self {
            video: VideoConstraints::default(),
            audio: false,
        }
    }

    pub fn ideal_resolution(width: u32, height: u32, device_id: Option<&str>) -> Self {
        Self {
            video: VideoConstraints {
                width: Some(ConstrainValue::Ideal(width)),
                height: Some(ConstrainValue::Ideal(height)),
                device_id: device_id.map(|id| ConstrainValue::Exact(id.to_string())),
            },
            audio: false,
        }
    }

    /// Browser-ready JSON form, as passed to `getUserMedia`.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn exact_device_id(&self) -> Option<&str> {
        match &self.video.device_id {
            Some(ConstrainValue::Exact(id)) | Some(ConstrainValue::Ideal(id)) => Some(id),
            None => None,
        }
    }
}

pub trait MediaTrack: Send + Sync {
    fn stop(&self);
    fn is_live(&self) -> bool;
}

pub trait MediaStream: Send + Sync {
    fn id(&self) -> &str;
    fn tracks(&self) -> Vec<Arc<dyn MediaTrack>>;
}

pub fn stop_all_tracks(stream: &dyn MediaStream) {
    for track in stream.tracks() {
        track.stop();
    }
}

#[async_trait]
pub trait MediaDevices: Send + Sync {
    async fn enumerate_devices(&self) -> Result<Vec<Device>, PlatformError>;
    async fn get_user_media(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<Box<dyn MediaStream>, PlatformError>;
}

/// Intrinsic size reported once the surface has decoded enough to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoMetrics {
    pub width: u32,
    pub height: u32,
}

#[async_trait]
pub trait VideoSurface: Send + Sync {
    fn attach(&self, stream: &dyn MediaStream);
    fn detach(&self);
    /// Resolves on the surface's "can begin playback" signal for the attached stream.
    async fn can_play(&self) -> Result<VideoMetrics, PlatformError>;
}

#[async_trait]
pub trait FullscreenApi: Send + Sync {
    fn is_supported(&self) -> bool;
    fn is_active(&self) -> bool;
    async fn request(&self) -> Result<(), PlatformError>;
    async fn exit(&self) -> Result<(), PlatformError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginKind {
    Secure,
    LocalFile,
    Insecure,
}

pub trait HostEnvironment: Send + Sync {
    fn origin(&self) -> OriginKind;

    /// Device labels are withheld outside secure contexts.
    fn is_secure_context(&self) -> bool {
        self.origin() == OriginKind::Secure
    }
}

#[derive(Clone)]
pub struct Platform {
    pub devices: Arc<dyn MediaDevices>,
    pub surface: Arc<dyn VideoSurface>,
    pub fullscreen: Arc<dyn FullscreenApi>,
    pub host: Arc<dyn HostEnvironment>,
}
