use std::sync::Arc;
use tracing::{debug, info};

use crate::error::ViewerError;
use crate::platform::FullscreenApi;
use crate::presenter::Presenter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FullscreenMode {
    Windowed,
    Native,
    /// Fixed full-viewport styling applied by the viewer itself.
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FullscreenIcon {
    Enter,
    Exit,
}

impl From<FullscreenMode> for FullscreenIcon {
    fn from(mode: FullscreenMode) -> Self {
        match mode {
            FullscreenMode::Windowed => FullscreenIcon::Enter,
            FullscreenMode::Native | FullscreenMode::Manual => FullscreenIcon::Exit,
        }
    }
}

pub struct FullscreenController {
    api: Arc<dyn FullscreenApi>,
    presenter: Arc<dyn Presenter>,
    mode: FullscreenMode,
}

impl FullscreenController {
    pub fn new(api: Arc<dyn FullscreenApi>, presenter: Arc<dyn Presenter>) -> Self {
        Self {
            api,
            presenter,
            mode: FullscreenMode::Windowed,
        }
    }

    /// Native mode ends silently when the host leaves fullscreen on its own.
    pub fn mode(&self) -> FullscreenMode {
        match self.mode {
            FullscreenMode::Native if !self.api.is_active() => FullscreenMode::Windowed,
            mode => mode,
        }
    }

    pub fn is_active(&self) -> bool {
        self.mode() != FullscreenMode::Windowed
    }

    pub fn is_native(&self) -> bool {
        self.mode() == FullscreenMode::Native
    }

    pub async fn toggle(&mut self) -> FullscreenMode {
        self.mode = self.mode();
        if self.mode == FullscreenMode::Windowed {
            self.enter().await
        } else {
            self.exit().await
        }
    }

    /// Native request first; any rejection or missing API falls back to manual styling.
    pub async fn enter(&mut self) -> FullscreenMode {
        let native = if self.api.is_supported() {
            self.api
                .request()
                .await
                .map_err(|err| ViewerError::FullscreenUnavailable(err.to_string()))
        } else {
            Err(ViewerError::FullscreenUnavailable(
                "native fullscreen API missing".to_string(),
            ))
        };

        self.mode = match native {
            Ok(()) => {
                debug!("native fullscreen entered");
                FullscreenMode::Native
            }
            Err(err) => {
                info!("{err}; using manual fullscreen");
                self.presenter.set_manual_fullscreen(true);
                FullscreenMode::Manual
            }
        };
        self.presenter.set_fullscreen_icon(self.mode.into());
        self.mode
    }

    pub async fn exit(&mut self) -> FullscreenMode {
        if self.api.is_active() {
            if let Err(err) = self.api.exit().await {
                debug!("exit fullscreen error: {err}");
            }
        }
        if self.mode == FullscreenMode::Manual {
            self.presenter.set_manual_fullscreen(false);
        }
        self.mode = FullscreenMode::Windowed;
        self.presenter.set_fullscreen_icon(self.mode.into());
        self.mode
    }

    /// Escape handling: only leaves native fullscreen.
    pub async fn exit_native(&mut self) -> bool {
        if self.api.is_active() {
            self.exit().await;
            true
        } else {
            false
        }
    }
}
