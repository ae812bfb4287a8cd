use std::sync::Mutex;

use crate::device::DeviceEntry;
use crate::fullscreen::FullscreenIcon;
use crate::interaction::{Focus, WarningModal};

/// Boundary through which the core asks the UI layer to render.
pub trait Presenter: Send + Sync {
    fn set_stage_progress(&self, percent: u8, text: &str);
    fn prepare_capture_screen(&self);
    fn show_ready_screen(&self);
    fn show_fatal_error(&self);
    fn show_transient_error(&self, message: &str);
    fn render_device_list(&self, entries: &[DeviceEntry], selected_index: usize);
    fn set_dropdown_open(&self, open: bool);
    fn set_overlay_visible(&self, visible: bool);
    fn set_focus(&self, focus: Focus);
    fn show_modal(&self, modal: &WarningModal);
    fn dismiss_modal(&self);
    fn set_fullscreen_icon(&self, icon: FullscreenIcon);
    /// Fixed full-viewport styling used when native fullscreen is unavailable.
    fn set_manual_fullscreen(&self, active: bool);
    fn set_video_visible(&self, visible: bool);
    fn set_resolution(&self, width: u32, height: u32);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenterCall {
    StageProgress { percent: u8, text: String },
    PrepareCaptureScreen,
    ReadyScreen,
    FatalError,
    TransientError(String),
    DeviceList { labels: Vec<String>, selected_index: usize },
    DropdownOpen(bool),
    OverlayVisible(bool),
    Focus(Focus),
    ShowModal(WarningModal),
    DismissModal,
    FullscreenIcon(FullscreenIcon),
    ManualFullscreen(bool),
    VideoVisible(bool),
    Resolution { width: u32, height: u32 },
}

/// Records every call in order. Used for headless runs and tests.
#[derive(Debug, Default)]
pub struct RecordingPresenter {
    calls: Mutex<Vec<PresenterCall>>,
}

impl RecordingPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<PresenterCall> {
        self.calls.lock().expect("presenter log mutex poisoned").clone()
    }

    pub fn count(&self, predicate: impl Fn(&PresenterCall) -> bool) -> usize {
        self.calls
            .lock()
            .expect("presenter log mutex poisoned")
            .iter()
            .filter(|call| predicate(call))
            .count()
    }

    pub fn progress_values(&self) -> Vec<u8> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PresenterCall::StageProgress { percent, .. } => Some(percent),
                _ => None,
            })
            .collect()
    }

    pub fn last_overlay_visible(&self) -> Option<bool> {
        self.calls().into_iter().rev().find_map(|call| match call {
            PresenterCall::OverlayVisible(visible) => Some(visible),
            _ => None,
        })
    }

    pub fn clear(&self) {
        self.calls.lock().expect("presenter log mutex poisoned").clear();
    }

    fn push(&self, call: PresenterCall) {
        self.calls
            .lock()
            .expect("presenter log mutex poisoned")
            .push(call);
    }
}

impl Presenter for RecordingPresenter {
    fn set_stage_progress(&self, percent: u8, text: &str) {
        self.push(PresenterCall::StageProgress {
            percent,
            text: text.to_string(),
        });
    }

    fn prepare_capture_screen(&self) {
        self.push(PresenterCall::PrepareCaptureScreen);
    }

    fn show_ready_screen(&self) {
        self.push(PresenterCall::ReadyScreen);
    }

    fn show_fatal_error(&self) {
        self.push(PresenterCall::FatalError);
    }

    fn show_transient_error(&self, message: &str) {
        self.push(PresenterCall::TransientError(message.to_string()));
    }

    fn render_device_list(&self, entries: &[DeviceEntry], selected_index: usize) {
        self.push(PresenterCall::DeviceList {
            labels: entries.iter().map(|entry| entry.label.clone()).collect(),
            selected_index,
        });
    }

    fn set_dropdown_open(&self, open: bool) {
        self.push(PresenterCall::DropdownOpen(open));
    }

    fn set_overlay_visible(&self, visible: bool) {
        self.push(PresenterCall::OverlayVisible(visible));
    }

    fn set_focus(&self, focus: Focus) {
        self.push(PresenterCall::Focus(focus));
    }

    fn show_modal(&self, modal: &WarningModal) {
        self.push(PresenterCall::ShowModal(modal.clone()));
    }

    fn dismiss_modal(&self) {
        self.push(PresenterCall::DismissModal);
    }

    fn set_fullscreen_icon(&self, icon: FullscreenIcon) {
        self.push(PresenterCall::FullscreenIcon(icon));
    }

    fn set_manual_fullscreen(&self, active: bool) {
        self.push(PresenterCall::ManualFullscreen(active));
    }

    fn set_video_visible(&self, visible: bool) {
        self.push(PresenterCall::VideoVisible(visible));
    }

    fn set_resolution(&self, width: u32, height: u32) {
        self.push(PresenterCall::Resolution { width, height });
    }
}

/// Line-oriented rendering for the simulator binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPresenter;

impl Presenter for TerminalPresenter {
    fn set_stage_progress(&self, percent: u8, text: &str) {
        println!("[{percent:>3}%] {text}");
    }

    fn prepare_capture_screen(&self) {
        println!("capture screen prepared (hidden)");
    }

    fn show_ready_screen(&self) {
        println!("capture screen visible");
    }

    fn show_fatal_error(&self) {
        println!("!! no capture device detected; reload to try again");
    }

    fn show_transient_error(&self, message: &str) {
        println!("overlay error: {message}");
    }

    fn render_device_list(&self, entries: &[DeviceEntry], selected_index: usize) {
        for (index, entry) in entries.iter().enumerate() {
            let marker = if index == selected_index { '>' } else { ' ' };
            println!("  {marker} {index}: {}", entry.label);
        }
    }

    fn set_dropdown_open(&self, open: bool) {
        println!("device dropdown {}", if open { "open" } else { "closed" });
    }

    fn set_overlay_visible(&self, visible: bool) {
        println!("overlay {}", if visible { "shown" } else { "hidden" });
    }

    fn set_focus(&self, focus: Focus) {
        println!("focus: {focus:?}");
    }

    fn show_modal(&self, modal: &WarningModal) {
        println!("== {} ==", modal.title());
        println!("{}", modal.body());
    }

    fn dismiss_modal(&self) {
        println!("modal dismissed");
    }

    fn set_fullscreen_icon(&self, icon: FullscreenIcon) {
        println!("fullscreen icon: {icon:?}");
    }

    fn set_manual_fullscreen(&self, active: bool) {
        println!(
            "manual fullscreen styling {}",
            if active { "applied" } else { "cleared" }
        );
    }

    fn set_video_visible(&self, visible: bool) {
        println!("video {}", if visible { "fading in" } else { "hidden" });
    }

    fn set_resolution(&self, width: u32, height: u32) {
        println!("resolution: {width}×{height}");
    }
}
