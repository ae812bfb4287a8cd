use std::sync::Arc;

use crate::config::ViewerConfig;
use crate::device::DeviceList;
use crate::enumerator::{DeviceEnumerator, EnumerationOutcome, EnumerationPolicy};
use crate::error_screen::ErrorPresenter;
use crate::fullscreen::FullscreenController;
use crate::permission::PermissionGate;
use crate::platform::Platform;
use crate::presenter::Presenter;
use crate::session::CaptureSessionManager;

/// One-way boolean. Once raised it stays raised for the session.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StickyFlag(bool);

impl StickyFlag {
    pub fn raise(&mut self) -> bool {
        let first = !self.0;
        self.0 = true;
        first
    }

    pub fn is_raised(&self) -> bool {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Up,
    Down,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UiState {
    pub overlay_visible: bool,
    pub dropdown_open: bool,
    selected_index: usize,
    pub system_error: StickyFlag,
}

impl UiState {
    pub fn selected_index(&self) -> usize {
        self.selected_index
    }

    /// Moves circularly over `item_count` rows.
    pub fn step_selection(&mut self, step: Step, item_count: usize) -> usize {
        if item_count == 0 {
            self.selected_index = 0;
            return 0;
        }
        let max_index = item_count - 1;
        self.selected_index = match step {
            Step::Up if self.selected_index == 0 => max_index,
            Step::Up => (self.selected_index - 1).min(max_index),
            Step::Down if self.selected_index >= max_index => 0,
            Step::Down => self.selected_index + 1,
        };
        self.selected_index
    }

    pub fn select(&mut self, index: usize, item_count: usize) -> usize {
        self.selected_index = index.min(item_count.saturating_sub(1));
        self.selected_index
    }
}

/// Everything the startup stages and the interaction controller share, built once per page.
pub struct ViewerContext {
    pub config: ViewerConfig,
    pub platform: Platform,
    pub presenter: Arc<dyn Presenter>,
    pub permission: PermissionGate,
    pub enumerator: DeviceEnumerator,
    pub session: CaptureSessionManager,
    pub fullscreen: FullscreenController,
    pub error_screen: ErrorPresenter,
    pub devices: DeviceList,
    pub ui: UiState,
}

impl ViewerContext {
    pub fn new(config: ViewerConfig, platform: Platform, presenter: Arc<dyn Presenter>) -> Self {
        let permission = PermissionGate::new(
            platform.devices.clone(),
            platform.host.clone(),
            config.permission.settle_delay,
        );
        let enumerator = DeviceEnumerator::new(
            platform.devices.clone(),
            EnumerationPolicy::from(&config.enumeration),
        );
        let session = CaptureSessionManager::new(
            platform.devices.clone(),
            platform.surface.clone(),
            presenter.clone(),
            &config.capture,
        );
        let fullscreen = FullscreenController::new(platform.fullscreen.clone(), presenter.clone());
        let error_screen = ErrorPresenter::new(presenter.clone());

        Self {
            config,
            platform,
            presenter,
            permission,
            enumerator,
            session,
            fullscreen,
            error_screen,
            devices: DeviceList::default(),
            ui: UiState::default(),
        }
    }

    /// Whether this host exposes device labels at all.
    pub fn labels_available(&self) -> bool {
        self.platform.host.is_secure_context()
    }

    pub fn system_error(&self) -> bool {
        self.ui.system_error.is_raised()
    }

    pub fn fullscreen_active(&self) -> bool {
        self.fullscreen.is_active()
    }

    /// Re-runs enumeration and replaces the selectable list regardless of outcome.
    pub async fn refresh_devices(&mut self) -> EnumerationOutcome {
        let outcome = self.enumerator.enumerate().await;
        self.apply_devices(&outcome);
        outcome
    }

    /// Replaces the selectable list and keeps the selection in bounds.
    pub fn apply_devices(&mut self, outcome: &EnumerationOutcome) {
        self.devices = outcome.devices.clone();
        let count = self.devices.len();
        self.ui.select(self.ui.selected_index(), count);
    }

    /// Raises the sticky error flag and hands off to the error screen.
    pub fn raise_fatal(&mut self) {
        self.ui.system_error.raise();
        self.error_screen.show_fatal();
    }
}

#[cfg(test)]
mod tests {
    use super::{StickyFlag, Step, UiState, ViewerContext};
    use crate::config::ViewerConfig;
    use crate::headless::HeadlessPlatform;
    use crate::presenter::RecordingPresenter;
    use std::sync::Arc;

    #[test]
    fn sticky_flag_only_reports_first_raise() {
        let mut flag = StickyFlag::default();
        assert!(!flag.is_raised());
        assert!(flag.raise());
        assert!(!flag.raise());
        assert!(flag.is_raised());
    }

    #[test]
    fn selection_wraps_in_both_directions() {
        let mut ui = UiState::default();
        assert_eq!(ui.step_selection(Step::Down, 3), 1);
        assert_eq!(ui.step_selection(Step::Down, 3), 2);
        assert_eq!(ui.step_selection(Step::Down, 3), 0);
        assert_eq!(ui.step_selection(Step::Up, 3), 2);
        assert_eq!(ui.step_selection(Step::Up, 3), 1);
    }

    #[test]
    fn selection_stays_in_bounds_when_items_shrink() {
        let mut ui = UiState::default();
        ui.select(4, 5);
        assert_eq!(ui.step_selection(Step::Down, 2), 0);

        ui.select(4, 5);
        assert_eq!(ui.step_selection(Step::Up, 2), 1);
        assert_eq!(ui.select(9, 3), 2);
        assert_eq!(ui.step_selection(Step::Down, 0), 0);
    }

    #[tokio::test]
    async fn fullscreen_active_follows_manual_and_native_modes() {
        for headless in [
            HeadlessPlatform::builder().build(),
            HeadlessPlatform::builder().fullscreen(|f| f.rejecting()).build(),
        ] {
            let mut ctx = ViewerContext::new(
                ViewerConfig::default(),
                headless.platform(),
                Arc::new(RecordingPresenter::new()),
            );
            assert!(!ctx.fullscreen_active());

            ctx.fullscreen.toggle().await;
            assert!(ctx.fullscreen_active());

            ctx.fullscreen.toggle().await;
            assert!(!ctx.fullscreen_active());
        }
    }
}
