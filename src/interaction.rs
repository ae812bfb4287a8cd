use std::future::{Future, pending};
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use crate::enumerator::EnumerationOutcome;
use crate::session::PlaybackReady;
use crate::state::{Step, ViewerContext};

/// Device work that outlives the event that started it.
type InFlight<T> = Pin<Box<dyn Future<Output = T> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    PointerMove,
    /// Pointer left the viewport.
    PointerLeave,
    Click(ClickTarget),
    Key(Key),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    Enter,
    Space,
    Escape,
    Char(char),
}

impl Key {
    fn is_arrow(self) -> bool {
        matches!(
            self,
            Key::ArrowUp | Key::ArrowDown | Key::ArrowLeft | Key::ArrowRight
        )
    }

    fn is_activation(self) -> bool {
        matches!(self, Key::Enter | Key::Space)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickTarget {
    DeviceSelector,
    DropdownItem(usize),
    FullscreenButton,
    /// Inside the warning modal's content.
    Modal,
    ModalButton,
    /// Anywhere outside the controls and their panels.
    Outside,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Focus {
    #[default]
    None,
    DeviceSelector,
    FullscreenButton,
    Modal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningModal {
    /// Device labels are withheld on this origin.
    ServerRequired,
    NoRealDevices,
}

impl WarningModal {
    pub fn title(&self) -> &'static str {
        match self {
            WarningModal::ServerRequired => "Server Required",
            WarningModal::NoRealDevices => "No Capture Device Found",
        }
    }

    pub fn body(&self) -> &'static str {
        match self {
            WarningModal::ServerRequired => {
                "To access the full camera list, run this viewer through a local server: \
                 `python -m http.server 8000`, then open http://localhost:8000"
            }
            WarningModal::NoRealDevices => {
                "No named capture device is available. Check the connection and permissions, \
                 then open the device list again."
            }
        }
    }
}

/// Single auto-hide deadline. Arming always replaces the previous deadline.
#[derive(Debug, Clone, Copy)]
pub struct OverlayTimer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl OverlayTimer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    pub fn arm(&mut self) {
        self.deadline = Some(Instant::now() + self.delay);
    }

    pub fn clear(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

/// Overlay, dropdown, modal and fullscreen state machine for the capture screen.
///
/// Device refreshes and playback waits are held as in-flight work rather than awaited inside
/// an event, so pointer input and the overlay timer keep running while they finish.
pub struct InteractionController {
    timer: OverlayTimer,
    focus: Focus,
    modal: Option<WarningModal>,
    refresh: Option<InFlight<EnumerationOutcome>>,
    playback: Option<InFlight<PlaybackReady>>,
}

impl InteractionController {
    pub fn new(hide_after: Duration) -> Self {
        Self {
            timer: OverlayTimer::new(hide_after),
            focus: Focus::None,
            modal: None,
            refresh: None,
            playback: None,
        }
    }

    pub fn focus(&self) -> Focus {
        self.focus
    }

    pub fn modal(&self) -> Option<WarningModal> {
        self.modal
    }

    pub fn overlay_deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    /// True while a device refresh or a playback wait is outstanding.
    pub fn is_busy(&self) -> bool {
        self.refresh.is_some() || self.playback.is_some()
    }

    /// Feeds events and overlay timeouts until the sender side closes.
    pub async fn run(
        &mut self,
        ctx: &mut ViewerContext,
        mut events: mpsc::UnboundedReceiver<InputEvent>,
    ) {
        loop {
            let deadline = self.timer.deadline();
            let armed = deadline.is_some();
            let wake_at = deadline.unwrap_or_else(Instant::now);

            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_event(ctx, event).await,
                    None => break,
                },
                _ = sleep_until(wake_at), if armed => self.on_overlay_timeout(ctx),
                outcome = next_result(&mut self.refresh) => {
                    self.refresh = None;
                    self.finish_open(ctx, outcome);
                }
                ready = next_result(&mut self.playback) => {
                    self.playback = None;
                    ctx.session.reveal(ready);
                }
            }
        }
        debug!("input channel closed");
    }

    /// Waits out any in-flight device work. Used when events are fed one at a time.
    pub async fn settle(&mut self, ctx: &mut ViewerContext) {
        if let Some(refresh) = self.refresh.take() {
            let outcome = refresh.await;
            self.finish_open(ctx, outcome);
        }
        if let Some(playback) = self.playback.take() {
            let ready = playback.await;
            ctx.session.reveal(ready);
        }
    }

    pub async fn handle_event(&mut self, ctx: &mut ViewerContext, event: InputEvent) {
        if ctx.system_error() {
            debug!(?event, "ignoring input on the error screen");
            return;
        }
        match event {
            InputEvent::PointerMove => self.show_overlay(ctx),
            InputEvent::PointerLeave => {
                self.timer.clear();
                self.hide_overlay(ctx);
            }
            InputEvent::Click(target) => self.handle_click(ctx, target).await,
            InputEvent::Key(key) => self.handle_key(ctx, key).await,
        }
    }

    pub fn on_overlay_timeout(&mut self, ctx: &mut ViewerContext) {
        self.timer.clear();
        self.hide_overlay(ctx);
    }

    async fn handle_click(&mut self, ctx: &mut ViewerContext, target: ClickTarget) {
        if self.modal.is_some() {
            // The modal sits above everything; any click off its content closes it.
            if target != ClickTarget::Modal {
                self.dismiss_modal(ctx);
            }
            return;
        }

        match target {
            ClickTarget::DeviceSelector => self.toggle_dropdown(ctx),
            ClickTarget::DropdownItem(index) if ctx.ui.dropdown_open => {
                self.commit(ctx, index).await
            }
            ClickTarget::DropdownItem(_) => {}
            ClickTarget::FullscreenButton => {
                self.close_dropdown(ctx);
                ctx.fullscreen.toggle().await;
            }
            ClickTarget::Outside => self.close_dropdown(ctx),
            ClickTarget::Modal | ClickTarget::ModalButton => {}
        }
    }

    async fn handle_key(&mut self, ctx: &mut ViewerContext, key: Key) {
        match key {
            Key::Escape => {
                ctx.fullscreen.exit_native().await;
                return;
            }
            Key::Char('f' | 'F') => {
                ctx.fullscreen.toggle().await;
                return;
            }
            _ => {}
        }

        if key.is_arrow() {
            self.show_overlay(ctx);
        }

        if self.modal.is_some() {
            if key.is_arrow() {
                self.set_focus(ctx, Focus::Modal);
            } else if key.is_activation() {
                self.dismiss_modal(ctx);
            }
            return;
        }

        if !ctx.ui.overlay_visible {
            return;
        }

        match key {
            Key::ArrowLeft | Key::ArrowRight => {
                let next = match self.focus {
                    Focus::DeviceSelector => Focus::FullscreenButton,
                    _ => Focus::DeviceSelector,
                };
                self.set_focus(ctx, next);
            }
            Key::ArrowUp | Key::ArrowDown
                if self.focus == Focus::DeviceSelector && ctx.ui.dropdown_open =>
            {
                let step = if key == Key::ArrowUp {
                    Step::Up
                } else {
                    Step::Down
                };
                let selected = ctx.ui.step_selection(step, ctx.devices.len());
                ctx.presenter
                    .render_device_list(ctx.devices.entries(), selected);
            }
            Key::Enter | Key::Space => match self.focus {
                Focus::DeviceSelector if ctx.ui.dropdown_open => {
                    let selected = ctx.ui.selected_index();
                    self.commit(ctx, selected).await;
                }
                Focus::DeviceSelector => self.toggle_dropdown(ctx),
                Focus::FullscreenButton => {
                    ctx.fullscreen.toggle().await;
                }
                Focus::None | Focus::Modal => {}
            },
            _ => {}
        }
    }

    fn toggle_dropdown(&mut self, ctx: &mut ViewerContext) {
        if ctx.ui.dropdown_open {
            self.close_dropdown(ctx);
        } else {
            self.open_dropdown(ctx);
        }
    }

    fn open_dropdown(&mut self, ctx: &mut ViewerContext) {
        if !ctx.labels_available() {
            info!("device labels are withheld on this origin; showing server warning");
            self.open_modal(ctx, WarningModal::ServerRequired);
            return;
        }
        if self.refresh.is_some() {
            debug!("device list refresh already running; ignoring selector");
            return;
        }

        let enumerator = ctx.enumerator.clone();
        self.refresh = Some(Box::pin(async move { enumerator.enumerate().await }));
    }

    fn finish_open(&mut self, ctx: &mut ViewerContext, outcome: EnumerationOutcome) {
        ctx.apply_devices(&outcome);
        if ctx.system_error() {
            return;
        }
        if !outcome.resolved {
            warn!(
                attempts = outcome.attempts,
                "refreshed device list has no named capture device"
            );
            self.open_modal(ctx, WarningModal::NoRealDevices);
            return;
        }
        if !ctx.ui.overlay_visible || self.modal.is_some() {
            debug!("controls hidden before the device list arrived; leaving dropdown closed");
            return;
        }

        if let Some(position) = ctx
            .session
            .device_id()
            .and_then(|id| ctx.devices.position_of(id))
        {
            ctx.ui.select(position, ctx.devices.len());
        }
        ctx.ui.dropdown_open = true;
        self.set_focus(ctx, Focus::DeviceSelector);
        ctx.presenter
            .render_device_list(ctx.devices.entries(), ctx.ui.selected_index());
        ctx.presenter.set_dropdown_open(true);
    }

    fn close_dropdown(&mut self, ctx: &mut ViewerContext) {
        if ctx.ui.dropdown_open {
            ctx.ui.dropdown_open = false;
            ctx.presenter.set_dropdown_open(false);
        }
    }

    async fn commit(&mut self, ctx: &mut ViewerContext, index: usize) {
        let device_id = ctx
            .devices
            .get(index)
            .and_then(|entry| entry.device_id.clone());
        ctx.ui.select(index, ctx.devices.len());
        self.close_dropdown(ctx);

        let Some(device_id) = device_id else {
            debug!(index, "unset entry committed; keeping current stream");
            return;
        };
        // A newer switch supersedes the previous playback wait.
        self.playback = None;
        match ctx.session.begin_switch(&device_id).await {
            Ok(playback) => self.playback = Some(Box::pin(playback.wait())),
            Err(_) => {
                // The session already pushed the message; keep it on screen.
                self.show_overlay(ctx);
            }
        }
    }

    fn open_modal(&mut self, ctx: &mut ViewerContext, modal: WarningModal) {
        if self.modal.is_some() {
            return;
        }
        self.modal = Some(modal);
        ctx.presenter.show_modal(&modal);
        self.set_focus(ctx, Focus::Modal);
        self.show_overlay(ctx);
    }

    fn dismiss_modal(&mut self, ctx: &mut ViewerContext) {
        if self.modal.take().is_some() {
            ctx.presenter.dismiss_modal();
            self.set_focus(ctx, Focus::None);
        }
    }

    fn set_focus(&mut self, ctx: &ViewerContext, focus: Focus) {
        self.focus = focus;
        ctx.presenter.set_focus(focus);
    }

    fn show_overlay(&mut self, ctx: &mut ViewerContext) {
        if !ctx.ui.overlay_visible {
            ctx.ui.overlay_visible = true;
            ctx.presenter.set_overlay_visible(true);
        }
        self.timer.arm();
    }

    fn hide_overlay(&mut self, ctx: &mut ViewerContext) {
        if ctx.ui.overlay_visible {
            ctx.ui.overlay_visible = false;
            ctx.presenter.set_overlay_visible(false);
        }
    }
}

async fn next_result<T>(slot: &mut Option<InFlight<T>>) -> T {
    match slot.as_mut() {
        Some(work) => work.await,
        None => pending().await,
    }
}
