use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::ViewerConfig;
use crate::error::Result;
use crate::interaction::{InputEvent, InteractionController};
use crate::orchestrator::{LoadingEvent, LoadingOrchestrator, LoadingStage, LoadingSummary};
use crate::platform::Platform;
use crate::presenter::Presenter;
use crate::stages::default_plan;
use crate::state::ViewerContext;

/// One page's worth of viewer: startup sequence first, then interaction.
pub struct Viewer {
    ctx: ViewerContext,
    orchestrator: LoadingOrchestrator,
    controller: InteractionController,
}

impl Viewer {
    pub fn new(
        config: ViewerConfig,
        platform: Platform,
        presenter: Arc<dyn Presenter>,
    ) -> Result<Self> {
        let plan = default_plan(&config);
        Self::with_plan(config, platform, presenter, plan)
    }

    pub fn with_plan(
        config: ViewerConfig,
        platform: Platform,
        presenter: Arc<dyn Presenter>,
        stages: Vec<LoadingStage>,
    ) -> Result<Self> {
        config.validate()?;
        let orchestrator = LoadingOrchestrator::new(stages, config.loading.transition_delay)?;
        let controller = InteractionController::new(config.overlay.hide_after);
        Ok(Self {
            ctx: ViewerContext::new(config, platform, presenter),
            orchestrator,
            controller,
        })
    }

    pub async fn start(
        &mut self,
        event_tx: Option<mpsc::UnboundedSender<LoadingEvent>>,
    ) -> LoadingSummary {
        self.orchestrator.run(&mut self.ctx, event_tx).await
    }

    /// Handles one event and waits for any device work it started.
    pub async fn handle_event(&mut self, event: InputEvent) {
        self.controller.handle_event(&mut self.ctx, event).await;
        self.controller.settle(&mut self.ctx).await;
    }

    /// Processes input until the sender side is dropped.
    pub async fn run_interaction(&mut self, events: mpsc::UnboundedReceiver<InputEvent>) {
        self.controller.run(&mut self.ctx, events).await;
    }

    pub fn context(&self) -> &ViewerContext {
        &self.ctx
    }

    pub fn controller(&self) -> &InteractionController {
        &self.controller
    }

    pub fn has_failed(&self) -> bool {
        self.ctx.system_error()
    }

    /// Releases the capture stream.
    pub fn shutdown(&mut self) {
        self.ctx.session.stop();
    }
}
