use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::error::ViewerError;
use crate::state::ViewerContext;

#[async_trait]
pub trait StageAction: Send + Sync {
    async fn run(&self, ctx: &mut ViewerContext) -> Result<(), ViewerError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagePolicy {
    /// Log the error and move on to the next stage.
    ContinueOnError,
    /// Raise the sticky error flag; every later stage becomes a no-op.
    HaltOnError,
}

pub struct LoadingStage {
    pub progress: u8,
    pub label: String,
    pub policy: StagePolicy,
    action: Box<dyn StageAction>,
}

impl LoadingStage {
    pub fn new(progress: u8, label: impl Into<String>, action: impl StageAction + 'static) -> Self {
        Self {
            progress,
            label: label.into(),
            policy: StagePolicy::ContinueOnError,
            action: Box::new(action),
        }
    }

    pub fn halting(mut self) -> Self {
        self.policy = StagePolicy::HaltOnError;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadingEvent {
    StageStarted {
        index: usize,
        progress: u8,
        label: String,
    },
    StageCompleted {
        index: usize,
    },
    StageFailed {
        index: usize,
        message: String,
    },
    StageSkipped {
        index: usize,
    },
    Fatal {
        index: usize,
        message: String,
    },
    Ready,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadingSummary {
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub fatal: bool,
    /// Last progress value actually rendered.
    pub last_progress: u8,
    pub transitioned: bool,
}

/// Runs the startup stages one at a time, in declared order.
pub struct LoadingOrchestrator {
    stages: Vec<LoadingStage>,
    transition_delay: Duration,
}

impl LoadingOrchestrator {
    pub fn new(stages: Vec<LoadingStage>, transition_delay: Duration) -> Result<Self, ViewerError> {
        if stages.is_empty() {
            return Err(ViewerError::invalid_plan("at least one stage is required"));
        }
        let mut previous = 0u8;
        for stage in &stages {
            if stage.progress > 100 {
                return Err(ViewerError::invalid_plan(format!(
                    "stage '{}' progress {} exceeds 100",
                    stage.label, stage.progress
                )));
            }
            if stage.progress < previous {
                return Err(ViewerError::invalid_plan(format!(
                    "stage '{}' progress {} is below the previous stage's {}",
                    stage.label, stage.progress, previous
                )));
            }
            previous = stage.progress;
        }
        Ok(Self {
            stages,
            transition_delay,
        })
    }

    pub fn stage_labels(&self) -> Vec<&str> {
        self.stages.iter().map(|stage| stage.label.as_str()).collect()
    }

    pub async fn run(
        &self,
        ctx: &mut ViewerContext,
        event_tx: Option<mpsc::UnboundedSender<LoadingEvent>>,
    ) -> LoadingSummary {
        let mut summary = LoadingSummary::default();

        for (index, stage) in self.stages.iter().enumerate() {
            if ctx.system_error() {
                debug!(stage = %stage.label, "skipping stage after fatal error");
                summary.skipped += 1;
                send_event(&event_tx, LoadingEvent::StageSkipped { index });
                continue;
            }

            ctx.presenter.set_stage_progress(stage.progress, &stage.label);
            summary.last_progress = stage.progress;
            send_event(
                &event_tx,
                LoadingEvent::StageStarted {
                    index,
                    progress: stage.progress,
                    label: stage.label.clone(),
                },
            );

            match stage.action.run(ctx).await {
                Ok(()) => {
                    summary.completed += 1;
                    send_event(&event_tx, LoadingEvent::StageCompleted { index });
                }
                Err(err) => match stage.policy {
                    StagePolicy::HaltOnError => {
                        error!(stage = %stage.label, "{err}");
                        ctx.raise_fatal();
                        summary.fatal = true;
                        send_event(
                            &event_tx,
                            LoadingEvent::Fatal {
                                index,
                                message: err.to_string(),
                            },
                        );
                    }
                    StagePolicy::ContinueOnError => {
                        warn!(stage = %stage.label, "loading step failed: {err}");
                        summary.failed += 1;
                        send_event(
                            &event_tx,
                            LoadingEvent::StageFailed {
                                index,
                                message: err.to_string(),
                            },
                        );
                    }
                },
            }
        }

        if ctx.system_error() {
            summary.fatal = true;
            return summary;
        }

        tokio::time::sleep(self.transition_delay).await;
        ctx.presenter.show_ready_screen();
        ctx.fullscreen.enter().await;
        summary.transitioned = true;
        info!("startup complete");
        send_event(&event_tx, LoadingEvent::Ready);
        summary
    }
}

fn send_event(event_tx: &Option<mpsc::UnboundedSender<LoadingEvent>>, event: LoadingEvent) {
    if let Some(tx) = event_tx {
        let _ = tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::{LoadingEvent, LoadingOrchestrator, LoadingStage, StageAction};
    use crate::config::ViewerConfig;
    use crate::error::{PlatformError, ViewerError};
    use crate::headless::{HeadlessPlatform, PlatformCall};
    use crate::presenter::{PresenterCall, RecordingPresenter};
    use crate::state::ViewerContext;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[derive(Clone, Default)]
    struct Journal(Arc<Mutex<Vec<&'static str>>>);

    impl Journal {
        fn entries(&self) -> Vec<&'static str> {
            self.0.lock().expect("journal mutex poisoned").clone()
        }
    }

    struct Step {
        name: &'static str,
        journal: Journal,
        fail_with: Option<fn() -> ViewerError>,
    }

    #[async_trait]
    impl StageAction for Step {
        async fn run(&self, _ctx: &mut ViewerContext) -> Result<(), ViewerError> {
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.journal
                .0
                .lock()
                .expect("journal mutex poisoned")
                .push(self.name);
            match self.fail_with {
                Some(make) => Err(make()),
                None => Ok(()),
            }
        }
    }

    fn step(name: &'static str, journal: &Journal) -> Step {
        Step {
            name,
            journal: journal.clone(),
            fail_with: None,
        }
    }

    fn failing(name: &'static str, journal: &Journal, make: fn() -> ViewerError) -> Step {
        Step {
            name,
            journal: journal.clone(),
            fail_with: Some(make),
        }
    }

    fn context(presenter: Arc<RecordingPresenter>) -> (HeadlessPlatform, ViewerContext) {
        let headless = HeadlessPlatform::builder().build();
        let ctx = ViewerContext::new(ViewerConfig::default(), headless.platform(), presenter);
        (headless, ctx)
    }

    fn incomplete() -> ViewerError {
        ViewerError::EnumerationIncomplete {
            attempts: 5,
            elapsed: Duration::from_secs(2),
        }
    }

    fn busy() -> ViewerError {
        ViewerError::StreamAcquisitionFailed {
            device_id: None,
            reason: PlatformError::NotReadable,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stages_run_in_order_then_transition() {
        let presenter = Arc::new(RecordingPresenter::new());
        let (headless, mut ctx) = context(presenter.clone());
        let journal = Journal::default();
        let orchestrator = LoadingOrchestrator::new(
            vec![
                LoadingStage::new(20, "one", step("one", &journal)),
                LoadingStage::new(60, "two", step("two", &journal)),
                LoadingStage::new(100, "three", step("three", &journal)),
            ],
            Duration::from_millis(300),
        )
        .expect("valid plan");

        let started = tokio::time::Instant::now();
        let summary = orchestrator.run(&mut ctx, None).await;

        assert_eq!(journal.entries(), vec!["one", "two", "three"]);
        assert_eq!(presenter.progress_values(), vec![20, 60, 100]);
        assert_eq!(summary.completed, 3);
        assert!(summary.transitioned);
        assert!(!summary.fatal);
        assert!(started.elapsed() >= Duration::from_millis(330));
        assert_eq!(
            presenter.count(|call| *call == PresenterCall::ReadyScreen),
            1
        );
        assert_eq!(
            headless
                .log
                .count(|call| *call == PlatformCall::FullscreenRequested),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn non_fatal_failures_do_not_stop_the_sequence() {
        let presenter = Arc::new(RecordingPresenter::new());
        let (_headless, mut ctx) = context(presenter.clone());
        let journal = Journal::default();
        let orchestrator = LoadingOrchestrator::new(
            vec![
                LoadingStage::new(40, "capture", failing("capture", &journal, busy)),
                LoadingStage::new(100, "ready", step("ready", &journal)),
            ],
            Duration::from_millis(300),
        )
        .expect("valid plan");

        let (tx, mut rx) = mpsc::unbounded_channel();
        let summary = orchestrator.run(&mut ctx, Some(tx)).await;

        assert_eq!(journal.entries(), vec!["capture", "ready"]);
        assert_eq!(summary.failed, 1);
        assert!(summary.transitioned);
        assert!(!ctx.system_error());

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert!(matches!(events[1], LoadingEvent::StageFailed { index: 0, .. }));
        assert_eq!(events.last(), Some(&LoadingEvent::Ready));
    }

    #[tokio::test(start_paused = true)]
    async fn halting_failure_short_circuits_remaining_stages() {
        let presenter = Arc::new(RecordingPresenter::new());
        let (headless, mut ctx) = context(presenter.clone());
        let journal = Journal::default();
        let orchestrator = LoadingOrchestrator::new(
            vec![
                LoadingStage::new(20, "permission", step("permission", &journal)),
                LoadingStage::new(40, "enumerate", failing("enumerate", &journal, incomplete))
                    .halting(),
                LoadingStage::new(60, "capture", step("capture", &journal)),
                LoadingStage::new(100, "ready", step("ready", &journal)),
            ],
            Duration::from_millis(300),
        )
        .expect("valid plan");

        let summary = orchestrator.run(&mut ctx, None).await;

        assert_eq!(journal.entries(), vec!["permission", "enumerate"]);
        assert!(summary.fatal);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.last_progress, 40);
        assert!(!summary.transitioned);
        assert!(ctx.system_error());
        assert_eq!(presenter.progress_values(), vec![20, 40]);
        assert_eq!(presenter.count(|call| *call == PresenterCall::FatalError), 1);
        assert_eq!(presenter.count(|call| *call == PresenterCall::ReadyScreen), 0);
        assert!(headless.log.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_screen_is_shown_once_across_runs() {
        let presenter = Arc::new(RecordingPresenter::new());
        let (_headless, mut ctx) = context(presenter.clone());
        let journal = Journal::default();
        let plan = || {
            LoadingOrchestrator::new(
                vec![
                    LoadingStage::new(40, "enumerate", failing("enumerate", &journal, incomplete))
                        .halting(),
                ],
                Duration::ZERO,
            )
            .expect("valid plan")
        };

        plan().run(&mut ctx, None).await;
        let second = plan().run(&mut ctx, None).await;

        assert_eq!(second.skipped, 1);
        assert_eq!(presenter.count(|call| *call == PresenterCall::FatalError), 1);
    }

    #[test]
    fn rejects_decreasing_or_out_of_range_progress() {
        let journal = Journal::default();
        let decreasing = LoadingOrchestrator::new(
            vec![
                LoadingStage::new(60, "a", step("a", &journal)),
                LoadingStage::new(40, "b", step("b", &journal)),
            ],
            Duration::ZERO,
        );
        assert!(matches!(decreasing, Err(ViewerError::InvalidPlan(_))));

        let too_high = LoadingOrchestrator::new(
            vec![LoadingStage::new(120, "a", step("a", &journal))],
            Duration::ZERO,
        );
        assert!(too_high.is_err());

        assert!(LoadingOrchestrator::new(Vec::new(), Duration::ZERO).is_err());
    }
}
