use std::sync::Arc;
use tracing::error;

use crate::presenter::Presenter;

/// Terminal error view. One-way: once shown, nothing brings the loading UI back.
pub struct ErrorPresenter {
    presenter: Arc<dyn Presenter>,
    shown: bool,
}

impl ErrorPresenter {
    pub fn new(presenter: Arc<dyn Presenter>) -> Self {
        Self {
            presenter,
            shown: false,
        }
    }

    /// Returns false when the error view was already up.
    pub fn show_fatal(&mut self) -> bool {
        if self.shown {
            return false;
        }
        self.shown = true;
        error!("no capture device could be resolved; startup halted");
        self.presenter.show_fatal_error();
        true
    }

    pub fn is_shown(&self) -> bool {
        self.shown
    }
}

#[cfg(test)]
mod tests {
    use super::ErrorPresenter;
    use crate::presenter::{PresenterCall, RecordingPresenter};
    use std::sync::Arc;

    #[test]
    fn fatal_view_is_rendered_once() {
        let presenter = Arc::new(RecordingPresenter::new());
        let mut screen = ErrorPresenter::new(presenter.clone());

        assert!(screen.show_fatal());
        assert!(!screen.show_fatal());
        assert!(screen.is_shown());
        assert_eq!(presenter.calls(), vec![PresenterCall::FatalError]);
    }
}
