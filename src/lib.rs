//! Kiosk-style capture-card viewer core.
//!
//! Startup runs a staged sequence (permission prompt, device detection, first
//! stream, UI prep) that either reaches the capture screen or halts on the
//! terminal error view. After that the interaction controller owns the overlay,
//! device dropdown, warning modal and fullscreen state. Rendering and the media
//! platform sit behind the [`presenter::Presenter`] and [`platform`] ports.

pub mod config;
pub mod device;
pub mod enumerator;
pub mod error;
pub mod error_screen;
pub mod fullscreen;
pub mod headless;
pub mod interaction;
pub mod orchestrator;
pub mod permission;
pub mod platform;
pub mod presenter;
pub mod session;
pub mod stages;
pub mod state;
pub mod viewer;

pub use config::ViewerConfig;
pub use error::{PlatformError, ViewerError};
pub use viewer::Viewer;
