//! Capability interface for the presentation layer. The core never
//! references concrete widgets; it only needs to enable/disable named
//! control groups, set display text, and raise messages.

use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::{info, warn};

/// Named control surfaces the core can enable or disable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlGroup {
    /// Aperture/shutter/ISO/white-balance settings panel
    Settings,
    /// Device list, refresh and open/close session controls
    SessionPanel,
    /// Live-view panel (viewport, focus drive, white-balance click)
    LiveViewPanel,
    /// The live-view start/stop toggle itself
    LiveViewToggle,
    TakePhoto,
    Record,
    Accept,
    Reject,
    /// Bulb exposure duration input, enabled only for the Bulb shutter mode
    BulbDuration,
}

/// Transient operator feedback after an accept/reject decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feedback {
    Accepted,
    Rejected,
}

pub trait PresentationShell: Send + Sync {
    fn set_enabled(&self, group: ControlGroup, enabled: bool);
    fn set_session_text(&self, text: &str);
    fn set_progress(&self, percent: u8);
    fn clear_serial(&self);
    /// Informational modal (non-blocking for the core).
    fn show_message(&self, message: &str);
    fn show_warning(&self, title: &str, message: &str);
    fn show_error(&self, message: &str);
    /// Show the accept/reject flash. Reverted by `clear_feedback`.
    fn flash_feedback(&self, feedback: Feedback);
    fn clear_feedback(&self);
}

/// Shell implementation for terminal operation: messages go to the log,
/// enablement state is tracked so gating still applies.
#[derive(Default)]
pub struct ConsoleShell {
    enabled: Mutex<HashMap<ControlGroup, bool>>,
}

impl ConsoleShell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self, group: ControlGroup) -> bool {
        self.enabled.lock().get(&group).copied().unwrap_or(false)
    }
}

impl PresentationShell for ConsoleShell {
    fn set_enabled(&self, group: ControlGroup, enabled: bool) {
        self.enabled.lock().insert(group, enabled);
    }

    fn set_session_text(&self, text: &str) {
        info!("Session: {}", text);
    }

    fn set_progress(&self, percent: u8) {
        if percent > 0 {
            info!("Transfer progress: {}%", percent);
        }
    }

    fn clear_serial(&self) {}

    fn show_message(&self, message: &str) {
        info!("{}", message);
    }

    fn show_warning(&self, title: &str, message: &str) {
        warn!("{}: {}", title, message);
    }

    fn show_error(&self, message: &str) {
        eprintln!("Error: {}", message);
    }

    fn flash_feedback(&self, feedback: Feedback) {
        match feedback {
            Feedback::Accepted => info!("ACCEPTED"),
            Feedback::Rejected => info!("REJECTED"),
        }
    }

    fn clear_feedback(&self) {}
}

/// Recorded state of a [`MemoryShell`].
#[derive(Debug, Default, Clone)]
pub struct ShellState {
    pub enabled: HashMap<ControlGroup, bool>,
    pub session_text: String,
    pub progress: u8,
    pub messages: Vec<String>,
    pub warnings: Vec<(String, String)>,
    pub errors: Vec<String>,
    pub feedback: Option<Feedback>,
    pub serial_cleared: u32,
}

/// In-memory shell that records every call, for headless runs and tests.
#[derive(Default)]
pub struct MemoryShell {
    state: Mutex<ShellState>,
}

impl MemoryShell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ShellState {
        self.state.lock().clone()
    }

    pub fn is_enabled(&self, group: ControlGroup) -> bool {
        self.state
            .lock()
            .enabled
            .get(&group)
            .copied()
            .unwrap_or(false)
    }
}

impl PresentationShell for MemoryShell {
    fn set_enabled(&self, group: ControlGroup, enabled: bool) {
        self.state.lock().enabled.insert(group, enabled);
    }

    fn set_session_text(&self, text: &str) {
        self.state.lock().session_text = text.to_string();
    }

    fn set_progress(&self, percent: u8) {
        self.state.lock().progress = percent;
    }

    fn clear_serial(&self) {
        self.state.lock().serial_cleared += 1;
    }

    fn show_message(&self, message: &str) {
        self.state.lock().messages.push(message.to_string());
    }

    fn show_warning(&self, title: &str, message: &str) {
        self.state
            .lock()
            .warnings
            .push((title.to_string(), message.to_string()));
    }

    fn show_error(&self, message: &str) {
        self.state.lock().errors.push(message.to_string());
    }

    fn flash_feedback(&self, feedback: Feedback) {
        self.state.lock().feedback = Some(feedback);
    }

    fn clear_feedback(&self) {
        self.state.lock().feedback = None;
    }
}
