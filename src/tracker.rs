//! In-flight error counting and the lockdown escalation policy.
//!
//! Reports can originate from any callback thread concurrently. A report
//! is "in flight" from entry until its guard drops, which in a modal
//! presentation spans the time the operator looks at the dialog. The
//! first three concurrent reports show their message verbatim, the
//! fourth collapses to a generic warning, and anything past that stays
//! silent until the in-flight count falls again.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, warn};

use crate::shell::{ControlGroup, PresentationShell};

const GENERIC_THRESHOLD: u32 = 4;
const GENERIC_MESSAGE: &str = "Many errors happened!";

/// Control groups taken away during lockdown. Session controls stay the
/// recovery surface.
const LOCKDOWN_GROUPS: [ControlGroup; 3] = [
    ControlGroup::Settings,
    ControlGroup::SessionPanel,
    ControlGroup::LiveViewPanel,
];

pub struct ErrorTracker {
    in_flight: Arc<Mutex<u32>>,
    locked: AtomicBool,
    shell: Arc<dyn PresentationShell>,
}

/// Keeps a report in flight until dropped.
pub struct ReportGuard {
    in_flight: Arc<Mutex<u32>>,
}

impl Drop for ReportGuard {
    fn drop(&mut self) {
        *self.in_flight.lock() -= 1;
    }
}

impl ErrorTracker {
    pub fn new(shell: Arc<dyn PresentationShell>) -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(0)),
            locked: AtomicBool::new(false),
            shell,
        }
    }

    /// Report an error. The escalation decision is made at the count
    /// including this report. Returns the guard that ends the report.
    #[must_use = "dropping the guard ends the report"]
    pub fn report(&self, message: &str, lockdown: bool) -> ReportGuard {
        let count = {
            let mut in_flight = self.in_flight.lock();
            *in_flight += 1;
            *in_flight
        };

        if lockdown {
            self.lockdown();
        }

        if count < GENERIC_THRESHOLD {
            error!("Error reported ({} in flight): {}", count, message);
            self.shell.show_error(message);
        } else if count == GENERIC_THRESHOLD {
            warn!("Error flood, collapsing to generic message");
            self.shell.show_error(GENERIC_MESSAGE);
        }
        // Beyond the threshold nothing further is shown until the
        // in-flight count drops.

        ReportGuard {
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    /// Disable everything except the recovery actions. Sticky until
    /// `re_enable` is called.
    pub fn lockdown(&self) {
        if !self.locked.swap(true, Ordering::SeqCst) {
            warn!("Entering UI lockdown");
        }
        for group in LOCKDOWN_GROUPS {
            self.shell.set_enabled(group, false);
        }
    }

    /// Explicit recovery from lockdown.
    pub fn re_enable(&self) {
        self.locked.store(false, Ordering::SeqCst);
        for group in LOCKDOWN_GROUPS {
            self.shell.set_enabled(group, true);
        }
    }

    pub fn is_locked_down(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> u32 {
        *self.in_flight.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::MemoryShell;

    #[test]
    fn test_escalation_policy() {
        let shell = Arc::new(MemoryShell::new());
        let tracker = ErrorTracker::new(shell.clone());

        // Four in-flight reports: three verbatim, then the generic one.
        let guards: Vec<_> = (0..4)
            .map(|i| tracker.report(&format!("error {}", i), false))
            .collect();

        let errors = shell.state().errors;
        assert_eq!(
            errors,
            vec![
                "error 0".to_string(),
                "error 1".to_string(),
                "error 2".to_string(),
                GENERIC_MESSAGE.to_string(),
            ]
        );

        // A fifth shows nothing.
        let fifth = tracker.report("error 4", false);
        assert_eq!(shell.state().errors.len(), 4);

        drop(fifth);
        drop(guards);
        assert_eq!(tracker.in_flight(), 0);

        // Once the count has dropped, messages show again.
        let _guard = tracker.report("after recovery", false);
        assert_eq!(
            shell.state().errors.last(),
            Some(&"after recovery".to_string())
        );
    }

    #[test]
    fn test_sequential_reports_each_show() {
        let shell = Arc::new(MemoryShell::new());
        let tracker = ErrorTracker::new(shell.clone());

        for i in 0..6 {
            let guard = tracker.report(&format!("solo {}", i), false);
            drop(guard);
        }
        // Count returns to zero between reports, so none escalate.
        assert_eq!(shell.state().errors.len(), 6);
    }

    #[test]
    fn test_lockdown_is_sticky_until_re_enable() {
        let shell = Arc::new(MemoryShell::new());
        shell.set_enabled(ControlGroup::Settings, true);
        shell.set_enabled(ControlGroup::SessionPanel, true);
        shell.set_enabled(ControlGroup::LiveViewPanel, true);

        let tracker = ErrorTracker::new(shell.clone());
        drop(tracker.report("fatal-ish", true));

        assert!(tracker.is_locked_down());
        assert!(!shell.is_enabled(ControlGroup::Settings));
        assert!(!shell.is_enabled(ControlGroup::SessionPanel));
        assert!(!shell.is_enabled(ControlGroup::LiveViewPanel));

        // Nothing unlocks by itself.
        drop(tracker.report("another", false));
        assert!(tracker.is_locked_down());

        tracker.re_enable();
        assert!(!tracker.is_locked_down());
        assert!(shell.is_enabled(ControlGroup::Settings));
    }

    #[test]
    fn test_concurrent_reports_from_threads() {
        let shell = Arc::new(MemoryShell::new());
        let tracker = Arc::new(ErrorTracker::new(shell.clone()));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || {
                    let guard = tracker.report(&format!("thread {}", i), false);
                    std::thread::sleep(std::time::Duration::from_millis(10));
                    drop(guard);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(tracker.in_flight(), 0);
        // At most the threshold's worth of messages made it through.
        assert!(shell.state().errors.len() <= 8);
    }
}
