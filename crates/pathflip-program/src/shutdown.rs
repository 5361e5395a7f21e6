//! Cooperative cancellation of running analyses.

use std::fmt;
use std::sync::{Arc, Mutex};

/// Why a shutdown was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// The CPU-time budget of the run is used up.
    CpuTimeLimit,
    Requested(String),
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::CpuTimeLimit => f.write_str("CPU-time limit reached"),
            ShutdownReason::Requested(why) => write!(f, "shutdown requested: {}", why),
        }
    }
}

/// Shared flag polled by interpreters between steps.
///
/// Clones share state. The first reason recorded wins.
#[derive(Debug, Clone, Default)]
pub struct ShutdownNotifier {
    reason: Arc<Mutex<Option<ShutdownReason>>>,
}

impl ShutdownNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self, reason: ShutdownReason) {
        let mut slot = self.reason.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_none() {
            *slot = Some(reason);
        }
    }

    pub fn reason(&self) -> Option<ShutdownReason> {
        self.reason
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn should_shutdown(&self) -> bool {
        self.reason().is_some()
    }

    /// `Err(reason)` once a shutdown was requested.
    pub fn check(&self) -> Result<(), ShutdownReason> {
        match self.reason() {
            Some(reason) => Err(reason),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_reason_wins() {
        let notifier = ShutdownNotifier::new();
        assert!(notifier.check().is_ok());

        let clone = notifier.clone();
        clone.request(ShutdownReason::CpuTimeLimit);
        notifier.request(ShutdownReason::Requested("user".into()));

        assert!(notifier.should_shutdown());
        assert_eq!(notifier.check(), Err(ShutdownReason::CpuTimeLimit));
    }

    #[test]
    fn test_request_from_other_thread() {
        let notifier = ShutdownNotifier::new();
        let remote = notifier.clone();
        std::thread::spawn(move || remote.request(ShutdownReason::Requested("signal".into())))
            .join()
            .unwrap();
        assert_eq!(
            notifier.reason(),
            Some(ShutdownReason::Requested("signal".into()))
        );
    }
}
