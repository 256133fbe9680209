//! Toast notifications
//!
//! Bridges the core's Notifier seam into the UI: the manager pushes
//! notices from any task, the draw loop reads the still-live ones.

use envdock_core::{NoticeKind, Notifier};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const TOAST_TTL: Duration = Duration::from_secs(4);

#[derive(Debug, Clone)]
pub struct Toast {
    pub kind: NoticeKind,
    pub message: String,
    pub at: Instant,
}

/// Shared toast queue. Cloning shares the underlying storage.
#[derive(Clone, Default)]
pub struct Toasts {
    entries: Arc<Mutex<Vec<Toast>>>,
}

impl Toasts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, kind: NoticeKind, message: &str) {
        let mut entries = self.lock();
        entries.push(Toast {
            kind,
            message: message.to_string(),
            at: Instant::now(),
        });
    }

    /// Drop expired toasts and return the rest, newest last
    pub fn visible(&self) -> Vec<Toast> {
        let mut entries = self.lock();
        entries.retain(|t| t.at.elapsed() < TOAST_TTL);
        entries.clone()
    }

    // A panicked pusher leaves the queue intact, keep serving it
    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Toast>> {
        self.entries.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Notifier for Toasts {
    fn notify(&self, kind: NoticeKind, message: &str) {
        self.push(kind, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_visible() {
        let toasts = Toasts::new();
        toasts.notify(NoticeKind::Success, "created");
        toasts.notify(NoticeKind::Error, "failed");

        let visible = toasts.visible();
        assert_eq!(visible.len(), 2);
        assert_eq!(visible[0].message, "created");
        assert_eq!(visible[1].kind, NoticeKind::Error);
    }

    #[test]
    fn test_clone_shares_storage() {
        let toasts = Toasts::new();
        let clone = toasts.clone();
        clone.push(NoticeKind::Info, "hello");
        assert_eq!(toasts.visible().len(), 1);
    }
}
