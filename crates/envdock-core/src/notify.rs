//! User-facing notification seam
//!
//! The manager reports operation outcomes through this trait so the UI can
//! render them as toasts without the core depending on any terminal code.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
    Info,
}

pub trait Notifier: Send + Sync {
    fn notify(&self, kind: NoticeKind, message: &str);
}

/// Discards all notices. Useful for headless callers and tests that don't
/// assert on notifications.
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _kind: NoticeKind, _message: &str) {}
}
