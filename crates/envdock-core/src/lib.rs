//! Core library for envdock
//!
//! Owns the client-side model of the backend's environments, folders, and
//! user settings: the polling reconciliation loop, the multi-step creation
//! flow, lifecycle operations with per-environment busy markers, and the
//! log line assembly used by the viewer.

mod create;
mod error;
mod folders;
mod logs;
mod manager;
mod mounts;
mod notify;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use create::*;
pub use error::*;
pub use folders::*;
pub use logs::*;
pub use manager::*;
pub use mounts::*;
pub use notify::*;
