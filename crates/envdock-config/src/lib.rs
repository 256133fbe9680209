//! Configuration for envdock
//!
//! This crate handles the client-side configuration file
//! (`~/.config/envdock/config.toml`). Server-side user settings are a
//! backend resource and live in `envdock-api`.

mod error;
mod global;

pub use error::*;
pub use global::*;
