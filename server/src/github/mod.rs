//! GitHub Events
//!
//! Typed webhook payloads and their rendering as IRC notifications.

pub mod events;
pub mod format;
pub mod shorten;

pub use events::{DecodeError, Event, EventKind};
pub use format::{FormatOptions, Formatter};
pub use shorten::UrlShortener;
