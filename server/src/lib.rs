//! Hubbub Server
//!
//! Relays GitHub webhook deliveries into an IRC channel.

pub mod api;
pub mod config;
pub mod github;
pub mod irc;
pub mod observability;
pub mod secret;
pub mod webhooks;
