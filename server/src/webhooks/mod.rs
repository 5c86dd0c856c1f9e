//! GitHub Webhook Ingestion
//!
//! Signature verification, the HTTP receiver, the bounded delivery queue and
//! the consumer that turns deliveries into IRC announcements.

pub mod consumer;
pub mod handlers;
pub mod queue;
pub mod signing;
pub mod types;

pub use queue::{DeliveryQueue, EnqueueOutcome};
pub use types::{Delivery, WebhookError};
