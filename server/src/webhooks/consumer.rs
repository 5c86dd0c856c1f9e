//! Delivery Consumer
//!
//! Drains the delivery queue one delivery at a time: decode, format, announce.
//! Nothing that goes wrong here is fatal; the delivery is logged and dropped.

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::types::Delivery;
use crate::github::{Event, EventKind, Formatter};
use crate::irc::IrcClient;

/// Characters of an undecodable payload kept in the log.
const PAYLOAD_LOG_LIMIT: usize = 500;

/// What became of one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Announced,
    /// Kind not handled by the formatter.
    Unsupported,
    /// Payload did not decode as its declared kind.
    Malformed,
    /// Formatter chose not to announce it.
    Suppressed,
    /// IRC send failed.
    Failed,
}

fn payload_excerpt(body: &[u8]) -> String {
    String::from_utf8_lossy(body)
        .chars()
        .take(PAYLOAD_LOG_LIMIT)
        .collect()
}

/// Handle a single delivery.
pub async fn process(formatter: &Formatter, irc: &IrcClient, delivery: Delivery) -> Outcome {
    let delivery_id = delivery.delivery_id.as_deref().unwrap_or("unknown");

    let Some(kind) = EventKind::parse_str(&delivery.kind) else {
        debug!(event = %delivery.kind, delivery = delivery_id, "Ignoring unsupported event");
        return Outcome::Unsupported;
    };

    let event = match Event::decode(kind, &delivery.body) {
        Ok(event) => event,
        Err(e) => {
            warn!(
                event = %kind,
                delivery = delivery_id,
                error = %e,
                payload = %payload_excerpt(&delivery.body),
                "Failed to decode event"
            );
            return Outcome::Malformed;
        }
    };

    let message = formatter.format(&event).await;
    if message.is_empty() {
        info!(event = %kind, delivery = delivery_id, "Ignoring event");
        return Outcome::Suppressed;
    }

    match irc.announce(&message).await {
        Ok(()) => {
            debug!(
                event = %kind,
                delivery = delivery_id,
                repo = %event.repository().full_name,
                "Announced event"
            );
            Outcome::Announced
        }
        Err(e) => {
            error!(event = %kind, delivery = delivery_id, error = %e, "Failed to announce event");
            Outcome::Failed
        }
    }
}

/// Process deliveries in arrival order until every producer is gone.
pub async fn run(mut deliveries: mpsc::Receiver<Delivery>, formatter: Formatter, irc: IrcClient) {
    while let Some(delivery) = deliveries.recv().await {
        process(&formatter, &irc, delivery).await;
    }
    info!("Delivery queue closed, consumer stopping");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::FormatOptions;
    use crate::irc::IrcSettings;
    use bytes::Bytes;

    fn delivery(kind: &str, body: &'static [u8]) -> Delivery {
        Delivery {
            kind: kind.to_string(),
            delivery_id: Some("72d3162e".into()),
            body: Bytes::from_static(body),
        }
    }

    /// A client whose session never ran, so it can never become ready.
    fn idle_client() -> IrcClient {
        let (client, _session) =
            IrcClient::new(IrcSettings::new("hubbub", "#test"), tokio::io::empty(), tokio::io::sink());
        client
    }

    #[tokio::test]
    async fn unsupported_and_malformed_deliveries_are_dropped() {
        let formatter = Formatter::default();
        let irc = idle_client();

        assert_eq!(
            process(&formatter, &irc, delivery("ping", b"{}")).await,
            Outcome::Unsupported
        );
        assert_eq!(
            process(&formatter, &irc, delivery("issues", b"not json")).await,
            Outcome::Malformed
        );
    }

    #[tokio::test]
    async fn suppressed_events_never_reach_irc() {
        let formatter = Formatter::new(FormatOptions::default(), None);
        let irc = idle_client();
        let body = br#"{
            "action": "labeled",
            "issue": {"number": 1, "title": "t", "html_url": "https://github.com/o/r/issues/1"},
            "sender": {"login": "octocat"},
            "repository": {"name": "r"}
        }"#;
        assert_eq!(
            process(&formatter, &irc, delivery("issues", body)).await,
            Outcome::Suppressed
        );
    }

    #[tokio::test]
    async fn announce_failure_is_contained() {
        let formatter = Formatter::default();
        let irc = idle_client();
        let body = br#"{
            "action": "opened",
            "issue": {"number": 1, "title": "t", "html_url": "https://github.com/o/r/issues/1"},
            "sender": {"login": "octocat"},
            "repository": {"name": "r"}
        }"#;
        assert_eq!(
            process(&formatter, &irc, delivery("issues", body)).await,
            Outcome::Failed
        );
    }

    #[test]
    fn payload_excerpt_is_bounded() {
        let body = "é".repeat(2 * PAYLOAD_LOG_LIMIT);
        assert_eq!(payload_excerpt(body.as_bytes()).chars().count(), PAYLOAD_LOG_LIMIT);
        assert_eq!(payload_excerpt(b"short"), "short");
    }
}
