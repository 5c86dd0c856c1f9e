//! Reusable test helpers for integration tests.
//!
//! Provides `TestApp` for sending requests through the full axum router, and
//! `FakeIrcServer` for driving an [`IrcClient`] over an in-memory pipe.
#![allow(dead_code)]

use std::time::Duration;

use axum::body::Body;
use axum::http::{self, Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tokio::io::{
    AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tower::ServiceExt;

use hubbub_server::api::{create_router, AppState};
use hubbub_server::config::Config;
use hubbub_server::irc::latch::{ready_latch, ReadySignal};
use hubbub_server::irc::{IrcClient, IrcError, IrcSettings};
use hubbub_server::secret::WebhookSecret;
use hubbub_server::webhooks::signing::sign_payload;
use hubbub_server::webhooks::types::{DELIVERY_HEADER, EVENT_HEADER, SIGNATURE_HEADER};
use hubbub_server::webhooks::{Delivery, DeliveryQueue};

/// Upper bound for any single wait in a test.
pub const WAIT: Duration = Duration::from_secs(5);

// ============================================================================
// HTTP
// ============================================================================

/// Router wired to a real delivery queue, with the consumer side exposed.
pub struct TestApp {
    pub router: Router,
    pub deliveries: mpsc::Receiver<Delivery>,
    /// Base64 text GitHub would use as its HMAC key.
    pub secret: String,
    /// Raises the IRC ready latch seen by `/health`.
    pub irc_signal: ReadySignal,
}

impl TestApp {
    /// Create a new test app with the default test config.
    pub fn new() -> Self {
        Self::with_config(Config::default_for_test())
    }

    /// Create a test app with a custom config.
    pub fn with_config(config: Config) -> Self {
        let secret = WebhookSecret::generate();
        let secret_text = String::from_utf8(secret.key().to_vec()).expect("base64 is utf-8");
        let (queue, deliveries) = DeliveryQueue::new(config.queue_capacity);
        let (irc_signal, irc_ready) = ready_latch();

        let router = create_router(AppState::new(config, secret, queue, irc_ready));
        Self {
            router,
            deliveries,
            secret: secret_text,
            irc_signal,
        }
    }

    /// Build an HTTP request with the given method and URI.
    pub fn request(method: Method, uri: &str) -> http::request::Builder {
        Request::builder().method(method).uri(uri)
    }

    /// A correctly signed delivery of `kind` to `/webhook`.
    pub fn signed_delivery(&self, kind: &str, body: &str) -> Request<Body> {
        Self::request(Method::POST, "/webhook")
            .header(EVENT_HEADER, kind)
            .header(SIGNATURE_HEADER, sign_payload(self.secret.as_bytes(), body.as_bytes()))
            .header(DELIVERY_HEADER, "72d3162e-cc78-11e3-81ab-4c9367dc0958")
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_owned()))
            .expect("valid request")
    }

    /// Send a request through the router via `tower::ServiceExt::oneshot`.
    pub async fn oneshot(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot request failed")
    }

    /// Next queued delivery, if one is waiting.
    pub fn try_next_delivery(&mut self) -> Option<Delivery> {
        self.deliveries.try_recv().ok()
    }
}

/// Collect a response body into a string.
pub async fn body_string(response: Response<Body>) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("failed to read body")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("body is utf-8")
}

/// Collect a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_str(&body_string(response).await).expect("body is JSON")
}

// ============================================================================
// IRC
// ============================================================================

/// The server end of an in-memory IRC connection.
pub struct FakeIrcServer {
    lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
    writer: WriteHalf<DuplexStream>,
}

impl FakeIrcServer {
    /// Next line written by the client, without CRLF.
    pub async fn recv(&mut self) -> String {
        tokio::time::timeout(WAIT, self.lines.next_line())
            .await
            .expect("timed out waiting for client line")
            .expect("read failed")
            .expect("client closed the connection")
    }

    pub async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\r\n").as_bytes())
            .await
            .expect("write failed");
    }

    /// Consume the registration burst and welcome the client into its channel.
    pub async fn welcome(&mut self, nick: &str) {
        assert_eq!(self.recv().await, format!("NICK {nick}"));
        assert!(self.recv().await.starts_with(&format!("USER {nick} ")));
        self.send(&format!(":irc.test 001 {nick} :Welcome to the test network"))
            .await;
        assert!(self.recv().await.starts_with("JOIN "));
    }
}

/// Start an IRC session against an in-memory server.
pub fn connect_irc(
    settings: IrcSettings,
) -> (IrcClient, JoinHandle<Result<(), IrcError>>, FakeIrcServer) {
    let (client_io, server_io) = tokio::io::duplex(64 * 1024);
    let (reader, writer) = tokio::io::split(client_io);
    let (client, session) = IrcClient::new(settings, reader, writer);
    let handle = tokio::spawn(session.run());

    let (server_reader, server_writer) = tokio::io::split(server_io);
    let server = FakeIrcServer {
        lines: BufReader::new(server_reader).lines(),
        writer: server_writer,
    };
    (client, handle, server)
}
