//! IRC Client
//!
//! A single connection to one channel: registration, keep-alive and a
//! serialized announce path for the delivery consumer.

pub mod client;
pub mod latch;
pub mod message;
pub mod transcript;
pub mod transport;

use thiserror::Error;
use tokio_util::codec::AnyDelimiterCodecError;

pub use client::{IrcClient, IrcSession, IrcSettings, SessionState};
pub use latch::ReadyLatch;

/// Fatal IRC errors. None of these are retried.
#[derive(Error, Debug)]
pub enum IrcError {
    #[error("failed to connect: {0}")]
    Connect(#[source] std::io::Error),

    #[error("connection timed out")]
    Timeout,

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to read from server: {0}")]
    Read(#[from] AnyDelimiterCodecError),

    #[error("nickname {0} is already in use")]
    NicknameInUse(String),

    #[error("server rejected the connection password")]
    PasswordRejected,

    #[error("server closed the link: {0}")]
    Server(String),

    #[error("session closed before it became ready")]
    NotReady,
}
