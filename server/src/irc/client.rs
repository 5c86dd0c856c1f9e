//! IRC Session State Machine
//!
//! [`IrcClient::new`] splits a connection into two parts:
//!
//! - [`IrcSession`] owns the read half and runs the receive loop: registration,
//!   `PING`/`PONG`, join on welcome, private-message commands. Lines are split
//!   on `\n` as raw bytes and decoded lossily, so stray Latin-1 from other
//!   users never ends the session.
//! - [`IrcClient`] is a cheap handle owning the write half behind a mutex.
//!   [`IrcClient::announce`] waits for the ready latch and then writes all of
//!   its lines under one lock, so concurrent announcements never interleave.

use std::borrow::Cow;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{AnyDelimiterCodec, FramedRead};
use tracing::{debug, info, warn};

use super::latch::{ready_latch, ReadyLatch, ReadySignal};
use super::message::Message;
use super::transcript::Transcript;
use super::transport::{BoxedReader, BoxedWriter};
use super::IrcError;

/// Maximum IRC line length on the wire, CRLF included.
pub const MAX_LINE_LEN: usize = 512;

/// Inbound line limit. Servers with message tags may exceed 512 bytes.
const READ_LIMIT: usize = 8192;

pub const DEFAULT_REALNAME: &str = "GitHub IRCBot";

const QUIT_COMMAND: &str = "!quit";
const QUIT_REASON: &str = "Bye";

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Socket open, registration sent, no welcome yet.
    Connected,
    /// Welcome received.
    Registered,
    /// Channel joined, announcements flow.
    Joined,
    /// Receive loop ended.
    Closed,
}

/// Per-connection settings.
#[derive(Clone)]
pub struct IrcSettings {
    pub nick: String,
    /// Channel name including its leading `#`.
    pub channel: String,
    /// Server password, sent with `PASS`.
    pub password: Option<String>,
    pub realname: String,
    /// Sent to NickServ with `IDENTIFY` after the welcome.
    pub nickserv_password: Option<String>,
    /// Announce with `NOTICE` instead of `PRIVMSG`.
    pub use_notice: bool,
    /// Echo private messages back to the channel.
    pub echo: bool,
    /// Keep a transcript of the raw protocol.
    pub debug: bool,
}

impl IrcSettings {
    pub fn new(nick: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            nick: nick.into(),
            channel: channel.into(),
            password: None,
            realname: DEFAULT_REALNAME.to_string(),
            nickserv_password: None,
            use_notice: false,
            echo: true,
            debug: false,
        }
    }
}

impl fmt::Debug for IrcSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("IrcSettings")
            .field("nick", &self.nick)
            .field("channel", &self.channel)
            .field("password", &redact(&self.password))
            .field("realname", &self.realname)
            .field("nickserv_password", &redact(&self.nickserv_password))
            .field("use_notice", &self.use_notice)
            .field("echo", &self.echo)
            .field("debug", &self.debug)
            .finish()
    }
}

struct Shared {
    settings: IrcSettings,
    writer: tokio::sync::Mutex<BoxedWriter>,
    state: Mutex<SessionState>,
    transcript: Transcript,
    ready: ReadyLatch,
}

/// Handle for sending on the connection.
#[derive(Clone)]
pub struct IrcClient {
    shared: Arc<Shared>,
}

impl fmt::Debug for IrcClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IrcClient")
            .field("nick", &self.shared.settings.nick)
            .field("channel", &self.shared.settings.channel)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl IrcClient {
    /// Wrap an established connection.
    ///
    /// Nothing is sent until [`IrcSession::run`] is awaited.
    pub fn new<R, W>(settings: IrcSettings, reader: R, writer: W) -> (Self, IrcSession)
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (signal, ready) = ready_latch();
        let transcript = Transcript::new(settings.debug);
        let writer: BoxedWriter = Box::new(writer);
        let reader: BoxedReader = Box::new(reader);

        let client = Self {
            shared: Arc::new(Shared {
                settings,
                writer: tokio::sync::Mutex::new(writer),
                state: Mutex::new(SessionState::Connected),
                transcript,
                ready,
            }),
        };
        let codec = AnyDelimiterCodec::new_with_max_length(b"\n".to_vec(), Vec::new(), READ_LIMIT);
        let session = IrcSession {
            handler: Handler {
                client: client.clone(),
                signal,
            },
            lines: FramedRead::new(reader, codec),
        };
        (client, session)
    }

    fn nick(&self) -> &str {
        &self.shared.settings.nick
    }

    fn channel(&self) -> &str {
        &self.shared.settings.channel
    }

    pub fn state(&self) -> SessionState {
        *self
            .shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: SessionState) {
        let mut current = self
            .shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *current != state {
            debug!(from = ?*current, to = ?state, "IRC session state change");
            *current = state;
        }
    }

    /// Latch raised once the channel has been joined.
    pub fn ready(&self) -> ReadyLatch {
        self.shared.ready.clone()
    }

    /// Recorded protocol lines. Empty unless debugging is enabled.
    pub fn transcript(&self) -> Vec<String> {
        self.shared.transcript.lines()
    }

    /// Send `text` to the channel, one message per non-empty line.
    ///
    /// Waits until the channel has been joined. Fails with
    /// [`IrcError::NotReady`] if the session ends first.
    pub async fn announce(&self, text: &str) -> Result<(), IrcError> {
        self.shared
            .ready
            .wait()
            .await
            .map_err(|_| IrcError::NotReady)?;

        let lines = self.channel_lines(text);
        if lines.is_empty() {
            return Ok(());
        }
        self.write_lines(&lines).await
    }

    /// Leave the channel.
    pub async fn part(&self) -> Result<(), IrcError> {
        let part = Message::new("PART").with_param(self.channel());
        self.send(&part).await
    }

    /// Disconnect from the server.
    pub async fn quit(&self, reason: &str) -> Result<(), IrcError> {
        self.send(&Message::new("QUIT").with_trailing(reason)).await
    }

    fn channel_lines(&self, text: &str) -> Vec<String> {
        let settings = &self.shared.settings;
        let command = if settings.use_notice {
            "NOTICE"
        } else {
            "PRIVMSG"
        };
        // "CMD #chan :" plus CRLF
        let overhead = command.len() + settings.channel.len() + 5;
        let budget = MAX_LINE_LEN.saturating_sub(overhead);

        text.split('\n')
            .map(|line| line.replace('\r', ""))
            .filter(|line| !line.is_empty())
            .map(|line| {
                Message::new(command)
                    .with_param(&settings.channel)
                    .with_trailing(truncate_at_boundary(&line, budget))
                    .to_string()
            })
            .collect()
    }

    async fn send(&self, message: &Message) -> Result<(), IrcError> {
        self.write_lines(&[message.to_string()]).await
    }

    async fn write_lines(&self, lines: &[String]) -> Result<(), IrcError> {
        let mut writer = self.shared.writer.lock().await;
        for line in lines {
            self.shared.transcript.outgoing(line);
            writer.write_all(line.as_bytes()).await?;
            writer.write_all(b"\r\n").await?;
        }
        writer.flush().await?;
        Ok(())
    }

    async fn register(&self) -> Result<(), IrcError> {
        let settings = &self.shared.settings;
        let mut lines = Vec::with_capacity(3);
        if let Some(password) = &settings.password {
            lines.push(Message::new("PASS").with_param(password).to_string());
        }
        lines.push(Message::new("NICK").with_param(&settings.nick).to_string());
        lines.push(
            Message::new("USER")
                .with_param(&settings.nick)
                .with_param("0")
                .with_param("*")
                .with_trailing(&settings.realname)
                .to_string(),
        );
        self.write_lines(&lines).await
    }
}

/// Decode one raw line, dropping its CR.
fn decode_line(raw: &[u8]) -> Cow<'_, str> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw)
}

/// Longest prefix of `text` within `max` bytes that ends on a char boundary.
fn truncate_at_boundary(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

enum Flow {
    Continue,
    Quit,
}

/// The receive loop. Run it exactly once.
pub struct IrcSession {
    handler: Handler,
    lines: FramedRead<BoxedReader, AnyDelimiterCodec>,
}

impl IrcSession {
    /// Register and process server lines until the connection ends.
    ///
    /// Returns `Ok` on `!quit` or a clean end of stream; any read failure or
    /// server rejection is an error. The ready latch is released either way.
    pub async fn run(self) -> Result<(), IrcError> {
        let Self { handler, mut lines } = self;
        let result = handler.drive(&mut lines).await;
        handler.client.set_state(SessionState::Closed);
        result
    }
}

/// Reacts to server messages. Must not own the read half, which is borrowed
/// mutably alongside it.
struct Handler {
    client: IrcClient,
    signal: ReadySignal,
}

impl Handler {
    async fn drive(
        &self,
        lines: &mut FramedRead<BoxedReader, AnyDelimiterCodec>,
    ) -> Result<(), IrcError> {
        self.client.register().await?;

        while let Some(raw) = lines.next().await {
            let raw = raw?;
            let line = decode_line(&raw);
            self.client.shared.transcript.incoming(&line);
            let Some(message) = Message::parse(&line) else {
                continue;
            };
            if let Flow::Quit = self.handle(&message).await? {
                return Ok(());
            }
        }

        info!("IRC server closed the connection");
        Ok(())
    }

    async fn handle(&self, message: &Message) -> Result<Flow, IrcError> {
        match message.command.as_str() {
            "PING" => {
                let pong = Message {
                    prefix: None,
                    command: "PONG".into(),
                    params: message.params.clone(),
                    trailing: message.trailing.clone(),
                };
                self.client.send(&pong).await?;
            }
            "001" => self.on_welcome().await?,
            "433" if self.client.state() == SessionState::Connected => {
                return Err(IrcError::NicknameInUse(self.client.nick().to_string()));
            }
            "464" => return Err(IrcError::PasswordRejected),
            "ERROR" => {
                let reason = message.last_param().unwrap_or_default();
                return Err(IrcError::Server(reason.to_string()));
            }
            "PRIVMSG" => return self.on_private_message(message).await,
            _ => {}
        }
        Ok(Flow::Continue)
    }

    async fn on_welcome(&self) -> Result<(), IrcError> {
        if self.signal.is_fired() {
            return Ok(());
        }
        self.client.set_state(SessionState::Registered);
        info!(nick = %self.client.nick(), "Registered with IRC server");

        let settings = &self.client.shared.settings;
        if let Some(password) = &settings.nickserv_password {
            let identify = Message::new("PRIVMSG")
                .with_param("NickServ")
                .with_trailing(format!("IDENTIFY {password}"));
            self.client.send(&identify).await?;
        }

        let join = Message::new("JOIN").with_param(&settings.channel);
        self.client.send(&join).await?;
        self.client.set_state(SessionState::Joined);
        self.signal.fire();
        info!(channel = %settings.channel, "Joined IRC channel");
        Ok(())
    }

    async fn on_private_message(&self, message: &Message) -> Result<Flow, IrcError> {
        let to_us = message
            .params
            .first()
            .is_some_and(|target| target.eq_ignore_ascii_case(self.client.nick()));
        if !to_us {
            return Ok(Flow::Continue);
        }

        let text = message
            .trailing
            .as_deref()
            .or_else(|| message.params.get(1).map(String::as_str))
            .unwrap_or_default();
        let from = message.source_nick().unwrap_or("unknown");

        if text.trim() == QUIT_COMMAND {
            info!(from = %from, "Quit requested over IRC");
            self.client.quit(QUIT_REASON).await?;
            return Ok(Flow::Quit);
        }

        if self.client.shared.settings.echo && self.client.state() == SessionState::Joined {
            let lines = self.client.channel_lines(text);
            if !lines.is_empty() {
                self.client.write_lines(&lines).await?;
            }
        } else {
            warn!(from = %from, "Ignoring private message");
        }
        Ok(Flow::Continue)
    }
}
