//! Server Configuration
//!
//! Loads configuration from environment variables.

use std::env;
use std::fmt;
use std::path::PathBuf;

use percent_encoding::percent_decode_str;
use thiserror::Error;
use url::{Host, Url};

use crate::github::format::FormatOptions;
use crate::github::shorten::DEFAULT_ENDPOINT;
use crate::irc::client::{IrcSettings, DEFAULT_REALNAME};
use crate::webhooks::queue::DEFAULT_CAPACITY;

const IRC_PORT: u16 = 6667;
const IRCS_PORT: u16 = 6697;

/// Invalid or missing configuration. Fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid IRC URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("not an IRC URL (scheme {0:?}); use irc:// or ircs://")]
    UnsupportedScheme(String),

    #[error("IRC URL has no host")]
    MissingHost,

    #[error("IRC URL is missing a nickname")]
    MissingNick,

    #[error("IRC URL is missing a channel")]
    MissingChannel,

    #[error("{name} has an invalid value: {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

/// Server, identity and channel taken from `irc[s]://nick[:pass]@host[:port]/channel`.
#[derive(Clone, PartialEq, Eq)]
pub struct IrcTarget {
    pub host: String,
    pub port: u16,
    pub tls: bool,
    pub nick: String,
    /// Server password (`PASS`).
    pub password: Option<String>,
    /// Channel name with its leading `#`.
    pub channel: String,
}

impl fmt::Debug for IrcTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IrcTarget")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .field("nick", &self.nick)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("channel", &self.channel)
            .finish()
    }
}

fn decode(component: &str) -> String {
    percent_decode_str(component).decode_utf8_lossy().into_owned()
}

/// Prefix `#` unless the name already carries it.
pub fn normalize_channel(channel: &str) -> String {
    if channel.starts_with('#') {
        channel.to_string()
    } else {
        format!("#{channel}")
    }
}

impl IrcTarget {
    /// Parse an IRC URL.
    ///
    /// The channel comes from the path (`/%23chan` or `/chan`). An unescaped
    /// `#` makes the channel the URL fragment instead, so `/#chan` works too.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(raw)?;

        let (tls, default_port) = match url.scheme() {
            "irc" => (false, IRC_PORT),
            "ircs" => (true, IRCS_PORT),
            other => return Err(ConfigError::UnsupportedScheme(other.to_string())),
        };

        let host = match url.host() {
            Some(Host::Domain(domain)) if !domain.is_empty() => domain.to_string(),
            Some(Host::Ipv4(addr)) => addr.to_string(),
            Some(Host::Ipv6(addr)) => addr.to_string(),
            _ => return Err(ConfigError::MissingHost),
        };

        let nick = decode(url.username());
        if nick.is_empty() {
            return Err(ConfigError::MissingNick);
        }
        let password = url.password().map(decode).filter(|p| !p.is_empty());

        let path = decode(url.path().trim_start_matches('/'));
        let channel = if path.is_empty() {
            url.fragment().map(decode).unwrap_or_default()
        } else {
            path
        };
        let channel = channel.trim_start_matches('#');
        if channel.is_empty() {
            return Err(ConfigError::MissingChannel);
        }

        Ok(Self {
            host,
            port: url.port().unwrap_or(default_port),
            tls,
            nick,
            password,
            channel: normalize_channel(channel),
        })
    }
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (e.g., "0.0.0.0:8080")
    pub bind_address: String,

    /// Path the webhook endpoint is mounted on
    pub webhook_path: String,

    /// Location of the base64 shared secret (created on first run)
    pub webhook_secret_file: PathBuf,

    /// Deliveries buffered ahead of the IRC consumer (default: 10)
    pub queue_capacity: usize,

    /// Branches whose pushes are announced; empty means all
    pub branches: Vec<String>,

    /// Strip IRC colours from notifications
    pub no_colors: bool,

    /// Skip URL shortening
    pub long_url: bool,

    /// URL shortening endpoint
    pub shortener_url: String,

    /// IRC server, nickname and channel
    pub irc: IrcTarget,

    /// Announce with NOTICE instead of PRIVMSG
    pub irc_notice: bool,

    pub irc_realname: String,

    /// NickServ password (optional)
    pub irc_nickserv_password: Option<String>,

    /// Echo private messages back to the channel
    pub irc_echo: bool,

    /// Record the raw IRC protocol transcript
    pub irc_debug: bool,
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name,
            value: value.to_string(),
        }),
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let flag = |name: &'static str, default: bool| {
            var(name).map_or(Ok(default), |v| parse_bool(name, &v))
        };

        let irc_url = var("IRC_URL").ok_or(ConfigError::Missing("IRC_URL"))?;

        let queue_capacity = match var("DELIVERY_QUEUE_CAPACITY") {
            Some(v) => v
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::InvalidValue {
                    name: "DELIVERY_QUEUE_CAPACITY",
                    value: v,
                })?,
            None => DEFAULT_CAPACITY,
        };

        let mut webhook_path = var("WEBHOOK_PATH").unwrap_or_else(|| "/webhook".into());
        if !webhook_path.starts_with('/') {
            webhook_path.insert(0, '/');
        }

        Ok(Self {
            bind_address: var("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:8080".into()),
            webhook_path,
            webhook_secret_file: var("WEBHOOK_SECRET_FILE")
                .unwrap_or_else(|| "webhook.secret".into())
                .into(),
            queue_capacity,
            branches: var("BRANCHES")
                .map(|list| FormatOptions::parse_branches(&list))
                .unwrap_or_default(),
            no_colors: flag("NO_COLORS", false)?,
            long_url: flag("LONG_URL", true)?,
            shortener_url: var("SHORTENER_URL").unwrap_or_else(|| DEFAULT_ENDPOINT.into()),
            irc: IrcTarget::parse(&irc_url)?,
            irc_notice: flag("IRC_NOTICE", false)?,
            irc_realname: var("IRC_REALNAME").unwrap_or_else(|| DEFAULT_REALNAME.into()),
            irc_nickserv_password: var("IRC_NICKSERV_PASSWORD"),
            irc_echo: flag("IRC_ECHO", true)?,
            irc_debug: flag("IRC_DEBUG", false)?,
        })
    }

    /// Formatter switches.
    pub fn format_options(&self) -> FormatOptions {
        FormatOptions {
            branches: self.branches.clone(),
            no_colors: self.no_colors,
            long_url: self.long_url,
        }
    }

    /// IRC session settings.
    pub fn irc_settings(&self) -> IrcSettings {
        IrcSettings {
            nick: self.irc.nick.clone(),
            channel: self.irc.channel.clone(),
            password: self.irc.password.clone(),
            realname: self.irc_realname.clone(),
            nickserv_password: self.irc_nickserv_password.clone(),
            use_notice: self.irc_notice,
            echo: self.irc_echo,
            debug: self.irc_debug,
        }
    }

    /// Create a default config for testing.
    #[must_use]
    pub fn default_for_test() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".into(),
            webhook_path: "/webhook".into(),
            webhook_secret_file: "webhook.secret".into(),
            queue_capacity: DEFAULT_CAPACITY,
            branches: Vec::new(),
            no_colors: true,
            long_url: true,
            shortener_url: DEFAULT_ENDPOINT.into(),
            irc: IrcTarget {
                host: "localhost".into(),
                port: IRC_PORT,
                tls: false,
                nick: "hubbub".into(),
                password: None,
                channel: "#test".into(),
            },
            irc_notice: false,
            irc_realname: DEFAULT_REALNAME.into(),
            irc_nickserv_password: None,
            irc_echo: true,
            irc_debug: false,
        }
    }
}
