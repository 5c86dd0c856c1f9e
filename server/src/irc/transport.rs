//! IRC Transport
//!
//! Plain TCP for `irc://`, TLS (rustls, webpki roots) for `ircs://`.

use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tracing::info;

use super::IrcError;
use crate::config::IrcTarget;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

fn tls_connector() -> Result<TlsConnector, IrcError> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| IrcError::Tls(format!("client config error: {e}")))?
    .with_root_certificates(roots)
    .with_no_client_auth();

    Ok(TlsConnector::from(Arc::new(config)))
}

/// Open the connection described by `target` and split it into halves.
pub async fn connect(target: &IrcTarget) -> Result<(BoxedReader, BoxedWriter), IrcError> {
    let addr = (target.host.as_str(), target.port);
    let tcp = timeout(CONNECT_TIMEOUT, TcpStream::connect(addr))
        .await
        .map_err(|_| IrcError::Timeout)?
        .map_err(IrcError::Connect)?;
    tcp.set_nodelay(true).map_err(IrcError::Connect)?;

    if !target.tls {
        info!(host = %target.host, port = target.port, "Connected to IRC server");
        let (reader, writer) = tcp.into_split();
        return Ok((Box::new(reader), Box::new(writer)));
    }

    let server_name = ServerName::try_from(target.host.clone())
        .map_err(|e| IrcError::Tls(format!("invalid server name: {e}")))?;
    let stream = timeout(CONNECT_TIMEOUT, tls_connector()?.connect(server_name, tcp))
        .await
        .map_err(|_| IrcError::Timeout)?
        .map_err(|e| IrcError::Tls(format!("TLS handshake failed: {e}")))?;

    info!(host = %target.host, port = target.port, "Connected to IRC server over TLS");
    let (reader, writer) = tokio::io::split(stream);
    Ok((Box::new(reader), Box::new(writer)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_tls_connector() {
        assert!(tls_connector().is_ok());
    }

    #[tokio::test]
    async fn refused_connection_is_an_error() {
        // Bind then drop to get a port nothing listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let target = IrcTarget {
            host: "127.0.0.1".into(),
            port,
            tls: false,
            nick: "hubbub".into(),
            password: None,
            channel: "#test".into(),
        };
        assert!(matches!(
            connect(&target).await,
            Err(IrcError::Connect(_))
        ));
    }
}
