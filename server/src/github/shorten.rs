//! URL Shortening
//!
//! Best-effort: any failure hands back the original URL.

use std::time::Duration;

use reqwest::header::LOCATION;
use tracing::debug;

/// Default shortening endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://git.io";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Client for a git.io-style shortener (`POST url=<long>`, answer in `Location`).
#[derive(Debug, Clone)]
pub struct UrlShortener {
    client: reqwest::Client,
    endpoint: String,
}

impl UrlShortener {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Shorten `url`, falling back to it unchanged on any error.
    pub async fn shorten(&self, url: &str) -> String {
        match self.try_shorten(url).await {
            Some(short) => short,
            None => url.to_string(),
        }
    }

    async fn try_shorten(&self, url: &str) -> Option<String> {
        let resp = match self
            .client
            .post(&self.endpoint)
            .form(&[("url", url)])
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                debug!(error = %e, "URL shortener request failed");
                return None;
            }
        };

        let status = resp.status();
        if !status.is_success() {
            debug!(status = status.as_u16(), "URL shortener refused request");
            return None;
        }

        resp.headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_owned)
    }
}
