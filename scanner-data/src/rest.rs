//! Thin `reqwest` wrapper shared by every provider adapter.
//!
//! Every request carries a timeout so a single unresponsive endpoint cannot stall a scan cycle.

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Transport-level failure, mapped by each adapter into a [`DataError`](crate::error::DataError)
/// appropriate to the operation being performed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RestError {
    #[error("invalid url: {0}")]
    Url(String),

    #[error("request timed out")]
    Timeout,

    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("HTTP error: {0}")]
    Status(StatusCode),

    #[error("empty response body")]
    EmptyBody,

    #[error("JSON parse failed: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for RestError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            RestError::Timeout
        } else {
            RestError::Request(error.to_string())
        }
    }
}

/// Hook allowing an adapter to attach authentication headers to a request before it is sent.
pub trait RequestSigner: Send + Sync {
    fn sign(&self, builder: RequestBuilder, method: &str, path: &str, query: &str) -> RequestBuilder;
}

/// REST client bound to one provider base url.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: Client,
    base_url: Url,
    timeout: Duration,
}

impl RestClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RestError> {
        let base_url = Url::parse(base_url).map_err(|e| RestError::Url(e.to_string()))?;
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(RestError::from)?;

        Ok(Self {
            http,
            base_url,
            timeout,
        })
    }

    /// GET `path` with `query` parameters and deserialise the JSON body.
    pub async fn get_json<T>(
        &self,
        path: &str,
        query: &[(&str, String)],
        signer: Option<&dyn RequestSigner>,
    ) -> Result<T, RestError>
    where
        T: DeserializeOwned,
    {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| RestError::Url(e.to_string()))?;
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(key, value)| (*key, value.as_str())));
        }

        let mut builder = self.http.get(url.clone()).timeout(self.timeout);
        if let Some(signer) = signer {
            let query_string = url.query().map(|q| format!("?{q}")).unwrap_or_default();
            builder = signer.sign(builder, "GET", url.path(), &query_string);
        }

        debug!(url = %url, "GET");
        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RestError::Status(status));
        }

        let body = response.bytes().await?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(RestError::EmptyBody);
        }

        serde_json::from_slice(&body).map_err(|e| RestError::Parse(e.to_string()))
    }
}
