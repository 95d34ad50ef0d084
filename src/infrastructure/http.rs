use crate::config::HubConfig;
use crate::domain::ports::HubTransport;
use crate::domain::transaction::Action;
use crate::error::{Result, TransportError, VendError};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use std::time::Duration;
use tracing::debug;

/// Live hub transport: one HTTPS POST per call, no retries.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    endpoint: Url,
}

impl HttpTransport {
    /// Builds a transport for the hub at `endpoint`.
    ///
    /// # Arguments
    ///
    /// * `endpoint` - Base URL of the hub service. `ACTION` is appended per call.
    /// * `timeout` - Limit for one attempt, connect through body.
    ///
    /// Returns [`VendError::Configuration`] if the URL does not parse or the
    /// client cannot be built.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let endpoint = Url::parse(endpoint.trim())
            .map_err(|e| VendError::Configuration(format!("invalid hub endpoint: {e}")))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VendError::Configuration(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client, endpoint })
    }

    /// Builds a transport from the endpoint and timeout in `config`.
    ///
    /// Does not validate `config`; call [`HubConfig::validate`] first.
    pub fn from_config(config: &HubConfig) -> Result<Self> {
        Self::new(&config.endpoint, config.timeout)
    }

    /// `{endpoint}?ACTION={action}`, keeping any query already on the endpoint.
    pub fn url_for(&self, action: Action) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("ACTION", action.as_str());
        url
    }
}

fn describe(error: &dyn std::error::Error) -> String {
    let mut detail = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        detail.push_str(": ");
        detail.push_str(&cause.to_string());
        source = cause.source();
    }
    detail
}

/// Maps a reqwest failure onto the transport taxonomy.
fn classify(error: reqwest::Error) -> TransportError {
    let detail = describe(&error);
    if error.is_timeout() {
        return TransportError::Timeout(detail);
    }
    if error.is_connect() {
        let lower = detail.to_lowercase();
        if lower.contains("certificate") || lower.contains("tls") || lower.contains("handshake") {
            return TransportError::Tls(detail);
        }
        if lower.contains("dns") || lower.contains("resolve") || lower.contains("lookup") {
            return TransportError::Dns(detail);
        }
        return TransportError::Connect(detail);
    }
    TransportError::Other(detail)
}

#[async_trait]
impl HubTransport for HttpTransport {
    async fn post(&self, action: Action, body: &[u8]) -> std::result::Result<Vec<u8>, TransportError> {
        let url = self.url_for(action);
        debug!(url = %url, %action, bytes = body.len(), "Posting request to hub");

        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/xml")
            .body(body.to_vec())
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await.map_err(classify)?;
        debug!(%action, bytes = bytes.len(), "Received hub response");
        Ok(bytes.to_vec())
    }
}
