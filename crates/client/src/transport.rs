//! Transport seam: executes an encoded request against the network.
//!
//! The engine never talks to the network directly; it hands a fully-encoded
//! [`HttpRequest`] to a [`Transport`] implementation and receives a raw
//! [`TransportOutcome`] back, which the request decoder then classifies.
//! Connection-level concurrency limits belong to the transport, not to the
//! engine.
//!
//! [`ReqwestTransport`] is the default implementation used by real clients.

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use crate::endpoint::HttpMethod;

/// A transport-ready request produced by the request encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Fully-resolved request URL, query included.
    pub url: Url,
    /// HTTP method.
    pub method: HttpMethod,
    /// Header name/value pairs.
    pub headers: Vec<(String, String)>,
    /// Serialized request body, if any.
    pub body: Option<Vec<u8>>,
}

/// Transport-level failure, prior to any decoding.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The connection could not be established or was dropped.
    #[error("connection lost: {0}")]
    ConnectionLost(String),
    /// Any other transport failure.
    #[error("transport failure: {0}")]
    Failure(String),
}

/// Raw result of one transport call, handed to the request decoder.
///
/// Mirrors the `(data, response, error)` triple of the underlying HTTP
/// session: any combination of the three may be present.
#[derive(Debug, Clone, Default)]
pub struct TransportOutcome {
    /// Response body bytes, if a response was received.
    pub data: Option<Vec<u8>>,
    /// HTTP status code, if a response was received.
    pub status: Option<u16>,
    /// Transport error, if the call failed below the HTTP layer.
    pub error: Option<TransportError>,
}

/// Executes encoded requests. Implemented over a real HTTP client in
/// production and by scripted spies in tests.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute the request and report the raw outcome.
    async fn execute(&self, request: HttpRequest) -> TransportOutcome;
}

/// Default [`Transport`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with a default client.
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }

    /// Create a transport over a pre-configured client (timeouts, proxies,
    /// connection limits).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn method_of(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }

    fn classify(error: &reqwest::Error) -> TransportError {
        if error.is_connect() || error.is_timeout() {
            TransportError::ConnectionLost(error.to_string())
        } else {
            TransportError::Failure(error.to_string())
        }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> TransportOutcome {
        let mut builder =
            self.client.request(Self::method_of(request.method), request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                return TransportOutcome {
                    data: None,
                    status: None,
                    error: Some(Self::classify(&e)),
                };
            }
        };

        let status = response.status().as_u16();
        match response.bytes().await {
            Ok(bytes) => TransportOutcome {
                data: Some(bytes.to_vec()),
                status: Some(status),
                error: None,
            },
            Err(e) => TransportOutcome {
                data: None,
                status: Some(status),
                error: Some(Self::classify(&e)),
            },
        }
    }
}
