//! Immutable description of one logical backend call.
//!
//! An [`Endpoint`] carries everything the request encoder needs to build a
//! transport request: path, method, query parameters, JSON body, and flags
//! telling the encoder whether to wait for a credential or session id.
//! Identity is structural — two endpoints with identical fields are
//! interchangeable for retry purposes, which is what lets the engine re-run
//! the encode step any number of times against the same value.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// HTTP method of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpMethod {
    /// GET request.
    Get,
    /// POST request.
    Post,
    /// PATCH request.
    Patch,
    /// DELETE request.
    Delete,
}

impl HttpMethod {
    /// Uppercase wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

/// Immutable value describing one logical call against the chat backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Path relative to the backend base URL, without a leading slash.
    pub path: String,
    /// HTTP method.
    pub method: HttpMethod,
    /// Query parameters appended to the URL.
    pub query_items: Vec<(String, String)>,
    /// Optional JSON body.
    pub body: Option<Value>,
    /// Whether the encoder must attach (and possibly wait for) a credential.
    pub requires_credential: bool,
    /// Whether the encoder must attach (and possibly wait for) a session id.
    pub requires_session_id: bool,
}

impl Endpoint {
    /// Create a GET endpoint with no body.
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: HttpMethod::Get,
            query_items: Vec::new(),
            body: None,
            requires_credential: true,
            requires_session_id: false,
        }
    }

    /// Create a POST endpoint with a JSON body.
    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            path: path.into(),
            method: HttpMethod::Post,
            query_items: Vec::new(),
            body: Some(body),
            requires_credential: true,
            requires_session_id: false,
        }
    }

    /// Append a query parameter.
    #[must_use]
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_items.push((name.into(), value.into()));
        self
    }

    /// Mark the endpoint as callable without a credential.
    #[must_use]
    pub fn without_credential(mut self) -> Self {
        self.requires_credential = false;
        self
    }

    /// Mark the endpoint as requiring a live session id.
    #[must_use]
    pub fn with_session_id(mut self) -> Self {
        self.requires_session_id = true;
        self
    }
}
