//! Outbound RPC execution.
//!
//! # Responsibilities
//! - Issue the GET against the downstream endpoint
//! - Classify the raw result into payload or [`CallError`]
//!
//! # Design Decisions
//! - No retries, deadlines or admission here; the coordinator owns those
//! - Non-2xx responses are application errors carrying status and body

use axum::body::Body;
use axum::http::{header, Request, Uri};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::future::Future;

use crate::resilience::outcome::CallError;

/// Upper bound on a downstream body we are willing to buffer.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Something that performs one outbound call.
pub trait RpcExecutor: Send + Sync {
    fn call(&self) -> impl Future<Output = Result<String, CallError>> + Send;
}

/// HTTP GET executor for a fixed downstream URI.
#[derive(Clone)]
pub struct HttpExecutor {
    client: Client<HttpConnector, Body>,
    uri: Uri,
}

impl HttpExecutor {
    pub fn new(uri: Uri) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { client, uri }
    }

    /// Build from a base URL (e.g. "http://127.0.0.1:8081") and a path.
    pub fn from_base(base_url: &str, path: &str) -> Result<Self, axum::http::uri::InvalidUri> {
        let uri: Uri = format!("{}{}", base_url.trim_end_matches('/'), path).parse()?;
        Ok(Self::new(uri))
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }
}

impl RpcExecutor for HttpExecutor {
    async fn call(&self) -> Result<String, CallError> {
        let request = Request::get(self.uri.clone())
            .header(header::USER_AGENT, "guarded-caller")
            .body(Body::empty())
            .map_err(|e| CallError::Transport(e.to_string()))?;

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| CallError::Transport(e.to_string()))?;

        let status = response.status();
        let bytes = axum::body::to_bytes(Body::new(response.into_body()), MAX_BODY_BYTES)
            .await
            .map_err(|e| CallError::Transport(format!("reading body: {}", e)))?;
        let body = String::from_utf8_lossy(&bytes).into_owned();

        if status.is_success() {
            Ok(body)
        } else {
            Err(CallError::Application {
                status: status.as_u16(),
                body,
            })
        }
    }
}
