//! HTTP client for CouchDB
//!
//! Timeouts for individual calls are applied by the caller; the client itself
//! only bounds connection setup.

use super::{
    body_excerpt, endpoints, BulkApi, BulkReply, CollectionApi, CreateStatus, DocResult,
    ProbeStatus,
};
use crate::config::IngestConfig;
use crate::error::TransportError;
use crate::record::Record;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, instrument, trace};

/// Upper bound on establishing a TCP/TLS connection
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct BulkDocsRequest<'a> {
    docs: &'a [&'a Record],
}

/// CouchDB client over `reqwest`
#[derive(Clone)]
pub struct CouchClient {
    client: Client,
    base_url: String,
    credentials: Option<(String, String)>,
}

impl std::fmt::Debug for CouchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CouchClient")
            .field("base_url", &self.base_url)
            .field("user", &self.credentials.as_ref().map(|(user, _)| user))
            .finish()
    }
}

impl CouchClient {
    /// Create a client for the server at `base_url`
    pub fn new(base_url: impl Into<String>) -> Result<Self, TransportError> {
        let client = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials: None,
        })
    }

    /// Send HTTP basic auth with every request
    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((user.into(), password.into()));
        self
    }

    /// Create a client from configuration; credentials are used only when
    /// both user and password are set
    pub fn from_config(config: &IngestConfig) -> Result<Self, TransportError> {
        let client = Self::new(config.base_url.clone())?;
        Ok(match (&config.username, &config.password) {
            (Some(user), Some(password)) => client.with_credentials(user, password),
            _ => client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match self.credentials {
            Some((ref user, ref password)) => builder.basic_auth(user, Some(password)),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<(StatusCode, String), TransportError> {
        let response = builder.send().await.map_err(classify)?;
        let status = response.status();
        let body = response.text().await.map_err(classify)?;
        trace!(status = status.as_u16(), body_len = body.len(), "Response received");
        Ok((status, body))
    }
}

fn classify(error: reqwest::Error) -> TransportError {
    if error.is_connect() {
        TransportError::Connection(error.to_string())
    } else {
        TransportError::Http(error)
    }
}

#[async_trait]
impl CollectionApi for CouchClient {
    #[instrument(skip(self))]
    async fn probe(&self, collection: &str) -> Result<ProbeStatus, TransportError> {
        let url = endpoints::collection_url(&self.base_url, collection);
        let (status, body) = self.send(self.request(Method::GET, &url)).await?;

        debug!(status = status.as_u16(), "Collection probe answered");

        Ok(match status {
            StatusCode::OK => ProbeStatus::Exists,
            StatusCode::NOT_FOUND => ProbeStatus::NotFound,
            other => ProbeStatus::Unexpected {
                status: other.as_u16(),
                body: body_excerpt(&body),
            },
        })
    }

    #[instrument(skip(self))]
    async fn create(&self, collection: &str) -> Result<CreateStatus, TransportError> {
        let url = endpoints::collection_url(&self.base_url, collection);
        let (status, body) = self.send(self.request(Method::PUT, &url)).await?;

        debug!(status = status.as_u16(), "Collection create answered");

        Ok(match status {
            StatusCode::OK | StatusCode::CREATED => CreateStatus::Created,
            other => CreateStatus::Refused {
                status: other.as_u16(),
                body: body_excerpt(&body),
            },
        })
    }
}

#[async_trait]
impl BulkApi for CouchClient {
    #[instrument(skip(self, docs), fields(docs = docs.len()))]
    async fn bulk_docs(
        &self,
        collection: &str,
        docs: &[&Record],
    ) -> Result<BulkReply, TransportError> {
        let url = endpoints::bulk_docs_url(&self.base_url, collection);
        let builder = self
            .request(Method::POST, &url)
            .json(&BulkDocsRequest { docs });
        let (status, body) = self.send(builder).await?;

        debug!(status = status.as_u16(), body_len = body.len(), "Bulk write answered");

        if !status.is_success() {
            return Ok(BulkReply::Refused {
                status: status.as_u16(),
                body: body_excerpt(&body),
            });
        }

        let results: Vec<DocResult> = serde_json::from_str(&body).map_err(|e| {
            TransportError::MalformedResponse(format!(
                "expected an array of document results ({}): {}",
                e,
                body_excerpt(&body)
            ))
        })?;

        Ok(BulkReply::Results(results))
    }
}
