//! services/shelf/src/adapters/http.rs
//!
//! This module contains the dataset fetcher, which implements the
//! `DatasetFetcher` port with `reqwest`. `file://` URLs are read from disk so
//! exports sitting next to the binary can be imported the same way.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde_json::Value;
use shelf_core::ports::{DatasetFetcher, PortError, PortResult};
use std::time::Duration;
use tracing::debug;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Creates a new `HttpFetcher`. Without a `timeout` a hung request waits
    /// indefinitely.
    pub fn new(timeout: Option<Duration>) -> Result<Self, reqwest::Error> {
        let mut builder =
            Client::builder().user_agent(concat!("shelf/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    async fn fetch_bytes(&self, url: &str) -> PortResult<Bytes> {
        if let Some(path) = url.strip_prefix("file://") {
            return tokio::fs::read(path)
                .await
                .map(Bytes::from)
                .map_err(|e| PortError::Fetch(format!("{}: {}", path, e)));
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PortError::Fetch(e.to_string()))?
            .error_for_status()
            .map_err(|e| PortError::Fetch(e.to_string()))?;
        response
            .bytes()
            .await
            .map_err(|e| PortError::Fetch(e.to_string()))
    }
}

fn parse_body(body: &Bytes) -> PortResult<Value> {
    serde_json::from_slice(body)
        .map_err(|e| PortError::Fetch(format!("response is not valid JSON: {}", e)))
}

//=========================================================================================
// `DatasetFetcher` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatasetFetcher for HttpFetcher {
    async fn fetch_json(&self, url: &str) -> PortResult<Value> {
        let body = self.fetch_bytes(url).await?;
        debug!(url, bytes = body.len(), "Fetched dataset");
        parse_body(&body)
    }
}
