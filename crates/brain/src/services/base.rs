// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared HTTP client plumbing for downstream service clients (spec.md §4.3).

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Serialize;

use crate::error::BrainError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Reusable async HTTP client wrapper, one per downstream service.
///
/// Connection pooling is internal to `reqwest::Client` and shared across
/// clones; `close()` exists to keep the documented "idempotent close"
/// contract explicit even though `reqwest` has no resource to release
/// eagerly.
#[derive(Clone)]
pub struct ServiceClient {
    base_url: String,
    http: Client,
}

impl ServiceClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        let http = Client::builder().timeout(timeout).build().unwrap_or_default();
        Self { base_url: base_url.into().trim_end_matches('/').to_owned(), http }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_owned()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }

    /// `close()` is a no-op beyond dropping the pooled client, kept for
    /// parity with the documented client lifecycle and to give the
    /// orchestrator a uniform shutdown sequence across all six clients.
    pub async fn close(&self) {}

    pub async fn post_json<T: Serialize + Sync>(
        &self,
        path: &str,
        payload: &T,
    ) -> Result<serde_json::Value, BrainError> {
        let url = self.url(path);
        let response = self
            .http
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|e| BrainError::transport(&url, e.status().map(|s| s.as_u16()), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BrainError::transport(&url, Some(status.as_u16()), status));
        }
        response
            .json()
            .await
            .map_err(|e| BrainError::transport(&url, None, format!("invalid JSON body: {e}")))
    }

    pub async fn post_multipart(
        &self,
        path: &str,
        field_name: &str,
        filename: &str,
        bytes: Vec<u8>,
        fields: &[(&str, &str)],
    ) -> Result<serde_json::Value, BrainError> {
        let url = self.url(path);
        let part = Part::bytes(bytes).file_name(filename.to_owned()).mime_str("image/jpeg").map_err(
            |e| BrainError::transport(&url, None, format!("invalid multipart part: {e}")),
        )?;
        let mut form = Form::new().part(field_name.to_owned(), part);
        for (key, value) in fields {
            form = form.text((*key).to_owned(), (*value).to_owned());
        }

        let response = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| BrainError::transport(&url, e.status().map(|s| s.as_u16()), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BrainError::transport(&url, Some(status.as_u16()), status));
        }
        response
            .json()
            .await
            .map_err(|e| BrainError::transport(&url, None, format!("invalid JSON body: {e}")))
    }

    pub async fn get_binary(&self, location: &str) -> Result<Vec<u8>, BrainError> {
        let url = self.url(location);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| BrainError::transport(&url, e.status().map(|s| s.as_u16()), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BrainError::transport(&url, Some(status.as_u16()), status));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| BrainError::transport(&url, None, format!("failed reading body: {e}")))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
#[path = "base_tests.rs"]
mod tests;
