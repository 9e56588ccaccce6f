//! Public-URL object store (Google Cloud Storage by default).
//!
//! Objects are read with plain `GET {base_url}/{bucket}/{key}`. 404 maps to
//! `NotFound`; connection failures, timeouts, 429 and 5xx are transient and
//! retried under the configured [`RetryPolicy`]. Anything else fails at once.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;

use super::{validate_key, BlockStore, StoreError};
use crate::config::StoreConfig;
use crate::retry::RetryPolicy;

#[derive(Debug, Clone)]
pub struct HttpBlockStore {
    client: Client,
    base_url: String,
    bucket: String,
    retry: RetryPolicy,
}

impl HttpBlockStore {
    pub fn new(config: &StoreConfig, bucket: impl Into<String>) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            bucket: bucket.into(),
            retry: config.retry,
        })
    }

    pub fn url_for(&self, key: &str) -> Result<String, StoreError> {
        validate_key(key)?;
        Ok(format!("{}/{}/{}", self.base_url, self.bucket, key))
    }

    fn send(&self, key: &str, head: bool) -> Result<Option<reqwest::blocking::Response>, StoreError> {
        let url = self.url_for(key)?;
        self.retry.run(
            |attempt| {
                tracing::debug!(%url, attempt, "object store request");
                let request = if head {
                    self.client.head(&url)
                } else {
                    self.client.get(&url)
                };
                let response = request.send().map_err(|e| StoreError::Transient {
                    key: key.to_string(),
                    reason: e.to_string(),
                })?;
                classify(key, response)
            },
            StoreError::is_transient,
        )
    }
}

/// `Ok(None)` for 404, `Ok(Some)` for success, an error otherwise.
fn classify(
    key: &str,
    response: reqwest::blocking::Response,
) -> Result<Option<reqwest::blocking::Response>, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(Some(response));
    }
    if status == StatusCode::NOT_FOUND {
        return Ok(None);
    }
    if is_retryable_status(status) {
        return Err(StoreError::Transient {
            key: key.to_string(),
            reason: format!("status {status}"),
        });
    }
    Err(StoreError::Status {
        key: key.to_string(),
        status: status.as_u16(),
    })
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

impl BlockStore for HttpBlockStore {
    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.send(key, true)?.is_some())
    }

    fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let response = self.send(key, false)?.ok_or_else(|| StoreError::NotFound {
            key: key.to_string(),
        })?;
        let body = response.bytes().map_err(|e| StoreError::Transient {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        Ok(body.to_vec())
    }
}
