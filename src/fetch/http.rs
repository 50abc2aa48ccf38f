use async_trait::async_trait;
use bytes::Bytes;
use log::debug;
use std::time::Duration;

use super::SampleFetcher;
use crate::error::FetchError;
use crate::models::SampleKey;

/// Fetches sample audio from the library server's byte-stream endpoint
/// (`GET {base_url}/api/samples/{id}/audio`).
pub struct HttpSampleFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSampleFetcher {
    pub fn new(base_url: impl Into<String>) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| FetchError::Network(format!("HTTP client error: {}", e)))?;

        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    /// Endpoint URL for a sample; string keys are percent-encoded
    pub fn audio_url(&self, key: &SampleKey) -> String {
        let segment = match key {
            SampleKey::Id(id) => id.to_string(),
            SampleKey::Name(name) => encode_path_segment(name),
        };
        format!("{}/api/samples/{}/audio", self.base_url, segment)
    }
}

#[async_trait]
impl SampleFetcher for HttpSampleFetcher {
    async fn fetch(&self, key: &SampleKey) -> Result<Bytes, FetchError> {
        let url = self.audio_url(key);
        debug!("Fetching sample {} from {}", key, url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Network(format!("Request failed: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound { key: key.to_string() });
        }
        if !status.is_success() {
            return Err(FetchError::Network(format!("Server returned {}", status)));
        }

        response
            .bytes()
            .await
            .map_err(|e| FetchError::Network(format!("Failed to read body: {}", e)))
    }
}

fn encode_path_segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}
