//! Remote agent job API transport
//!
//! The job API is two endpoints:
//! - `POST {base}/agent/prompt` with `{"prompt": ..}` returns `{"success", "jobId"}`
//! - `GET {base}/agent/job/{jobId}` returns the job record
//!
//! Both authenticate with an `X-API-Key` header. The poll loop only sees the
//! [`JobTransport`] trait so it can run against a scripted transport in tests.

use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};

const API_KEY_HEADER: &str = "X-API-Key";
const PING_PROMPT: &str = "ping";

/// Raw access to the remote job API
#[async_trait]
pub trait JobTransport: Send + Sync {
    /// Submit a prompt, returning the raw submit response body
    async fn submit(&self, prompt: &str) -> Result<Value>;

    /// Fetch the raw status record for `job_id`
    async fn status(&self, job_id: &str) -> Result<Value>;

    /// Whether the service is reachable. Never errors.
    async fn ping(&self) -> bool;
}

/// reqwest-backed transport
pub struct HttpJobTransport {
    client: Client,
    base_url: String,
    api_key: SecretString,
}

impl HttpJobTransport {
    pub fn new(base_url: impl Into<String>, api_key: SecretString) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn prompt_endpoint(&self) -> String {
        format!("{}/agent/prompt", self.base_url)
    }

    fn job_endpoint(&self, job_id: &str) -> String {
        format!("{}/agent/job/{}", self.base_url, job_id)
    }

    async fn post_prompt(&self, prompt: &str) -> reqwest::Result<reqwest::Response> {
        self.client
            .post(self.prompt_endpoint())
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .json(&json!({ "prompt": prompt }))
            .send()
            .await
    }
}

impl std::fmt::Debug for HttpJobTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpJobTransport")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl JobTransport for HttpJobTransport {
    async fn submit(&self, prompt: &str) -> Result<Value> {
        let response = self.post_prompt(prompt).await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::SubmitRejected {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|_| Error::MalformedSubmitResponse(body))
    }

    async fn status(&self, job_id: &str) -> Result<Value> {
        let response = self
            .client
            .get(self.job_endpoint(job_id))
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| Error::PollTransport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::PollTransport(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| Error::PollTransport(format!("Failed to parse job status: {}", e)))
    }

    async fn ping(&self) -> bool {
        match self.post_prompt(PING_PROMPT).await {
            // Any answer short of a gateway error means the API is up
            Ok(response) => !matches!(
                response.status(),
                StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE
            ),
            Err(e) => {
                tracing::warn!(base_url = %self.base_url, error = %e, "Remote agent connectivity check failed");
                false
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints() {
        let transport =
            HttpJobTransport::new("https://api.example.test/", SecretString::from("k"));

        assert_eq!(transport.base_url(), "https://api.example.test");
        assert_eq!(
            transport.prompt_endpoint(),
            "https://api.example.test/agent/prompt"
        );
        assert_eq!(
            transport.job_endpoint("abc"),
            "https://api.example.test/agent/job/abc"
        );
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let transport = HttpJobTransport::new("https://x", SecretString::from("super-secret"));
        let debug_str = format!("{:?}", transport);
        assert!(!debug_str.contains("super-secret"));
    }

    #[tokio::test]
    async fn test_ping_unreachable_is_false() {
        // Port 9 (discard) on localhost is closed in test environments
        let transport = HttpJobTransport::new("http://127.0.0.1:9", SecretString::from("k"));
        assert!(!transport.ping().await);
    }
}
