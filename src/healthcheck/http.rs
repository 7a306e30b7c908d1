use super::HealthChecker;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::OnceLock;
use std::time::Duration;

/// Shared HTTP client for health probes.
///
/// One pooled client across all checkers; individual requests override the
/// timeout per call.
static SHARED_HTTP_CLIENT: OnceLock<Client> = OnceLock::new();

fn shared_client() -> &'static Client {
    SHARED_HTTP_CLIENT.get_or_init(|| {
        Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client")
    })
}

/// Readiness probe that GETs a URL and expects a 2xx response
/// (e.g. flower's healthcheck endpoint).
pub struct HttpChecker {
    url: String,
    timeout: Duration,
}

impl HttpChecker {
    /// # Errors
    ///
    /// Returns an error if the URL is malformed or not http/https.
    pub fn new(url: String, timeout: Duration) -> Result<Self> {
        validate_url(&url)?;
        Ok(Self { url, timeout })
    }
}

fn validate_url(url: &str) -> Result<()> {
    let parsed = url::Url::parse(url)
        .map_err(|e| Error::Config(format!("invalid probe URL '{}': {}", url, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(Error::Config(format!(
            "invalid probe URL '{}': scheme must be http or https, got '{}'",
            url, scheme
        ))),
    }
}

#[async_trait]
impl HealthChecker for HttpChecker {
    async fn check(&self) -> Result<bool> {
        match shared_client()
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }
}
