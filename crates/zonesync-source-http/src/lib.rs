// # HTTP Snapshot Source
//
// This crate provides the HTTP-based inventory snapshot source for zonesync.
//
// ## Purpose
//
// The inventory service publishes the whole device list as one JSON object
// (device name → addresses). This source fetches it with a single GET per
// run and hands it to the core parser.
//
// ## Failure Handling
//
// - Unreachable endpoint, timeout, non-2xx status → `Error::Fetch`
// - Body that is not a JSON object → `Error::Snapshot`
//
// Both are fatal for the run: no zone file is touched. There is no retry;
// the external scheduler invokes the next run.

use std::time::Duration;

use zonesync_core::config::SnapshotSourceConfig;
use zonesync_core::traits::SnapshotSource;
use zonesync_core::{Error, InventorySnapshot, Result};

/// Basic auth credentials for the inventory endpoint
#[derive(Clone)]
struct Credentials {
    username: String,
    password: Option<String>,
}

/// Inventory snapshot fetched over HTTP(S)
pub struct HttpSnapshotSource {
    /// Snapshot URL
    url: String,

    /// Optional basic auth
    credentials: Option<Credentials>,

    /// Request timeout
    timeout: Duration,

    /// HTTP client
    client: reqwest::Client,
}

// Keeps the password out of logs
impl std::fmt::Debug for HttpSnapshotSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSnapshotSource")
            .field("url", &self.url)
            .field(
                "username",
                &self.credentials.as_ref().map(|c| c.username.as_str()),
            )
            .field(
                "password",
                &self
                    .credentials
                    .as_ref()
                    .and_then(|c| c.password.as_ref())
                    .map(|_| "<REDACTED>"),
            )
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl HttpSnapshotSource {
    /// Create a new HTTP snapshot source
    ///
    /// # Parameters
    ///
    /// - `url`: Snapshot endpoint (e.g., "https://netbox.example.com/api/dns/")
    /// - `timeout`: Upper bound for connecting and reading the response
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url: url.into(),
            credentials: None,
            timeout,
            client,
        })
    }

    /// Send basic auth credentials with every request
    pub fn with_basic_auth(
        mut self,
        username: impl Into<String>,
        password: Option<String>,
    ) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password,
        });
        self
    }

    /// Create a source from the engine's source configuration
    pub fn from_config(config: &SnapshotSourceConfig) -> Result<Self> {
        config.validate()?;

        let source = Self::new(&config.url, Duration::from_secs(config.timeout_secs))?;
        Ok(match &config.username {
            Some(username) => source.with_basic_auth(username, config.password.clone()),
            None => source,
        })
    }

    /// Snapshot URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch the raw snapshot document
    async fn fetch_document(&self) -> Result<String> {
        let mut request = self
            .client
            .get(&self.url)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(credentials) = &self.credentials {
            request = request.basic_auth(&credentials.username, credentials.password.as_ref());
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::fetch(format!("Request to {} failed: {}", self.url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::fetch(format!("HTTP error: {}", status)));
        }

        response
            .text()
            .await
            .map_err(|e| Error::fetch(format!("Failed to read response: {}", e)))
    }
}

#[async_trait::async_trait]
impl SnapshotSource for HttpSnapshotSource {
    async fn fetch(&self) -> Result<InventorySnapshot> {
        tracing::debug!("GET {}", self.url);
        let body = self.fetch_document().await?;
        tracing::debug!("Received {} byte(s) from {}", body.len(), self.url);

        InventorySnapshot::from_json_str(&body)
    }

    fn source_name(&self) -> &str {
        &self.url
    }
}
