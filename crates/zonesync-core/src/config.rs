//! Configuration types for zone synchronization
//!
//! A [`SyncConfig`] is built once at startup, validated, and then shared
//! read-only (usually as `Arc<SyncConfig>`) by the engine, the serial manager
//! and the zone writer.

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

/// File name of every generated zone inside its zone directory
pub const ZONE_FILE_NAME: &str = "zone.db";

/// Main synchronization configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Forward zone suffix (e.g. "example.com")
    pub zone: String,

    /// SOA RNAME (administrative contact)
    pub contact: String,

    /// SOA timers, passed through to the template
    #[serde(default)]
    pub timers: SoaTimers,

    /// `$TTL` of generated zones
    #[serde(default = "default_ttl")]
    pub default_ttl: u32,

    /// Authoritative DNS servers; the first one is the SOA MNAME
    pub dns_servers: Vec<DnsServer>,

    /// Base directory; zone `Z` is written to `directory/Z/zone.db`
    pub directory: PathBuf,

    /// Where the inventory snapshot comes from
    pub source: SnapshotSourceConfig,

    /// Custom zone template (built-in template when unset)
    #[serde(default)]
    pub template: Option<PathBuf>,
}

impl SyncConfig {
    /// Create a configuration with default timers and no servers
    pub fn new(
        zone: impl Into<String>,
        contact: impl Into<String>,
        directory: impl Into<PathBuf>,
        source: SnapshotSourceConfig,
    ) -> Self {
        Self {
            zone: zone.into(),
            contact: contact.into(),
            timers: SoaTimers::default(),
            default_ttl: default_ttl(),
            dns_servers: Vec::new(),
            directory: directory.into(),
            source,
            template: None,
        }
    }

    /// Add an authoritative DNS server
    pub fn with_dns_server(mut self, server: DnsServer) -> Self {
        self.dns_servers.push(server);
        self
    }

    /// Set the SOA timers
    pub fn with_timers(mut self, timers: SoaTimers) -> Self {
        self.timers = timers;
        self
    }

    /// Use a custom zone template
    pub fn with_template(mut self, template: impl Into<PathBuf>) -> Self {
        self.template = Some(template.into());
        self
    }

    /// Canonicalize user-supplied names
    ///
    /// - the zone loses any trailing dot
    /// - the contact turns `@` into `.` and gains a trailing dot
    /// - server names are trimmed
    pub fn normalized(mut self) -> Self {
        self.zone = self.zone.trim().trim_end_matches('.').to_lowercase();

        let mut contact = self.contact.trim().replacen('@', ".", 1);
        if !contact.ends_with('.') {
            contact.push('.');
        }
        self.contact = contact;

        for server in &mut self.dns_servers {
            server.name = server.name.trim().to_string();
        }
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.zone.is_empty() {
            return Err(crate::Error::config("DNS zone cannot be empty"));
        }

        if self.contact.trim_end_matches('.').is_empty() {
            return Err(crate::Error::config("DNS contact cannot be empty"));
        }

        if self.dns_servers.is_empty() {
            return Err(crate::Error::config(
                "At least one authoritative DNS server must be configured",
            ));
        }

        for server in &self.dns_servers {
            if server.name.is_empty() || server.name.contains(char::is_whitespace) {
                return Err(crate::Error::config(format!(
                    "Invalid DNS server name: '{}'",
                    server.name
                )));
            }
        }

        if self.directory.as_os_str().is_empty() {
            return Err(crate::Error::config("Zone directory cannot be empty"));
        }

        self.timers.validate()?;
        self.source.validate()?;

        Ok(())
    }

    /// Path of the zone file for `zone_name`
    pub fn zone_path(&self, zone_name: &str) -> PathBuf {
        zone_path(&self.directory, zone_name)
    }

    /// Names of the configured DNS servers, in configuration order
    pub fn server_names(&self) -> Vec<String> {
        self.dns_servers.iter().map(|s| s.name.clone()).collect()
    }
}

/// Path of the zone file for `zone_name` under `directory`
pub fn zone_path(directory: &Path, zone_name: &str) -> PathBuf {
    directory.join(zone_name).join(ZONE_FILE_NAME)
}

/// An authoritative DNS server of the forward zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsServer {
    /// Host label inside the forward zone (e.g. "ns1")
    pub name: String,

    /// Glue address published as an A record, if any
    #[serde(default)]
    pub address: Option<Ipv4Addr>,
}

impl DnsServer {
    /// Create a server entry
    pub fn new(name: impl Into<String>, address: Option<Ipv4Addr>) -> Self {
        Self {
            name: name.into(),
            address,
        }
    }
}

/// SOA timers in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoaTimers {
    /// Secondary refresh interval
    #[serde(default = "default_refresh")]
    pub refresh: u32,

    /// Retry interval after a failed refresh
    #[serde(default = "default_retry")]
    pub retry: u32,

    /// Expiry of secondary data
    #[serde(default = "default_expire")]
    pub expire: u32,

    /// Negative caching TTL
    #[serde(default = "default_negative_cache")]
    pub negative_cache: u32,
}

impl SoaTimers {
    /// Validate timer relationships
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.refresh == 0 || self.retry == 0 || self.expire == 0 {
            return Err(crate::Error::config(
                "SOA refresh, retry and expire times must be > 0",
            ));
        }
        if self.expire < self.refresh {
            return Err(crate::Error::config(format!(
                "SOA expire time ({}) must not be shorter than refresh time ({})",
                self.expire, self.refresh
            )));
        }
        Ok(())
    }
}

impl Default for SoaTimers {
    fn default() -> Self {
        Self {
            refresh: default_refresh(),
            retry: default_retry(),
            expire: default_expire(),
            negative_cache: default_negative_cache(),
        }
    }
}

/// Inventory snapshot endpoint configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct SnapshotSourceConfig {
    /// URL of the JSON snapshot
    pub url: String,

    /// Upper bound for the whole fetch (in seconds)
    #[serde(default = "default_fetch_timeout_secs")]
    pub timeout_secs: u64,

    /// Basic auth user name
    #[serde(default)]
    pub username: Option<String>,

    /// Basic auth password
    #[serde(default)]
    pub password: Option<String>,
}

// Keeps the password out of logs
impl std::fmt::Debug for SnapshotSourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotSourceConfig")
            .field("url", &self.url)
            .field("timeout_secs", &self.timeout_secs)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

impl SnapshotSourceConfig {
    /// Create a source configuration with the default timeout
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout_secs: default_fetch_timeout_secs(),
            username: None,
            password: None,
        }
    }

    /// Validate the source configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.url.is_empty() {
            return Err(crate::Error::config("Snapshot endpoint URL cannot be empty"));
        }
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err(crate::Error::config(format!(
                "Snapshot endpoint must use HTTP or HTTPS scheme. Got: {}",
                self.url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(crate::Error::config("Snapshot fetch timeout must be > 0"));
        }
        if self.password.is_some() && self.username.is_none() {
            return Err(crate::Error::config(
                "Snapshot endpoint password given without a user name",
            ));
        }
        Ok(())
    }
}

fn default_ttl() -> u32 {
    3600
}

fn default_refresh() -> u32 {
    3600
}

fn default_retry() -> u32 {
    900
}

fn default_expire() -> u32 {
    1_209_600
}

fn default_negative_cache() -> u32 {
    300
}

fn default_fetch_timeout_secs() -> u64 {
    30
}
