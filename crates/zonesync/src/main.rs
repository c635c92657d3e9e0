// # zonesync - Zone File Synchronizer
//
// One-shot binary: fetch the device inventory, regenerate the forward zone
// and every reverse zone, exit. Scheduling (cron, systemd timer) is external.
//
// This binary is a THIN integration layer:
// 1. Read configuration from environment variables
// 2. Initialize logging and the runtime
// 3. Build the HTTP snapshot source and the engine
// 4. Run the engine once and map the outcome to an exit code
//
// All record, serial and zone-file logic lives in zonesync-core.
//
// ## Configuration
//
// ### Inventory
// - `NETBOX_ENDPOINT`: URL of the JSON device snapshot (required)
// - `NETBOX_USERNAME`, `NETBOX_PASSWORD`: Basic auth credentials (optional)
// - `ZONESYNC_FETCH_TIMEOUT_SECS`: Fetch timeout (default 30)
//
// ### Zones
// - `DNS_ZONE`: Forward zone suffix (required)
// - `DNS_CONTACT`: SOA contact, e.g. hostmaster@example.com (required)
// - `DNS_SERVERS`: `{"ns1": "10.0.0.2", "ns2": null}` or `ns1,ns2` (required)
// - `DNS_DIRECTORY`: Base directory of the zone files (required)
// - `DNS_REFRESH_TIME`, `DNS_RETRY_TIME`, `DNS_EXPIRE_TIME`,
//   `DNS_NEGATIVE_CACHE_TIME`, `DNS_DEFAULT_TTL`: SOA timers and `$TTL`
// - `ZONESYNC_TEMPLATE`: Custom zone template (optional)
//
// ### Logging
// - `ZONESYNC_LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ## Example
//
// ```bash
// export NETBOX_ENDPOINT=https://netbox.example.com/api/dns/
// export DNS_ZONE=example.com
// export DNS_CONTACT=hostmaster@example.com
// export DNS_SERVERS='{"ns1": "10.0.0.2"}'
// export DNS_DIRECTORY=/var/lib/bind/zones
//
// zonesync
// ```

use anyhow::{Context, Result};
use std::env;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;
use zonesync_core::{DnsServer, SnapshotSourceConfig, SoaTimers, SyncConfig, SyncEngine};
use zonesync_source_http::HttpSnapshotSource;

/// Exit codes for the scheduler
///
/// - 0: Every zone written
/// - 1: Configuration or startup error
/// - 2: Runtime error (fetch failed, invalid snapshot, a zone failed)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncExitCode {
    /// All zones written
    Success = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error
    RuntimeError = 2,
}

impl From<SyncExitCode> for ExitCode {
    fn from(code: SyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    endpoint: String,
    username: Option<String>,
    password: Option<String>,
    fetch_timeout_secs: u64,
    zone: String,
    contact: String,
    dns_servers: Vec<DnsServer>,
    directory: PathBuf,
    timers: SoaTimers,
    default_ttl: u32,
    template: Option<PathBuf>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup` (environment in production)
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| -> Result<String> {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .with_context(|| format!("{} is required", key))
        };
        let optional = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let defaults = SoaTimers::default();
        Ok(Self {
            endpoint: required("NETBOX_ENDPOINT")?,
            username: optional("NETBOX_USERNAME"),
            password: optional("NETBOX_PASSWORD"),
            fetch_timeout_secs: parse_number(&lookup, "ZONESYNC_FETCH_TIMEOUT_SECS", 30)?,
            zone: required("DNS_ZONE")?,
            contact: required("DNS_CONTACT")?,
            dns_servers: parse_dns_servers(&required("DNS_SERVERS")?)?,
            directory: PathBuf::from(required("DNS_DIRECTORY")?),
            timers: SoaTimers {
                refresh: parse_number(&lookup, "DNS_REFRESH_TIME", defaults.refresh)?,
                retry: parse_number(&lookup, "DNS_RETRY_TIME", defaults.retry)?,
                expire: parse_number(&lookup, "DNS_EXPIRE_TIME", defaults.expire)?,
                negative_cache: parse_number(
                    &lookup,
                    "DNS_NEGATIVE_CACHE_TIME",
                    defaults.negative_cache,
                )?,
            },
            default_ttl: parse_number(&lookup, "DNS_DEFAULT_TTL", 3600)?,
            template: optional("ZONESYNC_TEMPLATE").map(PathBuf::from),
            log_level: optional("ZONESYNC_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate values the core does not check
    fn validate(&self) -> Result<()> {
        log_level(&self.log_level)?;

        if self.endpoint.starts_with("http://") && self.password.is_some() {
            eprintln!(
                "WARNING: NETBOX_ENDPOINT uses HTTP (not HTTPS). \
                 Credentials are sent in clear text."
            );
        }

        Ok(())
    }

    /// Build the normalized engine configuration
    fn sync_config(&self) -> SyncConfig {
        let mut source = SnapshotSourceConfig::new(&self.endpoint);
        source.timeout_secs = self.fetch_timeout_secs;
        source.username = self.username.clone();
        source.password = self.password.clone();

        let mut config = SyncConfig::new(&self.zone, &self.contact, &self.directory, source)
            .with_timers(self.timers);
        config.default_ttl = self.default_ttl;
        config.template = self.template.clone();
        for server in &self.dns_servers {
            config = config.with_dns_server(server.clone());
        }
        config.normalized()
    }
}

/// Parse an optional numeric variable, falling back to `default` when unset
fn parse_number<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key).map(|value| value.trim().to_string()) {
        Some(value) if !value.is_empty() => value
            .parse()
            .map_err(|e| anyhow::anyhow!("{} must be a number. Got '{}': {}", key, value, e)),
        _ => Ok(default),
    }
}

/// Parse `DNS_SERVERS`
///
/// Either a JSON object mapping server name to glue address (or null), in
/// order, or a comma-separated list of names without glue.
fn parse_dns_servers(text: &str) -> Result<Vec<DnsServer>> {
    let text = text.trim();

    let servers = if text.starts_with('{') {
        let map: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(text).context("DNS_SERVERS is not a valid JSON object")?;

        map.into_iter()
            .map(|(name, address)| -> Result<DnsServer> {
                let address = match address {
                    serde_json::Value::Null => None,
                    serde_json::Value::String(s) if s.trim().is_empty() => None,
                    serde_json::Value::String(s) => {
                        let address = s.trim().parse::<Ipv4Addr>().map_err(|e| {
                            anyhow::anyhow!(
                                "Invalid address for DNS server {}: '{}': {}",
                                name,
                                s,
                                e
                            )
                        })?;
                        Some(address)
                    }
                    other => anyhow::bail!(
                        "Invalid address for DNS server {}: expected a string or null, got {}",
                        name,
                        other
                    ),
                };
                Ok(DnsServer::new(name, address))
            })
            .collect::<Result<Vec<_>>>()?
    } else {
        text.split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| DnsServer::new(name, None))
            .collect()
    };

    if servers.is_empty() {
        anyhow::bail!("DNS_SERVERS must name at least one server");
    }
    Ok(servers)
}

fn log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "ZONESYNC_LOG_LEVEL '{}' is not valid. \
             Valid levels: trace, debug, info, warn, error",
            level
        ),
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return SyncExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return SyncExitCode::ConfigError.into();
    }

    // Logs go to stderr; stdout stays clean for the scheduler
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level(&config.log_level).unwrap_or(Level::INFO))
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return SyncExitCode::ConfigError.into();
    }

    let sync_config = Arc::new(config.sync_config());
    let source = match HttpSnapshotSource::from_config(&sync_config.source) {
        Ok(source) => source,
        Err(e) => {
            error!("{}", e);
            return SyncExitCode::ConfigError.into();
        }
    };
    let engine = match SyncEngine::new(Box::new(source), Arc::clone(&sync_config)) {
        Ok(engine) => engine,
        Err(e) => {
            error!("{}", e);
            return SyncExitCode::ConfigError.into();
        }
    };

    info!(
        "Synchronizing zone {} into {}",
        sync_config.zone,
        sync_config.directory.display()
    );

    // A single run needs no worker pool
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return SyncExitCode::RuntimeError.into();
        }
    };

    rt.block_on(run(engine)).into()
}

/// Run the engine once and report every zone
async fn run(engine: SyncEngine) -> SyncExitCode {
    let report = match engine.run().await {
        Ok(report) => report,
        Err(e) => {
            error!("Synchronization aborted: {}", e);
            return SyncExitCode::RuntimeError;
        }
    };

    for zone in &report.zones {
        match &zone.result {
            Ok(serial) => info!("{}: serial {} ({})", zone.zone, serial, zone.path.display()),
            Err(e) => error!("{}: {}", zone.zone, e),
        }
    }

    match report.into_result() {
        Ok(_) => SyncExitCode::Success,
        Err(e) => {
            error!("{}", e);
            SyncExitCode::RuntimeError
        }
    }
}
