// # Zone Writer
//
// Renders a zone's records into zone-file text and commits it to disk.
//
// ## Rendering
//
// Zone files are rendered from a Jinja template (built-in by default, see
// `templates/zonefile.j2`) in strict mode: referencing an undefined variable
// fails the render instead of producing empty output.
//
// ## Commit Protocol
//
// - Render completely in memory first
// - Write to a hidden temporary file in the destination directory
// - Flush and sync the temporary file
// - Atomic rename over the destination
//
// Readers of the destination path (name servers reloading the zone) see
// either the old file or the new one, never a partial write. Any failure
// before the rename leaves the destination untouched.

use std::path::{Path, PathBuf};

use minijinja::{Environment, UndefinedBehavior, context};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::records::ResourceRecord;

/// Built-in zone template
pub const DEFAULT_TEMPLATE: &str = include_str!("templates/zonefile.j2");

/// Provenance tag written into every generated zone
pub const DNS_SOURCE: &str = "netbox";

/// A zone file to (re)generate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneDescriptor {
    /// Zone name without trailing dot ("example.com", "0.0.10.in-addr.arpa")
    pub name: String,

    /// Apex NS records
    pub origin: Vec<ResourceRecord>,

    /// Records of the zone
    pub records: Vec<ResourceRecord>,

    /// Destination file
    pub path: PathBuf,
}

impl ZoneDescriptor {
    /// Describe a zone stored at its conventional path under `config.directory`
    pub fn new(
        config: &SyncConfig,
        name: impl Into<String>,
        origin: Vec<ResourceRecord>,
        records: Vec<ResourceRecord>,
    ) -> Self {
        let name = name.into();
        let path = config.zone_path(&name);
        Self {
            name,
            origin,
            records,
            path,
        }
    }
}

/// Renders and atomically writes zone files
///
/// Borrows the run's configuration for SOA contact, timers and server names.
pub struct ZoneWriter<'a> {
    config: &'a SyncConfig,
    template: String,
    env: Environment<'static>,
}

impl std::fmt::Debug for ZoneWriter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZoneWriter")
            .field("zone", &self.config.zone)
            .field("template_len", &self.template.len())
            .finish()
    }
}

impl<'a> ZoneWriter<'a> {
    /// Create a writer using the given template source
    pub fn new(config: &'a SyncConfig, template: impl Into<String>) -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_trim_blocks(true);
        env.set_keep_trailing_newline(true);

        Self {
            config,
            template: template.into(),
            env,
        }
    }

    /// Create a writer with the template selected by the configuration
    ///
    /// Loads `config.template` if set, otherwise uses [`DEFAULT_TEMPLATE`].
    pub async fn from_config(config: &'a SyncConfig) -> Result<Self> {
        let template = match &config.template {
            Some(path) => fs::read_to_string(path).await.map_err(|e| {
                Error::config(format!(
                    "Failed to read zone template {}: {}",
                    path.display(),
                    e
                ))
            })?,
            None => DEFAULT_TEMPLATE.to_string(),
        };
        Ok(Self::new(config, template))
    }

    /// Render the zone file text
    pub fn render(&self, zone: &ZoneDescriptor, serial: u32) -> Result<String> {
        let timers = &self.config.timers;
        let ctx = context! {
            dns_zone => &zone.name,
            dns_contact => &self.config.contact,
            dns_serial => serial.to_string(),
            dns_refresh_time => timers.refresh,
            dns_retry_time => timers.retry,
            dns_expire_time => timers.expire,
            dns_negative_cache_time => timers.negative_cache,
            dns_default_ttl => self.config.default_ttl,
            dns_servers => self.config.server_names(),
            dns_source => DNS_SOURCE,
            origin_records => &zone.origin,
            records => &zone.records,
        };

        self.env
            .render_str(&self.template, ctx)
            .map_err(|e| Error::render(&zone.name, render_error_message(&e)))
    }

    /// Render the zone and atomically replace its file
    pub async fn write_zone(&self, zone: &ZoneDescriptor, serial: u32) -> Result<()> {
        let text = self.render(zone, serial)?;
        commit_atomically(&zone.path, &text).await?;
        info!(
            "Wrote zone {} ({} records, serial {}) to {}",
            zone.name,
            zone.records.len(),
            serial,
            zone.path.display()
        );
        Ok(())
    }
}

/// Include the template location in render errors
fn render_error_message(err: &minijinja::Error) -> String {
    match err.line() {
        Some(line) => format!("{} (template line {})", err, line),
        None => err.to_string(),
    }
}

/// Replace `path` with `contents` through a temporary file and a rename
///
/// The temporary file lives in the same directory as `path`, so the rename
/// stays on one filesystem. On failure the temporary file is removed on a
/// best-effort basis and `path` is left as it was.
pub async fn commit_atomically(path: &Path, contents: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    fs::create_dir_all(parent).await.map_err(|e| {
        Error::commit(
            path,
            format!("failed to create directory {}: {}", parent.display(), e),
        )
    })?;

    let temp_path = temp_path(path);
    if let Err(e) = write_temp(&temp_path, contents).await {
        discard_temp(&temp_path).await;
        return Err(Error::commit(path, e));
    }

    if let Err(e) = fs::rename(&temp_path, path).await {
        discard_temp(&temp_path).await;
        return Err(Error::commit(
            path,
            format!("failed to rename {}: {}", temp_path.display(), e),
        ));
    }

    debug!("Committed {}", path.display());
    Ok(())
}

async fn write_temp(temp_path: &Path, contents: &str) -> std::result::Result<(), String> {
    let mut file = fs::File::create(temp_path).await.map_err(|e| {
        format!("failed to create temp file {}: {}", temp_path.display(), e)
    })?;

    file.write_all(contents.as_bytes()).await.map_err(|e| {
        format!("failed to write temp file {}: {}", temp_path.display(), e)
    })?;

    file.flush().await.map_err(|e| {
        format!("failed to flush temp file {}: {}", temp_path.display(), e)
    })?;

    file.sync_all().await.map_err(|e| {
        format!("failed to sync temp file {}: {}", temp_path.display(), e)
    })?;

    Ok(())
}

async fn discard_temp(temp_path: &Path) {
    if let Err(e) = fs::remove_file(temp_path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove temp file {}: {}", temp_path.display(), e);
        }
    }
}

/// Hidden sibling of `path`, unique per process: `.zone.db.<pid>.tmp`
fn temp_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "zone".to_string());
    path.with_file_name(format!(".{}.{}.tmp", file_name, std::process::id()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DnsServer, SnapshotSourceConfig};
    use crate::records::RecordType;
    use crate::serial::parse_soa_serial;
    use std::net::Ipv4Addr;
    use tempfile::tempdir;

    fn config(dir: &Path) -> SyncConfig {
        SyncConfig::new(
            "example.com",
            "hostmaster@example.com",
            dir,
            SnapshotSourceConfig::new("http://inventory/devices"),
        )
        .with_dns_server(DnsServer::new("ns1", Some(Ipv4Addr::new(10, 0, 0, 2))))
        .with_dns_server(DnsServer::new("ns2", None))
        .normalized()
    }

    fn forward_zone(config: &SyncConfig) -> ZoneDescriptor {
        ZoneDescriptor::new(
            config,
            "example.com",
            vec![
                ResourceRecord::new("@", RecordType::Ns, "ns1.example.com."),
                ResourceRecord::new("@", RecordType::Ns, "ns2.example.com."),
            ],
            vec![
                ResourceRecord::new("ns1", RecordType::A, "10.0.0.2"),
                ResourceRecord::new("web1", RecordType::A, "10.0.0.4"),
                ResourceRecord::new("www", RecordType::Cname, "web1"),
            ],
        )
    }

    #[test]
    fn test_render_builtin_template() {
        let dir = tempdir().unwrap();
        let config = config(dir.path());
        let writer = ZoneWriter::new(&config, DEFAULT_TEMPLATE);

        let text = writer.render(&forward_zone(&config), 2024060100).unwrap();

        assert!(text.contains("$ORIGIN example.com.\n"));
        assert!(text.contains("SOA\tns1.example.com. hostmaster.example.com. ("));
        assert!(text.contains("2024060100\t; serial"));
        assert!(text.contains("@\tIN\tNS\tns2.example.com.\n"));
        assert!(text.contains("www\tIN\tCNAME\tweb1\n"));
        assert!(text.contains("Generated from netbox"));
        assert!(text.contains("Name servers: ns1, ns2"));
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn test_rendered_zone_parses_back() {
        let dir = tempdir().unwrap();
        let config = config(dir.path());
        let writer = ZoneWriter::new(&config, DEFAULT_TEMPLATE);

        let text = writer.render(&forward_zone(&config), 2024060107).unwrap();
        assert_eq!(parse_soa_serial(&text, "example.com"), Ok(2024060107));
    }

    #[test]
    fn test_strict_mode_rejects_undefined_variables() {
        let dir = tempdir().unwrap();
        let config = config(dir.path());
        let writer = ZoneWriter::new(&config, "{{ dns_zone }} {{ not_a_variable }}\n");

        let err = writer.render(&forward_zone(&config), 2024060100).unwrap_err();
        assert!(matches!(err, Error::Render { .. }));
    }

    #[test]
    fn test_render_without_origin_records_fails() {
        let dir = tempdir().unwrap();
        let config = config(dir.path());
        let writer = ZoneWriter::new(&config, DEFAULT_TEMPLATE);

        let mut zone = forward_zone(&config);
        zone.origin.clear();
        assert!(writer.render(&zone, 2024060100).is_err());
    }

    #[tokio::test]
    async fn test_write_zone_creates_directory() {
        let dir = tempdir().unwrap();
        let config = config(dir.path());
        let writer = ZoneWriter::new(&config, DEFAULT_TEMPLATE);
        let zone = forward_zone(&config);

        writer.write_zone(&zone, 2024060100).await.unwrap();

        assert_eq!(zone.path, dir.path().join("example.com").join("zone.db"));
        let text = fs::read_to_string(&zone.path).await.unwrap();
        assert!(text.contains("web1\tIN\tA\t10.0.0.4"));
    }

    #[tokio::test]
    async fn test_failed_render_leaves_file_untouched() {
        let dir = tempdir().unwrap();
        let config = config(dir.path());
        let zone = forward_zone(&config);

        fs::create_dir_all(zone.path.parent().unwrap()).await.unwrap();
        fs::write(&zone.path, "previous contents\n").await.unwrap();

        let writer = ZoneWriter::new(&config, "{{ dns_zone }}\n{{ dns_missing_value }}\n");
        assert!(writer.write_zone(&zone, 2024060100).await.is_err());

        let text = fs::read_to_string(&zone.path).await.unwrap();
        assert_eq!(text, "previous contents\n");
    }

    #[tokio::test]
    async fn test_failed_rename_leaves_destination_and_no_temp() {
        let dir = tempdir().unwrap();
        // Destination is a non-empty directory: the rename must fail
        let path = dir.path().join("zone.db");
        fs::create_dir_all(path.join("keep")).await.unwrap();

        let err = commit_atomically(&path, "new contents\n").await.unwrap_err();
        assert!(matches!(err, Error::Commit { .. }));
        assert!(path.join("keep").is_dir());
        assert!(!temp_path(&path).exists());
    }

    #[tokio::test]
    async fn test_commit_replaces_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("zone.db");
        fs::write(&path, "old\n").await.unwrap();

        commit_atomically(&path, "new\n").await.unwrap();

        assert_eq!(fs::read_to_string(&path).await.unwrap(), "new\n");
        let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[tokio::test]
    async fn test_commit_into_existing_nested_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("1.0.10.in-addr.arpa").join("zone.db");
        fs::create_dir_all(path.parent().unwrap()).await.unwrap();

        commit_atomically(&path, "first\n").await.unwrap();
        commit_atomically(&path, "second\n").await.unwrap();

        assert_eq!(fs::read_to_string(&path).await.unwrap(), "second\n");
    }

    #[tokio::test]
    async fn test_commit_under_a_file_fails() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("example.com");
        fs::write(&blocker, "not a directory\n").await.unwrap();

        let err = commit_atomically(&blocker.join("zone.db"), "new\n")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Commit { .. }));
        assert_eq!(
            fs::read_to_string(&blocker).await.unwrap(),
            "not a directory\n"
        );
    }

    #[test]
    fn test_temp_path_is_hidden_sibling() {
        let temp = temp_path(Path::new("/srv/dns/example.com/zone.db"));
        assert_eq!(temp.parent(), Some(Path::new("/srv/dns/example.com")));
        let name = temp.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(".zone.db."));
        assert!(name.ends_with(".tmp"));
    }

    #[tokio::test]
    async fn test_from_config_missing_template() {
        let dir = tempdir().unwrap();
        let config = config(dir.path()).with_template(dir.path().join("nope.j2"));
        let err = ZoneWriter::from_config(&config).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
