//! Test doubles and common utilities for synchronization contract tests
//!
//! This module provides minimal snapshot sources and configuration helpers
//! shared by the contract tests.

#![allow(dead_code)]

use chrono::NaiveDate;
use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use zonesync_core::config::{DnsServer, SnapshotSourceConfig, SyncConfig};
use zonesync_core::error::{Error, Result};
use zonesync_core::{InventorySnapshot, SerialManager, SnapshotSource, SyncEngine};

/// A source that always returns the same snapshot
pub struct StaticSnapshotSource {
    snapshot: InventorySnapshot,
    fetch_count: Arc<AtomicUsize>,
}

impl StaticSnapshotSource {
    pub fn new(snapshot: InventorySnapshot) -> Self {
        Self {
            snapshot,
            fetch_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Build from a JSON document, as the inventory service would send it
    pub fn from_json(value: serde_json::Value) -> Self {
        Self::new(InventorySnapshot::from_json(&value).expect("valid snapshot document"))
    }

    /// Get the number of times fetch() was called
    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }

    /// Create a new source that shares its counter with an existing one
    pub fn sharing_counter_with(other: &Self) -> Self {
        Self {
            snapshot: other.snapshot.clone(),
            fetch_count: Arc::clone(&other.fetch_count),
        }
    }
}

#[async_trait::async_trait]
impl SnapshotSource for StaticSnapshotSource {
    async fn fetch(&self) -> Result<InventorySnapshot> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        Ok(self.snapshot.clone())
    }

    fn source_name(&self) -> &str {
        "static"
    }
}

/// A source whose endpoint is down
pub struct FailingSnapshotSource;

#[async_trait::async_trait]
impl SnapshotSource for FailingSnapshotSource {
    async fn fetch(&self) -> Result<InventorySnapshot> {
        Err(Error::fetch("HTTP error: 503 Service Unavailable"))
    }
}

/// A source that answers far too late
pub struct SlowSnapshotSource {
    pub delay: Duration,
}

#[async_trait::async_trait]
impl SnapshotSource for SlowSnapshotSource {
    async fn fetch(&self) -> Result<InventorySnapshot> {
        tokio::time::sleep(self.delay).await;
        Ok(InventorySnapshot::new())
    }
}

/// Helper to create a minimal SyncConfig writing below `dir`
pub fn minimal_config(dir: &Path) -> SyncConfig {
    SyncConfig::new(
        "example.com",
        "hostmaster@example.com",
        dir,
        SnapshotSourceConfig::new("http://inventory.test/devices"),
    )
    .with_dns_server(DnsServer::new("ns1", Some(Ipv4Addr::new(10, 0, 0, 2))))
    .normalized()
}

/// Serial manager pinned to 2024-06-01 (baseline 2024060100)
pub fn june_first() -> SerialManager {
    SerialManager::pinned(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())
}

/// Engine over `source` with a pinned date
pub fn engine(
    source: impl SnapshotSource + 'static,
    config: SyncConfig,
    serials: SerialManager,
) -> SyncEngine {
    SyncEngine::new(Box::new(source), Arc::new(config))
        .expect("engine construction succeeds")
        .with_serial_manager(serials)
}

/// The example inventory used throughout the contract tests
pub fn example_snapshot() -> serde_json::Value {
    serde_json::json!({
        "web1": {"primary": "10.0.0.4", "cnames": ["www"]},
        "web2": {"primary": "10.0.0.30"}
    })
}

/// Zone file text without comment lines and the serial line
pub fn records_only(text: &str) -> Vec<String> {
    text.lines()
        .filter(|line| !line.trim_start().starts_with(';'))
        .filter(|line| !line.contains("; serial"))
        .map(str::to_string)
        .collect()
}
