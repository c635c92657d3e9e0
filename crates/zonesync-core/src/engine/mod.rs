//! Zone synchronization engine
//!
//! The SyncEngine is responsible for:
//! - Fetching the inventory snapshot via SnapshotSource
//! - Deriving forward and reverse records
//! - Computing the next serial of every affected zone
//! - Writing each zone file atomically via ZoneWriter
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────┐
//! │ SnapshotSource │─── InventorySnapshot ───┐
//! └────────────────┘                         │
//!                                            ▼
//!                                   ┌──────────────┐
//!                                   │  SyncEngine  │── derive() ──▶ DerivedRecords
//!                                   └──────────────┘
//!                                            │  per zone
//!                         ┌──────────────────┴──────────────────┐
//!                         ▼                                     ▼
//!                 ┌───────────────┐                     ┌──────────────┐
//!                 │ SerialManager │── next serial ─────▶│  ZoneWriter  │
//!                 │ (read old)    │                     │ (render+mv)  │
//!                 └───────────────┘                     └──────────────┘
//! ```
//!
//! ## Run Flow
//!
//! 1. Fetch the snapshot (bounded by the configured timeout). A failed fetch
//!    aborts the run before any zone file is touched.
//! 2. Derive all records.
//! 3. For the forward zone and each reverse block: compute the serial,
//!    render and commit. A failing zone does not stop the others.
//! 4. Report every zone's outcome.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::records::{DerivedRecords, derive};
use crate::serial::SerialManager;
use crate::snapshot::InventorySnapshot;
use crate::traits::SnapshotSource;
use crate::zone::{ZoneDescriptor, ZoneWriter};

/// Outcome of one zone in a run
#[derive(Debug)]
pub struct ZoneOutcome {
    /// Zone name
    pub zone: String,
    /// Zone file path
    pub path: PathBuf,
    /// Serial written, or why the zone was not written
    pub result: Result<u32>,
}

impl ZoneOutcome {
    /// Whether the zone file was replaced
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Summary of one synchronization run
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Devices in the fetched snapshot
    pub devices: usize,
    /// One entry per zone, forward zone first, then reverse zones by network
    pub zones: Vec<ZoneOutcome>,
}

impl SyncReport {
    /// Number of zones that failed
    pub fn failed(&self) -> usize {
        self.zones.iter().filter(|z| !z.is_success()).count()
    }

    /// Whether every zone was written
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    /// Turn per-zone failures into a run error
    pub fn into_result(self) -> Result<Self> {
        let failed = self.failed();
        if failed > 0 {
            return Err(Error::ZoneWrite {
                failed,
                total: self.zones.len(),
            });
        }
        Ok(self)
    }
}

/// One-shot zone synchronization engine
///
/// ## Lifecycle
///
/// 1. Create with [`SyncEngine::new()`]
/// 2. Call [`SyncEngine::run()`] once per synchronization
/// 3. Nothing is kept between runs except the zone files
pub struct SyncEngine {
    /// Snapshot source
    source: Box<dyn SnapshotSource>,

    /// Immutable run configuration
    config: Arc<SyncConfig>,

    /// Serial computation
    serials: SerialManager,
}

impl SyncEngine {
    /// Create a new engine
    ///
    /// The configuration is validated here.
    pub fn new(source: Box<dyn SnapshotSource>, config: Arc<SyncConfig>) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            source,
            config,
            serials: SerialManager::new(),
        })
    }

    /// Use a custom serial manager (e.g. pinned to a date)
    pub fn with_serial_manager(mut self, serials: SerialManager) -> Self {
        self.serials = serials;
        self
    }

    /// Configuration of this engine
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Run one synchronization
    ///
    /// # Returns
    ///
    /// - `Ok(SyncReport)`: The snapshot was fetched; per-zone outcomes are
    ///   in the report (some zones may have failed)
    /// - `Err(Error)`: Fatal error before any zone was written (fetch,
    ///   invalid snapshot, unreadable template)
    pub async fn run(&self) -> Result<SyncReport> {
        let snapshot = self.fetch_snapshot().await?;
        let writer = ZoneWriter::from_config(&self.config).await?;

        let derived = derive(&snapshot, &self.config.zone, &self.config.dns_servers);
        info!(
            "Derived {} forward record(s) and {} reverse zone(s)",
            derived.forward.len(),
            derived.reverse.len()
        );

        let mut report = SyncReport {
            devices: snapshot.len(),
            zones: Vec::new(),
        };

        for zone in self.zone_descriptors(derived) {
            let result = self.write_zone(&writer, &zone).await;
            if let Err(e) = &result {
                error!("Failed to update zone {}: {}", zone.name, e);
            }
            report.zones.push(ZoneOutcome {
                zone: zone.name,
                path: zone.path,
                result,
            });
        }

        info!(
            "Synchronization finished: {} zone(s) written, {} failed",
            report.zones.len() - report.failed(),
            report.failed()
        );

        Ok(report)
    }

    /// Fetch the snapshot within the configured timeout
    async fn fetch_snapshot(&self) -> Result<InventorySnapshot> {
        let timeout = Duration::from_secs(self.config.source.timeout_secs);
        info!("Fetching inventory snapshot from {}", self.source.source_name());

        let snapshot = tokio::time::timeout(timeout, self.source.fetch())
            .await
            .map_err(|_| Error::fetch(format!("no snapshot after {:?}", timeout)))??;

        info!("Fetched snapshot with {} device(s)", snapshot.len());
        Ok(snapshot)
    }

    /// Forward zone first, then reverse zones in network order
    fn zone_descriptors(&self, derived: DerivedRecords) -> Vec<ZoneDescriptor> {
        let DerivedRecords {
            origin,
            forward,
            reverse,
        } = derived;

        let mut zones = Vec::with_capacity(reverse.len() + 1);
        zones.push(ZoneDescriptor::new(
            &self.config,
            self.config.zone.clone(),
            origin.clone(),
            forward,
        ));
        for (block, records) in reverse {
            zones.push(ZoneDescriptor::new(
                &self.config,
                block.zone_name(),
                origin.clone(),
                records,
            ));
        }
        zones
    }

    /// Compute the serial of one zone and write it
    async fn write_zone(&self, writer: &ZoneWriter<'_>, zone: &ZoneDescriptor) -> Result<u32> {
        let state = self.serials.next_serial(&zone.path, &zone.name).await?;
        writer.write_zone(zone, state.next).await?;
        Ok(state.next)
    }
}
