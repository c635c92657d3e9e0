// # Snapshot Source Trait
//
// Defines the interface for fetching the device inventory snapshot.
//
// ## Implementations
//
// - HTTP (JSON document): `zonesync-source-http` crate
// - Tests: static in-memory snapshots
//
// ## Usage
//
// ```rust,ignore
// use zonesync_core::SnapshotSource;
//
// #[tokio::main]
// async fn main() -> zonesync_core::Result<()> {
//     let source = /* SnapshotSource implementation */;
//
//     let snapshot = source.fetch().await?;
//     println!("{} devices", snapshot.len());
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

use crate::snapshot::InventorySnapshot;

/// Trait for inventory snapshot sources
///
/// A source performs a single fetch per call. It does not retry, cache or
/// schedule anything: a failed fetch is returned to the engine, which aborts
/// the run before any zone file is touched. Re-invocation by an external
/// scheduler is the retry mechanism.
///
/// Implementations must be thread-safe and usable across async tasks.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetch a complete snapshot
    ///
    /// # Returns
    ///
    /// - `Ok(InventorySnapshot)`: The whole inventory
    /// - `Err(Error::Fetch)`: The endpoint was unreachable or answered with
    ///   a non-success status
    /// - `Err(Error::Snapshot)`: The document is not a valid snapshot
    async fn fetch(&self) -> Result<InventorySnapshot, crate::Error>;

    /// Short name used in log messages
    fn source_name(&self) -> &str {
        "snapshot"
    }
}
