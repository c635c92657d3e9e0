//! Core traits for zone synchronization
//!
//! - [`SnapshotSource`]: Fetch the device inventory snapshot

pub mod snapshot_source;

pub use snapshot_source::SnapshotSource;
