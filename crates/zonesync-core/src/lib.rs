// # zonesync-core
//
// Core library for keeping authoritative DNS zone files in sync with a
// device inventory.
//
// ## Architecture Overview
//
// - **SnapshotSource**: Trait for fetching the device inventory snapshot
// - **directive**: Opportunistic parser for directives embedded in device comments
// - **records**: Derivation of forward (A/CNAME) and reverse (PTR) records
// - **SerialManager**: Next SOA serial from the existing zone file
// - **ZoneWriter**: Template rendering and atomic zone file replacement
// - **SyncEngine**: One-shot orchestration of fetch → derive → write
//
// ## Design Principles
//
// 1. **Reproducible**: Derivation is a pure function with canonical ordering
// 2. **Monotonic**: Serials never decrease and never repeat
// 3. **Atomic**: A zone file is replaced whole or not at all
// 4. **Library-First**: The binary only loads configuration and calls the engine

pub mod config;
pub mod directive;
pub mod engine;
pub mod error;
pub mod records;
pub mod serial;
pub mod snapshot;
pub mod traits;
pub mod zone;

// Re-export core types for convenience
pub use config::{DnsServer, SnapshotSourceConfig, SoaTimers, SyncConfig};
pub use directive::{Directive, parse_directives};
pub use engine::{SyncEngine, SyncReport, ZoneOutcome};
pub use error::{Error, Result};
pub use records::{DerivedRecords, RecordType, ResourceRecord, ReverseBlock, derive};
pub use serial::{PreviousSerial, SerialManager, SerialState};
pub use snapshot::{DeviceEntry, InventorySnapshot};
pub use traits::SnapshotSource;
pub use zone::{ZoneDescriptor, ZoneWriter};
