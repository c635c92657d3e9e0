//! Record derivation
//!
//! Turns an [`InventorySnapshot`] into the record sets of one forward zone
//! and of one reverse zone per /24 network block.
//!
//! ## Ordering
//!
//! Records are ordered by the numeric value of their address, octet by
//! octet. Text ordering would put `10.0.0.30` before `10.0.0.4`. A device's
//! CNAME records follow its A record, so aliases sort by the address of the
//! device they point at.
//!
//! Derivation is a pure function of its inputs: the same snapshot always
//! yields identical record lists.

use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::DnsServer;
use crate::snapshot::InventorySnapshot;

/// Suffix of reverse-lookup names
pub const REVERSE_SUFFIX: &str = "in-addr.arpa";

/// DNS record types produced by the deriver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    /// IPv4 address
    A,
    /// Name server
    Ns,
    /// Alias
    Cname,
    /// Reverse pointer
    Ptr,
}

impl RecordType {
    /// Zone-file mnemonic
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Ns => "NS",
            RecordType::Cname => "CNAME",
            RecordType::Ptr => "PTR",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One zone-file record: owner name, type, value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ResourceRecord {
    /// Owner name (relative to the zone origin unless it ends with a dot)
    pub name: String,
    /// Record type
    #[serde(rename = "type")]
    pub rtype: RecordType,
    /// Record data
    pub value: String,
}

impl ResourceRecord {
    /// Create a record
    pub fn new(name: impl Into<String>, rtype: RecordType, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rtype,
            value: value.into(),
        }
    }
}

impl fmt::Display for ResourceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.name, self.rtype, self.value)
    }
}

/// A /24 network block, identified by its first three octets
///
/// Blocks order numerically by network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReverseBlock([u8; 3]);

impl ReverseBlock {
    /// Block containing `address`
    pub fn of(address: Ipv4Addr) -> Self {
        let [a, b, c, _] = address.octets();
        Self([a, b, c])
    }

    /// Block key: the first three octets reversed ("10.0.1.5" → "1.0.10")
    pub fn key(&self) -> String {
        let [a, b, c] = self.0;
        format!("{}.{}.{}", c, b, a)
    }

    /// Name of the reverse zone ("1.0.10.in-addr.arpa")
    pub fn zone_name(&self) -> String {
        format!("{}.{}", self.key(), REVERSE_SUFFIX)
    }
}

impl fmt::Display for ReverseBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Fully qualified reverse-lookup name of an address
///
/// `10.0.1.5` → `5.1.0.10.in-addr.arpa.`
pub fn reverse_pointer(address: Ipv4Addr) -> String {
    let [a, b, c, d] = address.octets();
    format!("{}.{}.{}.{}.{}.", d, c, b, a, REVERSE_SUFFIX)
}

/// Everything derived from one snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DerivedRecords {
    /// NS records at the apex, shared by every generated zone
    pub origin: Vec<ResourceRecord>,

    /// Records of the forward zone
    pub forward: Vec<ResourceRecord>,

    /// PTR records per reverse block
    pub reverse: BTreeMap<ReverseBlock, Vec<ResourceRecord>>,
}

/// Sort key of a forward record
///
/// (address, owning host, A before CNAME, record name)
type ForwardKey = ([u8; 4], String, u8, String);

/// Derive forward, reverse and origin records
///
/// # Parameters
///
/// - `snapshot`: The inventory
/// - `zone`: Forward zone suffix, without trailing dot
/// - `dns_servers`: Authoritative servers of the forward zone
pub fn derive(
    snapshot: &InventorySnapshot,
    zone: &str,
    dns_servers: &[DnsServer],
) -> DerivedRecords {
    let mut origin = Vec::with_capacity(dns_servers.len());
    let mut forward: Vec<(ForwardKey, ResourceRecord)> = Vec::new();

    for server in dns_servers {
        origin.push(ResourceRecord::new(
            "@",
            RecordType::Ns,
            format!("{}.{}.", server.name, zone),
        ));

        if let Some(address) = server.address {
            forward.push((
                (address.octets(), server.name.clone(), 0, server.name.clone()),
                ResourceRecord::new(&server.name, RecordType::A, address.to_string()),
            ));
        }
    }

    // Devices in address order, so that a shared address is attributed to
    // the same device on every run
    let mut devices: Vec<(Ipv4Addr, &str, _)> = Vec::with_capacity(snapshot.len());
    for (name, entry) in snapshot.iter() {
        match entry.primary_address {
            Some(primary) => devices.push((primary, name, entry)),
            None => warn!("Device {} has no primary address, skipping", name),
        }
    }
    devices.sort_by(|a, b| (a.0.octets(), a.1).cmp(&(b.0.octets(), b.1)));

    let mut reverse: BTreeMap<ReverseBlock, BTreeMap<[u8; 4], ResourceRecord>> = BTreeMap::new();

    for (primary, name, entry) in devices {
        forward.push((
            (primary.octets(), name.to_string(), 0, name.to_string()),
            ResourceRecord::new(name, RecordType::A, primary.to_string()),
        ));

        for alias in &entry.aliases {
            forward.push((
                (primary.octets(), name.to_string(), 1, alias.clone()),
                ResourceRecord::new(alias, RecordType::Cname, name),
            ));
        }

        let target = format!("{}.{}.", name, zone);
        let mut addresses: Vec<Ipv4Addr> = std::iter::once(primary)
            .chain(entry.secondary_addresses.iter().copied())
            .collect();
        addresses.sort_by_key(|address| address.octets());
        addresses.dedup();

        for address in addresses {
            let block = reverse.entry(ReverseBlock::of(address)).or_default();
            if block.contains_key(&address.octets()) {
                debug!(
                    "Address {} already has a PTR record, not adding one for {}",
                    address, name
                );
                continue;
            }
            block.insert(
                address.octets(),
                ResourceRecord::new(reverse_pointer(address), RecordType::Ptr, target.clone()),
            );
        }
    }

    forward.sort_by(|a, b| a.0.cmp(&b.0));
    let mut forward: Vec<ResourceRecord> = forward.into_iter().map(|(_, record)| record).collect();
    forward.dedup();

    let reverse = reverse
        .into_iter()
        .map(|(block, records)| (block, records.into_values().collect()))
        .collect();

    DerivedRecords {
        origin,
        forward,
        reverse,
    }
}
