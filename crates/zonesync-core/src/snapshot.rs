//! Inventory snapshot model
//!
//! The inventory service answers with a JSON object mapping device names to
//! their addresses:
//!
//! ```json
//! {
//!   "web1": {"primary": "10.0.0.4", "cnames": ["www"]},
//!   "web2": {"primary": "10.0.0.30", "secondary_ips": ["10.0.2.5"]},
//!   "db1": "10.0.0.7"
//! }
//! ```
//!
//! Entries may be a bare address string or an object. Objects may carry a
//! free-text `comments` field whose embedded directives (see
//! [`crate::directive`]) overwrite `cnames` / `secondary_ips`.

use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;

use serde_json::Value;
use tracing::warn;

use crate::directive::{Directive, parse_directives};
use crate::error::{Error, Result};

/// One device of the inventory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceEntry {
    /// Primary IPv4 address, `None` when missing or unparseable
    pub primary_address: Option<Ipv4Addr>,

    /// Hostname aliases (CNAME owners)
    pub aliases: BTreeSet<String>,

    /// Additional addresses (PTR only), never containing the primary address
    pub secondary_addresses: BTreeSet<Ipv4Addr>,
}

impl DeviceEntry {
    /// Create an entry with a primary address only
    pub fn new(primary_address: Ipv4Addr) -> Self {
        Self {
            primary_address: Some(primary_address),
            ..Self::default()
        }
    }

    /// Add a hostname alias
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.insert(alias.into());
        self
    }

    /// Add a secondary address (ignored if it equals the primary address)
    pub fn with_secondary(mut self, address: Ipv4Addr) -> Self {
        if self.primary_address != Some(address) {
            self.secondary_addresses.insert(address);
        }
        self
    }

    /// Build an entry from one value of the snapshot document
    fn from_value(name: &str, value: &Value) -> Self {
        let (primary, mut directive, comments) = match value {
            Value::String(address) => (Some(address.as_str()), Directive::default(), None),
            Value::Object(object) => (
                object.get("primary").and_then(Value::as_str),
                Directive::from_value(value).unwrap_or_default(),
                object.get("comments").and_then(Value::as_str),
            ),
            _ => (None, Directive::default(), None),
        };

        directive.overwrite_with(parse_directives(comments));

        let primary_address = match primary {
            Some(text) => match parse_address(text) {
                Some(address) => Some(address),
                None => {
                    warn!("Device {} has an invalid primary address: {}", name, text);
                    None
                }
            },
            None => None,
        };

        let mut entry = Self {
            primary_address,
            ..Self::default()
        };

        for alias in directive.cnames.unwrap_or_default() {
            let alias = alias.trim();
            if !alias.is_empty() {
                entry.aliases.insert(alias.to_string());
            }
        }

        for text in directive.secondary_ips.unwrap_or_default() {
            match parse_address(&text) {
                Some(address) => entry = entry.with_secondary(address),
                None => warn!("Device {} has an invalid secondary address: {}", name, text),
            }
        }

        entry
    }
}

/// Device name → entry, as fetched for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventorySnapshot {
    devices: BTreeMap<String, DeviceEntry>,
}

impl InventorySnapshot {
    /// Create an empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a device; the name is lowercased
    pub fn insert(&mut self, name: &str, entry: DeviceEntry) {
        self.devices.insert(name.trim().to_lowercase(), entry);
    }

    /// Add a device (builder form of [`InventorySnapshot::insert`])
    pub fn with_device(mut self, name: &str, entry: DeviceEntry) -> Self {
        self.insert(name, entry);
        self
    }

    /// Parse a snapshot document
    ///
    /// The document must be a JSON object. Individual entries are read
    /// leniently: bad addresses are dropped with a warning.
    pub fn from_json(value: &Value) -> Result<Self> {
        let object = value.as_object().ok_or_else(|| {
            Error::snapshot(format!(
                "expected a JSON object of devices, got {}",
                json_kind(value)
            ))
        })?;

        let mut snapshot = Self::new();
        for (name, entry) in object {
            let key = name.trim().to_lowercase();
            if key.is_empty() {
                warn!("Skipping device with an empty name");
                continue;
            }
            if snapshot.devices.contains_key(&key) {
                warn!("Device name {} appears more than once, keeping the last entry", key);
            }
            snapshot.devices.insert(key, DeviceEntry::from_value(name, entry));
        }

        Ok(snapshot)
    }

    /// Parse a snapshot from JSON text
    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| Error::snapshot(format!("not a JSON document: {}", e)))?;
        Self::from_json(&value)
    }

    /// Look up a device
    pub fn get(&self, name: &str) -> Option<&DeviceEntry> {
        self.devices.get(name)
    }

    /// Iterate devices in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &DeviceEntry)> {
        self.devices.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    /// Number of devices
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether the snapshot has no devices
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

/// Parse an IPv4 address, tolerating a CIDR prefix length ("10.0.0.4/24")
fn parse_address(text: &str) -> Option<Ipv4Addr> {
    let text = text.trim();
    let address = text.split_once('/').map_or(text, |(address, _)| address);
    address.parse().ok()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_and_string_entries() {
        let snapshot = InventorySnapshot::from_json(&json!({
            "web1": {"primary": "10.0.0.4", "cnames": ["www"]},
            "db1": "10.0.0.7"
        }))
        .unwrap();

        assert_eq!(snapshot.len(), 2);
        let web1 = snapshot.get("web1").unwrap();
        assert_eq!(web1.primary_address, Some(Ipv4Addr::new(10, 0, 0, 4)));
        assert!(web1.aliases.contains("www"));
        assert_eq!(
            snapshot.get("db1").unwrap().primary_address,
            Some(Ipv4Addr::new(10, 0, 0, 7))
        );
    }

    #[test]
    fn test_names_are_lowercased() {
        let snapshot = InventorySnapshot::from_json(&json!({"Web1": "10.0.0.4"})).unwrap();
        assert!(snapshot.get("web1").is_some());
        assert!(snapshot.get("Web1").is_none());
    }

    #[test]
    fn test_optional_fields_absent() {
        let snapshot =
            InventorySnapshot::from_json(&json!({"web1": {"primary": "10.0.0.4"}})).unwrap();
        let web1 = snapshot.get("web1").unwrap();
        assert!(web1.aliases.is_empty());
        assert!(web1.secondary_addresses.is_empty());
    }

    #[test]
    fn test_primary_not_repeated_in_secondaries() {
        let snapshot = InventorySnapshot::from_json(&json!({
            "web1": {"primary": "10.0.0.4", "secondary_ips": ["10.0.0.4", "10.0.2.5"]}
        }))
        .unwrap();

        let web1 = snapshot.get("web1").unwrap();
        assert_eq!(
            web1.secondary_addresses.iter().copied().collect::<Vec<_>>(),
            vec![Ipv4Addr::new(10, 0, 2, 5)]
        );
    }

    #[test]
    fn test_missing_or_invalid_primary_kept_as_none() {
        let snapshot = InventorySnapshot::from_json(&json!({
            "ghost": {"cnames": ["boo"]},
            "broken": {"primary": "10.0.0.999"},
            "weird": 42
        }))
        .unwrap();

        assert_eq!(snapshot.get("ghost").unwrap().primary_address, None);
        assert_eq!(snapshot.get("broken").unwrap().primary_address, None);
        assert_eq!(snapshot.get("weird").unwrap().primary_address, None);
    }

    #[test]
    fn test_cidr_primary_accepted() {
        let snapshot = InventorySnapshot::from_json(&json!({"web1": "10.0.0.4/24"})).unwrap();
        assert_eq!(
            snapshot.get("web1").unwrap().primary_address,
            Some(Ipv4Addr::new(10, 0, 0, 4))
        );
    }

    #[test]
    fn test_comment_directive_overwrites_fields() {
        let snapshot = InventorySnapshot::from_json(&json!({
            "web1": {
                "primary": "10.0.0.4",
                "cnames": ["old"],
                "secondary_ips": ["10.0.2.5"],
                "comments": "front door\n`{\"cnames\": [\"www\", \"intranet\"]}`"
            }
        }))
        .unwrap();

        let web1 = snapshot.get("web1").unwrap();
        assert_eq!(
            web1.aliases.iter().cloned().collect::<Vec<_>>(),
            vec!["intranet".to_string(), "www".to_string()]
        );
        assert!(web1.secondary_addresses.contains(&Ipv4Addr::new(10, 0, 2, 5)));
    }

    #[test]
    fn test_invalid_secondary_skipped() {
        let snapshot = InventorySnapshot::from_json(&json!({
            "web1": {"primary": "10.0.0.4", "secondary_ips": ["bogus", "10.0.2.5"]}
        }))
        .unwrap();
        assert_eq!(snapshot.get("web1").unwrap().secondary_addresses.len(), 1);
    }

    #[test]
    fn test_non_object_document_rejected() {
        let err = InventorySnapshot::from_json(&json!(["web1"])).unwrap_err();
        assert!(matches!(err, Error::Snapshot(_)));
        assert!(InventorySnapshot::from_json_str("<html>").is_err());
    }
}
