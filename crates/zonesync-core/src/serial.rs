//! SOA serial management
//!
//! Serials use the date-encoded `YYYYMMDDnn` convention. A regenerated zone
//! gets `max(previous + 1, today's YYYYMMDD00)`, so the serial always grows,
//! even across several regenerations on the same day, and snaps to the date
//! baseline once a new day begins. A zone written for the first time gets
//! today's baseline.
//!
//! The date baseline is computed in UTC so that every host agrees on it.

use std::io::ErrorKind;
use std::path::Path;

use chrono::{Datelike, NaiveDate, Utc};
use hickory_proto::rr::{LowerName, Name, RData, RecordType, RrKey};
use hickory_proto::serialize::txt::Parser;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Number of decimal digits of every serial we emit
pub const SERIAL_DIGITS: usize = 10;

/// What was found in the existing zone file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviousSerial {
    /// No zone file yet
    Missing,
    /// SOA serial read from the existing zone file
    Found(u32),
    /// The file exists but its SOA serial could not be extracted
    Unreadable(String),
}

impl PreviousSerial {
    /// Previous serial, 0 when there is none
    pub fn value(&self) -> u32 {
        match self {
            PreviousSerial::Found(serial) => *serial,
            PreviousSerial::Missing | PreviousSerial::Unreadable(_) => 0,
        }
    }

    /// Whether a zone file already exists
    pub fn file_exists(&self) -> bool {
        !matches!(self, PreviousSerial::Missing)
    }
}

/// Previous and next serial of one zone regeneration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialState {
    /// What the existing zone file had
    pub previous: PreviousSerial,
    /// Serial of the regenerated zone
    pub next: u32,
}

/// Baseline serial of a date: `YYYYMMDD00`
pub fn todays_serial(date: NaiveDate) -> Result<u32> {
    let year = u64::try_from(date.year()).unwrap_or(0);
    let serial = (year * 10_000 + u64::from(date.month()) * 100 + u64::from(date.day())) * 100;
    checked_serial("baseline", serial)
}

/// Compute the next serial
///
/// - no file: today's baseline
/// - file present (readable or not): `max(previous + 1, baseline)`
pub fn compute_next_serial(zone: &str, previous: &PreviousSerial, baseline: u32) -> Result<u32> {
    let next = if previous.file_exists() {
        (u64::from(previous.value()) + 1).max(u64::from(baseline))
    } else {
        u64::from(baseline)
    };
    checked_serial(zone, next)
}

/// Reject serials that do not fit `u32` or do not have exactly ten digits
fn checked_serial(zone: &str, serial: u64) -> Result<u32> {
    let value = u32::try_from(serial).map_err(|_| Error::SerialOverflow {
        zone: zone.to_string(),
        serial,
    })?;
    if value.to_string().len() != SERIAL_DIGITS {
        return Err(Error::SerialOverflow {
            zone: zone.to_string(),
            serial,
        });
    }
    Ok(value)
}

/// Read the SOA serial of an existing zone file
///
/// Never fails: a missing file is [`PreviousSerial::Missing`], anything
/// else that prevents reading the serial is [`PreviousSerial::Unreadable`].
pub async fn read_previous_serial(path: &Path, zone: &str) -> PreviousSerial {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("Zone file {} does not exist yet", path.display());
            return PreviousSerial::Missing;
        }
        Err(e) => return PreviousSerial::Unreadable(format!("failed to read: {}", e)),
    };

    match parse_soa_serial(&text, zone) {
        Ok(serial) => PreviousSerial::Found(serial),
        Err(reason) => PreviousSerial::Unreadable(reason),
    }
}

/// Extract the serial of the SOA record at the zone apex
///
/// Only the `$ORIGIN`/`$TTL` entries and the SOA record are parsed. Other
/// records may carry owner names the parser rejects (e.g. `web_1`) and
/// must not make the serial unreadable.
pub fn parse_soa_serial(text: &str, zone: &str) -> std::result::Result<u32, String> {
    let origin = Name::from_ascii(format!("{}.", zone.trim_end_matches('.')))
        .map_err(|e| format!("invalid zone name {}: {}", zone, e))?;

    let soa_text = apex_soa_text(text).ok_or_else(|| "no SOA record found".to_string())?;

    let (origin, records) = Parser::new(soa_text, None, Some(origin))
        .parse()
        .map_err(|e| format!("failed to parse SOA record: {}", e))?;

    let key = RrKey::new(LowerName::new(&origin), RecordType::SOA);
    let rrset = records
        .get(&key)
        .ok_or_else(|| format!("no SOA record at {}", origin))?;

    rrset
        .records_without_rrsigs()
        .find_map(|record| match record.data() {
            Some(RData::SOA(soa)) => Some(soa.serial()),
            _ => None,
        })
        .ok_or_else(|| format!("SOA record at {} has no data", origin))
}

/// Zone text reduced to the `$ORIGIN`/`$TTL` entries and the first SOA record
fn apex_soa_text(text: &str) -> Option<String> {
    let mut soa = String::new();
    let mut lines = text.lines();

    while let Some(line) = lines.next() {
        let content = strip_comment(line);

        if content.starts_with('$') {
            let keyword = content.split_whitespace().next().unwrap_or_default();
            if keyword.eq_ignore_ascii_case("$ORIGIN") || keyword.eq_ignore_ascii_case("$TTL") {
                soa.push_str(content);
                soa.push('\n');
            }
            continue;
        }

        if !is_soa_record(content) {
            continue;
        }

        // The SOA RDATA may continue inside parentheses
        let mut depth = paren_depth(content);
        soa.push_str(content);
        soa.push('\n');
        while depth > 0 {
            let next = strip_comment(lines.next()?);
            depth += paren_depth(next);
            soa.push_str(next);
            soa.push('\n');
        }
        return Some(soa);
    }

    None
}

/// Whether the record type of a zone-file line is SOA
fn is_soa_record(content: &str) -> bool {
    let mut tokens = content.split_whitespace();
    if !content.starts_with(char::is_whitespace) {
        // owner name
        tokens.next();
    }

    tokens
        .find(|token| !is_ttl_or_class(token))
        .is_some_and(|token| token.eq_ignore_ascii_case("SOA"))
}

fn is_ttl_or_class(token: &str) -> bool {
    token.chars().all(|c| c.is_ascii_digit())
        || ["IN", "CH", "HS", "CS"]
            .iter()
            .any(|class| token.eq_ignore_ascii_case(class))
}

fn strip_comment(line: &str) -> &str {
    line.split(';').next().unwrap_or_default()
}

fn paren_depth(content: &str) -> i32 {
    content.chars().fold(0, |depth, c| match c {
        '(' => depth + 1,
        ')' => depth - 1,
        _ => depth,
    })
}

/// Computes serials for zone regenerations
///
/// Uses today's UTC date unless pinned to a fixed date.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialManager {
    pinned: Option<NaiveDate>,
}

impl SerialManager {
    /// Serial manager following the UTC calendar
    pub fn new() -> Self {
        Self::default()
    }

    /// Serial manager that always uses `date` as today
    pub fn pinned(date: NaiveDate) -> Self {
        Self { pinned: Some(date) }
    }

    /// Date used for the baseline
    pub fn today(&self) -> NaiveDate {
        self.pinned.unwrap_or_else(|| Utc::now().date_naive())
    }

    /// Determine the serial for regenerating the zone file at `path`
    ///
    /// An unreadable previous serial is logged and treated as 0.
    pub async fn next_serial(&self, path: &Path, zone: &str) -> Result<SerialState> {
        let previous = read_previous_serial(path, zone).await;
        if let PreviousSerial::Unreadable(reason) = &previous {
            warn!(
                "Cannot read previous serial of {} from {}: {}. Assuming 0.",
                zone,
                path.display(),
                reason
            );
        }

        let baseline = todays_serial(self.today())?;
        let next = compute_next_serial(zone, &previous, baseline)?;
        debug!(
            "Zone {}: previous serial {}, baseline {}, next {}",
            zone,
            previous.value(),
            baseline,
            next
        );

        Ok(SerialState { previous, next })
    }
}
