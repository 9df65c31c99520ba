// # DNS Record Model
//
// Value types shared by the validator, the transport mapping and the
// reconciler.
//
// - `Record`: one resource record as the provider represents it
// - `RecordKey`: `(name, type)`, the provider's unit of atomic replacement
// - `RecordSet`: ordered map from key to the full array of records
//
// Records are never mutated once built; a change is always a new value that
// replaces the whole array for its key.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Marker the provider uses for the zone apex
pub const ROOT_MARKER: &str = "@";

/// Default TTL applied when a provider response omits one
pub const DEFAULT_TTL: u32 = 3600;

/// DNS record type
///
/// Types outside the supported set are kept as [`RecordType::Other`] so live
/// state fetched from the provider (SOA, PTR, ...) can still be represented.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RecordType {
    /// IPv4 address
    A,
    /// IPv6 address
    Aaaa,
    /// Canonical name
    Cname,
    /// Mail exchanger
    Mx,
    /// Free text
    Txt,
    /// Service locator
    Srv,
    /// Name server
    Ns,
    /// Certification authority authorization
    Caa,
    /// Any other type the provider reports
    Other(String),
}

impl RecordType {
    /// The types this crate can validate and reconcile
    pub const SUPPORTED: [RecordType; 8] = [
        RecordType::A,
        RecordType::Aaaa,
        RecordType::Cname,
        RecordType::Mx,
        RecordType::Txt,
        RecordType::Srv,
        RecordType::Ns,
        RecordType::Caa,
    ];

    /// Wire name of the type (upper case)
    pub fn as_str(&self) -> &str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Cname => "CNAME",
            RecordType::Mx => "MX",
            RecordType::Txt => "TXT",
            RecordType::Srv => "SRV",
            RecordType::Ns => "NS",
            RecordType::Caa => "CAA",
            RecordType::Other(s) => s,
        }
    }

    /// Whether the type is in the supported set
    pub fn is_supported(&self) -> bool {
        !matches!(self, RecordType::Other(_))
    }

    /// Whether records of this type carry a priority
    pub fn uses_priority(&self) -> bool {
        matches!(self, RecordType::Mx | RecordType::Srv)
    }

    /// Whether records of this type carry weight and port
    pub fn uses_weight_and_port(&self) -> bool {
        matches!(self, RecordType::Srv)
    }
}

impl From<String> for RecordType {
    fn from(s: String) -> Self {
        RecordType::from(s.as_str())
    }
}

impl From<&str> for RecordType {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => RecordType::A,
            "AAAA" => RecordType::Aaaa,
            "CNAME" => RecordType::Cname,
            "MX" => RecordType::Mx,
            "TXT" => RecordType::Txt,
            "SRV" => RecordType::Srv,
            "NS" => RecordType::Ns,
            "CAA" => RecordType::Caa,
            other => RecordType::Other(other.to_string()),
        }
    }
}

impl From<RecordType> for String {
    fn from(t: RecordType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_ttl() -> u32 {
    DEFAULT_TTL
}

/// A DNS resource record
///
/// The JSON form matches the provider payload:
/// `{name, type, data, ttl, priority?, weight?, port?}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    /// Record name relative to the domain (`@` for the apex)
    pub name: String,

    /// Record type
    #[serde(rename = "type")]
    pub record_type: RecordType,

    /// Record data (address, target host, text, ...)
    pub data: String,

    /// Time-to-live in seconds
    #[serde(default = "default_ttl")]
    pub ttl: u32,

    /// MX/SRV priority
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u16>,

    /// SRV weight
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<u16>,

    /// SRV port
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl Record {
    /// Create a record without companion fields
    pub fn new(
        name: impl Into<String>,
        record_type: impl Into<RecordType>,
        data: impl Into<String>,
        ttl: u32,
    ) -> Self {
        Self {
            name: name.into(),
            record_type: record_type.into(),
            data: data.into(),
            ttl,
            priority: None,
            weight: None,
            port: None,
        }
    }

    /// Set the priority
    pub fn with_priority(mut self, priority: u16) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Set the weight
    pub fn with_weight(mut self, weight: u16) -> Self {
        self.weight = Some(weight);
        self
    }

    /// Set the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// The record-set key this record belongs to
    pub fn key(&self) -> RecordKey {
        RecordKey::new(&self.name, self.record_type.clone())
    }

    /// The form sent to the provider
    ///
    /// Companion fields are dropped on types that do not use them; the
    /// provider ignores them anyway, and keeping them would make content
    /// comparison against live state report spurious differences.
    pub fn wire_form(&self) -> Record {
        let mut out = self.clone();
        if !self.record_type.uses_priority() {
            out.priority = None;
        }
        if !self.record_type.uses_weight_and_port() {
            out.weight = None;
            out.port = None;
        }
        out
    }

    fn content_tuple(&self) -> (String, u32, Option<u16>, Option<u16>, Option<u16>) {
        let wire = self.wire_form();
        (wire.data, wire.ttl, wire.priority, wire.weight, wire.port)
    }
}

/// Identity of a record set: `(name, type)`
///
/// Names compare case-insensitively; the key stores the lower-cased name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    /// Lower-cased record name
    pub name: String,
    /// Record type
    #[serde(rename = "type")]
    pub record_type: RecordType,
}

impl RecordKey {
    /// Create a key
    pub fn new(name: impl AsRef<str>, record_type: impl Into<RecordType>) -> Self {
        Self {
            name: name.as_ref().to_ascii_lowercase(),
            record_type: record_type.into(),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.name, self.record_type)
    }
}

/// Mapping from `(name, type)` to the full ordered record array for that key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordSet {
    sets: BTreeMap<RecordKey, Vec<Record>>,
}

/// The record set a caller wants to exist
pub type DesiredState = RecordSet;

/// The record set fetched from the provider
pub type LiveState = RecordSet;

impl RecordSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Group records by key, preserving their order within a key
    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Self {
        let mut set = Self::new();
        for record in records {
            set.push(record);
        }
        set
    }

    /// Append a record to the array of its key
    pub fn push(&mut self, record: Record) {
        self.sets.entry(record.key()).or_default().push(record);
    }

    /// Insert the full array for a key, replacing any existing one
    pub fn insert(&mut self, key: RecordKey, records: Vec<Record>) {
        self.sets.insert(key, records);
    }

    /// Remove a key
    pub fn remove(&mut self, key: &RecordKey) -> Option<Vec<Record>> {
        self.sets.remove(key)
    }

    /// Records for a key
    pub fn get(&self, key: &RecordKey) -> Option<&[Record]> {
        self.sets.get(key).map(Vec::as_slice)
    }

    /// Whether a key is present
    pub fn contains_key(&self, key: &RecordKey) -> bool {
        self.sets.contains_key(key)
    }

    /// Keys in order
    pub fn keys(&self) -> impl Iterator<Item = &RecordKey> {
        self.sets.keys()
    }

    /// Key/array pairs in key order
    pub fn iter(&self) -> impl Iterator<Item = (&RecordKey, &[Record])> {
        self.sets.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// Every record, flattened
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.sets.values().flatten()
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// Whether there are no keys
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

impl FromIterator<Record> for RecordSet {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self::from_records(iter)
    }
}

/// Whether two record arrays describe the same provider state
///
/// Order-insensitive and computed on the wire form.
pub fn same_content(a: &[Record], b: &[Record]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut left: Vec<_> = a.iter().map(Record::content_tuple).collect();
    let mut right: Vec<_> = b.iter().map(Record::content_tuple).collect();
    left.sort();
    right.sort();
    left == right
}
