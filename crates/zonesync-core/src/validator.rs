//! Record validation
//!
//! Pure checks applied before any network call. Rules run in a fixed order
//! and the first failure wins, so a given invalid record always reports the
//! same error:
//!
//! 1. name
//! 2. type
//! 3. data (per type)
//! 4. ttl
//! 5. required companion fields (MX priority; SRV priority, weight, port)
//!
//! Companion fields on types that ignore them are only warnings, see
//! [`warnings`]. The CNAME exclusivity rule spans records and is checked by
//! [`validate_set`].

use std::collections::{BTreeMap, BTreeSet};
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::error::{InvalidEntry, ValidationError};
use crate::record::{Record, RecordKey, RecordSet, RecordType, ROOT_MARKER};

/// Lowest TTL the provider accepts
pub const MIN_TTL: u32 = 300;

/// Highest TTL the provider accepts
pub const MAX_TTL: u32 = 604_800;

/// Maximum length of one TXT character-string
pub const MAX_TXT_SEGMENT: usize = 255;

const MAX_LABEL_LEN: usize = 63;
const MAX_NAME_LEN: usize = 253;

/// A non-fatal observation about a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    /// Field concerned
    pub field: &'static str,
    /// Human readable message
    pub message: String,
}

/// Validate a single record
pub fn validate(record: &Record) -> Result<(), ValidationError> {
    validate_name(&record.name)?;
    validate_type(&record.record_type)?;
    validate_data(record)?;
    validate_ttl(record.ttl)?;
    validate_companions(record)?;
    Ok(())
}

/// Validate a whole desired state
///
/// Every record is checked with [`validate`]; an invalid record marks its
/// whole key invalid (the provider replaces arrays atomically). Then the
/// CNAME exclusivity rule runs once over all names. Returns every invalid
/// key, in key order, with its first failure.
pub fn validate_set(desired: &RecordSet) -> Result<(), Vec<InvalidEntry>> {
    let failures = check_set(desired);
    if failures.is_empty() {
        Ok(())
    } else {
        Err(failures)
    }
}

/// Non-fatal notices for a record
pub fn warnings(record: &Record) -> Vec<ValidationWarning> {
    let mut out = Vec::new();
    let t = &record.record_type;
    if record.priority.is_some() && !t.uses_priority() {
        out.push(ValidationWarning {
            field: "priority",
            message: format!("priority is ignored for {} records", t),
        });
    }
    if record.weight.is_some() && !t.uses_weight_and_port() {
        out.push(ValidationWarning {
            field: "weight",
            message: format!("weight is ignored for {} records", t),
        });
    }
    if record.port.is_some() && !t.uses_weight_and_port() {
        out.push(ValidationWarning {
            field: "port",
            message: format!("port is ignored for {} records", t),
        });
    }
    out
}

fn check_set(desired: &RecordSet) -> Vec<InvalidEntry> {
    let mut invalid: BTreeMap<RecordKey, ValidationError> = BTreeMap::new();

    for (key, records) in desired.iter() {
        if records.is_empty() {
            invalid.insert(
                key.clone(),
                ValidationError::new("data", "record set contains no records"),
            );
            continue;
        }
        for record in records {
            if record.key() != *key {
                invalid.insert(
                    key.clone(),
                    ValidationError::new(
                        "name",
                        format!("record {} filed under key {}", record.key(), key),
                    ),
                );
                break;
            }
            if let Err(e) = validate(record) {
                invalid.insert(key.clone(), e);
                break;
            }
        }
    }

    // CNAME exclusivity, once over the whole set
    let mut types_by_name: BTreeMap<&str, BTreeSet<&RecordType>> = BTreeMap::new();
    for key in desired.keys() {
        types_by_name
            .entry(key.name.as_str())
            .or_default()
            .insert(&key.record_type);
    }
    for (name, types) in &types_by_name {
        if !types.contains(&RecordType::Cname) || types.len() < 2 {
            continue;
        }
        let others: Vec<String> = types
            .iter()
            .filter(|t| ***t != RecordType::Cname)
            .map(|t| t.to_string())
            .collect();
        for t in types {
            let key = RecordKey::new(name, (*t).clone());
            invalid.entry(key).or_insert_with(|| {
                ValidationError::new(
                    "name",
                    format!(
                        "CNAME at '{}' cannot coexist with other record types ({})",
                        name,
                        others.join(", ")
                    ),
                )
            });
        }
    }

    invalid
        .into_iter()
        .map(|(key, error)| InvalidEntry { key, error })
        .collect()
}

fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::new("name", "name cannot be empty"));
    }
    if name == ROOT_MARKER {
        return Ok(());
    }
    check_hostname(name, true).map_err(|reason| ValidationError::new("name", reason))
}

fn validate_type(record_type: &RecordType) -> Result<(), ValidationError> {
    if record_type.is_supported() {
        return Ok(());
    }
    let supported: Vec<&str> = RecordType::SUPPORTED.iter().map(RecordType::as_str).collect();
    Err(ValidationError::new(
        "type",
        format!(
            "unsupported record type '{}' (supported: {})",
            record_type,
            supported.join(", ")
        ),
    ))
}

fn validate_data(record: &Record) -> Result<(), ValidationError> {
    let data = record.data.as_str();
    if data.trim().is_empty() {
        return Err(ValidationError::new("data", "data cannot be empty"));
    }

    let invalid =
        |reason: String| -> Result<(), ValidationError> { Err(ValidationError::new("data", reason)) };

    match record.record_type {
        RecordType::A => {
            if data.parse::<Ipv4Addr>().is_err() {
                return invalid(format!("'{}' is not a valid IPv4 address", data));
            }
        }
        RecordType::Aaaa => {
            if data.parse::<Ipv6Addr>().is_err() {
                return invalid(format!("'{}' is not a valid IPv6 address", data));
            }
        }
        RecordType::Cname | RecordType::Mx | RecordType::Ns | RecordType::Srv => {
            if data != ROOT_MARKER {
                if let Err(reason) = check_hostname(data.strip_suffix('.').unwrap_or(data), false) {
                    return invalid(format!("target '{}' is not a valid hostname: {}", data, reason));
                }
            }
        }
        RecordType::Txt => {
            for segment in txt_segments(data) {
                if segment.len() > MAX_TXT_SEGMENT {
                    return invalid(format!(
                        "TXT segment is {} bytes (max {})",
                        segment.len(),
                        MAX_TXT_SEGMENT
                    ));
                }
            }
        }
        RecordType::Caa | RecordType::Other(_) => {}
    }
    Ok(())
}

fn validate_ttl(ttl: u32) -> Result<(), ValidationError> {
    if !(MIN_TTL..=MAX_TTL).contains(&ttl) {
        return Err(ValidationError::new(
            "ttl",
            format!("ttl {} outside [{}, {}]", ttl, MIN_TTL, MAX_TTL),
        ));
    }
    Ok(())
}

fn validate_companions(record: &Record) -> Result<(), ValidationError> {
    let t = &record.record_type;
    if t.uses_priority() && record.priority.is_none() {
        return Err(ValidationError::new(
            "priority",
            format!("{} records require a priority", t),
        ));
    }
    if t.uses_weight_and_port() {
        if record.weight.is_none() {
            return Err(ValidationError::new("weight", "SRV records require a weight"));
        }
        match record.port {
            None => return Err(ValidationError::new("port", "SRV records require a port")),
            Some(0) => {
                return Err(ValidationError::new("port", "port must be between 1 and 65535"));
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Hostname grammar: dot-separated labels of 1-63 letters, digits, hyphens
/// and underscores, not starting or ending with a hyphen. Record names may
/// start with a `*` wildcard label.
fn check_hostname(host: &str, allow_wildcard: bool) -> Result<(), String> {
    if host.is_empty() {
        return Err("hostname is empty".to_string());
    }
    if host.len() > MAX_NAME_LEN {
        return Err(format!("{} characters (max {})", host.len(), MAX_NAME_LEN));
    }
    for (i, label) in host.split('.').enumerate() {
        if label.is_empty() {
            return Err("empty label".to_string());
        }
        if i == 0 && allow_wildcard && label == "*" {
            continue;
        }
        if label.len() > MAX_LABEL_LEN {
            return Err(format!("label '{}' longer than {} characters", label, MAX_LABEL_LEN));
        }
        if !label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(format!("label '{}' contains invalid characters", label));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(format!("label '{}' starts or ends with a hyphen", label));
        }
    }
    Ok(())
}

/// Split TXT data into character-strings
///
/// `"a" "b"` yields two segments; unquoted data is one segment.
fn txt_segments(data: &str) -> Vec<&str> {
    let trimmed = data.trim();
    if !trimmed.starts_with('"') {
        return vec![data];
    }
    let mut segments = Vec::new();
    let mut rest = trimmed;
    while let Some(start) = rest.find('"') {
        let after = &rest[start + 1..];
        match after.find('"') {
            Some(end) => {
                segments.push(&after[..end]);
                rest = &after[end + 1..];
            }
            None => {
                segments.push(after);
                break;
            }
        }
    }
    segments
}
