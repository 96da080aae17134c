//! Lenient field access over raw backend records
//!
//! The portal collections disagree on field names and types. Normalizers read
//! through [`RawRecord`] with an ordered list of candidate keys; the first key
//! holding a non-null value wins, matching how the portal itself resolved them.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};

use branchdesk_protocol::common::RecordId;

#[derive(Debug, Clone, Copy)]
pub struct RawRecord<'a> {
    fields: &'a Map<String, Value>,
}

impl<'a> RawRecord<'a> {
    pub fn new(fields: &'a Map<String, Value>) -> Self {
        Self { fields }
    }

    /// First non-null value among `keys`
    pub fn first(&self, keys: &[&str]) -> Option<&'a Value> {
        keys.iter()
            .filter_map(|key| self.fields.get(*key))
            .find(|value| !value.is_null())
    }

    /// First non-null value rendered as text; numbers and booleans are
    /// stringified, blank strings count as absent
    pub fn text(&self, keys: &[&str]) -> Option<String> {
        keys.iter()
            .filter_map(|key| self.fields.get(*key))
            .find_map(|value| match value {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                Value::Bool(b) => Some(b.to_string()),
                _ => None,
            })
    }

    pub fn id(&self, keys: &[&str]) -> Option<RecordId> {
        self.first(keys)
            .and_then(RecordId::from_json)
            .filter(RecordId::is_valid)
    }

    /// Nested object reference such as `{"program": {"id": 3, "name": ..}}`
    pub fn nested_id(&self, key: &str) -> Option<RecordId> {
        match self.fields.get(key) {
            Some(Value::Object(inner)) => RawRecord::new(inner).id(&["id", "_id"]),
            Some(other) => RecordId::from_json(other).filter(RecordId::is_valid),
            None => None,
        }
    }

    /// Truthy legacy flag: `true`, non-zero numbers, `"true"`, `"1"`, `"yes"`
    pub fn flag(&self, keys: &[&str]) -> bool {
        keys.iter()
            .filter_map(|key| self.fields.get(*key))
            .any(|value| match value {
                Value::Bool(b) => *b,
                Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
                Value::String(s) => matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "yes"),
                _ => false,
            })
    }

    pub fn unsigned(&self, keys: &[&str]) -> Option<u64> {
        match self.first(keys)? {
            Value::Number(n) => n.as_u64().or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn timestamp(&self, keys: &[&str]) -> Option<DateTime<Utc>> {
        self.text(keys).as_deref().and_then(parse_timestamp)
    }
}

/// Parse the timestamp formats the backend emits: RFC 3339, SQL datetime
/// without zone (taken as UTC), or a bare date
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// JavaScript `parseInt` over a JSON value, with `NaN` mapped to 0.
///
/// Numbers truncate toward zero. Strings take optional leading whitespace,
/// an optional sign and the longest run of decimal digits, or of hex digits
/// after a `0x` prefix; anything else is 0. Values past `i64` saturate.
pub fn parse_int_lenient(value: &Value) -> i64 {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i
            } else {
                n.as_f64()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i64)
                    .unwrap_or(0)
            }
        }
        Value::String(s) => parse_int_prefix(s),
        _ => 0,
    }
}

fn parse_int_prefix(raw: &str) -> i64 {
    let trimmed = raw.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let (radix, digits) = match digits.get(..2) {
        Some("0x") | Some("0X") => (16, &digits[2..]),
        _ => (10, digits),
    };

    let run: String = digits.chars().take_while(|c| c.is_digit(radix)).collect();
    if run.is_empty() {
        return 0;
    }

    let magnitude = i64::from_str_radix(&run, radix).unwrap_or(i64::MAX);
    if negative {
        -magnitude
    } else {
        magnitude
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn first_skips_nulls_in_key_order() {
        let fields = record(json!({"amount_paid": null, "amount": 500, "price": 900}));
        let raw = RawRecord::new(&fields);
        assert_eq!(raw.first(&["amount_paid", "amount", "price"]), Some(&json!(500)));
        assert_eq!(raw.first(&["missing"]), None);
    }

    #[test]
    fn ids_accept_numbers_and_reject_sentinels() {
        let fields = record(json!({"id": 17, "_id": "undefined", "program": {"id": "p1"}}));
        let raw = RawRecord::new(&fields);
        assert_eq!(raw.id(&["id"]), Some(RecordId::from("17")));
        assert_eq!(raw.id(&["_id"]), None);
        assert_eq!(raw.nested_id("program"), Some(RecordId::from("p1")));
    }

    #[test]
    fn legacy_flags_are_truthy() {
        let fields = record(json!({"is_deleted": "true", "deleted": 0, "archived": false}));
        let raw = RawRecord::new(&fields);
        assert!(raw.flag(&["is_deleted"]));
        assert!(!raw.flag(&["deleted", "archived"]));
    }

    #[test]
    fn parse_int_matches_javascript() {
        assert_eq!(parse_int_lenient(&json!(500)), 500);
        assert_eq!(parse_int_lenient(&json!(499.99)), 499);
        assert_eq!(parse_int_lenient(&json!("  1200.50")), 1200);
        assert_eq!(parse_int_lenient(&json!("-35abc")), -35);
        assert_eq!(parse_int_lenient(&json!("Rs. 500")), 0);
        assert_eq!(parse_int_lenient(&json!("")), 0);
        assert_eq!(parse_int_lenient(&json!(true)), 0);
        assert_eq!(parse_int_lenient(&Value::Null), 0);
    }

    #[test]
    fn parse_int_reads_hex_prefixes() {
        assert_eq!(parse_int_lenient(&json!("0x10")), 16);
        assert_eq!(parse_int_lenient(&json!(" -0XfFz")), -255);
        assert_eq!(parse_int_lenient(&json!("0x")), 0);
        assert_eq!(parse_int_lenient(&json!("010")), 10);
        assert_eq!(parse_int_lenient(&json!("99999999999999999999")), i64::MAX);
    }

    #[test]
    fn timestamps_in_backend_formats() {
        assert!(parse_timestamp("2024-03-01T10:00:00Z").is_some());
        assert!(parse_timestamp("2024-03-01 10:00:00").is_some());
        assert!(parse_timestamp("2024-03-01T10:00:00.123").is_some());
        assert_eq!(
            parse_timestamp("2024-03-01").map(|d| d.to_rfc3339()),
            Some("2024-03-01T00:00:00+00:00".to_string())
        );
        assert_eq!(parse_timestamp("yesterday"), None);
    }
}
