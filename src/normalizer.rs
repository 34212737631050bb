//! Raw record -> `ProtocolSnapshot`.
//!
//! Raw records are loosely-typed JSON objects whose field names vary by
//! source (`marketCap`, `market_cap`, `mcap`, ...) and may sit one or two
//! objects deep. Nothing untyped leaves this module.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Map, Value};

use crate::error::NormalizationError;
use crate::types::{DroppedRecord, ProtocolSnapshot};

// Aliases are compared against keys with case and separators stripped, in
// priority order.
const PROTOCOL_ID_KEYS: &[&str] = &["protocolid", "id", "slug"];
const NAME_KEYS: &[&str] = &["name", "protocolname", "displayname"];
const SECTOR_KEYS: &[&str] = &["sector", "category"];
const SYMBOL_KEYS: &[&str] = &["symbol", "ticker"];
const CHAIN_KEYS: &[&str] = &["chain", "primarychain", "chains"];
const MARKET_CAP_KEYS: &[&str] = &["marketcap", "mcap"];
const TVL_KEYS: &[&str] = &["tvl", "totalvaluelocked"];
const REVENUE_KEYS: &[&str] = &["revenueperiod", "revenue", "fees"];
const TIMESTAMP_KEYS: &[&str] = &["timestamp", "time", "date", "asof"];

/// How many levels of nested objects are searched for a field.
const MAX_NESTING: usize = 2;

/// Epoch values above this are taken to be milliseconds.
const MILLIS_THRESHOLD: u64 = 100_000_000_000;

#[derive(Debug, Default)]
pub struct NormalizedBatch {
    pub snapshots: Vec<ProtocolSnapshot>,
    pub dropped: Vec<DroppedRecord>,
}

/// Coerce one raw record into a snapshot.
///
/// Only `protocol_id`, `name` and `sector` are required. Numeric fields that
/// fail to parse, are negative or non-finite become `None`; the record is
/// still usable. A missing or unreadable timestamp falls back to the Unix
/// epoch so the record still sorts deterministically.
pub fn normalize(raw: &Value) -> Result<ProtocolSnapshot, NormalizationError> {
    let obj = raw.as_object().ok_or(NormalizationError::NotAnObject)?;

    let protocol_id = required_text(obj, PROTOCOL_ID_KEYS, "protocol_id")?;
    let name = required_text(obj, NAME_KEYS, "name")?;
    let sector = required_text(obj, SECTOR_KEYS, "sector")?;

    Ok(ProtocolSnapshot {
        protocol_id,
        name,
        sector,
        symbol: lookup(obj, SYMBOL_KEYS).and_then(text),
        chain: lookup(obj, CHAIN_KEYS).and_then(primary_chain),
        market_cap: lookup(obj, MARKET_CAP_KEYS).and_then(parse_amount),
        tvl: lookup(obj, TVL_KEYS).and_then(parse_amount),
        revenue_period: lookup(obj, REVENUE_KEYS).and_then(parse_amount),
        timestamp: lookup(obj, TIMESTAMP_KEYS)
            .and_then(parse_timestamp)
            .unwrap_or_default(),
    })
}

/// Normalize a whole batch. Failing records are collected, never fatal.
pub fn normalize_batch(records: &[Value]) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();
    for (index, raw) in records.iter().enumerate() {
        match normalize(raw) {
            Ok(snapshot) => batch.snapshots.push(snapshot),
            Err(error) => batch.dropped.push(DroppedRecord { index, error }),
        }
    }
    batch
}

/// Parse a non-negative amount from a JSON number or a string such as
/// `"$1,234,567.89"`. Anything else is `None`.
pub fn parse_amount(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => parse_amount_str(s)?,
        _ => return None,
    };
    (n.is_finite() && n >= 0.0).then_some(n)
}

fn parse_amount_str(s: &str) -> Option<f64> {
    let cleaned: String = s
        .trim()
        .trim_start_matches('$')
        .chars()
        .filter(|c| !matches!(c, ',' | '_' | ' '))
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok()
}

fn parse_timestamp(v: &Value) -> Option<DateTime<Utc>> {
    match v {
        Value::Number(n) => from_epoch(n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(secs) = s.parse::<i64>() {
                return from_epoch(secs);
            }
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc())
        }
        _ => None,
    }
}

fn from_epoch(value: i64) -> Option<DateTime<Utc>> {
    if value.unsigned_abs() > MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(value)
    } else {
        DateTime::from_timestamp(value, 0)
    }
}

fn required_text(
    obj: &Map<String, Value>,
    aliases: &[&str],
    field: &'static str,
) -> Result<String, NormalizationError> {
    lookup(obj, aliases)
        .and_then(text)
        .ok_or(NormalizationError::MissingField { field })
}

/// Non-empty trimmed string. Numeric ids are accepted and stringified.
fn text(v: &Value) -> Option<String> {
    let s = match v {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

fn primary_chain(v: &Value) -> Option<String> {
    match v {
        Value::Array(items) => items.first().and_then(text),
        other => text(other),
    }
}

fn canonical_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn lookup<'a>(obj: &'a Map<String, Value>, aliases: &[&str]) -> Option<&'a Value> {
    lookup_at(obj, aliases, 0)
}

fn lookup_at<'a>(obj: &'a Map<String, Value>, aliases: &[&str], depth: usize) -> Option<&'a Value> {
    for alias in aliases {
        let hit = obj
            .iter()
            .find(|(k, v)| !v.is_null() && canonical_key(k) == *alias)
            .map(|(_, v)| v);
        if hit.is_some() {
            return hit;
        }
    }
    if depth >= MAX_NESTING {
        return None;
    }
    obj.values()
        .filter_map(Value::as_object)
        .find_map(|nested| lookup_at(nested, aliases, depth + 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_varied_casing_and_aliases() {
        let raw = json!({
            "ProtocolId": "uniswap",
            "Name": "Uniswap",
            "category": "DEX",
            "marketCap": 1000,
            "TVL": "500",
            "revenue_period": 10.0,
            "chains": ["Ethereum", "Arbitrum"],
            "timestamp": 1_700_000_000
        });
        let snap = normalize(&raw).unwrap();
        assert_eq!(snap.protocol_id, "uniswap");
        assert_eq!(snap.name, "Uniswap");
        assert_eq!(snap.sector, "DEX");
        assert_eq!(snap.market_cap, Some(1000.0));
        assert_eq!(snap.tvl, Some(500.0));
        assert_eq!(snap.revenue_period, Some(10.0));
        assert_eq!(snap.chain.as_deref(), Some("Ethereum"));
        assert_eq!(snap.timestamp.timestamp(), 1_700_000_000);
    }

    #[test]
    fn finds_nested_fields() {
        let raw = json!({
            "id": "aave",
            "name": "Aave",
            "sector": "Lending",
            "metrics": { "market_cap": "2,500,000", "tvl": 9e9, "financials": { "fees": "12_000" } }
        });
        let snap = normalize(&raw).unwrap();
        assert_eq!(snap.market_cap, Some(2_500_000.0));
        assert_eq!(snap.tvl, Some(9e9));
        assert_eq!(snap.revenue_period, Some(12_000.0));
    }

    #[test]
    fn missing_required_field_is_an_error() {
        let raw = json!({ "protocol_id": "x", "name": "X" });
        assert_eq!(
            normalize(&raw),
            Err(NormalizationError::MissingField { field: "sector" })
        );
        let raw = json!({ "protocol_id": "  ", "name": "X", "sector": "DEX" });
        assert_eq!(
            normalize(&raw),
            Err(NormalizationError::MissingField { field: "protocol_id" })
        );
    }

    #[test]
    fn non_object_is_rejected() {
        assert_eq!(normalize(&json!([1, 2])), Err(NormalizationError::NotAnObject));
    }

    #[test]
    fn bad_numbers_become_missing_not_zero() {
        let raw = json!({
            "protocol_id": "p", "name": "P", "sector": "DEX",
            "market_cap": "n/a", "tvl": -5, "revenue_period": "NaN"
        });
        let snap = normalize(&raw).unwrap();
        assert_eq!(snap.market_cap, None);
        assert_eq!(snap.tvl, None);
        assert_eq!(snap.revenue_period, None);
    }

    #[test]
    fn zero_is_kept_as_a_measured_value() {
        let raw = json!({ "protocol_id": "p", "name": "P", "sector": "DEX", "revenue_period": 0 });
        assert_eq!(normalize(&raw).unwrap().revenue_period, Some(0.0));
    }

    #[test]
    fn amount_strings() {
        assert_eq!(parse_amount(&json!("$1,234.5")), Some(1234.5));
        assert_eq!(parse_amount(&json!(" 42 ")), Some(42.0));
        assert_eq!(parse_amount(&json!("")), None);
        assert_eq!(parse_amount(&json!(true)), None);
        assert_eq!(parse_amount(&json!("-3")), None);
    }

    #[test]
    fn timestamps_in_several_shapes() {
        let base = json!({ "protocol_id": "p", "name": "P", "sector": "DEX" });
        let with = |ts: Value| {
            let mut v = base.clone();
            v["timestamp"] = ts;
            normalize(&v).unwrap().timestamp.timestamp()
        };
        assert_eq!(with(json!(1_700_000_000_000i64)), 1_700_000_000);
        assert_eq!(with(json!("2024-01-01T00:00:00Z")), 1_704_067_200);
        assert_eq!(with(json!("2024-01-01")), 1_704_067_200);
        assert_eq!(normalize(&base).unwrap().timestamp.timestamp(), 0);
    }

    #[test]
    fn batch_counts_dropped_records() {
        let records = vec![
            json!({ "protocol_id": "a", "name": "A", "sector": "DEX" }),
            json!({ "name": "B", "sector": "DEX" }),
            json!("garbage"),
            json!({ "protocol_id": "c", "name": "C", "sector": "Lending" }),
        ];
        let batch = normalize_batch(&records);
        assert_eq!(batch.snapshots.len(), 2);
        assert_eq!(batch.dropped.len(), 2);
        assert_eq!(batch.dropped[0].index, 1);
        assert_eq!(batch.dropped[1].error, NormalizationError::NotAnObject);
    }
}
