use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::config::{Config, FETCH_TIMEOUT_SECS};
use crate::error::{AppError, Result};

#[derive(Debug, Default)]
pub struct FetchStats {
    pub protocols_total: usize,
    pub fee_rows_total: usize,
    pub matched_by_name: usize,
    pub matched_by_symbol: usize,
    pub unmatched: usize,
}

/// DefiLlama fee-overview fields holding revenue for the current window and
/// the window immediately before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevenueFields {
    pub current: &'static str,
    pub previous: &'static str,
}

impl RevenueFields {
    /// Only the windows DefiLlama reports are supported for the live source.
    pub fn for_window(window_days: u32) -> Option<Self> {
        let (current, previous) = match window_days {
            1 => ("total24h", "total48hto24h"),
            7 => ("total7d", "total14dto7d"),
            30 => ("total30d", "total60dto30d"),
            _ => return None,
        };
        Some(Self { current, previous })
    }
}

/// Fetch protocols and fee overviews from DefiLlama and merge them into raw
/// per-snapshot records for the normalizer. Any transport or shape failure
/// is reported as `FetchUnavailable` so the caller can fall back to
/// synthetic data.
pub async fn fetch_raw_records(cfg: &Config, as_of: DateTime<Utc>) -> Result<(Vec<Value>, FetchStats)> {
    let window_days = cfg.scoring.window_days;
    let fields = RevenueFields::for_window(window_days).ok_or_else(|| {
        AppError::Config(format!(
            "live source only reports 1, 7 or 30 day windows (WINDOW_DAYS={window_days})"
        ))
    })?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
        .user_agent("venture-scout/0.1")
        .build()?;

    let protocols_resp = fetch_json(&client, &cfg.protocols_url).await?;
    let protocols = protocols_resp.as_array().ok_or_else(|| {
        AppError::FetchUnavailable("protocols response was not an array".to_string())
    })?;

    let fees_resp = fetch_json(&client, &cfg.fees_url).await?;
    let fees = fees_resp
        .get("protocols")
        .and_then(Value::as_array)
        .ok_or_else(|| AppError::FetchUnavailable("no protocols in fees response".to_string()))?;

    if protocols.is_empty() {
        return Err(AppError::FetchUnavailable(
            "protocols response was empty".to_string(),
        ));
    }

    let (records, stats) = merge_records(protocols, fees, fields, window_days, as_of);
    info!(
        protocols = stats.protocols_total,
        fee_rows = stats.fee_rows_total,
        by_name = stats.matched_by_name,
        by_symbol = stats.matched_by_symbol,
        unmatched = stats.unmatched,
        "Fetched {} raw records from DefiLlama",
        records.len(),
    );
    Ok((records, stats))
}

async fn fetch_json(client: &reqwest::Client, url: &str) -> Result<Value> {
    debug!("GET {url}");
    let resp = client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(unavailable)?;
    resp.json().await.map_err(unavailable)
}

fn unavailable(e: reqwest::Error) -> AppError {
    AppError::FetchUnavailable(e.to_string())
}

/// Join fee rows onto protocols and emit two raw records per protocol: the
/// previous window (stamped `as_of - window_days`) and the current one
/// (stamped `as_of`).
///
/// Fee rows are matched by case-insensitive name, then by symbol; the first
/// fee row wins on duplicates. Protocols with no fee match carry no revenue
/// field at all. The listing endpoint has no history, so both records share
/// the current market cap and TVL.
pub fn merge_records(
    protocols: &[Value],
    fees: &[Value],
    fields: RevenueFields,
    window_days: u32,
    as_of: DateTime<Utc>,
) -> (Vec<Value>, FetchStats) {
    let mut stats = FetchStats {
        protocols_total: protocols.len(),
        fee_rows_total: fees.len(),
        ..FetchStats::default()
    };

    let mut by_name: HashMap<String, &Value> = HashMap::new();
    let mut by_symbol: HashMap<String, &Value> = HashMap::new();
    for fee in fees {
        if let Some(name) = match_key(fee, "name") {
            by_name.entry(name).or_insert(fee);
        }
        if let Some(symbol) = match_key(fee, "symbol") {
            by_symbol.entry(symbol).or_insert(fee);
        }
    }

    let current_ts = as_of.timestamp();
    let previous_ts = current_ts - i64::from(window_days) * 86_400;
    let mut records = Vec::with_capacity(protocols.len() * 2);

    for item in protocols {
        let Some(obj) = item.as_object() else {
            // the normalizer drops and counts it
            records.push(item.clone());
            continue;
        };

        let fee = match match_key(item, "name").and_then(|n| by_name.get(&n)) {
            Some(fee) => {
                stats.matched_by_name += 1;
                Some(*fee)
            }
            None => match match_key(item, "symbol").and_then(|s| by_symbol.get(&s)) {
                Some(fee) => {
                    stats.matched_by_symbol += 1;
                    Some(*fee)
                }
                None => {
                    stats.unmatched += 1;
                    None
                }
            },
        };

        let base = base_record(obj);
        for (ts, field) in [(previous_ts, fields.previous), (current_ts, fields.current)] {
            let mut record = base.clone();
            record.insert("timestamp".to_string(), json!(ts));
            if let Some(revenue) = fee.and_then(|f| f.get(field)).filter(|v| !v.is_null()) {
                record.insert("revenue_period".to_string(), revenue.clone());
            }
            records.push(Value::Object(record));
        }
    }

    (records, stats)
}

fn base_record(protocol: &Map<String, Value>) -> Map<String, Value> {
    let pick = |key: &str| protocol.get(key).cloned().unwrap_or(Value::Null);
    let protocol_id = protocol
        .get("slug")
        .or_else(|| protocol.get("id"))
        .cloned()
        .unwrap_or(Value::Null);

    let mut record = Map::new();
    record.insert("protocol_id".to_string(), protocol_id);
    record.insert("name".to_string(), pick("name"));
    record.insert("sector".to_string(), pick("category"));
    record.insert("symbol".to_string(), pick("symbol"));
    record.insert("chains".to_string(), pick("chains"));
    record.insert("market_cap".to_string(), pick("mcap"));
    record.insert("tvl".to_string(), pick("tvl"));
    record
}

fn match_key(v: &Value, field: &str) -> Option<String> {
    let s = v.get(field)?.as_str()?.trim().to_lowercase();
    (!s.is_empty() && s != "-").then_some(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::normalize_batch;

    fn as_of() -> DateTime<Utc> {
        DateTime::from_timestamp(1_750_000_000, 0).unwrap()
    }

    fn protocols() -> Vec<Value> {
        vec![
            json!({ "slug": "uniswap", "name": "Uniswap", "symbol": "UNI", "category": "Dexs",
                    "chains": ["Ethereum"], "tvl": 5e9, "mcap": 4e9 }),
            json!({ "slug": "aave-v3", "name": "Aave V3", "symbol": "AAVE", "category": "Lending",
                    "chains": ["Ethereum", "Arbitrum"], "tvl": 2e10, "mcap": null }),
            json!({ "slug": "quiet", "name": "Quiet", "symbol": "-", "category": "Yield",
                    "chains": [], "tvl": 1e6, "mcap": 0 }),
        ]
    }

    fn fees() -> Vec<Value> {
        vec![
            json!({ "name": " uniswap ", "symbol": "UNI", "total30d": 90.0, "total60dto30d": 60.0 }),
            json!({ "name": "Uniswap", "symbol": "UNI", "total30d": 1.0, "total60dto30d": 1.0 }),
            json!({ "name": "Aave", "symbol": "aave", "total30d": 30.0, "total60dto30d": null }),
        ]
    }

    #[test]
    fn window_field_mapping() {
        assert_eq!(RevenueFields::for_window(30).unwrap().previous, "total60dto30d");
        assert_eq!(RevenueFields::for_window(1).unwrap().current, "total24h");
        assert!(RevenueFields::for_window(14).is_none());
    }

    #[test]
    fn merges_by_name_then_symbol() {
        let fields = RevenueFields::for_window(30).unwrap();
        let (records, stats) = merge_records(&protocols(), &fees(), fields, 30, as_of());
        assert_eq!(records.len(), 6);
        assert_eq!(stats.matched_by_name, 1);
        assert_eq!(stats.matched_by_symbol, 1);
        assert_eq!(stats.unmatched, 1);

        // first duplicate wins
        assert_eq!(records[0]["revenue_period"], json!(60.0));
        assert_eq!(records[1]["revenue_period"], json!(90.0));
        assert_eq!(records[0]["timestamp"], json!(1_750_000_000 - 30 * 86_400));
        assert_eq!(records[1]["timestamp"], json!(1_750_000_000));

        // null previous window stays absent, not zero
        assert!(records[2].get("revenue_period").is_none());
        assert_eq!(records[3]["revenue_period"], json!(30.0));
        assert!(records[5].get("revenue_period").is_none());
    }

    #[test]
    fn merged_records_normalize_cleanly() {
        let fields = RevenueFields::for_window(30).unwrap();
        let mut list = protocols();
        list.push(json!({ "name": "No Slug", "category": "Dexs" }));
        let (records, _) = merge_records(&list, &fees(), fields, 30, as_of());
        let batch = normalize_batch(&records);
        assert_eq!(batch.snapshots.len(), 6);
        assert_eq!(batch.dropped.len(), 2);

        let uni = &batch.snapshots[1];
        assert_eq!(uni.protocol_id, "uniswap");
        assert_eq!(uni.sector, "Dexs");
        assert_eq!(uni.chain.as_deref(), Some("Ethereum"));
        assert_eq!(uni.market_cap, Some(4e9));
        assert_eq!(batch.snapshots[3].market_cap, None);
        assert_eq!(batch.snapshots[5].market_cap, Some(0.0));
    }
}
