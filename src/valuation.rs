//! Sector fair-value model.
//!
//! Each protocol is compared against the median P/S of its own sector only.
//! A sector without a single priceable member gets no median, and its
//! members get no fair value.

use std::collections::BTreeMap;

use crate::metrics::ratio;
use crate::types::{DerivedMetrics, ProtocolSnapshot, SectorValuation};

/// Group candidates by sector and compute each sector's median P/S.
///
/// Only positive P/S values count as comparables: a zero P/S (unlisted or
/// zero market cap) and values above `ps_outlier_cap` (when set) are left
/// out of the median.
/// The result is keyed and ordered by sector name and does not depend on the
/// order of `candidates`.
pub fn compute_sector_valuations(
    candidates: &[(ProtocolSnapshot, DerivedMetrics)],
    ps_outlier_cap: Option<f64>,
) -> BTreeMap<String, SectorValuation> {
    let mut groups: BTreeMap<&str, (usize, Vec<f64>)> = BTreeMap::new();

    for (snapshot, metrics) in candidates {
        let entry = groups.entry(snapshot.sector.as_str()).or_default();
        entry.0 += 1;
        if let Some(ps) = metrics.price_to_sales {
            if ps > 0.0 && ps_outlier_cap.map_or(true, |cap| ps <= cap) {
                entry.1.push(ps);
            }
        }
    }

    groups
        .into_iter()
        .map(|(sector, (member_count, mut values))| {
            let priced_count = values.len();
            let valuation = SectorValuation {
                sector: sector.to_string(),
                median_price_to_sales: median(&mut values),
                member_count,
                priced_count,
            };
            (sector.to_string(), valuation)
        })
        .collect()
}

/// Standard median: middle element, or the mean of the two middle elements
/// for an even count. Sorts `values` in place. `None` when empty.
pub fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// `annualized_revenue * sector median P/S`.
pub fn fair_value(annualized_revenue: Option<f64>, sector_median_ps: Option<f64>) -> Option<f64> {
    Some(annualized_revenue? * sector_median_ps?)
}

/// `(fair_value - market_cap) / market_cap`; positive means undervalued.
pub fn valuation_gap(fair_value: Option<f64>, market_cap: Option<f64>) -> Option<f64> {
    let (fv, mcap) = (fair_value?, market_cap?);
    ratio(fv - mcap, mcap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn candidate(id: &str, sector: &str, ps: Option<f64>) -> (ProtocolSnapshot, DerivedMetrics) {
        let snapshot = ProtocolSnapshot {
            protocol_id: id.to_string(),
            name: id.to_uppercase(),
            sector: sector.to_string(),
            symbol: None,
            chain: None,
            market_cap: None,
            tvl: None,
            revenue_period: None,
            timestamp: DateTime::default(),
        };
        let metrics = DerivedMetrics { price_to_sales: ps, ..DerivedMetrics::default() };
        (snapshot, metrics)
    }

    #[test]
    fn median_odd_and_even() {
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&mut [4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&mut []), None);
    }

    #[test]
    fn undefined_ps_counts_as_member_but_not_in_median() {
        let cands = vec![
            candidate("a", "DEX", Some(1.0)),
            candidate("b", "DEX", None),
            candidate("c", "DEX", Some(2.0)),
            candidate("d", "DEX", Some(3.0)),
        ];
        let sectors = compute_sector_valuations(&cands, None);
        let dex = &sectors["DEX"];
        assert_eq!(dex.median_price_to_sales, Some(2.0));
        assert_eq!(dex.member_count, 4);
        assert_eq!(dex.priced_count, 3);
    }

    #[test]
    fn unpriceable_sector_has_no_median_and_no_fair_value() {
        let cands = vec![
            candidate("a", "Bridge", None),
            candidate("b", "Bridge", None),
            candidate("c", "DEX", Some(4.0)),
        ];
        let sectors = compute_sector_valuations(&cands, None);
        let bridge = &sectors["Bridge"];
        assert_eq!(bridge.median_price_to_sales, None);
        assert_eq!(fair_value(Some(100.0), bridge.median_price_to_sales), None);
        assert_eq!(sectors["DEX"].median_price_to_sales, Some(4.0));
    }

    #[test]
    fn outliers_excluded_from_median() {
        let cands = vec![
            candidate("a", "DEX", Some(2.0)),
            candidate("b", "DEX", Some(4.0)),
            candidate("c", "DEX", Some(5000.0)),
        ];
        let capped = compute_sector_valuations(&cands, Some(1000.0));
        assert_eq!(capped["DEX"].median_price_to_sales, Some(3.0));
        let uncapped = compute_sector_valuations(&cands, None);
        assert_eq!(uncapped["DEX"].median_price_to_sales, Some(4.0));
    }

    #[test]
    fn zero_ps_excluded_from_median() {
        let cands = vec![
            candidate("a", "DEX", Some(0.0)),
            candidate("b", "DEX", Some(0.0)),
            candidate("c", "DEX", Some(32.9)),
        ];
        let sectors = compute_sector_valuations(&cands, Some(1000.0));
        let dex = &sectors["DEX"];
        assert_eq!(dex.median_price_to_sales, Some(32.9));
        assert_eq!(dex.member_count, 3);
        assert_eq!(dex.priced_count, 1);
    }

    #[test]
    fn independent_of_input_order() {
        let mut cands = vec![
            candidate("a", "DEX", Some(7.0)),
            candidate("b", "Lending", Some(1.5)),
            candidate("c", "DEX", Some(2.0)),
            candidate("d", "DEX", Some(3.5)),
            candidate("e", "Lending", None),
            candidate("f", "DEX", Some(9.0)),
        ];
        let forward = compute_sector_valuations(&cands, Some(1000.0));
        cands.reverse();
        let reversed = compute_sector_valuations(&cands, Some(1000.0));
        cands.swap(0, 3);
        let shuffled = compute_sector_valuations(&cands, Some(1000.0));
        assert_eq!(forward, reversed);
        assert_eq!(forward, shuffled);
        assert_eq!(forward["DEX"].median_price_to_sales, Some(5.25));
    }

    #[test]
    fn gap_sign_and_guards() {
        let fv = fair_value(Some(121.666_666_666_666_67), Some(5.0)).unwrap();
        assert!((fv - 608.333).abs() < 1e-3);
        let gap = valuation_gap(Some(fv), Some(1000.0)).unwrap();
        assert!((gap - -0.391_666).abs() < 1e-5);
        assert_eq!(valuation_gap(Some(fv), Some(0.0)), None);
        assert_eq!(valuation_gap(Some(fv), None), None);
        assert_eq!(valuation_gap(None, Some(1000.0)), None);
    }
}
