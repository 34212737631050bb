use crate::config::DAYS_IN_YEAR;
use crate::types::{DerivedMetrics, ProtocolSnapshot};

/// Derive per-protocol metrics from its snapshot history.
///
/// `history` must be ordered by timestamp ascending. The last element drives
/// annualized revenue, P/S and capital efficiency; the last two drive
/// momentum. Every division goes through [`ratio`], so a zero or missing
/// operand yields `None` rather than an infinity.
pub fn derive(history: &[ProtocolSnapshot], window_days: u32) -> DerivedMetrics {
    let Some(current) = history.last() else {
        return DerivedMetrics::default();
    };

    let annualized_revenue = current
        .revenue_period
        .and_then(|rev| annualize(rev, window_days));

    let price_to_sales = match (current.market_cap, annualized_revenue) {
        (Some(mcap), Some(annual)) => ratio(mcap, annual),
        _ => None,
    };

    let capital_efficiency = match (annualized_revenue, current.tvl) {
        (Some(annual), Some(tvl)) => ratio(annual, tvl),
        _ => None,
    };

    let revenue_momentum = match history {
        [.., previous, current] => match (previous.revenue_period, current.revenue_period) {
            (Some(prev), Some(cur)) => ratio(cur - prev, prev),
            _ => None,
        },
        _ => None,
    };

    DerivedMetrics {
        annualized_revenue,
        price_to_sales,
        revenue_momentum,
        capital_efficiency,
    }
}

/// `revenue_period * (365 / window_days)`.
pub fn annualize(revenue_period: f64, window_days: u32) -> Option<f64> {
    if window_days == 0 {
        return None;
    }
    Some(revenue_period * (DAYS_IN_YEAR / f64::from(window_days)))
}

/// `num / den`, or `None` when the denominator is zero or the result is not finite.
pub fn ratio(num: f64, den: f64) -> Option<f64> {
    if den == 0.0 {
        return None;
    }
    let r = num / den;
    r.is_finite().then_some(r)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn snap(revenue: Option<f64>, mcap: Option<f64>, tvl: Option<f64>, ts: i64) -> ProtocolSnapshot {
        ProtocolSnapshot {
            protocol_id: "p".to_string(),
            name: "P".to_string(),
            sector: "DEX".to_string(),
            symbol: None,
            chain: None,
            market_cap: mcap,
            tvl,
            revenue_period: revenue,
            timestamp: DateTime::<Utc>::from_timestamp(ts, 0).unwrap(),
        }
    }

    #[test]
    fn annualization_is_exact() {
        for (rev, days) in [(10.0, 30), (1234.5, 7), (0.0, 1), (99.0, 365)] {
            let m = derive(&[snap(Some(rev), None, None, 0)], days);
            let expected = rev * 365.0 / f64::from(days);
            assert!(approx(m.annualized_revenue.unwrap(), expected));
            assert!(m.annualized_revenue.unwrap() >= 0.0);
        }
    }

    #[test]
    fn dex_scenario() {
        let history = [
            snap(Some(8.0), Some(1000.0), Some(500.0), 0),
            snap(Some(10.0), Some(1000.0), Some(500.0), 30 * 86_400),
        ];
        let m = derive(&history, 30);
        assert!((m.annualized_revenue.unwrap() - 121.666_666).abs() < 1e-3);
        assert!((m.price_to_sales.unwrap() - 8.219).abs() < 1e-3);
        assert!(approx(m.revenue_momentum.unwrap(), 0.25));
        assert!((m.capital_efficiency.unwrap() - 0.2433).abs() < 1e-3);
    }

    #[test]
    fn zero_revenue_leaves_ps_undefined() {
        let m = derive(&[snap(Some(0.0), Some(1000.0), Some(500.0), 0)], 30);
        assert_eq!(m.annualized_revenue, Some(0.0));
        assert_eq!(m.price_to_sales, None);
        assert_eq!(m.capital_efficiency, Some(0.0));
    }

    #[test]
    fn missing_operands_leave_metrics_undefined() {
        let m = derive(&[snap(Some(10.0), None, Some(0.0), 0)], 30);
        assert_eq!(m.price_to_sales, None);
        assert_eq!(m.capital_efficiency, None);
        assert_eq!(m.revenue_momentum, None);

        let m = derive(&[snap(None, Some(1.0), Some(1.0), 0)], 30);
        assert_eq!(m, DerivedMetrics::default());
    }

    #[test]
    fn momentum_uses_last_two_and_guards_zero_base() {
        let history = [
            snap(Some(100.0), None, None, 0),
            snap(Some(0.0), None, None, 1),
            snap(Some(5.0), None, None, 2),
        ];
        assert_eq!(derive(&history, 30).revenue_momentum, None);

        let history = [snap(Some(10.0), None, None, 0), snap(Some(4.0), None, None, 1)];
        assert!(approx(derive(&history, 30).revenue_momentum.unwrap(), -0.6));
    }

    #[test]
    fn empty_history_is_all_undefined() {
        assert_eq!(derive(&[], 30), DerivedMetrics::default());
    }
}
