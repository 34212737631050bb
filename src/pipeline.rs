use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use crate::config::ScoringConfig;
use crate::error::Result;
use crate::metrics::derive;
use crate::normalizer::normalize_batch;
use crate::scorer::{ScoreInputs, VentureScorer};
use crate::types::{
    DataOrigin, DerivedMetrics, DroppedRecord, ProtocolSnapshot, RunReport, RunSummary,
    ScoredProtocol, SnapshotPair, TopPick,
};
use crate::valuation::{compute_sector_valuations, fair_value, median, valuation_gap};

/// Annualized revenue a protocol needs before it can be the top pick.
const TOP_PICK_MIN_ANNUAL_REVENUE: f64 = 100_000.0;
/// Score a protocol needs before it can be the top pick.
const TOP_PICK_MIN_SCORE: f64 = 50.0;

/// Raw records -> normalized snapshots -> metrics -> sector medians -> scores.
///
/// Construction validates the scoring configuration, so a `Pipeline` that
/// exists can always run. Each run owns its input and returns a fresh
/// report; nothing is carried between runs.
#[derive(Debug, Clone)]
pub struct Pipeline {
    scorer: VentureScorer,
}

impl Pipeline {
    pub fn new(config: ScoringConfig) -> Result<Self> {
        Ok(Self {
            scorer: VentureScorer::new(config)?,
        })
    }

    pub fn config(&self) -> &ScoringConfig {
        self.scorer.config()
    }

    /// Score loosely-typed records from the fetch collaborator. Records that
    /// fail normalization are dropped and counted.
    pub fn run_raw(&self, records: &[Value], origin: DataOrigin) -> RunReport {
        let batch = normalize_batch(records);
        for dropped in &batch.dropped {
            debug!(index = dropped.index, "Dropping raw record: {}", dropped.error);
        }
        self.run(batch.snapshots, batch.dropped, origin)
    }

    /// Score generator output. Always marked simulated.
    pub fn run_synthetic(&self, pairs: Vec<SnapshotPair>) -> RunReport {
        let snapshots = pairs
            .into_iter()
            .flat_map(|pair| [pair.previous, pair.current])
            .collect();
        self.run(snapshots, Vec::new(), DataOrigin::Simulated)
    }

    pub fn run(
        &self,
        snapshots: Vec<ProtocolSnapshot>,
        dropped: Vec<DroppedRecord>,
        origin: DataOrigin,
    ) -> RunReport {
        let cfg = self.scorer.config();

        let mut histories: BTreeMap<String, Vec<ProtocolSnapshot>> = BTreeMap::new();
        for snapshot in snapshots {
            histories
                .entry(snapshot.protocol_id.clone())
                .or_default()
                .push(snapshot);
        }

        let candidates: Vec<(ProtocolSnapshot, DerivedMetrics)> = histories
            .into_values()
            .filter_map(|mut history| {
                history.sort_by(snapshot_order);
                let metrics = derive(&history, cfg.window_days);
                history.pop().map(|latest| (latest, metrics))
            })
            .collect();

        let sectors = compute_sector_valuations(&candidates, cfg.ps_outlier_cap);

        let scored = candidates
            .into_iter()
            .map(|(snapshot, metrics)| {
                let sector_median_ps = sectors
                    .get(&snapshot.sector)
                    .and_then(|s| s.median_price_to_sales);
                let fair_value = fair_value(metrics.annualized_revenue, sector_median_ps);
                let valuation_gap = valuation_gap(fair_value, snapshot.market_cap);
                let score = self.scorer.score(&ScoreInputs {
                    valuation_gap,
                    revenue_momentum: metrics.revenue_momentum,
                    capital_efficiency: metrics.capital_efficiency,
                });
                ScoredProtocol {
                    snapshot,
                    metrics,
                    sector_median_ps,
                    fair_value,
                    valuation_gap,
                    score,
                }
            })
            .collect();

        RunReport {
            origin,
            scored,
            sectors: sectors.into_values().collect(),
            dropped: dropped.len(),
            drop_reasons: dropped,
        }
    }
}

/// Timestamp ascending. Snapshots sharing a timestamp are ordered by their
/// amounts, then by their descriptive fields, so the "latest" pick does not
/// depend on input order.
fn snapshot_order(a: &ProtocolSnapshot, b: &ProtocolSnapshot) -> Ordering {
    a.timestamp
        .cmp(&b.timestamp)
        .then_with(|| cmp_amount(a.revenue_period, b.revenue_period))
        .then_with(|| cmp_amount(a.tvl, b.tvl))
        .then_with(|| cmp_amount(a.market_cap, b.market_cap))
        .then_with(|| a.sector.cmp(&b.sector))
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.symbol.cmp(&b.symbol))
        .then_with(|| a.chain.cmp(&b.chain))
}

fn cmp_amount(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

impl RunReport {
    pub fn summary(&self) -> RunSummary {
        let total_revenue_period: f64 = self
            .scored
            .iter()
            .filter_map(|p| p.snapshot.revenue_period)
            .sum();

        let mut sector_medians: Vec<f64> = self
            .sectors
            .iter()
            .filter_map(|s| s.median_price_to_sales)
            .collect();

        let top_pick = self
            .scored
            .iter()
            .filter(|p| {
                p.valuation_gap.is_some_and(|g| g > 0.0)
                    && p.metrics
                        .annualized_revenue
                        .is_some_and(|r| r > TOP_PICK_MIN_ANNUAL_REVENUE)
                    && p.score.value > TOP_PICK_MIN_SCORE
            })
            // rows are ordered by protocol_id, so ties resolve to the first id
            .fold(None::<&ScoredProtocol>, |best, p| match best {
                Some(b) if b.score.value >= p.score.value => Some(b),
                _ => Some(p),
            })
            .and_then(|p| {
                p.valuation_gap.map(|valuation_gap| TopPick {
                    protocol_id: p.snapshot.protocol_id.clone(),
                    name: p.snapshot.name.clone(),
                    score: p.score.value,
                    valuation_gap,
                })
            });

        RunSummary {
            origin: self.origin,
            protocols_scanned: self.scored.len(),
            dropped: self.dropped,
            sectors: self.sectors.len(),
            total_revenue_period,
            median_sector_ps: median(&mut sector_medians),
            incomplete_rows: self.scored.iter().filter(|p| p.score.is_incomplete()).count(),
            top_pick,
        }
    }

    pub fn find(&self, protocol_id: &str) -> Option<&ScoredProtocol> {
        self.scored
            .binary_search_by(|p| p.snapshot.protocol_id.as_str().cmp(protocol_id))
            .ok()
            .map(|i| &self.scored[i])
    }
}
