use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::NormalizationError;

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// One protocol at one point in time, as produced by the normalizer or the
/// synthetic generator. `None` on a numeric field means "missing"; zero is a
/// measured value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolSnapshot {
    pub protocol_id: String,
    pub name: String,
    pub sector: String,
    pub symbol: Option<String>,
    /// Primary chain the protocol is deployed on.
    pub chain: Option<String>,
    pub market_cap: Option<f64>,
    pub tvl: Option<f64>,
    /// Revenue collected over the configured observation window.
    pub revenue_period: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// Two consecutive observations of the same protocol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotPair {
    pub previous: ProtocolSnapshot,
    pub current: ProtocolSnapshot,
}

// ---------------------------------------------------------------------------
// Derived values
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    pub annualized_revenue: Option<f64>,
    pub price_to_sales: Option<f64>,
    /// Signed fractional change of `revenue_period` between the last two snapshots.
    pub revenue_momentum: Option<f64>,
    pub capital_efficiency: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorValuation {
    pub sector: String,
    /// `None` when no member has a usable P/S; such a sector cannot be fair-valued.
    pub median_price_to_sales: Option<f64>,
    pub member_count: usize,
    /// Members whose P/S contributed to the median.
    pub priced_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreComponent {
    Valuation,
    Momentum,
    Efficiency,
}

impl std::fmt::Display for ScoreComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ScoreComponent::Valuation => "valuation",
            ScoreComponent::Momentum => "momentum",
            ScoreComponent::Efficiency => "efficiency",
        };
        write!(f, "{s}")
    }
}

/// Composite score plus the sub-scores it was built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VentureScore {
    /// Clamped to [0, 100].
    pub value: f64,
    pub valuation: f64,
    pub momentum: f64,
    pub efficiency: f64,
    /// Components whose input was undefined and were scored at the midpoint.
    pub imputed: Vec<ScoreComponent>,
}

impl VentureScore {
    pub fn is_incomplete(&self) -> bool {
        !self.imputed.is_empty()
    }
}

/// Final output row handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredProtocol {
    #[serde(flatten)]
    pub snapshot: ProtocolSnapshot,
    #[serde(flatten)]
    pub metrics: DerivedMetrics,
    pub sector_median_ps: Option<f64>,
    pub fair_value: Option<f64>,
    /// `(fair_value - market_cap) / market_cap`; positive means undervalued.
    pub valuation_gap: Option<f64>,
    pub score: VentureScore,
}

// ---------------------------------------------------------------------------
// Run output
// ---------------------------------------------------------------------------

/// Where the snapshots of a run came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataOrigin {
    Live,
    Simulated,
}

impl std::fmt::Display for DataOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataOrigin::Live => write!(f, "live"),
            DataOrigin::Simulated => write!(f, "simulated"),
        }
    }
}

/// A raw record that failed normalization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DroppedRecord {
    /// Position of the record in the input batch.
    pub index: usize,
    pub error: NormalizationError,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub origin: DataOrigin,
    /// One row per protocol, ordered by `protocol_id`.
    pub scored: Vec<ScoredProtocol>,
    /// One entry per sector, ordered by sector name.
    pub sectors: Vec<SectorValuation>,
    pub dropped: usize,
    pub drop_reasons: Vec<DroppedRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub origin: DataOrigin,
    pub protocols_scanned: usize,
    pub dropped: usize,
    pub sectors: usize,
    pub total_revenue_period: f64,
    /// Median of the defined sector medians.
    pub median_sector_ps: Option<f64>,
    pub incomplete_rows: usize,
    pub top_pick: Option<TopPick>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopPick {
    pub protocol_id: String,
    pub name: String,
    pub score: f64,
    pub valuation_gap: f64,
}
