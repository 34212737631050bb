use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::error::AppError;
use crate::refresh::Refresher;
use crate::state::{Published, ScoreBoard};
use crate::types::{DataOrigin, RunSummary, ScoredProtocol, SectorValuation};

#[derive(Clone)]
pub struct ApiState {
    pub board: Arc<ScoreBoard>,
    pub health: Arc<HealthState>,
    pub latency: Arc<LatencyStats>,
    pub refresher: Arc<Refresher>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/protocols", get(get_protocols))
        .route("/protocols/:id", get(get_protocol))
        .route("/sectors", get(get_sectors))
        .route("/stats/summary", get(get_stats_summary))
        .route("/stats/latency", get(get_stats_latency))
        .route("/health", get(get_health))
        .route("/refresh", post(post_refresh))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ProtocolsQuery {
    /// Comma-separated sector names, case-insensitive.
    pub sector: Option<String>,
    /// Comma-separated chain names, case-insensitive.
    pub chain: Option<String>,
    pub min_tvl: Option<f64>,
    pub min_score: Option<f64>,
}

impl ProtocolsQuery {
    pub fn matches(&self, p: &ScoredProtocol) -> bool {
        let snap = &p.snapshot;
        if !list_matches(self.sector.as_deref(), Some(snap.sector.as_str())) {
            return false;
        }
        if !list_matches(self.chain.as_deref(), snap.chain.as_deref()) {
            return false;
        }
        if let Some(min_tvl) = self.min_tvl.filter(|m| *m > 0.0) {
            if !snap.tvl.is_some_and(|tvl| tvl >= min_tvl) {
                return false;
            }
        }
        self.min_score.map_or(true, |min| p.score.value >= min)
    }
}

/// An absent or empty filter list matches everything.
fn list_matches(filter: Option<&str>, value: Option<&str>) -> bool {
    let wanted: Vec<&str> = filter
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if wanted.is_empty() {
        return true;
    }
    value.is_some_and(|v| wanted.iter().any(|w| w.eq_ignore_ascii_case(v)))
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct SummaryResponse {
    #[serde(flatten)]
    pub summary: RunSummary,
    pub refreshed_at: DateTime<Utc>,
    pub run_duration_ms: f64,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub ready: bool,
    pub origin: Option<DataOrigin>,
    pub simulated: bool,
    pub refresh_count: u64,
    pub fetch_failures: u64,
    pub last_refresh_at_ms: Option<u64>,
}

#[derive(Serialize)]
pub struct LatencyResponse {
    pub p50_ms: Option<f64>,
    pub p95_ms: Option<f64>,
    pub p99_ms: Option<f64>,
    pub sample_count: u64,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

fn current(state: &ApiState) -> Result<Arc<Published>, AppError> {
    state.board.current().ok_or(AppError::NotReady)
}

async fn get_protocols(
    State(state): State<ApiState>,
    Query(params): Query<ProtocolsQuery>,
) -> Result<Json<Vec<ScoredProtocol>>, AppError> {
    let published = current(&state)?;
    let rows = published
        .report
        .scored
        .iter()
        .filter(|p| params.matches(p))
        .cloned()
        .collect();
    Ok(Json(rows))
}

async fn get_protocol(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<ScoredProtocol>, AppError> {
    let published = current(&state)?;
    published
        .report
        .find(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("protocol {id}")))
}

async fn get_sectors(
    State(state): State<ApiState>,
) -> Result<Json<Vec<SectorValuation>>, AppError> {
    let published = current(&state)?;
    Ok(Json(published.report.sectors.clone()))
}

async fn get_stats_summary(
    State(state): State<ApiState>,
) -> Result<Json<SummaryResponse>, AppError> {
    let published = current(&state)?;
    Ok(Json(SummaryResponse {
        summary: published.report.summary(),
        refreshed_at: published.refreshed_at,
        run_duration_ms: published.run_duration_ms,
    }))
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<LatencyResponse> {
    let percentiles = state.latency.percentiles_ms();
    Json(LatencyResponse {
        p50_ms: percentiles.map(|p| p.0),
        p95_ms: percentiles.map(|p| p.1),
        p99_ms: percentiles.map(|p| p.2),
        sample_count: state.latency.len(),
    })
}

async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    let published = state.board.current();
    let last = state.health.last_refresh_at_ms();
    Json(HealthResponse {
        ready: published.is_some(),
        origin: published.map(|p| p.report.origin),
        simulated: state.health.simulated(),
        refresh_count: state.health.refresh_count(),
        fetch_failures: state.health.fetch_failures(),
        last_refresh_at_ms: (last > 0).then_some(last),
    })
}

async fn post_refresh(
    State(state): State<ApiState>,
) -> Result<Json<SummaryResponse>, AppError> {
    state.refresher.refresh().await?;
    get_stats_summary(State(state)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DerivedMetrics, ProtocolSnapshot, VentureScore};

    fn row(sector: &str, chain: Option<&str>, tvl: Option<f64>, score: f64) -> ScoredProtocol {
        ScoredProtocol {
            snapshot: ProtocolSnapshot {
                protocol_id: "p".to_string(),
                name: "P".to_string(),
                sector: sector.to_string(),
                symbol: None,
                chain: chain.map(str::to_string),
                market_cap: None,
                tvl,
                revenue_period: None,
                timestamp: DateTime::default(),
            },
            metrics: DerivedMetrics::default(),
            sector_median_ps: None,
            fair_value: None,
            valuation_gap: None,
            score: VentureScore {
                value: score,
                valuation: 50.0,
                momentum: 50.0,
                efficiency: 50.0,
                imputed: Vec::new(),
            },
        }
    }

    #[test]
    fn empty_query_matches_everything() {
        let q = ProtocolsQuery::default();
        assert!(q.matches(&row("DEX", None, None, 0.0)));
    }

    #[test]
    fn sector_and_chain_lists_are_case_insensitive() {
        let q = ProtocolsQuery {
            sector: Some("dex, lending".to_string()),
            chain: Some("ETHEREUM".to_string()),
            ..ProtocolsQuery::default()
        };
        assert!(q.matches(&row("Lending", Some("Ethereum"), None, 10.0)));
        assert!(!q.matches(&row("Bridge", Some("Ethereum"), None, 10.0)));
        assert!(!q.matches(&row("DEX", None, None, 10.0)));
    }

    #[test]
    fn min_tvl_excludes_missing_tvl() {
        let q = ProtocolsQuery { min_tvl: Some(1e6), ..ProtocolsQuery::default() };
        assert!(q.matches(&row("DEX", None, Some(2e6), 0.0)));
        assert!(!q.matches(&row("DEX", None, Some(5e5), 0.0)));
        assert!(!q.matches(&row("DEX", None, None, 0.0)));

        let zero = ProtocolsQuery { min_tvl: Some(0.0), ..ProtocolsQuery::default() };
        assert!(zero.matches(&row("DEX", None, None, 0.0)));
    }

    #[test]
    fn min_score_is_inclusive() {
        let q = ProtocolsQuery { min_score: Some(60.0), ..ProtocolsQuery::default() };
        assert!(q.matches(&row("DEX", None, None, 60.0)));
        assert!(!q.matches(&row("DEX", None, None, 59.9)));
    }
}
