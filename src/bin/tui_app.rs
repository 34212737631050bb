use serde::Deserialize;

/// Rendered in place of any undefined metric.
pub const NA_LABEL: &str = "N/A";

// ---------------------------------------------------------------------------
// API response types (mirror routes.rs shapes)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[allow(dead_code)]
pub struct TopPick {
    pub protocol_id: String,
    pub name: String,
    pub score: f64,
    pub valuation_gap: f64,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[allow(dead_code)]
pub struct SummaryResponse {
    pub origin: String,
    pub protocols_scanned: usize,
    pub dropped: usize,
    pub sectors: usize,
    pub total_revenue_period: f64,
    pub median_sector_ps: Option<f64>,
    pub incomplete_rows: usize,
    pub top_pick: Option<TopPick>,
    pub refreshed_at: String,
    pub run_duration_ms: f64,
}

impl SummaryResponse {
    pub fn is_simulated(&self) -> bool {
        self.origin == "simulated"
    }
}

#[derive(Debug, Clone, Deserialize)]
#[allow(dead_code)]
pub struct ScoreResponse {
    pub value: f64,
    pub valuation: f64,
    pub momentum: f64,
    pub efficiency: f64,
    pub imputed: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[allow(dead_code)]
pub struct ProtocolResponse {
    pub protocol_id: String,
    pub name: String,
    pub sector: String,
    pub symbol: Option<String>,
    pub chain: Option<String>,
    pub market_cap: Option<f64>,
    pub tvl: Option<f64>,
    pub revenue_period: Option<f64>,
    pub annualized_revenue: Option<f64>,
    pub price_to_sales: Option<f64>,
    pub revenue_momentum: Option<f64>,
    pub capital_efficiency: Option<f64>,
    pub sector_median_ps: Option<f64>,
    pub fair_value: Option<f64>,
    pub valuation_gap: Option<f64>,
    pub score: ScoreResponse,
}

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionStatus {
    Connected,
    Error(String),
    Connecting,
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub status: ConnectionStatus,
    pub summary: SummaryResponse,
    /// Sorted by score, highest first.
    pub protocols: Vec<ProtocolResponse>,
    pub last_refresh: std::time::Instant,
    pub base_url: String,
}

impl AppState {
    pub fn new(base_url: String) -> Self {
        Self {
            status: ConnectionStatus::Connecting,
            summary: SummaryResponse::default(),
            protocols: Vec::new(),
            last_refresh: std::time::Instant::now(),
            base_url,
        }
    }

    /// Ask the server to re-run fetch + scoring, then reload.
    pub async fn trigger_refresh(&mut self, client: &reqwest::Client) {
        let url = format!("{}/refresh", self.base_url);
        match client.post(&url).send().await {
            Ok(resp) if resp.status().is_success() => {}
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                self.status = ConnectionStatus::Error(format!(
                    "refresh failed: {status} {}",
                    truncate(body.trim(), 60)
                ));
                return;
            }
            Err(e) => {
                self.status = ConnectionStatus::Error(format!("{e}"));
                return;
            }
        }
        self.refresh(client).await;
    }

    pub async fn refresh(&mut self, client: &reqwest::Client) {
        let summary_url = format!("{}/stats/summary", self.base_url);
        let protocols_url = format!("{}/protocols", self.base_url);

        let (summary_res, protocols_res) = tokio::join!(
            client.get(&summary_url).send(),
            client.get(&protocols_url).send(),
        );

        let (summary_resp, protocols_resp) = match (summary_res, protocols_res) {
            (Ok(s), Ok(p)) => (s, p),
            (Err(e), _) | (_, Err(e)) => {
                self.status = ConnectionStatus::Error(format!("{e}"));
                return;
            }
        };

        if !summary_resp.status().is_success() {
            self.status = ConnectionStatus::Error(format!("server: {}", summary_resp.status()));
            return;
        }

        let (summary, protocols) = tokio::join!(
            summary_resp.json::<SummaryResponse>(),
            protocols_resp.json::<Vec<ProtocolResponse>>(),
        );

        match (summary, protocols) {
            (Ok(s), Ok(mut p)) => {
                sort_by_score(&mut p);
                self.summary = s;
                self.protocols = p;
                self.status = ConnectionStatus::Connected;
                self.last_refresh = std::time::Instant::now();
            }
            (Err(e), _) | (_, Err(e)) => {
                self.status = ConnectionStatus::Error(format!("parse error: {e}"));
            }
        }
    }
}

/// Score descending; ties by name so the table doesn't jump between polls.
pub fn sort_by_score(rows: &mut [ProtocolResponse]) {
    rows.sort_by(|a, b| {
        b.score
            .value
            .total_cmp(&a.score.value)
            .then_with(|| a.name.cmp(&b.name))
    });
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Growing,
    Declining,
    Flat,
    Unknown,
}

pub fn trend(momentum: Option<f64>) -> Trend {
    match momentum {
        Some(m) if m > 0.0 => Trend::Growing,
        Some(m) if m < 0.0 => Trend::Declining,
        Some(_) => Trend::Flat,
        None => Trend::Unknown,
    }
}

/// `$1.2B`, `$340.0M`, `$12.5K`, `$800`.
pub fn format_usd(v: Option<f64>) -> String {
    match v {
        Some(v) if v >= 1e9 => format!("${:.1}B", v / 1e9),
        Some(v) if v >= 1e6 => format!("${:.1}M", v / 1e6),
        Some(v) if v >= 1e3 => format!("${:.1}K", v / 1e3),
        Some(v) => format!("${v:.0}"),
        None => NA_LABEL.to_string(),
    }
}

pub fn format_ratio(v: Option<f64>) -> String {
    v.map_or(NA_LABEL.to_string(), |r| format!("{r:.1}x"))
}

/// Fraction rendered as a signed percentage.
pub fn format_pct(v: Option<f64>) -> String {
    v.map_or(NA_LABEL.to_string(), |f| format!("{:+.1}%", f * 100.0))
}

/// Score with a trailing `*` when any component was imputed.
pub fn format_score(score: &ScoreResponse) -> String {
    let marker = if score.imputed.is_empty() { "" } else { "*" };
    format!("{:.1}{marker}", score.value)
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{head}…")
    }
}


fn main() {
    // entry point lives in src/bin/tui.rs
}
