use serde::Serialize;

use crate::error::{AppError, Result};

pub const DEFILLAMA_PROTOCOLS_URL: &str = "https://api.llama.fi/protocols";
pub const DEFILLAMA_FEES_URL: &str = "https://api.llama.fi/overview/fees";

/// Annualisation base: `revenue_period * DAYS_IN_YEAR / window_days`.
pub const DAYS_IN_YEAR: f64 = 365.0;

/// Observation window (days) the `revenue_period` field covers.
pub const DEFAULT_WINDOW_DAYS: u32 = 30;

/// HTTP timeout for the live DefiLlama fetch (seconds).
pub const FETCH_TIMEOUT_SECS: u64 = 30;

/// How often the refresher re-runs fetch + scoring (seconds).
pub const REFRESH_INTERVAL_SECS: u64 = 3600;

/// Protocols generated per synthetic batch when the live source is down.
pub const DEFAULT_SYNTHETIC_COUNT: usize = 50;

/// P/S ratios above this are left out of sector medians.
pub const DEFAULT_PS_OUTLIER_CAP: f64 = 1000.0;
/// Longest observation window accepted (ten years).
pub const MAX_WINDOW_DAYS: u32 = 3650;

/// Tolerance when checking that scorer weights sum to 1.0.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Default composite weights. Must sum to 1.0.
pub mod weights {
    pub const VALUATION: f64 = 0.5;
    pub const MOMENTUM: f64 = 0.3;
    pub const EFFICIENCY: f64 = 0.2;
}

/// Default clamp ranges for each sub-score before rescaling to [0, 100].
pub mod ranges {
    /// Valuation gap: -100% (fair value zero) .. +200% upside.
    pub const VALUATION_GAP: (f64, f64) = (-1.0, 2.0);
    /// Period-over-period revenue change: -50% .. +100%.
    pub const MOMENTUM: (f64, f64) = (-0.5, 1.0);
    /// Annualized revenue per dollar of TVL.
    pub const EFFICIENCY: (f64, f64) = (0.0, 0.5);
}

/// Closed interval a raw metric is clamped to before linear rescaling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClampRange {
    pub min: f64,
    pub max: f64,
}

impl ClampRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Clamp `value` into the range, then map it linearly onto [0, 100].
    pub fn rescale(&self, value: f64) -> f64 {
        let clamped = value.clamp(self.min, self.max);
        (clamped - self.min) / (self.max - self.min) * 100.0
    }

    fn validate(&self, label: &str) -> Result<()> {
        if !self.min.is_finite() || !self.max.is_finite() {
            return Err(AppError::InvalidConfiguration(format!(
                "{label} range must be finite (got {}..{})",
                self.min, self.max
            )));
        }
        if self.min >= self.max {
            return Err(AppError::InvalidConfiguration(format!(
                "{label} range min must be below max (got {}..{})",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreWeights {
    pub valuation: f64,
    pub momentum: f64,
    pub efficiency: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            valuation: weights::VALUATION,
            momentum: weights::MOMENTUM,
            efficiency: weights::EFFICIENCY,
        }
    }
}

impl ScoreWeights {
    fn validate(&self) -> Result<()> {
        for (label, w) in [
            ("valuation", self.valuation),
            ("momentum", self.momentum),
            ("efficiency", self.efficiency),
        ] {
            if !w.is_finite() || w < 0.0 {
                return Err(AppError::InvalidConfiguration(format!(
                    "{label} weight must be a non-negative number (got {w})"
                )));
            }
        }
        let sum = self.valuation + self.momentum + self.efficiency;
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(AppError::InvalidConfiguration(format!(
                "weights must sum to 1.0 (got {sum})"
            )));
        }
        Ok(())
    }
}

/// Everything the valuation model and scorer need. Passed in explicitly at
/// construction; nothing is read from ambient state during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoringConfig {
    pub window_days: u32,
    pub weights: ScoreWeights,
    pub valuation_gap_range: ClampRange,
    pub momentum_range: ClampRange,
    pub efficiency_range: ClampRange,
    /// `None` keeps every defined P/S in the sector median.
    pub ps_outlier_cap: Option<f64>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_WINDOW_DAYS,
            weights: ScoreWeights::default(),
            valuation_gap_range: ClampRange::new(ranges::VALUATION_GAP.0, ranges::VALUATION_GAP.1),
            momentum_range: ClampRange::new(ranges::MOMENTUM.0, ranges::MOMENTUM.1),
            efficiency_range: ClampRange::new(ranges::EFFICIENCY.0, ranges::EFFICIENCY.1),
            ps_outlier_cap: Some(DEFAULT_PS_OUTLIER_CAP),
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<()> {
        if self.window_days == 0 || self.window_days > MAX_WINDOW_DAYS {
            return Err(AppError::InvalidConfiguration(format!(
                "window_days must be between 1 and {MAX_WINDOW_DAYS} (got {})",
                self.window_days
            )));
        }
        self.weights.validate()?;
        self.valuation_gap_range.validate("valuation gap")?;
        self.momentum_range.validate("momentum")?;
        self.efficiency_range.validate("capital efficiency")?;
        if let Some(cap) = self.ps_outlier_cap {
            if !cap.is_finite() || cap <= 0.0 {
                return Err(AppError::InvalidConfiguration(format!(
                    "ps_outlier_cap must be a positive number (got {cap})"
                )));
            }
        }
        Ok(())
    }

    /// Scoring settings from the environment, falling back to the defaults
    /// above. Parsing errors surface as `Config`; semantic checks are left
    /// to [`ScoringConfig::validate`].
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let ps_outlier_cap = match std::env::var("PS_OUTLIER_CAP") {
            Ok(v) if v.trim().eq_ignore_ascii_case("none") => None,
            Ok(v) => Some(parse_var("PS_OUTLIER_CAP", &v)?),
            Err(_) => defaults.ps_outlier_cap,
        };
        Ok(Self {
            window_days: env_or("WINDOW_DAYS", defaults.window_days)?,
            weights: ScoreWeights {
                valuation: env_or("WEIGHT_VALUATION", defaults.weights.valuation)?,
                momentum: env_or("WEIGHT_MOMENTUM", defaults.weights.momentum)?,
                efficiency: env_or("WEIGHT_EFFICIENCY", defaults.weights.efficiency)?,
            },
            valuation_gap_range: ClampRange::new(
                env_or("VALUATION_GAP_MIN", defaults.valuation_gap_range.min)?,
                env_or("VALUATION_GAP_MAX", defaults.valuation_gap_range.max)?,
            ),
            momentum_range: ClampRange::new(
                env_or("MOMENTUM_MIN", defaults.momentum_range.min)?,
                env_or("MOMENTUM_MAX", defaults.momentum_range.max)?,
            ),
            efficiency_range: ClampRange::new(
                env_or("EFFICIENCY_MIN", defaults.efficiency_range.min)?,
                env_or("EFFICIENCY_MAX", defaults.efficiency_range.max)?,
            ),
            ps_outlier_cap,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub api_port: u16,
    pub protocols_url: String,
    pub fees_url: String,
    /// Seconds between background refreshes (REFRESH_INTERVAL_SECS)
    pub refresh_interval_secs: u64,
    /// Protocols per synthetic batch (SYNTHETIC_COUNT)
    pub synthetic_count: usize,
    /// Fixed seed for reproducible synthetic batches (SYNTHETIC_SEED)
    pub synthetic_seed: Option<u64>,
    /// Skip the live fetch entirely and always score synthetic data (FORCE_SYNTHETIC)
    pub force_synthetic: bool,
    pub scoring: ScoringConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let synthetic_count: usize = env_or("SYNTHETIC_COUNT", DEFAULT_SYNTHETIC_COUNT)?;
        if synthetic_count == 0 {
            return Err(AppError::Config("SYNTHETIC_COUNT must be positive".to_string()));
        }
        let synthetic_seed = match std::env::var("SYNTHETIC_SEED") {
            Ok(v) if !v.trim().is_empty() => Some(parse_var("SYNTHETIC_SEED", &v)?),
            _ => None,
        };
        let force_synthetic = std::env::var("FORCE_SYNTHETIC")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            protocols_url: std::env::var("PROTOCOLS_URL")
                .unwrap_or_else(|_| DEFILLAMA_PROTOCOLS_URL.to_string()),
            fees_url: std::env::var("FEES_URL").unwrap_or_else(|_| DEFILLAMA_FEES_URL.to_string()),
            refresh_interval_secs: env_or("REFRESH_INTERVAL_SECS", REFRESH_INTERVAL_SECS)?,
            synthetic_count,
            synthetic_seed,
            force_synthetic,
            scoring: ScoringConfig::from_env()?,
        })
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(v) => parse_var(name, &v),
        Err(_) => Ok(default),
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| AppError::Config(format!("{name} has an invalid value: {raw:?}")))
}
