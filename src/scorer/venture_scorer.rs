use crate::config::{ClampRange, ScoringConfig};
use crate::error::Result;
use crate::types::{ScoreComponent, VentureScore};

/// Sub-score assigned to a component whose input is undefined.
pub const NEUTRAL_SUB_SCORE: f64 = 50.0;

/// The three signals the composite is built from.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoreInputs {
    pub valuation_gap: Option<f64>,
    pub revenue_momentum: Option<f64>,
    pub capital_efficiency: Option<f64>,
}

/// Composite 0-100 venture score.
/// Each signal is clamped to its configured range and rescaled to [0, 100],
/// then combined with the configured weights.
#[derive(Debug, Clone)]
pub struct VentureScorer {
    config: ScoringConfig,
}

impl VentureScorer {
    /// Fails with `InvalidConfiguration` before any candidate is scored.
    pub fn new(config: ScoringConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn score(&self, inputs: &ScoreInputs) -> VentureScore {
        let cfg = &self.config;
        let mut imputed = Vec::new();

        let valuation = sub_score(
            inputs.valuation_gap,
            &cfg.valuation_gap_range,
            ScoreComponent::Valuation,
            &mut imputed,
        );
        let momentum = sub_score(
            inputs.revenue_momentum,
            &cfg.momentum_range,
            ScoreComponent::Momentum,
            &mut imputed,
        );
        let efficiency = sub_score(
            inputs.capital_efficiency,
            &cfg.efficiency_range,
            ScoreComponent::Efficiency,
            &mut imputed,
        );

        let w = &cfg.weights;
        let composite =
            valuation * w.valuation + momentum * w.momentum + efficiency * w.efficiency;

        VentureScore {
            value: round_1dp(composite.clamp(0.0, 100.0)),
            valuation,
            momentum,
            efficiency,
            imputed,
        }
    }
}

fn sub_score(
    value: Option<f64>,
    range: &ClampRange,
    component: ScoreComponent,
    imputed: &mut Vec<ScoreComponent>,
) -> f64 {
    match value.filter(|v| v.is_finite()) {
        Some(v) => range.rescale(v),
        None => {
            imputed.push(component);
            NEUTRAL_SUB_SCORE
        }
    }
}

fn round_1dp(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
