use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::time::interval;
use tracing::{error, info, warn};

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::config::Config;
use crate::error::AppError;
use crate::fetcher::fetch_raw_records;
use crate::pipeline::Pipeline;
use crate::state::{Published, ScoreBoard};
use crate::synthetic::SyntheticGenerator;
use crate::types::{DataOrigin, RunReport, RunSummary};

/// Fetches, scores and publishes. Falls back to synthetic data whenever the
/// live source is unavailable.
pub struct Refresher {
    cfg: Config,
    pipeline: Pipeline,
    generator: SyntheticGenerator,
    board: Arc<ScoreBoard>,
    health: Arc<HealthState>,
    latency: Arc<LatencyStats>,
    // serialises manual and scheduled refreshes
    in_flight: tokio::sync::Mutex<()>,
}

impl Refresher {
    pub fn new(
        cfg: Config,
        pipeline: Pipeline,
        board: Arc<ScoreBoard>,
        health: Arc<HealthState>,
        latency: Arc<LatencyStats>,
    ) -> Self {
        let generator = SyntheticGenerator::new(pipeline.config().window_days);
        Self {
            cfg,
            pipeline,
            generator,
            board,
            health,
            latency,
            in_flight: tokio::sync::Mutex::new(()),
        }
    }

    pub async fn run(self: Arc<Self>) {
        let mut ticker = interval(Duration::from_secs(self.cfg.refresh_interval_secs));
        ticker.tick().await; // skip immediate first tick, bootstrap already ran

        loop {
            ticker.tick().await;
            if let Err(e) = self.refresh().await {
                error!("Refresh failed: {e}");
            }
        }
    }

    /// One full cycle. Only configuration problems with the live source are
    /// returned as errors; an unreachable source degrades to synthetic data.
    pub async fn refresh(&self) -> crate::error::Result<RunSummary> {
        let _guard = self.in_flight.lock().await;
        let as_of = Utc::now();

        let (report, elapsed) = if self.cfg.force_synthetic {
            self.score_synthetic(as_of)
        } else {
            match fetch_raw_records(&self.cfg, as_of).await {
                Ok((records, _stats)) => {
                    let started = Instant::now();
                    let report = self.pipeline.run_raw(&records, DataOrigin::Live);
                    (report, started.elapsed())
                }
                Err(AppError::FetchUnavailable(reason)) => {
                    self.health.inc_fetch_failures();
                    warn!(
                        reason = %reason,
                        "Live data unavailable, scoring randomly generated data instead"
                    );
                    self.score_synthetic(as_of)
                }
                Err(e) => return Err(e),
            }
        };

        let summary = report.summary();
        self.latency.record(elapsed);
        self.health.record_refresh(
            report.origin == DataOrigin::Simulated,
            u64::try_from(as_of.timestamp_millis()).unwrap_or(0),
        );

        info!(
            origin = %report.origin,
            scored = report.scored.len(),
            dropped = report.dropped,
            sectors = report.sectors.len(),
            incomplete = summary.incomplete_rows,
            elapsed_ms = elapsed.as_secs_f64() * 1_000.0,
            "Scoring run complete: {} protocols ({} dropped) from {} data",
            report.scored.len(),
            report.dropped,
            report.origin,
        );

        self.board.publish(Published {
            report,
            refreshed_at: as_of,
            run_duration_ms: elapsed.as_secs_f64() * 1_000.0,
        });

        Ok(summary)
    }

    fn score_synthetic(&self, as_of: chrono::DateTime<Utc>) -> (RunReport, Duration) {
        let started = Instant::now();
        let pairs = self
            .generator
            .generate(self.cfg.synthetic_count, self.cfg.synthetic_seed, as_of);
        let report = self.pipeline.run_synthetic(pairs);
        (report, started.elapsed())
    }
}
