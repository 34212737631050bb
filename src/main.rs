mod api;
mod config;
mod error;
mod fetcher;
mod metrics;
mod normalizer;
mod pipeline;
mod refresh;
mod scorer;
mod state;
mod synthetic;
mod types;
mod valuation;

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::api::routes::{router, ApiState};
use crate::config::Config;
use crate::error::Result;
use crate::pipeline::Pipeline;
use crate::refresh::Refresher;
use crate::state::ScoreBoard;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Scoring configuration: refuse to start on invalid weights/ranges ---
    let pipeline = Pipeline::new(cfg.scoring.clone())?;
    let scoring = pipeline.config();
    info!(
        window_days = scoring.window_days,
        w_valuation = scoring.weights.valuation,
        w_momentum = scoring.weights.momentum,
        w_efficiency = scoring.weights.efficiency,
        "Scoring pipeline ready"
    );
    if cfg.force_synthetic {
        warn!("FORCE_SYNTHETIC set: every run will score randomly generated data");
    }

    // --- Shared state ---
    let board = ScoreBoard::new();
    let health = Arc::new(HealthState::new());
    let latency = Arc::new(LatencyStats::new());

    let refresher = Arc::new(Refresher::new(
        cfg.clone(),
        pipeline,
        Arc::clone(&board),
        Arc::clone(&health),
        Arc::clone(&latency),
    ));

    // --- Bootstrap: first run before the API starts serving ---
    let summary = refresher.refresh().await?;
    info!(
        "Bootstrap complete: {} protocols scored, {} dropped, origin={}",
        summary.protocols_scanned, summary.dropped, summary.origin,
    );
    if let Some(pick) = &summary.top_pick {
        info!(
            "Top undervalued pick: {} (score {:.1}, gap {:+.1}%)",
            pick.name,
            pick.score,
            pick.valuation_gap * 100.0,
        );
    }

    // Periodic refresher (background)
    let bg = Arc::clone(&refresher);
    tokio::spawn(async move { bg.run().await });

    // HTTP API server
    let api_state = ApiState {
        board,
        health,
        latency,
        refresher,
    };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
