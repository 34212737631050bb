use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use crate::types::RunReport;

/// A finished run as served by the API.
#[derive(Debug)]
pub struct Published {
    pub report: RunReport,
    pub refreshed_at: DateTime<Utc>,
    pub run_duration_ms: f64,
}

/// Holds the most recent run. A refresh swaps in a whole new report; rows
/// already handed out are never mutated.
#[derive(Default)]
pub struct ScoreBoard {
    current: RwLock<Option<Arc<Published>>>,
}

impl ScoreBoard {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn publish(&self, published: Published) {
        let mut slot = self.current.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(Arc::new(published));
    }

    /// Latest run, or `None` before the first refresh completes.
    pub fn current(&self) -> Option<Arc<Published>> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataOrigin;

    fn published(dropped: usize) -> Published {
        Published {
            report: RunReport {
                origin: DataOrigin::Simulated,
                scored: Vec::new(),
                sectors: Vec::new(),
                dropped,
                drop_reasons: Vec::new(),
            },
            refreshed_at: Utc::now(),
            run_duration_ms: 1.0,
        }
    }

    #[test]
    fn publish_replaces_without_touching_old_readers() {
        let board = ScoreBoard::new();
        assert!(board.current().is_none());

        board.publish(published(1));
        let first = board.current().unwrap();
        board.publish(published(2));

        assert_eq!(first.report.dropped, 1);
        assert_eq!(board.current().unwrap().report.dropped, 2);
    }
}
