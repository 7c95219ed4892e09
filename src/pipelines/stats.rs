use std::time::{Duration, Instant};

/// Timing for one classification or explanation call.
#[derive(Debug, Clone)]
pub struct PipelineStats {
    /// Total execution time.
    pub total_time: Duration,
    /// Number of texts classified.
    pub items_processed: usize,
    /// Number of model forward rows evaluated (one per text, or one per coalition when
    /// explaining).
    pub model_evaluations: usize,
}

impl PipelineStats {
    /// Create a new stats tracker (call at start of operation).
    pub(crate) fn start() -> PipelineStatsBuilder {
        PipelineStatsBuilder {
            start_time: Instant::now(),
            model_evaluations: 0,
        }
    }
}

/// Tracks timing from creation to finish.
pub(crate) struct PipelineStatsBuilder {
    start_time: Instant,
    model_evaluations: usize,
}

impl PipelineStatsBuilder {
    pub fn record_evaluations(&mut self, rows: usize) {
        self.model_evaluations += rows;
    }

    /// Finalize stats with the number of items processed.
    pub fn finish(self, items_processed: usize) -> PipelineStats {
        PipelineStats {
            total_time: self.start_time.elapsed(),
            items_processed,
            model_evaluations: self.model_evaluations,
        }
    }
}
