// src/metrics.rs
//! Shared pipeline counters.
//!
//! Relaxed atomics: totals only, nothing transactional. The producer thread
//! counts lines and parse drops, the consumer counts events; the ring's own
//! overflow counter is folded in when the summary renders.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct PipelineMetrics {
    pub lines_total: AtomicU64,
    pub lines_dropped: AtomicU64,
    pub events_consumed: AtomicU64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn inc_lines(&self) {
        self.lines_total.fetch_add(1, Ordering::Relaxed);
    }
    #[inline]
    pub fn inc_line_dropped(&self) {
        self.lines_dropped.fetch_add(1, Ordering::Relaxed);
    }
    #[inline]
    pub fn inc_consumed(&self) {
        self.events_consumed.fetch_add(1, Ordering::Relaxed);
    }

    /// One-line shutdown report. `ring_dropped` comes from the ring handle.
    pub fn summary(&self, ring_dropped: u64) -> String {
        format!(
            "lines={} parse_dropped={} ring_dropped={} consumed={}",
            self.lines_total.load(Ordering::Relaxed),
            self.lines_dropped.load(Ordering::Relaxed),
            ring_dropped,
            self.events_consumed.load(Ordering::Relaxed),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_reflects_counts() {
        let m = PipelineMetrics::new();
        m.inc_lines();
        m.inc_lines();
        m.inc_line_dropped();
        m.inc_consumed();
        assert_eq!(m.summary(3), "lines=2 parse_dropped=1 ring_dropped=3 consumed=1");
    }
}
