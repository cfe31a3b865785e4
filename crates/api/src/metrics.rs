use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

pub struct Metrics {
    // Counters
    sessions: AtomicUsize,
    files_received: AtomicUsize,
    files_structured: AtomicUsize,
    files_failed: AtomicUsize,
    reports_extracted: AtomicUsize,
    documents_rendered: AtomicUsize,

    // Timing (in microseconds)
    total_text_time_us: AtomicU64,
    total_structuring_time_us: AtomicU64,
    total_render_time_us: AtomicU64,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sessions: AtomicUsize::new(0),
            files_received: AtomicUsize::new(0),
            files_structured: AtomicUsize::new(0),
            files_failed: AtomicUsize::new(0),
            reports_extracted: AtomicUsize::new(0),
            documents_rendered: AtomicUsize::new(0),
            total_text_time_us: AtomicU64::new(0),
            total_structuring_time_us: AtomicU64::new(0),
            total_render_time_us: AtomicU64::new(0),
        })
    }

    pub fn record_session(&self, files: usize) {
        self.sessions.fetch_add(1, Ordering::Relaxed);
        self.files_received.fetch_add(files, Ordering::Relaxed);
    }

    pub fn record_text_extraction(&self, duration: Duration) {
        self.total_text_time_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    /// `reports` is `None` when structuring the file failed.
    pub fn record_structuring(&self, duration: Duration, reports: Option<usize>) {
        self.total_structuring_time_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        match reports {
            Some(count) => {
                self.files_structured.fetch_add(1, Ordering::Relaxed);
                self.reports_extracted.fetch_add(count, Ordering::Relaxed);
            }
            None => {
                self.files_failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn record_render(&self, duration: Duration) {
        self.total_render_time_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.documents_rendered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let structured = self.files_structured.load(Ordering::Relaxed);
        let failed = self.files_failed.load(Ordering::Relaxed);

        MetricsSnapshot {
            sessions: self.sessions.load(Ordering::Relaxed),
            files_received: self.files_received.load(Ordering::Relaxed),
            files_structured: structured,
            files_failed: failed,
            reports_extracted: self.reports_extracted.load(Ordering::Relaxed),
            documents_rendered: self.documents_rendered.load(Ordering::Relaxed),
            avg_text_extraction_ms: avg_time_ms(
                &self.total_text_time_us,
                self.files_received.load(Ordering::Relaxed),
            ),
            avg_structuring_ms: avg_time_ms(&self.total_structuring_time_us, structured + failed),
            avg_render_ms: avg_time_ms(
                &self.total_render_time_us,
                self.documents_rendered.load(Ordering::Relaxed),
            ),
        }
    }
}

fn avg_time_ms(total_us: &AtomicU64, count: usize) -> f64 {
    let total = total_us.load(Ordering::Relaxed) as f64;
    if count > 0 {
        total / count as f64 / 1000.0 // Convert to ms
    } else {
        0.0
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub sessions: usize,
    pub files_received: usize,
    pub files_structured: usize,
    pub files_failed: usize,
    pub reports_extracted: usize,
    pub documents_rendered: usize,
    pub avg_text_extraction_ms: f64,
    pub avg_structuring_ms: f64,
    pub avg_render_ms: f64,
}

pub struct TimedOperation {
    start: Instant,
}

impl TimedOperation {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_are_per_file() {
        let metrics = Metrics::new();
        metrics.record_session(2);
        metrics.record_structuring(Duration::from_millis(30), Some(2));
        metrics.record_structuring(Duration::from_millis(10), None);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.files_received, 2);
        assert_eq!(snapshot.files_structured, 1);
        assert_eq!(snapshot.files_failed, 1);
        assert_eq!(snapshot.reports_extracted, 2);
        assert!((snapshot.avg_structuring_ms - 20.0).abs() < 1e-9);
    }

    #[test]
    fn empty_metrics_average_zero() {
        let snapshot = Metrics::new().snapshot();
        assert_eq!(snapshot.avg_render_ms, 0.0);
        assert_eq!(snapshot.sessions, 0);
    }
}
