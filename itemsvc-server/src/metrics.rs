//! Per-route request counters in Prometheus text exposition format
//!
//! Each [`RequestCounter`] owns its own registry, so tests and multiple
//! servers in one process never share counts.

use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

/// Metric name for the request counter.
pub const REQUEST_COUNT: &str = "api_request_count";

/// Content type of [`RequestCounter::render`] output.
pub const CONTENT_TYPE: &str = prometheus::TEXT_FORMAT;

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("exposition is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Monotonic request counts keyed by route path.
#[derive(Clone)]
pub struct RequestCounter {
    registry: Registry,
    requests: IntCounterVec,
}

impl RequestCounter {
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();
        let requests = IntCounterVec::new(
            Opts::new(REQUEST_COUNT, "Total HTTP requests"),
            &["path"],
        )?;
        registry.register(Box::new(requests.clone()))?;

        Ok(Self { registry, requests })
    }

    /// Bump the counter for `path`, creating it at zero on first use.
    pub fn increment(&self, path: &str) {
        self.requests.with_label_values(&[path]).inc();
    }

    /// Render every known path and its count, one sample line per path,
    /// sorted by path.
    pub fn render(&self) -> Result<String, MetricsError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

impl std::fmt::Debug for RequestCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestCounter").finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::BTreeMap;

    use super::*;

    /// Parse `api_request_count{path="..."} N` sample lines.
    pub(crate) fn parse_counts(text: &str) -> BTreeMap<String, u64> {
        text.lines()
            .filter(|line| !line.starts_with('#'))
            .filter_map(|line| {
                let rest = line.strip_prefix("api_request_count{path=\"")?;
                let (path, value) = rest.split_once("\"} ")?;
                Some((path.to_string(), value.trim().parse().ok()?))
            })
            .collect()
    }

    #[test]
    fn empty_counter_renders_nothing() {
        let counter = RequestCounter::new().unwrap();
        assert_eq!(counter.render().unwrap(), "");
    }

    #[test]
    fn render_reports_counts_per_path() {
        let counter = RequestCounter::new().unwrap();
        counter.increment("/status");
        counter.increment("/items");
        counter.increment("/status");

        let text = counter.render().unwrap();
        assert!(text.contains("# HELP api_request_count Total HTTP requests"));
        assert!(text.contains("# TYPE api_request_count counter"));

        let counts = parse_counts(&text);
        assert_eq!(counts.len(), 2);
        assert_eq!(counts["/status"], 2);
        assert_eq!(counts["/items"], 1);
    }

    #[test]
    fn render_is_sorted_and_stable() {
        let counter = RequestCounter::new().unwrap();
        for path in ["/status", "/items", "/metrics"] {
            counter.increment(path);
        }

        let first = counter.render().unwrap();
        assert_eq!(first, counter.render().unwrap());

        let samples: Vec<&str> = first.lines().filter(|l| !l.starts_with('#')).collect();
        assert_eq!(
            samples,
            vec![
                r#"api_request_count{path="/items"} 1"#,
                r#"api_request_count{path="/metrics"} 1"#,
                r#"api_request_count{path="/status"} 1"#,
            ]
        );
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 1_000;

        let counter = RequestCounter::new().unwrap();
        std::thread::scope(|scope| {
            for _ in 0..THREADS {
                scope.spawn(|| {
                    for _ in 0..PER_THREAD {
                        counter.increment("/items");
                    }
                });
            }
        });

        let counts = parse_counts(&counter.render().unwrap());
        assert_eq!(counts["/items"], (THREADS * PER_THREAD) as u64);
    }

    #[test]
    fn separate_counters_do_not_share_state() {
        let a = RequestCounter::new().unwrap();
        let b = RequestCounter::new().unwrap();
        a.increment("/status");

        assert!(parse_counts(&b.render().unwrap()).is_empty());
    }
}
