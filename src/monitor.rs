use crate::config::{Config, MonitorConfig};
use crate::event::LogEntry;
use crate::query::{self, Filter, QueryError};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Query compilation failed for monitor '{title}': {source}")]
    Compile {
        title: String,
        #[source]
        source: QueryError,
    },
}

/// A compiled query paired with a running match counter
#[derive(Debug)]
pub struct Monitor {
    config: MonitorConfig,
    filter: Filter,
    counter: AtomicU64,
}

impl Monitor {
    pub fn new(config: &MonitorConfig) -> Result<Self, MonitorError> {
        let filter = query::compile(&config.query).map_err(|source| MonitorError::Compile {
            title: config.title.clone(),
            source,
        })?;
        log::debug!("monitor '{}' ready: {}", config.title, filter.source());
        Ok(Self {
            config: config.clone(),
            filter,
            counter: AtomicU64::new(0),
        })
    }

    /// Apply the query to one entry and count it on a match
    pub fn update(&self, entry: &LogEntry) -> bool {
        let matched = self.filter.matches(entry);
        if matched {
            self.counter.fetch_add(1, Ordering::Relaxed);
        }
        matched
    }

    pub fn count(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }

    pub fn title(&self) -> &str {
        &self.config.title
    }

    pub fn query(&self) -> &str {
        &self.config.query
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }
}

/// Receives acknowledgement bookkeeping for published batches
pub trait Observer: Sync {
    fn new_batch(&self, _len: usize) {}
    fn acked(&self, _len: usize) {}
    fn dropped(&self, _len: usize) {}
}

/// Observer that ignores everything
pub struct NilObserver;

impl Observer for NilObserver {}

/// Observer that keeps running totals
#[derive(Debug, Default)]
pub struct BatchStats {
    batches: AtomicU64,
    events: AtomicU64,
    acked: AtomicU64,
    dropped: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchTotals {
    pub batches: u64,
    pub events: u64,
    pub acked: u64,
    pub dropped: u64,
}

impl BatchStats {
    pub fn totals(&self) -> BatchTotals {
        BatchTotals {
            batches: self.batches.load(Ordering::Relaxed),
            events: self.events.load(Ordering::Relaxed),
            acked: self.acked.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

impl Observer for BatchStats {
    fn new_batch(&self, len: usize) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.events.fetch_add(len as u64, Ordering::Relaxed);
    }

    fn acked(&self, len: usize) {
        self.acked.fetch_add(len as u64, Ordering::Relaxed);
    }

    fn dropped(&self, len: usize) {
        self.dropped.fetch_add(len as u64, Ordering::Relaxed);
    }
}

/// Snapshot of one monitor for reporting
#[derive(Debug, Clone, Serialize)]
pub struct MonitorReport {
    pub title: String,
    pub query: String,
    pub count: u64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub agg_func: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub agg_window: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub threshold: String,
}

/// The full, read-only set of monitors every event is offered to
#[derive(Debug, Default)]
pub struct MonitorSet {
    monitors: Vec<Monitor>,
}

impl MonitorSet {
    pub fn new(monitors: Vec<Monitor>) -> Self {
        Self { monitors }
    }

    /// Build every configured monitor, failing on the first malformed query
    pub fn from_config(config: &Config) -> Result<Self, MonitorError> {
        let monitors = config
            .monitors
            .iter()
            .map(Monitor::new)
            .collect::<Result<Vec<_>, _>>()?;
        log::debug!("initialized {} monitor(s)", monitors.len());
        Ok(Self { monitors })
    }

    pub fn monitors(&self) -> &[Monitor] {
        &self.monitors
    }

    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }

    /// Offer one entry to every monitor
    pub fn update(&self, entry: &LogEntry) {
        for monitor in &self.monitors {
            monitor.update(entry);
        }
    }

    /// Offer a whole batch to every monitor, then acknowledge it.
    /// Nothing is ever dropped once an entry made it into a batch.
    pub fn publish(&self, batch: &[LogEntry], observer: &dyn Observer) {
        observer.new_batch(batch.len());
        for entry in batch {
            self.update(entry);
        }
        observer.dropped(0);
        observer.acked(batch.len());
        log::trace!("published batch of {} event(s)", batch.len());
    }

    pub fn snapshot(&self) -> Vec<MonitorReport> {
        self.monitors
            .iter()
            .map(|m| MonitorReport {
                title: m.config.title.clone(),
                query: m.config.query.clone(),
                count: m.count(),
                agg_func: m.config.agg_func.clone(),
                agg_window: m.config.agg_window.clone(),
                threshold: m.config.threshold.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(value: serde_json::Value) -> LogEntry {
        LogEntry::from_json(value).unwrap()
    }

    #[test]
    fn test_update_counts_only_matches() {
        let monitor = Monitor::new(&MonitorConfig::new("errors", "level:error")).unwrap();
        assert!(monitor.update(&entry(json!({"level": "error"}))));
        assert!(!monitor.update(&entry(json!({"level": "info"}))));
        assert!(monitor.update(&entry(json!({"level": "error"}))));
        assert_eq!(monitor.count(), 2);
    }

    #[test]
    fn test_malformed_query_fails_construction() {
        let err = Monitor::new(&MonitorConfig::new("broken", "message:'unterminated")).unwrap_err();
        let MonitorError::Compile { title, source } = err;
        assert_eq!(title, "broken");
        assert!(matches!(source, QueryError::UnterminatedString { .. }));
    }

    #[test]
    fn test_from_config_stops_at_first_bad_monitor() {
        let config = Config {
            monitors: vec![
                MonitorConfig::new("ok", "env:prod"),
                MonitorConfig::new("bad", ":prod"),
            ],
            ..Config::default()
        };
        let err = MonitorSet::from_config(&config).unwrap_err();
        assert!(err.to_string().contains("'bad'"));
    }

    #[test]
    fn test_publish_reports_acks() {
        let set = MonitorSet::from_config(&Config {
            monitors: vec![MonitorConfig::new("prod", "env:prod")],
            ..Config::default()
        })
        .unwrap();
        let stats = BatchStats::default();
        let batch = vec![entry(json!({"env": "prod"})), entry(json!({"env": "dev"}))];

        set.publish(&batch, &stats);
        set.publish(&batch[..1], &stats);

        assert_eq!(
            stats.totals(),
            BatchTotals {
                batches: 2,
                events: 3,
                acked: 3,
                dropped: 0
            }
        );
        assert_eq!(set.snapshot()[0].count, 2);
    }

    #[test]
    fn test_concurrent_updates_lose_nothing() {
        let monitor = Monitor::new(&MonitorConfig::new("all", "-absent:x")).unwrap();
        let event = entry(json!({"message": "hi"}));
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..1000 {
                        monitor.update(&event);
                    }
                });
            }
        });
        assert_eq!(monitor.count(), 8000);
    }
}
