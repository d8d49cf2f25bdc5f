use crate::monitor::{BatchTotals, MonitorReport, MonitorSet};
use chrono::{Local, SecondsFormat};
use colored::Colorize;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table};
use serde::Serialize;
use serde_json::json;
use std::fmt::Write;

/// Result of running a set of monitors over one or more event sources
#[derive(Debug, Clone, Serialize)]
pub struct CountReport {
    pub generated_at: String,
    pub sources: usize,
    pub skipped: usize,
    pub batches: BatchTotals,
    pub monitors: Vec<MonitorReport>,
}

impl CountReport {
    pub fn new(set: &MonitorSet, sources: usize, skipped: usize, batches: BatchTotals) -> Self {
        Self {
            generated_at: Local::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            sources,
            skipped,
            batches,
            monitors: set.snapshot(),
        }
    }
}

/// Outcome of compiling one configured monitor
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub title: String,
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compiled: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

fn new_table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.iter().map(|h| Cell::new(h)).collect::<Vec<_>>());
    table
}

pub fn format_count_text(report: &CountReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", "MONITOR COUNTS".bold());

    if report.monitors.is_empty() {
        let _ = writeln!(out, "No monitors configured.");
    } else {
        let mut table = new_table(&["Monitor", "Query", "Count", "Threshold"]);
        for monitor in &report.monitors {
            let count = if monitor.count > 0 {
                monitor.count.to_string().yellow().bold().to_string()
            } else {
                monitor.count.to_string()
            };
            table.add_row(vec![
                Cell::new(&monitor.title),
                Cell::new(&monitor.query),
                Cell::new(count).set_alignment(CellAlignment::Right),
                Cell::new(&monitor.threshold),
            ]);
        }
        let _ = writeln!(out, "{table}");
    }

    let events = format!("{} event(s)", report.batches.events);
    let _ = writeln!(
        out,
        "{} from {} source(s) in {} batch(es), {} acked, {} dropped, {} line(s) skipped",
        events.cyan(),
        report.sources,
        report.batches.batches,
        report.batches.acked,
        report.batches.dropped,
        report.skipped
    );
    let matched = report.monitors.iter().filter(|m| m.count > 0).count();
    if matched > 0 {
        let _ = writeln!(
            out,
            "{}",
            format!("{matched} monitor(s) matched at least one event").green()
        );
    }
    out
}

pub fn format_count_json(report: &CountReport) -> String {
    serde_json::to_string_pretty(&json!({ "counts": report }))
        .unwrap_or_else(|_| "{\"counts\":{\"error\":\"failed to serialize report\"}}".into())
}

pub fn format_check_text(results: &[CheckResult]) -> String {
    let mut out = String::new();
    let mut table = new_table(&["Monitor", "Status", "Detail"]);
    for result in results {
        let (status, detail) = match (&result.compiled, &result.error) {
            (_, Some(error)) => ("invalid", error.as_str()),
            (Some(compiled), None) => ("ok", compiled.as_str()),
            (None, None) => ("ok", ""),
        };
        table.add_row(vec![
            Cell::new(&result.title),
            Cell::new(status),
            Cell::new(detail),
        ]);
    }
    let _ = writeln!(out, "{table}");

    let failed = results.iter().filter(|r| !r.is_ok()).count();
    if failed == 0 {
        let _ = writeln!(out, "{}", format!("All {} monitor(s) compiled.", results.len()).green());
    } else {
        let _ = writeln!(
            out,
            "{}",
            format!("{failed} of {} monitor(s) failed to compile.", results.len()).red()
        );
    }
    out
}

pub fn format_check_json(results: &[CheckResult]) -> String {
    serde_json::to_string_pretty(&json!({ "check": results }))
        .unwrap_or_else(|_| "{\"check\":{\"error\":\"failed to serialize report\"}}".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, MonitorConfig};
    use crate::event::LogEntry;

    fn sample_set() -> MonitorSet {
        let mut errors = MonitorConfig::new("errors", "level:error");
        errors.threshold = "> 0".to_string();
        let set = MonitorSet::from_config(&Config {
            monitors: vec![errors, MonitorConfig::new("slow", "latency:>1")],
            ..Config::default()
        })
        .unwrap();
        set.update(&LogEntry::new().with("level", "error"));
        set
    }

    #[test]
    fn test_count_text_lists_monitors() {
        colored::control::set_override(false);
        let report = CountReport::new(&sample_set(), 1, 0, BatchTotals::default());
        let text = format_count_text(&report);
        assert!(text.contains("errors"));
        assert!(text.contains("latency:>1"));
        assert!(text.contains("1 monitor(s) matched"));
    }

    #[test]
    fn test_count_json_shape() {
        let report = CountReport::new(&sample_set(), 2, 3, BatchTotals::default());
        let value: serde_json::Value = serde_json::from_str(&format_count_json(&report)).unwrap();
        let counts = &value["counts"];
        assert_eq!(counts["sources"], 2);
        assert_eq!(counts["skipped"], 3);
        assert_eq!(counts["monitors"][0]["count"], 1);
        assert_eq!(counts["monitors"][0]["threshold"], "> 0");
        assert!(counts["monitors"][1].get("threshold").is_none());
    }

    #[test]
    fn test_check_text_reports_failures() {
        colored::control::set_override(false);
        let results = vec![
            CheckResult {
                title: "good".to_string(),
                query: "a:b".to_string(),
                compiled: Some("a:b".to_string()),
                error: None,
            },
            CheckResult {
                title: "bad".to_string(),
                query: "a:(".to_string(),
                compiled: None,
                error: Some("Unexpected end of query".to_string()),
            },
        ];
        let text = format_check_text(&results);
        assert!(text.contains("invalid"));
        assert!(text.contains("1 of 2 monitor(s) failed"));
    }
}
