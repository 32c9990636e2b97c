//! Run output: progress milestones and the final report, as text or JSON lines.

use std::io::{self, Write};
use std::time::Duration;

use fanout_core::GroupSummary;
use fanout_runner::memory::{self, MemoryUsage};
use fanout_runner::threads::ThreadReport;
use serde::Serialize;

/// JSON event types that can be emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JsonEventType {
    Milestone,
    Report,
}

/// A JSON event to be output to stdout.
#[derive(Debug, Clone, Serialize)]
pub struct JsonEvent {
    pub event: JsonEventType,
    pub timestamp: String,
    pub data: serde_json::Value,
}

impl JsonEvent {
    /// Create a new JSON event with the current timestamp.
    pub fn new(event: JsonEventType, data: serde_json::Value) -> Self {
        Self {
            event,
            timestamp: chrono::Utc::now().to_rfc3339(),
            data,
        }
    }
}

/// Which benchmark produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Executor,
    Tasks,
    OsThreads,
    Sum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemoryStat {
    pub rss_bytes: u64,
    pub virtual_bytes: u64,
}

impl From<MemoryUsage> for MemoryStat {
    fn from(usage: MemoryUsage) -> Self {
        Self {
            rss_bytes: usage.rss_bytes,
            virtual_bytes: usage.virtual_bytes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ThreadStat {
    pub spawned: usize,
    pub joined: usize,
    pub interrupted: usize,
    pub panicked: usize,
}

impl From<&ThreadReport> for ThreadStat {
    fn from(report: &ThreadReport) -> Self {
        Self {
            spawned: report.spawned,
            joined: report.joined,
            interrupted: report.interrupted,
            panicked: report.panicked,
        }
    }
}

/// Final result of one benchmark run.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub mode: Mode,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<GroupSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sum: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threads: Option<ThreadStat>,
    pub memory: Option<MemoryStat>,
}

impl Report {
    pub fn new(mode: Mode, elapsed: Duration) -> Self {
        Self {
            mode,
            elapsed_ms: elapsed.as_millis() as u64,
            summary: None,
            sum: None,
            threads: None,
            memory: memory::current().map(MemoryStat::from),
        }
    }

    pub fn with_summary(mut self, summary: &GroupSummary) -> Self {
        self.summary = Some(summary.clone());
        self
    }

    pub fn with_sum(mut self, sum: u64) -> Self {
        self.sum = Some(sum);
        self
    }

    pub fn with_threads(mut self, report: &ThreadReport) -> Self {
        self.threads = Some(ThreadStat::from(report));
        self
    }

    /// Plain-text lines, one fact per line.
    pub fn render_text(&self) -> Vec<String> {
        let mut lines = Vec::new();

        if let Some(summary) = &self.summary {
            lines.push(format!(
                "Group {}: {} completed, {} failed, {} cancelled of {} submitted",
                summary.group_id,
                summary.completed,
                summary.failed,
                summary.cancelled,
                summary.submitted
            ));
        }
        if let Some(threads) = &self.threads {
            lines.push(format!(
                "Threads: {} joined, {} interrupted, {} panicked of {} spawned",
                threads.joined, threads.interrupted, threads.panicked, threads.spawned
            ));
        }
        if let Some(sum) = self.sum {
            lines.push(format!("Sum: {sum}"));
        }
        lines.push(format!(
            "Elapsed: {:.2}s",
            self.elapsed_ms as f64 / 1000.0
        ));
        match &self.memory {
            Some(stat) => lines.push(format!(
                "Total memory: {} (virtual {})",
                memory::format_bytes(stat.rss_bytes),
                memory::format_bytes(stat.virtual_bytes)
            )),
            None => lines.push("Total memory: unavailable".to_string()),
        }

        lines
    }
}

/// Writes milestones and reports to stdout in the selected format.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    json: bool,
}

impl Output {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    /// Print a progress milestone such as "Waiting for tasks...".
    pub fn milestone(&self, message: &str) {
        if self.json {
            self.emit_json(JsonEvent::new(
                JsonEventType::Milestone,
                serde_json::json!({ "message": message }),
            ));
        } else {
            self.emit_lines(&[message.to_string()]);
        }
    }

    pub fn report(&self, report: &Report) {
        if self.json {
            match serde_json::to_value(report) {
                Ok(data) => self.emit_json(JsonEvent::new(JsonEventType::Report, data)),
                Err(err) => tracing::warn!(error = %err, "Failed to serialize report"),
            }
        } else {
            self.emit_lines(&report.render_text());
        }
    }

    fn emit_json(&self, event: JsonEvent) {
        if let Ok(json) = serde_json::to_string(&event) {
            self.emit_lines(&[json]);
        }
    }

    fn emit_lines(&self, lines: &[String]) {
        let mut stdout = io::stdout().lock();
        for line in lines {
            let _ = writeln!(stdout, "{}", line);
        }
        let _ = stdout.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fanout_core::{FailurePolicy, GroupId, TaskStatus};

    fn summary() -> GroupSummary {
        let mut summary = GroupSummary::new(GroupId::new("g-1"), FailurePolicy::Strict);
        summary.submitted = 3;
        summary.record(TaskStatus::Completed);
        summary.record(TaskStatus::Completed);
        summary.record(TaskStatus::Cancelled);
        summary.finish();
        summary
    }

    #[test]
    fn test_render_text_sum_report() {
        let mut report = Report::new(Mode::Sum, Duration::from_millis(1234)).with_sum(1_000_000);
        report.memory = Some(MemoryStat {
            rss_bytes: 2 * 1024 * 1024,
            virtual_bytes: 64 * 1024 * 1024,
        });

        let lines = report.render_text();
        assert_eq!(
            lines,
            vec![
                "Sum: 1000000".to_string(),
                "Elapsed: 1.23s".to_string(),
                "Total memory: 2.0 MiB (virtual 64.0 MiB)".to_string(),
            ]
        );
    }

    #[test]
    fn test_render_text_group_summary() {
        let report = Report::new(Mode::Executor, Duration::from_secs(10)).with_summary(&summary());
        let lines = report.render_text();
        assert_eq!(
            lines[0],
            "Group g-1: 2 completed, 0 failed, 1 cancelled of 3 submitted"
        );
    }

    #[test]
    fn test_render_text_threads() {
        let threads = ThreadReport {
            spawned: 4,
            joined: 4,
            interrupted: 1,
            panicked: 0,
            elapsed: Duration::from_millis(100),
        };
        let report = Report::new(Mode::OsThreads, threads.elapsed).with_threads(&threads);
        assert_eq!(
            report.render_text()[0],
            "Threads: 4 joined, 1 interrupted, 0 panicked of 4 spawned"
        );
    }

    #[test]
    fn test_report_json_shape() {
        let report = Report::new(Mode::OsThreads, Duration::from_millis(5)).with_sum(3);
        let value = serde_json::to_value(&report).unwrap();

        assert_eq!(value["mode"], "os_threads");
        assert_eq!(value["sum"], 3);
        assert_eq!(value["elapsed_ms"], 5);
        assert!(value.get("summary").is_none());
    }

    #[test]
    fn test_json_event_has_timestamp() {
        let event = JsonEvent::new(JsonEventType::Milestone, serde_json::json!({"message": "hi"}));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "milestone");
        assert!(json["timestamp"].as_str().unwrap().contains('T'));
    }
}
