//! Output formatting for the CLI.

use std::fmt;

use console::style;
use tc_jobs::request::ResolvedJob;

/// Output handler for CLI messages.
#[derive(Clone)]
pub struct Output {
    verbose: bool,
    json: bool,
}

impl Output {
    /// Create a new output handler.
    pub fn new(verbose: bool, json: bool) -> Self {
        Self { verbose, json }
    }

    /// Print a success message.
    pub fn success(&self, msg: &str) {
        if self.json {
            return;
        }
        println!("{} {}", style("✓").green(), msg);
    }

    /// Print an error message.
    pub fn error(&self, msg: &str) {
        if self.json {
            eprintln!("{}", serde_json::json!({ "error": msg }));
            return;
        }
        eprintln!("{} {}", style("✗").red(), style(msg).red());
    }

    /// Print a debug message (only in verbose mode).
    pub fn debug(&self, msg: &str) {
        if !self.verbose || self.json {
            return;
        }
        eprintln!("{} {}", style("→").dim(), style(msg).dim());
    }

    /// Print JSON output.
    pub fn json<T: serde::Serialize>(&self, value: &T) {
        if let Ok(json) = serde_json::to_string_pretty(value) {
            println!("{}", json);
        }
    }

    /// Print a key-value pair.
    pub fn kv(&self, key: &str, value: &str) {
        if self.json {
            return;
        }
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a list item.
    pub fn list_item(&self, item: &str) {
        if self.json {
            return;
        }
        println!("  {} {}", style("•").dim(), item);
    }

    /// Print the fields of a validated job.
    pub fn job(&self, job: &ResolvedJob) {
        if self.json {
            return;
        }
        self.kv("Delivery Service", &job.delivery_service_id.to_string());
        self.kv("Regex", &job.regex);
        self.kv("Start", &job.start_time.to_rfc3339());
        self.kv("TTL", &job.ttl_hours.to_string());
    }

    /// Print overlapping jobs, or a success line when there are none.
    pub fn conflicts<T: fmt::Display>(&self, conflicts: &[T]) {
        if self.json {
            return;
        }
        if conflicts.is_empty() {
            self.success("No overlapping jobs");
            return;
        }
        eprintln!("{} {}", style("⚠").yellow(), conflict_summary(conflicts.len()));
        for conflict in conflicts {
            self.list_item(&conflict.to_string());
        }
    }

    /// Check if JSON mode is enabled.
    pub fn is_json(&self) -> bool {
        self.json
    }
}

fn conflict_summary(count: usize) -> String {
    match count {
        1 => "1 overlapping job".to_string(),
        n => format!("{} overlapping jobs", n),
    }
}
