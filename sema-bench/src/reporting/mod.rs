//! Results reporting

use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::path::Path;

use crate::analysis::{RunMetrics, RunReport};

const MAX_LISTED_FAILURES: usize = 20;

/// Compact JSON summary of a run, without per-sample results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonSummary {
    pub benchmark: String,
    pub partition: String,
    pub model: Option<String>,
    pub timestamp: String,
    pub duration_secs: f64,
    pub metrics: RunMetrics,
    pub num_errors: usize,
    pub detailed_results_file: Option<String>,
}

impl JsonSummary {
    pub fn from_report(report: &RunReport, detailed_file: Option<String>) -> Self {
        Self {
            benchmark: report.benchmark.clone(),
            partition: report.partition.clone(),
            model: report.model.clone(),
            timestamp: report.finished_at.to_rfc3339(),
            duration_secs: report.duration_secs(),
            metrics: report.metrics.clone(),
            num_errors: report.errors().count(),
            detailed_results_file: detailed_file,
        }
    }

    /// Write to JSON file
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }
}

/// Render the console report
pub fn format_console_report(report: &RunReport) -> String {
    let mut out = String::new();
    let metrics = &report.metrics;

    let _ = writeln!(out, "\n=== {} Benchmark Results ===\n", report.benchmark);
    if let Some(model) = &report.model {
        let _ = writeln!(out, "Model:       {}", model);
    }
    let _ = writeln!(out, "Partition:   {}", report.partition);
    let _ = writeln!(out, "Duration:    {:.1}s\n", report.duration_secs());

    let _ = writeln!(out, "{:-<50}", "");
    let _ = writeln!(out, "  Exact Match: {:.3}", metrics.exact_match);
    let _ = writeln!(out, "  F1:          {:.3}", metrics.f1);
    let _ = writeln!(out, "  Passed:      {}/{}", metrics.num_passed, metrics.num_samples);
    let _ = writeln!(out, "{:-<50}", "");

    let errors: Vec<_> = report.errors().collect();
    if !errors.is_empty() {
        let _ = writeln!(out, "\nErrors ({}):", errors.len());
        for result in errors.iter().take(MAX_LISTED_FAILURES) {
            let _ = writeln!(
                out,
                "  [{}] {}",
                id_label(&result.id),
                result.error.as_deref().unwrap_or_default()
            );
        }
        if errors.len() > MAX_LISTED_FAILURES {
            let _ = writeln!(out, "  ... and {} more", errors.len() - MAX_LISTED_FAILURES);
        }
    }

    let _ = writeln!(out, "\n{:=<50}", "");
    out
}

/// Print the console report to stdout
pub fn print_console_report(report: &RunReport) {
    print!("{}", format_console_report(report));
}

fn id_label(id: &serde_json::Value) -> String {
    match id {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
