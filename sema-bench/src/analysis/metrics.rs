//! Per-sample results and run-level aggregates

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// PASS/FAIL classification of one sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pass => "PASS",
            Verdict::Fail => "FAIL",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scores for one prediction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationScores {
    pub em: f64,
    pub f1: f64,
    #[serde(rename = "result")]
    pub verdict: Verdict,
}

/// Outcome of one benchmark sample
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Record `_id`, or the sample index when the record has none
    pub id: Value,
    pub question: String,
    pub prediction: String,
    pub ground_truth: Value,
    pub em: f64,
    pub f1: f64,
    pub result: Verdict,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub evaluated_at: DateTime<Utc>,
}

impl EvaluationResult {
    pub fn scored(
        id: Value,
        question: String,
        prediction: String,
        ground_truth: Value,
        scores: EvaluationScores,
    ) -> Self {
        Self {
            id,
            question,
            prediction,
            ground_truth,
            em: scores.em,
            f1: scores.f1,
            result: scores.verdict,
            error: None,
            evaluated_at: Utc::now(),
        }
    }

    /// A FAIL with zero scores carrying the error message
    pub fn failed(id: Value, question: String, ground_truth: Value, error: String) -> Self {
        Self {
            id,
            question,
            prediction: String::new(),
            ground_truth,
            em: 0.0,
            f1: 0.0,
            result: Verdict::Fail,
            error: Some(error),
            evaluated_at: Utc::now(),
        }
    }

    pub fn passed(&self) -> bool {
        self.result == Verdict::Pass
    }
}

/// Aggregate metrics over a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub exact_match: f64,
    pub f1: f64,
    pub num_samples: usize,
    pub num_passed: usize,
}

impl RunMetrics {
    /// Means of per-sample EM and F1; zero for an empty run
    pub fn from_results(results: &[EvaluationResult]) -> Self {
        let n = results.len();
        if n == 0 {
            return Self::default();
        }
        let total_em: f64 = results.iter().map(|r| r.em).sum();
        let total_f1: f64 = results.iter().map(|r| r.f1).sum();
        Self {
            exact_match: total_em / n as f64,
            f1: total_f1 / n as f64,
            num_samples: n,
            num_passed: results.iter().filter(|r| r.passed()).count(),
        }
    }

    pub fn num_failed(&self) -> usize {
        self.num_samples - self.num_passed
    }
}

/// Everything produced by one benchmark run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub benchmark: String,
    pub partition: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub metrics: RunMetrics,
    pub results: Vec<EvaluationResult>,
}

impl RunReport {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn errors(&self) -> impl Iterator<Item = &EvaluationResult> {
        self.results.iter().filter(|r| r.error.is_some())
    }

    pub fn duration_secs(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }

    /// Write the report as pretty-printed JSON
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }
}
