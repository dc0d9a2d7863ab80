//! Answer scoring and run aggregation

pub mod metrics;
pub mod scoring;

pub use metrics::{EvaluationResult, EvaluationScores, RunMetrics, RunReport, Verdict};
pub use scoring::{coerce_text, evaluate, exact_match, f1, normalize};
