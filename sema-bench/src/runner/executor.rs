//! Sequential per-sample run loop

use serde_json::{json, Value};
use std::fmt::Display;
use std::future::Future;

use crate::analysis::{EvaluationResult, EvaluationScores};
use crate::benchmarks::QaRecord;

const PREVIEW_CHARS: usize = 50;

/// Feed each record to `callback` in order and score the answers.
///
/// A failing callback becomes a FAIL result carrying the error message;
/// the loop always processes every record.
pub async fn run_samples<F, Fut, E, V>(
    records: &[QaRecord],
    mut callback: F,
    evaluate: V,
    verbose: bool,
) -> Vec<EvaluationResult>
where
    F: FnMut(String, Value) -> Fut,
    Fut: Future<Output = Result<String, E>>,
    E: Display,
    V: Fn(&Value, &Value) -> EvaluationScores,
{
    let total = records.len();
    let mut results = Vec::with_capacity(total);

    for (index, record) in records.iter().enumerate() {
        let id = record.id.clone().unwrap_or_else(|| json!(index));

        if verbose {
            tracing::info!("Processing {}/{}: {}...", index + 1, total, preview(&record.question));
        }

        let result = match callback(record.question.clone(), record.context.clone()).await {
            Ok(prediction) => {
                let scores = evaluate(&Value::String(prediction.clone()), &record.answer);
                EvaluationResult::scored(
                    id,
                    record.question.clone(),
                    prediction,
                    record.answer.clone(),
                    scores,
                )
            }
            Err(e) => {
                tracing::error!("Error processing question {}: {}", index, e);
                let message = e.to_string();
                let message = if message.is_empty() {
                    "callback failed".to_string()
                } else {
                    message
                };
                EvaluationResult::failed(
                    id,
                    record.question.clone(),
                    record.answer.clone(),
                    message,
                )
            }
        };

        if verbose {
            tracing::info!("  EM: {:.2}, F1: {:.2}", result.em, result.f1);
        }
        results.push(result);
    }

    results
}

/// First characters of a question, cut on a char boundary
fn preview(text: &str) -> &str {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
