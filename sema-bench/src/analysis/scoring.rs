//! Answer normalization and text-similarity scores

use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;

use super::metrics::{EvaluationScores, Verdict};

fn articles() -> &'static Regex {
    static ARTICLES: OnceLock<Regex> = OnceLock::new();
    ARTICLES.get_or_init(|| Regex::new(r"\b(a|an|the)\b").expect("article pattern is valid"))
}

/// Lower-case, strip ASCII punctuation, drop the articles a/an/the, and
/// collapse whitespace.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let without_punct: String = lowered.chars().filter(|c| !c.is_ascii_punctuation()).collect();
    let without_articles = articles().replace_all(&without_punct, " ");
    without_articles.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 1.0 when both strings normalize to the same text, else 0.0
pub fn exact_match(prediction: &str, ground_truth: &str) -> f64 {
    if normalize(prediction) == normalize(ground_truth) {
        1.0
    } else {
        0.0
    }
}

/// Token-level F1 over normalized whitespace tokens
pub fn f1(prediction: &str, ground_truth: &str) -> f64 {
    let prediction = normalize(prediction);
    let ground_truth = normalize(ground_truth);
    let pred_tokens: Vec<&str> = prediction.split_whitespace().collect();
    let truth_tokens: Vec<&str> = ground_truth.split_whitespace().collect();

    let mut truth_counts: HashMap<&str, usize> = HashMap::new();
    for token in &truth_tokens {
        *truth_counts.entry(token).or_insert(0) += 1;
    }

    let mut common = 0usize;
    for token in &pred_tokens {
        if let Some(count) = truth_counts.get_mut(token) {
            if *count > 0 {
                *count -= 1;
                common += 1;
            }
        }
    }

    if common == 0 {
        return 0.0;
    }

    let precision = common as f64 / pred_tokens.len() as f64;
    let recall = common as f64 / truth_tokens.len() as f64;
    if precision + recall == 0.0 {
        return 0.0;
    }
    2.0 * precision * recall / (precision + recall)
}

/// String form of an answer value; `null` is empty, strings are unquoted
pub fn coerce_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Score one prediction; PASS iff exact match
pub fn evaluate(prediction: &Value, ground_truth: &Value) -> EvaluationScores {
    let prediction = coerce_text(prediction);
    let ground_truth = coerce_text(ground_truth);
    let em = exact_match(&prediction, &ground_truth);
    EvaluationScores {
        em,
        f1: f1(&prediction, &ground_truth),
        verdict: if em == 1.0 { Verdict::Pass } else { Verdict::Fail },
    }
}
