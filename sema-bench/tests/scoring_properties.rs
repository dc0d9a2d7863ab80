//! Property-based tests for answer scoring using proptest

use proptest::prelude::*;
use sema_bench::analysis::{exact_match, f1, normalize};

// =============================================================================
// Strategies
// =============================================================================

fn word() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z]{1,8}",
        Just("the".to_string()),
        Just("A".to_string()),
        Just("an".to_string()),
    ]
}

/// Short answers: words separated by spaces and stray ASCII punctuation
fn answer() -> impl Strategy<Value = String> {
    prop::collection::vec((word(), "[ ,.!?'-]{1,3}"), 0..8).prop_map(|parts| {
        parts
            .into_iter()
            .map(|(w, sep)| format!("{}{}", w, sep))
            .collect::<String>()
    })
}

// =============================================================================
// Normalization
// =============================================================================

proptest! {
    #[test]
    fn normalize_is_idempotent(text in answer()) {
        let once = normalize(&text);
        prop_assert_eq!(normalize(&once), once);
    }

    #[test]
    fn normalized_text_has_no_articles_or_padding(text in answer()) {
        let normalized = normalize(&text);
        prop_assert_eq!(normalized.trim(), normalized.as_str());
        prop_assert!(!normalized.contains("  "));
        for token in normalized.split_whitespace() {
            prop_assert!(!matches!(token, "a" | "an" | "the"));
        }
    }

    #[test]
    fn articles_and_punctuation_alone_normalize_to_empty(
        parts in prop::collection::vec(
            (prop_oneof![Just("a"), Just("An"), Just("THE")], "[,.!?]{0,2}"),
            0..6,
        )
    ) {
        let text: String = parts.iter().map(|(w, punct)| format!("{}{} ", w, punct)).collect();
        prop_assert_eq!(normalize(&text), "");
    }
}

// =============================================================================
// Scores
// =============================================================================

proptest! {
    #[test]
    fn exact_match_is_reflexive(text in answer()) {
        prop_assert_eq!(exact_match(&text, &text), 1.0);
    }

    #[test]
    fn f1_is_bounded(prediction in answer(), truth in answer()) {
        let score = f1(&prediction, &truth);
        prop_assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn f1_is_symmetric(prediction in answer(), truth in answer()) {
        prop_assert_eq!(f1(&prediction, &truth), f1(&truth, &prediction));
    }

    #[test]
    fn exact_match_implies_full_f1(prediction in answer(), truth in answer()) {
        if exact_match(&prediction, &truth) == 1.0 && !normalize(&truth).is_empty() {
            prop_assert!((f1(&prediction, &truth) - 1.0).abs() < 1e-12);
        }
    }
}
