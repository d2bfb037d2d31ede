//! Property-Based Tests for draftsmith
//!
//! Invariants checked across generated inputs:
//! - Outline parsing always covers every blueprint section id
//! - Assembly is deterministic and follows ascending section order
//! - Verifier overall scores stay on the 1-5 scale and readiness tracks the threshold
//! - JSON repair leaves valid JSON alone and closes arrays cut mid-stream
//!
//! ## Configuration
//!
//! - `PROPTEST_CASES`: Number of test cases per property (default: 64)
//! - `PROPTEST_MAX_SHRINK_ITERS`: Max shrinking iterations on failure (default: 1000)
//!
//! ```bash
//! PROPTEST_CASES=256 cargo test --test property_based_tests
//! ```

use proptest::prelude::*;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::env;

use draftsmith::Blueprint;
use draftsmith::blueprint::Rubric;
use draftsmith::engine::{
    READY_THRESHOLD, SectionContent, assemble, parse_skeleton, parse_verification,
};
use draftsmith::extraction::repair_json;

const DEFAULT_PROPTEST_CASES: u32 = 64;

const DEFAULT_MAX_SHRINK_ITERS: u32 = 1000;

/// Creates a ProptestConfig that respects `PROPTEST_CASES` and
/// `PROPTEST_MAX_SHRINK_ITERS`, capped at `max_cases` when given.
fn proptest_config(max_cases: Option<u32>) -> ProptestConfig {
    let env_cases = env::var("PROPTEST_CASES")
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(DEFAULT_PROPTEST_CASES);

    let env_shrink_iters = env::var("PROPTEST_MAX_SHRINK_ITERS")
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(DEFAULT_MAX_SHRINK_ITERS);

    let cases = match max_cases {
        Some(max) => env_cases.min(max),
        None => env_cases,
    };

    ProptestConfig {
        cases,
        max_shrink_iters: env_shrink_iters,
        max_shrink_time: 30000,
        ..ProptestConfig::default()
    }
}

/// A blueprint with `n` sections whose declaration order is a shuffle of
/// their `order` values.
fn arb_blueprint() -> impl Strategy<Value = Blueprint> {
    (1usize..8)
        .prop_flat_map(|n| Just((1..=n as u32).collect::<Vec<u32>>()).prop_shuffle())
        .prop_map(|orders| {
            let sections: Vec<Value> = orders
                .iter()
                .map(|order| {
                    json!({
                        "id": format!("s{order}"),
                        "title": format!("Section {order}"),
                        "description": format!("About part {order}"),
                        "order": order,
                    })
                })
                .collect();
            serde_json::from_value(json!({"name": "generated", "sections": sections}))
                .expect("generated blueprint deserializes")
        })
}

/// Outline responses ranging from garbage to partial, truncated and
/// complete JSON.
fn arb_skeleton_response(ids: Vec<String>) -> impl Strategy<Value = String> {
    let full: serde_json::Map<String, Value> = ids
        .iter()
        .map(|id| {
            (
                id.clone(),
                json!({"purpose": format!("Purpose of {id}"), "key_points": ["one", "two"]}),
            )
        })
        .collect();
    let full_text = Value::Object(full).to_string();
    let full_len = full_text.len();

    prop_oneof![
        ".{0,200}",
        prop::sample::subsequence(ids.clone(), 0..=ids.len()).prop_map(|subset| {
            let mut object = serde_json::Map::new();
            for id in subset {
                object.insert(id, json!({"purpose": "kept"}));
            }
            object.insert("unexpected".to_string(), json!({"purpose": "dropped"}));
            Value::Object(object).to_string()
        }),
        (0..=full_len).prop_map(move |cut| full_text[..cut].to_string()),
    ]
}

fn section_content(id: &str, title: &str, body: &str) -> SectionContent {
    SectionContent {
        section_id: id.to_string(),
        title: title.to_string(),
        content: body.to_string(),
        word_count: body.split_whitespace().count(),
        target_words: 100,
        is_valid: true,
        regeneration_count: 0,
    }
}

fn rubric(weights: &[Option<f64>]) -> Rubric {
    let criteria: Vec<Value> = weights
        .iter()
        .enumerate()
        .map(|(i, weight)| json!({"id": format!("c{i}"), "name": format!("Criterion {i}"), "weight": weight}))
        .collect();
    serde_json::from_value(json!({"criteria": criteria})).expect("rubric deserializes")
}

proptest! {
    #![proptest_config(proptest_config(None))]

    #[test]
    fn prop_skeleton_covers_every_section(
        (blueprint, raw) in arb_blueprint().prop_flat_map(|bp| {
            let ids: Vec<String> = bp.section_ids().iter().map(|s| s.to_string()).collect();
            (Just(bp), arb_skeleton_response(ids))
        })
    ) {
        let outcome = parse_skeleton(&blueprint, &raw);
        let skeleton = outcome.value();

        let mut expected: Vec<&str> = blueprint.section_ids();
        expected.sort_unstable();
        let mut got: Vec<&str> = skeleton.ids().collect();
        got.sort_unstable();
        prop_assert_eq!(got, expected);

        if skeleton.fallback_ids().is_empty() {
            prop_assert!(outcome.reasons().iter().all(|r| !r.contains("missing")));
        } else {
            prop_assert!(outcome.is_degraded());
        }
    }

    #[test]
    fn prop_assembly_is_deterministic_and_ordered(
        blueprint in arb_blueprint(),
        bodies in prop::collection::vec("[A-Za-z ]{1,40}", 8),
    ) {
        let sections: BTreeMap<String, SectionContent> = blueprint
            .sections
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.clone(), section_content(&s.id, &s.title, &bodies[i])))
            .collect();

        let first = assemble(&blueprint, &sections);
        let second = assemble(&blueprint, &sections);
        prop_assert_eq!(&first, &second);

        let positions: Vec<usize> = blueprint
            .sections_in_order()
            .iter()
            .map(|s| first.find(&format!("# {}\n", s.title)).expect("every title is present"))
            .collect();
        prop_assert!(positions.windows(2).all(|w| w[0] < w[1]));
        prop_assert_eq!(first.matches("\n---\n").count(), blueprint.sections.len());
    }

    #[test]
    fn prop_verifier_scores_stay_in_bounds(
        entries in prop::collection::vec((-3i64..9, prop::option::of(0.1f64..5.0)), 1..6),
    ) {
        let weights: Vec<Option<f64>> = entries.iter().map(|(_, w)| *w).collect();
        let rubric = rubric(&weights);
        let scores: Vec<Value> = entries
            .iter()
            .enumerate()
            .map(|(i, (score, _))| json!({"id": format!("c{i}"), "score": score}))
            .collect();
        let raw = json!({"scores": scores, "strengths": ["s"]}).to_string();

        let outcome = parse_verification(&rubric, &raw);
        let result = outcome.value();

        prop_assert_eq!(result.scores.len(), entries.len());
        prop_assert!(result.scores.iter().all(|s| (1..=5).contains(&s.score)));
        prop_assert!(result.overall_score >= 1.0 && result.overall_score <= 5.0,
            "overall {} out of range", result.overall_score);
        prop_assert_eq!(result.ready_for_approval, result.overall_score >= READY_THRESHOLD);
    }

    #[test]
    fn prop_repair_leaves_valid_json_unchanged(
        items in prop::collection::vec(prop_oneof![
            any::<u32>().prop_map(|n| json!(n)),
            "[a-z ]{0,12}".prop_map(|s| json!(s)),
            any::<bool>().prop_map(|b| json!(b)),
        ], 0..8),
        pretty in any::<bool>(),
    ) {
        let value = json!({"items": items, "done": true});
        let text = if pretty {
            serde_json::to_string_pretty(&value).expect("serializes")
        } else {
            value.to_string()
        };
        prop_assert_eq!(repair_json(&text), text);
    }

    #[test]
    fn prop_repair_closes_truncated_array(
        (text, cut) in prop::collection::vec(prop_oneof![
            any::<u32>().prop_map(|n| n.to_string()),
            "[a-z ]{0,12}".prop_map(|s| format!("\"{s}\"")),
        ], 1..10)
        .prop_flat_map(|items| {
            let text = format!("{{\"strengths\": [{}", items.join(", "));
            let start = text.find('[').expect("has bracket") + 1;
            let len = text.len();
            (Just(text), start..=len)
        })
    ) {
        let truncated = &text[..cut];
        let repaired = repair_json(truncated);
        let parsed: Result<Value, _> = serde_json::from_str(&repaired);
        prop_assert!(parsed.is_ok(), "did not parse: {}", repaired);
        prop_assert!(parsed.expect("checked above")["strengths"].is_array());
    }
}
