// Property-based tests for the registries and code resolution.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use proptest::prelude::*;

use cdmload_recon::assemble::{disambiguate, Candidate};
use cdmload_recon::footnote::{strip_parens, triplet_rows};
use cdmload_recon::reconcile::normalize_measure;
use cdmload_recon::suppression::{SdEntry, SuppressionRegistry, RESERVED_FROM};
use cdmload_recon::template;
use cdmload_recon::CdmError;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

fn arb_registry() -> impl Strategy<Value = SuppressionRegistry> {
    prop::collection::btree_set(1i64..120, 0..40).prop_map(|codes| {
        SuppressionRegistry::from_entries(
            codes
                .into_iter()
                .map(|value| SdEntry {
                    value,
                    symbol: format!("s{value}"),
                    desc_eng: String::new(),
                    desc_chi: String::new(),
                    suppressed: false,
                })
                .collect(),
        )
    })
}

fn arb_candidate() -> impl Strategy<Value = Candidate> {
    (0usize..6, 1i64..4, 1i64..4, prop::option::of(0usize..6)).prop_map(|(code, cv_id, ccg, parent)| Candidate {
        code: format!("C{code}"),
        cv_id,
        cc_id: code as i64 + 1,
        ccg,
        parent_cc_code: parent.map(|p| format!("C{p}")).unwrap_or_default(),
    })
}

fn arb_fields() -> impl Strategy<Value = Vec<Vec<Candidate>>> {
    prop::collection::vec(prop::collection::vec(arb_candidate(), 0..4), 0..5)
}

// ---------------------------------------------------------------------------
// Suppression codes
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn next_code_stays_below_the_reserved_range(registry in arb_registry()) {
        let below: Vec<i64> = registry
            .entries()
            .iter()
            .map(|e| e.value)
            .filter(|v| *v < RESERVED_FROM)
            .collect();
        match registry.next_code() {
            Ok(code) => {
                prop_assert!(code < RESERVED_FROM);
                prop_assert!(below.iter().all(|v| *v < code));
                prop_assert!(!registry.entries().iter().any(|e| e.value == code));
            }
            Err(CdmError::SuppressionExhausted) => {
                prop_assert_eq!(below.iter().max().copied(), Some(RESERVED_FROM - 1));
            }
            Err(e) => prop_assert!(false, "unexpected error {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Disambiguation
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn accepted_codes_come_from_the_input(fields in arb_fields()) {
        let all: Vec<Candidate> = fields.iter().flatten().cloned().collect();
        let out = disambiguate(fields);
        for c in &out {
            prop_assert!(all.contains(c));
        }
    }

    #[test]
    fn one_depth_per_classification_variable(fields in arb_fields()) {
        let out = disambiguate(fields);
        for c in &out {
            prop_assert!(out.iter().filter(|o| o.cv_id == c.cv_id).all(|o| o.ccg == c.ccg));
        }
    }

    #[test]
    fn accepted_set_is_a_fixed_point(fields in arb_fields()) {
        let once = disambiguate(fields);
        let again = disambiguate(once.iter().cloned().map(|c| vec![c]).collect());
        prop_assert_eq!(once, again);
    }
}

// ---------------------------------------------------------------------------
// Footnotes and cell text
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn triplet_filter_removes_pairs_and_keeps_type_one(types in prop::collection::vec(1i64..4, 0..30)) {
        let typed: Vec<(usize, i64)> = types.iter().copied().enumerate().collect();
        let removed = triplet_rows(&typed);
        prop_assert_eq!(removed.len() % 2, 0);
        for idx in &removed {
            prop_assert!(types[*idx] != 1);
        }
    }

    #[test]
    fn stripped_symbols_have_no_parens(text in r"[()a-z§*#]{0,8}") {
        let stripped = strip_parens(&text);
        prop_assert!(!stripped.contains('(') && !stripped.contains(')'));
        prop_assert_eq!(strip_parens(&stripped), stripped.clone());
    }

    #[test]
    fn measure_normalization_is_idempotent(text in r"[0-9 ,.\-]{0,12}") {
        let once = normalize_measure(&text);
        prop_assert_eq!(normalize_measure(&once), once.clone());
        prop_assert!(!once.contains(' ') && !once.contains(','));
    }

    #[test]
    fn year_offsets_evaluate_like_integers(year in 1950i64..2100, offset in 0i64..50) {
        let rendered = template::render(&format!("[YYYY-{offset}] to [YYYY+{offset}]"), &year.to_string()).unwrap();
        prop_assert_eq!(rendered, format!("{} to {}", year - offset, year + offset));
    }
}
