//! Property-based tests for preemption ranking, sort list capacity, line scanning
//! and snapshot integrity.

use std::cmp::Ordering;

use proptest::prelude::*;
use sp_config::preempt::{compare, encode, sort_classes, PreemptClass};
use sp_config::{
    LineScanner, Policy, PolicyCompiler, PolicySnapshot, PreemptBits, PreemptLevel, MAX_SORTS,
};

fn level_strategy() -> impl Strategy<Value = PreemptLevel> {
    prop::sample::select(PreemptLevel::ALL.to_vec())
}

fn class_strategy() -> impl Strategy<Value = PreemptClass> {
    (0u32..64, -3i32..=3).prop_map(|(bits, priority)| PreemptClass {
        bits: PreemptBits(bits),
        priority: priority * 1000,
    })
}

fn word_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9_]{1,12}"
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2_000))]

    #[test]
    fn encoding_ignores_token_order(levels in prop::collection::vec(level_strategy(), 1..8)) {
        let forward: Vec<_> = levels.iter().map(|l| l.name()).collect();
        let mut backward = forward.clone();
        backward.reverse();

        let a = encode(&forward.join("+")).expect("known levels encode");
        let b = encode(&backward.join("+")).expect("known levels encode");
        prop_assert_eq!(a, b);
        for level in &levels {
            prop_assert!(a.contains(*level));
        }
    }

    #[test]
    fn any_unknown_token_rejects_the_list(
        levels in prop::collection::vec(level_strategy(), 0..5),
        bogus in "[A-Z]{3,8}",
        at in 0usize..5,
    ) {
        let mut tokens: Vec<String> = levels.iter().map(|l| l.name().to_string()).collect();
        let at = at.min(tokens.len());
        tokens.insert(at, bogus.clone());

        let err = encode(&tokens.join("+")).unwrap_err();
        prop_assert_eq!(err.0, bogus);
    }

    #[test]
    fn comparator_is_a_strict_weak_order(
        a in class_strategy(),
        b in class_strategy(),
        c in class_strategy(),
    ) {
        prop_assert_eq!(compare(&a, &a), Ordering::Equal);
        prop_assert_eq!(compare(&a, &b), compare(&b, &a).reverse());
        if compare(&a, &b) == Ordering::Less && compare(&b, &c) == Ordering::Less {
            prop_assert_eq!(compare(&a, &c), Ordering::Less);
        }
        if a.bits.count() > b.bits.count() {
            prop_assert_eq!(compare(&a, &b), Ordering::Less);
        }
    }

    #[test]
    fn sorted_classes_never_rank_fewer_levels_first(
        mut classes in prop::collection::vec(class_strategy(), 0..10),
    ) {
        sort_classes(&mut classes);
        for pair in classes.windows(2) {
            prop_assert!(compare(&pair[0], &pair[1]) != Ordering::Greater);
            prop_assert!(pair[0].bits.count() >= pair[1].bits.count());
        }
    }

    #[test]
    fn sort_lists_never_exceed_capacity(
        resources in prop::collection::vec(word_strategy(), 0..25),
        window in prop::sample::select(vec!["all", "prime", "non_prime", "none"]),
    ) {
        let text: String = resources
            .iter()
            .map(|r| format!("job_sort_key: \"{r} high\" {window}\nnode_sort_key: \"{r} low\" {window}\n"))
            .collect();
        let compiled = PolicyCompiler::new().compile_str(&text).expect("sort keys compile");
        let policy = &compiled.policy;

        for list in [
            &policy.prime.job_sort,
            &policy.non_prime.job_sort,
            &policy.prime.node_sort,
            &policy.non_prime.node_sort,
        ] {
            prop_assert!(list.len() <= MAX_SORTS);
        }
        prop_assert!(!compiled.report.has_errors());
    }

    #[test]
    fn scanner_yields_whitespace_separated_words(
        words in prop::collection::vec(word_strategy(), 1..8),
        gaps in prop::collection::vec(" {1,3}|\t", 8),
    ) {
        let mut line = String::new();
        for (word, gap) in words.iter().zip(&gaps) {
            line.push_str(gap);
            line.push_str(word);
        }

        let mut scanner = LineScanner::new(&line);
        let mut seen = Vec::new();
        while let Some(token) = scanner.next_token(None) {
            seen.push(token.to_string());
        }
        prop_assert_eq!(seen, words);
        prop_assert!(scanner.is_exhausted());
    }

    #[test]
    fn quoted_values_keep_inner_spaces(
        left in word_strategy(),
        right in word_strategy(),
    ) {
        let line = format!("resources: \"{left}, {right}\" all");
        let mut scanner = LineScanner::new(&line);

        prop_assert_eq!(scanner.next_token(Some(':')), Some("resources"));
        scanner.skip_char(':');
        let expected = format!("{left}, {right}");
        prop_assert_eq!(scanner.next_token(None), Some(expected.as_str()));
        prop_assert_eq!(scanner.next_token(None), Some("all"));
    }

    #[test]
    fn snapshot_round_trip_keeps_any_decay_factor(factor in 0.0f64..1.0) {
        prop_assume!(factor > 0.0);
        let text = format!("fairshare_decay_factor: {factor}\n");
        let compiled = PolicyCompiler::new().compile_str(&text).expect("factor compiles");
        prop_assert_eq!(compiled.policy.fairshare_decay_factor, factor);

        let snapshot = PolicySnapshot::new(compiled.policy, "inline").expect("snapshot");
        let json = snapshot.to_json().expect("serialize");
        let back = match PolicySnapshot::from_json(&json) {
            Ok(back) => back,
            Err(err) => return Err(TestCaseError::fail(format!("integrity failed for {factor}: {err}"))),
        };
        prop_assert_eq!(back.policy, Policy {
            fairshare_decay_factor: factor,
            ..Policy::default()
        });
    }
}
