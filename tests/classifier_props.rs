// tests/classifier_props.rs
//
// Classifier properties over seeded random texts, plus the documented
// example sentences with the default rule table.

use std::collections::HashSet;
use std::sync::Arc;

use rand::{rngs::StdRng, Rng, SeedableRng};

use rival_watch::ingest::clean_text;
use rival_watch::{AlertClassifier, AlertLevel, AlertRules};

const VOCAB: [&str; 16] = [
    "WinZO", "raises", "Series", "funding", "hiring", "engineer", "update", "blog", "VP",
    "partnership", "market", "polish", "the", "new", "  ", "#launch",
];

fn classifier() -> AlertClassifier {
    AlertClassifier::new(Arc::new(AlertRules::default().compile().expect("rules compile")))
}

fn random_text(rng: &mut StdRng) -> String {
    let n = rng.random_range(0..12);
    (0..n)
        .map(|_| VOCAB[rng.random_range(0..VOCAB.len())])
        .collect::<Vec<_>>()
        .join(" ")
}

#[test]
fn classify_is_deterministic() {
    let c = classifier();
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..500 {
        let t = random_text(&mut rng);
        assert_eq!(c.classify(&t), c.classify(&t), "text: {t:?}");
    }
}

#[test]
fn low_results_only_come_from_low_patterns_or_nothing() {
    let c = classifier();
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..500 {
        let t = random_text(&mut rng);
        let out = c.classify(&t);
        if out.level == AlertLevel::Low {
            assert!(!out.is_alert());
            for k in &out.keywords {
                assert!(["update", "blog"].contains(&k.as_str()), "unexpected {k} in {t:?}");
            }
        } else {
            assert!(!out.keywords.is_empty(), "alert without keywords: {t:?}");
        }
        let unique: HashSet<&String> = out.keywords.iter().collect();
        assert_eq!(unique.len(), out.keywords.len(), "repeated keyword in {t:?}");
    }
}

#[test]
fn documented_sentences() {
    let c = classifier();

    let funding = c.classify(&clean_text("WinZO announces $50M Series C funding round"));
    assert_eq!(funding.level, AlertLevel::High);
    assert!(funding.keywords.contains(&"funding".to_string()));
    assert!(funding.keywords.contains(&"series".to_string()));

    let hiring = c.classify(&clean_text("We are hiring a Senior Backend Engineer"));
    assert_eq!(hiring.level, AlertLevel::Medium);
    assert_eq!(hiring.keywords, vec!["hiring"]);

    let polish = c.classify(&clean_text("Minor UI polish update"));
    assert_eq!(polish.level, AlertLevel::Low);
    assert!(!polish.is_alert());
}
