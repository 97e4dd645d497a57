//! Classify the given texts (or a few built-in samples) with the loaded rules.

use std::sync::Arc;

use rival_watch::analyze::rules::load_rules_default;
use rival_watch::ingest::clean_text;
use rival_watch::AlertClassifier;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();
    let rules = load_rules_default()?.compile()?;
    let classifier = AlertClassifier::new(Arc::new(rules));

    let mut texts: Vec<String> = std::env::args().skip(1).collect();
    if texts.is_empty() {
        texts = vec![
            "WinZO raises Series B funding of $50M".into(),
            "We're hiring senior engineers in Bangalore".into(),
            "Minor UI polish update".into(),
        ];
    }

    for t in &texts {
        let c = classifier.classify(&clean_text(t));
        println!("{:<6} {:?}  {}", c.level.as_str(), c.keywords, t);
    }
    Ok(())
}
