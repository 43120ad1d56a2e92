//! Integration tests for learning across repeated analyses and restarts.

use std::sync::Arc;

use acumen::learn::PatternRecord;
use acumen::signature::PatternSignature;
use acumen::store::{Entity, JsonStore, MemoryStore, Store};
use acumen::{Engine, EngineConfig, FindingKind};

const RISKY_SOURCE: &str = "\
def risky(data):
    \"\"\"First element, swallowing everything.\"\"\"
    try:
        return data[0]
    except:
        return None
";

fn bare_handler_confidence(engine: &Engine, run: &str) -> f64 {
    engine
        .analyze("risky.py", RISKY_SOURCE, "alice")
        .unwrap_or_else(|e| panic!("{run} analysis failed: {e}"))
        .findings
        .iter()
        .find(|f| f.kind == FindingKind::BareHandler)
        .map(|f| f.final_confidence)
        .expect("bare handler should be found")
}

#[test]
fn confidence_rises_monotonically_over_repeated_runs() {
    let engine = Engine::new(EngineConfig::default(), Arc::new(MemoryStore::new())).unwrap();

    let mut last = bare_handler_confidence(&engine, "first");
    let first = last;
    for run in 2..=5 {
        let current = bare_handler_confidence(&engine, "repeat");
        assert!(
            current >= last,
            "confidence fell on run {run}: {current} < {last}"
        );
        last = current;
    }
    assert!(last > first, "five risky runs should raise confidence");
}

#[test]
fn pattern_records_count_every_observation() {
    let store = Arc::new(MemoryStore::new());
    let engine = Engine::new(EngineConfig::default(), Arc::clone(&store) as Arc<dyn Store>).unwrap();
    for _ in 0..5 {
        engine.analyze("risky.py", RISKY_SOURCE, "alice").unwrap();
    }

    let entries = store
        .scan(Entity::Patterns, &PatternSignature::version_prefix())
        .unwrap();
    assert!(!entries.is_empty());
    for (key, bytes) in entries {
        let record: PatternRecord =
            serde_json::from_slice(&bytes).unwrap_or_else(|e| panic!("bad record {key}: {e}"));
        assert_eq!(record.occurrence_count, 5, "key {key}");
        assert!(record.bug_risk > 0.5, "key {key} should have learned risk");
    }
}

#[test]
fn learned_state_survives_restart_through_json_store() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("acumen.json");

    // First process: learn from five runs, then flush and drop.
    {
        let store = Arc::new(JsonStore::open(&path)?);
        let engine = Engine::new(EngineConfig::default(), Arc::clone(&store) as Arc<dyn Store>)?;
        for _ in 0..5 {
            engine.analyze("risky.py", RISKY_SOURCE, "dana")?;
        }
        store.flush()?;
    }

    // Second process: history is visible without any new observation.
    let store = Arc::new(JsonStore::open(&path)?);
    let engine = Engine::new(EngineConfig::default(), store)?;

    let predictions = engine.predictions("risky.py", RISKY_SOURCE)?;
    let bare = predictions
        .iter()
        .find(|f| f.kind == FindingKind::BareHandler)
        .expect("bare handler should be predicted");
    assert!(
        bare.final_confidence > bare.base_confidence,
        "persisted history should raise the calibrated confidence"
    );

    let profile = engine.developer_insights("dana")?.unwrap();
    assert_eq!(profile.analyses_count, 5);
    Ok(())
}

#[test]
fn recurrent_issues_surface_as_suggestions() {
    let engine = Engine::new(EngineConfig::default(), Arc::new(MemoryStore::new())).unwrap();

    // Below the recurrence threshold nothing recurrence-based is emitted.
    let first = engine.analyze("risky.py", RISKY_SOURCE, "alice").unwrap();
    assert!(!first
        .suggestions
        .iter()
        .any(|s| s.kind == acumen::SuggestionKind::RecurrentIssue));

    for _ in 0..4 {
        engine.analyze("risky.py", RISKY_SOURCE, "alice").unwrap();
    }
    let suggestions = engine.suggestions("risky.py", RISKY_SOURCE).unwrap();
    let recurrent: Vec<_> = suggestions
        .iter()
        .filter(|s| s.kind == acumen::SuggestionKind::RecurrentIssue)
        .collect();
    assert!(
        !recurrent.is_empty(),
        "a finding repeated five times should surface as recurrent"
    );
    for s in recurrent {
        assert!(s.confidence > 0.0 && s.confidence <= 1.0);
        assert!(s.reasoning.contains("recurred"));
    }
}
