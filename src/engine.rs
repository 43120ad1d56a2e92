//! The analysis engine: public operations over the core components.
//!
//! Per-file analysis is CPU-bound; the only blocking points are store
//! reads/updates. Batch analysis parallelizes across files with rayon, with
//! per-key serialization handled by the store's atomic upserts.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::detect::{self, CompiledDetector, Finding, FindingKind};
use crate::error::EngineError;
use crate::extract::{self, CodeMetrics};
use crate::facts::FileFacts;
use crate::frontend::{FrontEnd, PythonFrontEnd};
use crate::learn::{
    self, compile_suggestion_patterns, LearningEngine, Observation, Suggestion, SuggestionMatcher,
};
use crate::profile::DeveloperProfile;
use crate::score;
use crate::signature::signature_of;
use crate::store::{Entity, Store};

/// A source file handed to the engine. The caller owns file IO and
/// traversal; the engine only ever sees path identity plus content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: String,
    pub source: String,
}

/// Value object describing one completed analysis. Not self-persisting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub file: String,
    pub developer_id: String,
    pub metrics: CodeMetrics,
    pub findings: Vec<Finding>,
    pub suggestions: Vec<Suggestion>,
    /// Bounded [0,100] quality summary.
    pub quality_score: f64,
    /// Epoch seconds.
    pub analyzed_at: u64,
    /// Set when persistence failed and the result was computed without the
    /// learned blend. Never fatal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degraded: Option<String>,
}

/// The adaptive analysis engine.
pub struct Engine {
    config: EngineConfig,
    detectors: Vec<CompiledDetector>,
    suggestion_matchers: Vec<SuggestionMatcher>,
    frontend: Box<dyn FrontEnd>,
    store: Arc<dyn Store>,
    learner: LearningEngine,
}

impl Engine {
    /// Build an engine over a store, with the Python front end.
    ///
    /// Validates and compiles the configuration; a bad registry fails here,
    /// before any analysis runs.
    pub fn new(config: EngineConfig, store: Arc<dyn Store>) -> Result<Self, EngineError> {
        Self::with_frontend(config, store, Box::new(PythonFrontEnd::new()))
    }

    /// Build an engine with an explicit parser front end.
    pub fn with_frontend(
        config: EngineConfig,
        store: Arc<dyn Store>,
        frontend: Box<dyn FrontEnd>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let detectors = detect::compile(&config.detectors)?;
        let suggestion_matchers = compile_suggestion_patterns(&config.suggestions.patterns)?;
        let learner = LearningEngine::new(Arc::clone(&store), config.learning.clone());

        Ok(Engine {
            config,
            detectors,
            suggestion_matchers,
            frontend,
            store,
            learner,
        })
    }

    /// Analyze one file, learn from it, and update the developer's profile.
    pub fn analyze(
        &self,
        path: &str,
        source: &str,
        developer_id: &str,
    ) -> Result<AnalysisResult, EngineError> {
        let facts = self.frontend.extract(path, source)?;
        let metrics = extract::metrics(&facts, source);
        let mut findings = detect::run(&facts, source, &self.detectors);
        let now = epoch_seconds();

        let mut degraded = None;
        let observations = match self.observe_constructs(&facts, &findings, now) {
            Ok(observations) => observations,
            Err(e) => {
                log::warn!("{path}: learning disabled for this analysis: {e}");
                degraded = Some(e.to_string());
                Vec::new()
            }
        };

        calibrate_findings(&self.learner, &facts, &observations, &mut findings);

        let suggestions = learn::emit_suggestions(
            &self.learner,
            &facts,
            source,
            &observations,
            &findings,
            &self.config.suggestions,
            &self.suggestion_matchers,
            &self.detectors,
        );

        let quality = score::evaluate(&metrics, &findings, &self.config.score);

        if degraded.is_none() {
            if let Err(e) =
                self.update_profile(developer_id, &facts, &metrics, &findings, quality.score, now)
            {
                log::warn!("{path}: profile update failed: {e}");
                degraded = Some(e.to_string());
            }
        }

        Ok(AnalysisResult {
            file: path.to_string(),
            developer_id: developer_id.to_string(),
            metrics,
            findings,
            suggestions,
            quality_score: quality.score,
            analyzed_at: now,
            degraded,
        })
    }

    /// Analyze many files for one developer. File results are independent;
    /// a parse failure in one file never fails the batch.
    pub fn analyze_batch(
        &self,
        files: &[SourceFile],
        developer_id: &str,
    ) -> Vec<Result<AnalysisResult, EngineError>> {
        files
            .par_iter()
            .map(|f| self.analyze(&f.path, &f.source, developer_id))
            .collect()
    }

    /// Calibrated findings for a file without updating any persisted state.
    pub fn predictions(&self, path: &str, source: &str) -> Result<Vec<Finding>, EngineError> {
        let facts = self.frontend.extract(path, source)?;
        let mut findings = detect::run(&facts, source, &self.detectors);

        let records = self.read_records(&facts);
        for finding in &mut findings {
            let record = facts
                .construct_index_at_line(finding.line)
                .and_then(|idx| records.get(idx).and_then(|r| r.as_ref()));
            finding.final_confidence = self.learner.calibrate(finding.base_confidence, record);
        }
        Ok(findings)
    }

    /// Suggestions for a file without updating any persisted state.
    pub fn suggestions(&self, path: &str, source: &str) -> Result<Vec<Suggestion>, EngineError> {
        let facts = self.frontend.extract(path, source)?;
        let findings = detect::run(&facts, source, &self.detectors);

        // Read-only observations: prior and updated are the stored record.
        let records = self.read_records(&facts);
        let observations: Vec<Observation> = facts
            .constructs
            .iter()
            .enumerate()
            .filter_map(|(idx, desc)| {
                records.get(idx).and_then(|r| r.as_ref()).map(|record| Observation {
                    signature: signature_of(desc),
                    construct_index: idx,
                    prior: Some(record.clone()),
                    updated: record.clone(),
                })
            })
            .collect();

        Ok(learn::emit_suggestions(
            &self.learner,
            &facts,
            source,
            &observations,
            &findings,
            &self.config.suggestions,
            &self.suggestion_matchers,
            &self.detectors,
        ))
    }

    /// Immutable snapshot of a developer's profile, if one exists.
    pub fn developer_insights(
        &self,
        developer_id: &str,
    ) -> Result<Option<DeveloperProfile>, EngineError> {
        let bytes = self.store.get(Entity::Profiles, developer_id)?;
        match bytes {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| EngineError::Persistence(format!("decoding profile: {e}"))),
            None => Ok(None),
        }
    }

    /// Observe every construct's signature, returning observations in
    /// construct order.
    fn observe_constructs(
        &self,
        facts: &FileFacts,
        findings: &[Finding],
        now: u64,
    ) -> Result<Vec<Observation>, EngineError> {
        facts
            .constructs
            .iter()
            .enumerate()
            .map(|(idx, desc)| {
                let risk_signal = findings.iter().any(|f| {
                    f.severity.is_risk_signal() && desc.span.contains_line(f.line)
                });
                let kinds: Vec<FindingKind> = findings
                    .iter()
                    .filter(|f| desc.span.contains_line(f.line))
                    .map(|f| f.kind)
                    .collect();
                self.learner
                    .observe(signature_of(desc), idx, risk_signal, &kinds, now)
            })
            .collect()
    }

    /// Stored records per construct, with store failures degraded to "no
    /// history" rather than surfaced.
    fn read_records(&self, facts: &FileFacts) -> Vec<Option<crate::learn::PatternRecord>> {
        facts
            .constructs
            .iter()
            .map(|desc| match self.learner.read(signature_of(desc)) {
                Ok(record) => record,
                Err(e) => {
                    log::warn!("{}: record read failed: {e}", facts.path);
                    None
                }
            })
            .collect()
    }

    fn update_profile(
        &self,
        developer_id: &str,
        facts: &FileFacts,
        metrics: &CodeMetrics,
        findings: &[Finding],
        quality_score: f64,
        now: u64,
    ) -> Result<(), EngineError> {
        let pattern_kinds: Vec<&str> = facts.constructs.iter().map(|c| c.kind.as_str()).collect();
        let issue_kinds: Vec<&str> = findings.iter().map(|f| f.kind.as_str()).collect();

        self.store
            .upsert(Entity::Profiles, developer_id, &mut |prev| {
                let mut profile = prev
                    .and_then(|bytes| serde_json::from_slice::<DeveloperProfile>(bytes).ok())
                    .unwrap_or_else(|| DeveloperProfile::new(developer_id));
                profile.record_analysis(quality_score, metrics, &pattern_kinds, &issue_kinds, now);
                serde_json::to_vec(&profile).map_err(|e| {
                    EngineError::Persistence(format!("encoding profile {developer_id}: {e}"))
                })
            })?;
        Ok(())
    }
}

/// Calibrate findings against the pre-update record state of the construct
/// containing them. Findings outside any construct keep their base.
fn calibrate_findings(
    learner: &LearningEngine,
    facts: &FileFacts,
    observations: &[Observation],
    findings: &mut [Finding],
) {
    for finding in findings.iter_mut() {
        let prior = facts
            .construct_index_at_line(finding.line)
            .and_then(|idx| observations.iter().find(|o| o.construct_index == idx))
            .and_then(|o| o.prior.as_ref());
        finding.final_confidence = learner.calibrate(finding.base_confidence, prior);
    }
}

fn epoch_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn engine() -> Engine {
        Engine::new(EngineConfig::default(), Arc::new(MemoryStore::new())).unwrap()
    }

    const SOURCE: &str = r#"
def risky(data):
    try:
        return data[0]
    except:
        pass
"#;

    #[test]
    fn analyze_returns_findings_and_score_in_bounds() {
        let result = engine().analyze("risky.py", SOURCE, "alice").unwrap();
        assert!(result.findings.iter().any(|f| f.kind == FindingKind::BareHandler));
        assert!((0.0..=100.0).contains(&result.quality_score));
        assert!(result.degraded.is_none());
    }

    #[test]
    fn parse_error_carries_file_identity_and_leaves_store_untouched() {
        let store = Arc::new(MemoryStore::new());
        let engine = Engine::new(EngineConfig::default(), Arc::clone(&store) as Arc<dyn Store>).unwrap();

        let err = engine.analyze("broken.py", "def broken(:", "alice").unwrap_err();
        match err {
            EngineError::Parse { file, .. } => assert_eq!(file, "broken.py"),
            other => panic!("expected parse error, got {other}"),
        }
        assert!(store.is_empty(Entity::Patterns));
        assert!(store.is_empty(Entity::Profiles));
    }

    #[test]
    fn first_run_confidence_equals_base() {
        let result = engine().analyze("risky.py", SOURCE, "alice").unwrap();
        for finding in &result.findings {
            assert_eq!(finding.final_confidence, finding.base_confidence);
        }
    }

    #[test]
    fn repeated_analysis_raises_confidence() {
        let engine = engine();
        let first = engine.analyze("risky.py", SOURCE, "alice").unwrap();
        for _ in 0..3 {
            engine.analyze("risky.py", SOURCE, "alice").unwrap();
        }
        let fifth = engine.analyze("risky.py", SOURCE, "alice").unwrap();

        let base = |r: &AnalysisResult| {
            r.findings
                .iter()
                .find(|f| f.kind == FindingKind::BareHandler)
                .map(|f| f.final_confidence)
                .unwrap()
        };
        assert!(base(&fifth) > base(&first));
    }

    #[test]
    fn predictions_do_not_mutate_state() {
        let store = Arc::new(MemoryStore::new());
        let engine = Engine::new(EngineConfig::default(), Arc::clone(&store) as Arc<dyn Store>).unwrap();

        let a = engine.predictions("risky.py", SOURCE).unwrap();
        let b = engine.predictions("risky.py", SOURCE).unwrap();
        assert_eq!(a.len(), b.len());
        assert!(store.is_empty(Entity::Patterns));
    }

    #[test]
    fn batch_isolates_parse_failures() {
        let files = vec![
            SourceFile {
                path: "good.py".to_string(),
                source: "def ok():\n    return 1\n".to_string(),
            },
            SourceFile {
                path: "bad.py".to_string(),
                source: "def broken(:".to_string(),
            },
        ];
        let results = engine().analyze_batch(&files, "alice");
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }

    #[test]
    fn profile_counts_match_analyses() {
        let engine = engine();
        for _ in 0..4 {
            engine.analyze("risky.py", SOURCE, "bob").unwrap();
        }
        let profile = engine.developer_insights("bob").unwrap().unwrap();
        assert_eq!(profile.analyses_count, 4);
        assert!(engine.developer_insights("nobody").unwrap().is_none());
    }
}
