//! Pattern learning engine.
//!
//! Owns the persistent `PatternRecord` per signature, updates occurrence
//! counts and the decayed bug-risk estimate on every observation, calibrates
//! finding confidence against learned history, and emits suggestions from
//! metric thresholds, optimization line patterns, and recurrence counts.
//!
//! A signature has exactly two states: Unseen (absent from the store) and
//! Known (occurrence_count >= 1). Records are created on first observation
//! and never deleted. `bug_risk` and confidence values are bounded
//! exponential-average estimates, nothing more.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::{LearningParams, SuggestionRules};
use crate::detect::{CompiledDetector, Finding, FindingKind};
use crate::error::EngineError;
use crate::facts::{ConstructDescriptor, FileFacts};
use crate::signature::PatternSignature;
use crate::store::{Entity, Store};

/// Persistent learning state for one pattern signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternRecord {
    /// Times this signature has been observed. Monotone non-decreasing,
    /// +1 per observation.
    pub occurrence_count: u64,
    /// Decayed estimate in [0,1] of co-occurrence with findings.
    pub bug_risk: f64,
    /// Epoch seconds of first observation.
    pub first_seen: u64,
    /// Epoch seconds of most recent observation.
    pub last_seen: u64,
    /// Count of finding kinds observed against instances of this pattern.
    /// Bounded: finding kinds form a closed enum.
    #[serde(default)]
    pub kind_counts: BTreeMap<String, u32>,
}

impl PatternRecord {
    fn seed(params: &LearningParams, risk_signal: bool, now: u64) -> Self {
        PatternRecord {
            occurrence_count: 1,
            bug_risk: if risk_signal {
                params.seed_risk_triggered
            } else {
                params.seed_risk_clean
            },
            first_seen: now,
            last_seen: now,
            kind_counts: BTreeMap::new(),
        }
    }

    /// Apply one observation: bump the counter and fold the signal into the
    /// exponential moving average. The EMA decays risk once a developer
    /// stops reproducing an anti-pattern instead of anchoring on early
    /// history.
    fn advance(&mut self, params: &LearningParams, risk_signal: bool, now: u64) {
        self.occurrence_count += 1;
        let signal = if risk_signal { 1.0 } else { 0.0 };
        self.bug_risk = (self.bug_risk * (1.0 - params.alpha) + signal * params.alpha)
            .clamp(0.0, 1.0);
        self.last_seen = now;
    }

    fn note_kinds(&mut self, kinds: &[FindingKind]) {
        for kind in kinds {
            *self.kind_counts.entry(kind.as_str().to_string()).or_insert(0) += 1;
        }
    }
}

/// One signature observation: the record state before this observation (used
/// for calibration) and after it.
#[derive(Debug, Clone)]
pub struct Observation {
    pub signature: PatternSignature,
    pub construct_index: usize,
    pub prior: Option<PatternRecord>,
    pub updated: PatternRecord,
}

/// The learning engine: persistent pattern statistics plus calibration.
pub struct LearningEngine {
    store: Arc<dyn Store>,
    params: LearningParams,
}

impl LearningEngine {
    pub fn new(store: Arc<dyn Store>, params: LearningParams) -> Self {
        Self { store, params }
    }

    pub fn params(&self) -> &LearningParams {
        &self.params
    }

    /// Record one observation of a signature.
    ///
    /// The read of the prior state and the write of the updated state happen
    /// inside a single atomic upsert, so partial updates are never
    /// observable and the prior state used for calibration is exactly the
    /// state this update replaced.
    pub fn observe(
        &self,
        signature: PatternSignature,
        construct_index: usize,
        risk_signal: bool,
        finding_kinds: &[FindingKind],
        now: u64,
    ) -> Result<Observation, EngineError> {
        let params = self.params.clone();
        let mut prior: Option<PatternRecord> = None;
        let mut updated: Option<PatternRecord> = None;

        self.store
            .upsert(Entity::Patterns, &signature.store_key(), &mut |prev| {
                let existing = prev.and_then(|bytes| {
                    serde_json::from_slice::<PatternRecord>(bytes)
                        .map_err(|e| {
                            log::warn!("undecodable pattern record {signature}: {e}");
                            e
                        })
                        .ok()
                });

                let mut record = match existing {
                    Some(record) => {
                        prior = Some(record.clone());
                        let mut next = record;
                        next.advance(&params, risk_signal, now);
                        next
                    }
                    None => PatternRecord::seed(&params, risk_signal, now),
                };
                record.note_kinds(finding_kinds);
                let bytes = serde_json::to_vec(&record).map_err(|e| {
                    EngineError::Persistence(format!("encoding pattern record {signature}: {e}"))
                })?;
                updated = Some(record);
                Ok(bytes)
            })?;

        let updated = updated.ok_or_else(|| {
            EngineError::Persistence("store upsert did not invoke its mutator".to_string())
        })?;
        log::debug!(
            "pattern {signature}: occurrences={} bug_risk={:.3}",
            updated.occurrence_count,
            updated.bug_risk
        );

        Ok(Observation {
            signature,
            construct_index,
            prior,
            updated,
        })
    }

    /// Read a record without updating it.
    pub fn read(&self, signature: PatternSignature) -> Result<Option<PatternRecord>, EngineError> {
        let bytes = self.store.get(Entity::Patterns, &signature.store_key())?;
        Ok(bytes.and_then(|b| serde_json::from_slice(&b).ok()))
    }

    /// Blend a static base confidence with learned history.
    ///
    /// `final = clamp(base*(1-beta) + bug_risk*beta, 0, 1)` - history nudges
    /// but never overrides a single static judgement. An unseen signature
    /// calibrates to the base unchanged. Deterministic in (base, record).
    pub fn calibrate(&self, base_confidence: f64, record: Option<&PatternRecord>) -> f64 {
        match record {
            Some(record) => {
                let beta = self.params.beta;
                (base_confidence * (1.0 - beta) + record.bug_risk * beta).clamp(0.0, 1.0)
            }
            None => base_confidence,
        }
    }

    /// Confidence of a recurrence-based suggestion: grows with occurrence
    /// count and bug risk, saturating toward 1.0.
    pub fn suggestion_confidence(&self, record: &PatternRecord) -> f64 {
        let n = record.occurrence_count as f64;
        let k = self.params.recurrence_threshold as f64;
        ((n / (n + k)) * (0.5 + 0.5 * record.bug_risk)).clamp(0.0, 1.0)
    }
}

/// Kinds of improvement suggestions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    ListComprehension,
    StringConcatenation,
    InefficientMembership,
    ReduceComplexity,
    SplitFunction,
    RecurrentIssue,
}

impl SuggestionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionKind::ListComprehension => "list_comprehension",
            SuggestionKind::StringConcatenation => "string_concatenation",
            SuggestionKind::InefficientMembership => "inefficient_membership",
            SuggestionKind::ReduceComplexity => "reduce_complexity",
            SuggestionKind::SplitFunction => "split_function",
            SuggestionKind::RecurrentIssue => "recurrent_issue",
        }
    }
}

impl std::fmt::Display for SuggestionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A proposed improvement, independent of any single finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    pub file: String,
    pub kind: SuggestionKind,
    pub line: usize,
    pub original_snippet: String,
    pub suggested_snippet: String,
    pub confidence: f64,
    pub reasoning: String,
}

/// An optimization line pattern with its regex pre-compiled.
pub struct SuggestionMatcher {
    pub kind: SuggestionKind,
    pub regex: regex::Regex,
    pub suggested: String,
    pub reasoning: String,
    pub confidence: f64,
}

/// Compile the configured optimization patterns, failing fast on a bad
/// regex.
pub fn compile_suggestion_patterns(
    patterns: &[crate::config::SuggestionPattern],
) -> Result<Vec<SuggestionMatcher>, EngineError> {
    patterns
        .iter()
        .map(|p| {
            let regex = regex::Regex::new(&p.pattern).map_err(|e| {
                EngineError::config(format!("suggestion {}: invalid pattern: {e}", p.kind))
            })?;
            Ok(SuggestionMatcher {
                kind: p.kind,
                regex,
                suggested: p.suggested.clone(),
                reasoning: p.reasoning.clone(),
                confidence: p.confidence,
            })
        })
        .collect()
}

/// Emit suggestions for one analysis.
///
/// Three triggers: a configured optimization line pattern matches, a metric
/// crosses its configured threshold, or a finding kind has recurred at least
/// K times for a construct's signature. Output ordered by (line, kind).
pub fn emit_suggestions(
    engine: &LearningEngine,
    facts: &FileFacts,
    source: &str,
    observations: &[Observation],
    findings: &[Finding],
    rules: &SuggestionRules,
    matchers: &[SuggestionMatcher],
    detectors: &[CompiledDetector],
) -> Vec<Suggestion> {
    let mut suggestions = Vec::new();

    // Optimization line patterns.
    for matcher in matchers {
        for (idx, line) in source.lines().enumerate() {
            if matcher.regex.is_match(line) {
                suggestions.push(Suggestion {
                    file: facts.path.clone(),
                    kind: matcher.kind,
                    line: idx + 1,
                    original_snippet: line.trim().to_string(),
                    suggested_snippet: matcher.suggested.clone(),
                    confidence: matcher.confidence,
                    reasoning: matcher.reasoning.clone(),
                });
            }
        }
    }

    // Metric thresholds, per function.
    for func in facts.functions() {
        if func.cyclomatic_complexity() > rules.max_function_complexity {
            suggestions.push(Suggestion {
                file: facts.path.clone(),
                kind: SuggestionKind::ReduceComplexity,
                line: func.span.start_line,
                original_snippet: func.name.clone(),
                suggested_snippet: "extract decision-heavy branches into helper functions"
                    .to_string(),
                confidence: 0.6,
                reasoning: format!(
                    "function {} has cyclomatic complexity {}, threshold {}",
                    func.name,
                    func.cyclomatic_complexity(),
                    rules.max_function_complexity
                ),
            });
        }
        if func.span.line_count() > rules.max_function_lines {
            suggestions.push(Suggestion {
                file: facts.path.clone(),
                kind: SuggestionKind::SplitFunction,
                line: func.span.start_line,
                original_snippet: func.name.clone(),
                suggested_snippet: "split into smaller functions with one responsibility each"
                    .to_string(),
                confidence: 0.6,
                reasoning: format!(
                    "function {} spans {} lines, threshold {}",
                    func.name,
                    func.span.line_count(),
                    rules.max_function_lines
                ),
            });
        }
    }

    // Recurrence: a finding kind seen >= K times against one signature.
    let k = engine.params().recurrence_threshold;
    for obs in observations {
        let construct: &ConstructDescriptor = &facts.constructs[obs.construct_index];
        for (kind_name, count) in &obs.updated.kind_counts {
            if *count < k {
                continue;
            }
            let fix = detectors
                .iter()
                .find(|d| d.spec.kind.as_str() == kind_name)
                .map(|d| d.spec.fix_text.clone())
                .unwrap_or_else(|| "address the recurring issue".to_string());
            // Suppress when this run raised no such finding in the construct;
            // the recurrence is then historical, not actionable here.
            let present = findings.iter().any(|f| {
                f.kind.as_str() == kind_name && construct.span.contains_line(f.line)
            });
            if !present {
                continue;
            }
            suggestions.push(Suggestion {
                file: facts.path.clone(),
                kind: SuggestionKind::RecurrentIssue,
                line: construct.span.start_line,
                original_snippet: construct.name.clone(),
                suggested_snippet: fix,
                confidence: engine.suggestion_confidence(&obs.updated),
                reasoning: format!(
                    "{} has recurred {} times for this {} shape (bug risk {:.2})",
                    kind_name,
                    count,
                    construct.kind,
                    obs.updated.bug_risk
                ),
            });
        }
    }

    suggestions.sort_by(|a, b| (a.line, a.kind.as_str()).cmp(&(b.line, b.kind.as_str())));
    suggestions
}
