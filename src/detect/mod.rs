//! Heuristic defect detectors.
//!
//! Detection is a registry of independent matchers, each tied to one
//! `FindingKind`. Matchers are either line-oriented (regex over source lines)
//! or structural (over construct descriptors and name facts). The registry
//! contents - thresholds, base confidences, severities, fix texts - are
//! configuration supplied at engine construction; the matcher implementations
//! themselves form a closed enumeration.
//!
//! Output is deterministic: ordered by (line, kind), independent of call
//! order and of any prior analysis history.

mod line;
mod structural;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::facts::FileFacts;

/// Severity of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }

    /// Whether findings of this severity count as a bug-risk signal.
    pub fn is_risk_signal(&self) -> bool {
        matches!(self, Severity::High | Severity::Medium)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Closed enumeration of finding kinds.
///
/// Extend detection by adding a variant and its matcher arm, not by runtime
/// patching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    LongLine,
    MagicNumber,
    MutableDefault,
    GlobalVariable,
    UnusedVariable,
    BareHandler,
    DeepNesting,
    HighBranchCount,
    TooManyArguments,
    MissingDocstring,
    LongFunction,
}

impl FindingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingKind::LongLine => "long_line",
            FindingKind::MagicNumber => "magic_number",
            FindingKind::MutableDefault => "mutable_default",
            FindingKind::GlobalVariable => "global_variable",
            FindingKind::UnusedVariable => "unused_variable",
            FindingKind::BareHandler => "bare_handler",
            FindingKind::DeepNesting => "deep_nesting",
            FindingKind::HighBranchCount => "high_branch_count",
            FindingKind::TooManyArguments => "too_many_arguments",
            FindingKind::MissingDocstring => "missing_docstring",
            FindingKind::LongFunction => "long_function",
        }
    }

    /// Line-oriented kinds match a regex per source line; the rest operate on
    /// construct descriptors.
    pub fn is_line_oriented(&self) -> bool {
        matches!(
            self,
            FindingKind::LongLine
                | FindingKind::MagicNumber
                | FindingKind::MutableDefault
                | FindingKind::GlobalVariable
        )
    }
}

impl std::fmt::Display for FindingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One detector registration: kind, matcher parameters, and the metadata its
/// findings carry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorSpec {
    pub kind: FindingKind,
    /// Static confidence in [0,1] before any learned calibration.
    pub base_confidence: f64,
    pub severity: Severity,
    pub description: String,
    pub fix_text: String,
    /// Regex for line-oriented kinds; ignored for structural kinds.
    #[serde(default)]
    pub pattern: Option<String>,
    /// Threshold for structural kinds that compare against a limit.
    #[serde(default)]
    pub threshold: Option<usize>,
}

/// A detector with its regex pre-compiled.
pub struct CompiledDetector {
    pub spec: DetectorSpec,
    pub regex: Option<Regex>,
}

/// Compile and validate a detector registry.
///
/// Fails fast with `Configuration` on a bad regex, a confidence outside
/// [0,1], or a missing pattern on a line-oriented kind.
pub fn compile(specs: &[DetectorSpec]) -> Result<Vec<CompiledDetector>, EngineError> {
    let mut compiled = Vec::with_capacity(specs.len());
    for spec in specs {
        if !(0.0..=1.0).contains(&spec.base_confidence) {
            return Err(EngineError::config(format!(
                "detector {}: base_confidence {} outside [0,1]",
                spec.kind, spec.base_confidence
            )));
        }
        let regex = if spec.kind.is_line_oriented() {
            let pattern = spec.pattern.as_deref().ok_or_else(|| {
                EngineError::config(format!("detector {}: missing line pattern", spec.kind))
            })?;
            Some(Regex::new(pattern).map_err(|e| {
                EngineError::config(format!("detector {}: invalid pattern: {e}", spec.kind))
            })?)
        } else {
            if spec.threshold == Some(0) {
                return Err(EngineError::config(format!(
                    "detector {}: threshold must be positive",
                    spec.kind
                )));
            }
            None
        };
        compiled.push(CompiledDetector {
            spec: spec.clone(),
            regex,
        });
    }
    Ok(compiled)
}

/// A candidate defect flagged at a location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub file: String,
    pub line: usize,
    pub kind: FindingKind,
    pub base_confidence: f64,
    /// Equals `base_confidence` until the learning engine calibrates it.
    pub final_confidence: f64,
    pub severity: Severity,
    pub description: String,
    pub fix_text: String,
}

impl Finding {
    pub(crate) fn from_spec(spec: &DetectorSpec, file: &str, line: usize) -> Self {
        Finding {
            file: file.to_string(),
            line,
            kind: spec.kind,
            base_confidence: spec.base_confidence,
            final_confidence: spec.base_confidence,
            severity: spec.severity,
            description: spec.description.clone(),
            fix_text: spec.fix_text.clone(),
        }
    }
}

/// Run the full registry against one file's facts and source.
pub fn run(facts: &FileFacts, source: &str, detectors: &[CompiledDetector]) -> Vec<Finding> {
    let mut findings = Vec::new();
    for det in detectors {
        if det.spec.kind.is_line_oriented() {
            line::scan(det, facts, source, &mut findings);
        } else {
            structural::scan(det, facts, &mut findings);
        }
    }
    findings.sort_by(|a, b| (a.line, a.kind.as_str()).cmp(&(b.line, b.kind.as_str())));
    findings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(kind: FindingKind) -> DetectorSpec {
        DetectorSpec {
            kind,
            base_confidence: 0.5,
            severity: Severity::Low,
            description: "d".to_string(),
            fix_text: "f".to_string(),
            pattern: kind.is_line_oriented().then(|| "x".to_string()),
            threshold: None,
        }
    }

    #[test]
    fn compile_rejects_confidence_out_of_range() {
        let mut s = spec(FindingKind::LongLine);
        s.base_confidence = 1.5;
        assert!(matches!(compile(&[s]), Err(EngineError::Configuration(_))));
    }

    #[test]
    fn compile_rejects_bad_regex() {
        let mut s = spec(FindingKind::MagicNumber);
        s.pattern = Some("([".to_string());
        assert!(matches!(compile(&[s]), Err(EngineError::Configuration(_))));
    }

    #[test]
    fn compile_rejects_missing_pattern() {
        let mut s = spec(FindingKind::GlobalVariable);
        s.pattern = None;
        assert!(matches!(compile(&[s]), Err(EngineError::Configuration(_))));
    }

    #[test]
    fn compile_rejects_zero_threshold() {
        let mut s = spec(FindingKind::DeepNesting);
        s.threshold = Some(0);
        assert!(matches!(compile(&[s]), Err(EngineError::Configuration(_))));
    }

    #[test]
    fn run_orders_by_line_then_kind() {
        let detectors = compile(&crate::config::default_detectors()).unwrap();
        let source = "global x\ny = 123456\nz = 654321\n";
        let facts = FileFacts {
            path: "t.py".to_string(),
            ..Default::default()
        };

        let findings = run(&facts, source, &detectors);
        assert!(findings.len() >= 3);
        let lines: Vec<usize> = findings.iter().map(|f| f.line).collect();
        let mut sorted = lines.clone();
        sorted.sort();
        assert_eq!(lines, sorted);
    }
}
