//! Engine configuration.
//!
//! Everything tunable lives here: the detector registry, suggestion rules,
//! learning parameters, and score weights. `Default` mirrors the built-in
//! heuristic dictionaries; a YAML file can override any part without
//! recompilation. Validation fails fast at construction, before any
//! analysis runs.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::detect::{DetectorSpec, FindingKind, Severity};
use crate::error::EngineError;
use crate::learn::SuggestionKind;

/// Learning-rate and calibration parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningParams {
    /// EMA learning rate for bug-risk updates.
    pub alpha: f64,
    /// Blend weight of learned risk in confidence calibration.
    pub beta: f64,
    /// bug_risk seed when the first observation co-occurs with a finding.
    pub seed_risk_triggered: f64,
    /// bug_risk seed for a clean first observation.
    pub seed_risk_clean: f64,
    /// Recurrence count K at which a finding kind triggers a suggestion.
    pub recurrence_threshold: u32,
}

impl Default for LearningParams {
    fn default() -> Self {
        LearningParams {
            alpha: 0.2,
            beta: 0.3,
            seed_risk_triggered: 1.0,
            seed_risk_clean: 0.05,
            recurrence_threshold: 3,
        }
    }
}

impl LearningParams {
    fn validate(&self) -> Result<(), EngineError> {
        if !(0.0..=1.0).contains(&self.alpha) || self.alpha == 0.0 {
            return Err(EngineError::config(format!(
                "learning alpha {} outside (0,1]",
                self.alpha
            )));
        }
        if !(0.0..=1.0).contains(&self.beta) {
            return Err(EngineError::config(format!(
                "learning beta {} outside [0,1]",
                self.beta
            )));
        }
        for (name, v) in [
            ("seed_risk_triggered", self.seed_risk_triggered),
            ("seed_risk_clean", self.seed_risk_clean),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(EngineError::config(format!("{name} {v} outside [0,1]")));
            }
        }
        if self.recurrence_threshold == 0 {
            return Err(EngineError::config("recurrence_threshold must be >= 1"));
        }
        Ok(())
    }
}

/// One optimization line pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionPattern {
    pub kind: SuggestionKind,
    pub pattern: String,
    /// Replacement guidance shown as the suggested snippet.
    pub suggested: String,
    pub reasoning: String,
    pub confidence: f64,
}

/// Suggestion triggers: optimization patterns and metric thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionRules {
    pub patterns: Vec<SuggestionPattern>,
    /// Per-function cyclomatic complexity above which a refactor is
    /// suggested.
    pub max_function_complexity: usize,
    /// Per-function line count above which a split is suggested.
    pub max_function_lines: usize,
}

impl Default for SuggestionRules {
    fn default() -> Self {
        SuggestionRules {
            patterns: vec![
                SuggestionPattern {
                    kind: SuggestionKind::ListComprehension,
                    pattern: r"^\s+\w+\.append\(".to_string(),
                    suggested: "build the list with a comprehension".to_string(),
                    reasoning: "append inside a loop is usually clearer and faster as a \
                                comprehension"
                        .to_string(),
                    confidence: 0.5,
                },
                SuggestionPattern {
                    kind: SuggestionKind::StringConcatenation,
                    pattern: r#"\w+\s*\+=\s*["']"#.to_string(),
                    suggested: "accumulate parts and join(), or use an f-string".to_string(),
                    reasoning: "repeated string concatenation is quadratic".to_string(),
                    confidence: 0.6,
                },
                SuggestionPattern {
                    kind: SuggestionKind::InefficientMembership,
                    pattern: r"\bin\s+\[".to_string(),
                    suggested: "test membership against a set".to_string(),
                    reasoning: "membership tests on list literals are linear scans".to_string(),
                    confidence: 0.6,
                },
            ],
            max_function_complexity: 10,
            max_function_lines: 50,
        }
    }
}

impl SuggestionRules {
    fn validate(&self) -> Result<(), EngineError> {
        for p in &self.patterns {
            if !(0.0..=1.0).contains(&p.confidence) {
                return Err(EngineError::config(format!(
                    "suggestion {}: confidence {} outside [0,1]",
                    p.kind, p.confidence
                )));
            }
        }
        if self.max_function_complexity == 0 || self.max_function_lines == 0 {
            return Err(EngineError::config("suggestion thresholds must be positive"));
        }
        Ok(())
    }
}

/// Score weights and thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub severity_high: f64,
    pub severity_medium: f64,
    pub severity_low: f64,
    /// Group cap on the summed finding penalties.
    pub findings_cap: f64,
    /// Per-function cyclomatic complexity tolerated without penalty.
    pub complexity_threshold: usize,
    pub complexity_per_point: f64,
    pub complexity_cap: f64,
    pub nesting_threshold: usize,
    pub nesting_per_level: f64,
    pub nesting_cap: f64,
    /// Documented-function ratio below which a penalty applies.
    pub min_doc_ratio: f64,
    pub doc_penalty_cap: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        ScoreWeights {
            severity_high: 10.0,
            severity_medium: 5.0,
            severity_low: 2.0,
            findings_cap: 60.0,
            complexity_threshold: 10,
            complexity_per_point: 3.0,
            complexity_cap: 15.0,
            nesting_threshold: 3,
            nesting_per_level: 4.0,
            nesting_cap: 12.0,
            min_doc_ratio: 0.5,
            doc_penalty_cap: 10.0,
        }
    }
}

impl ScoreWeights {
    fn validate(&self) -> Result<(), EngineError> {
        let nonnegative = [
            ("severity_high", self.severity_high),
            ("severity_medium", self.severity_medium),
            ("severity_low", self.severity_low),
            ("complexity_per_point", self.complexity_per_point),
            ("nesting_per_level", self.nesting_per_level),
        ];
        for (name, v) in nonnegative {
            if v < 0.0 {
                return Err(EngineError::config(format!("score weight {name} is negative")));
            }
        }
        let positive = [
            ("findings_cap", self.findings_cap),
            ("complexity_cap", self.complexity_cap),
            ("nesting_cap", self.nesting_cap),
            ("doc_penalty_cap", self.doc_penalty_cap),
            ("min_doc_ratio", self.min_doc_ratio),
        ];
        for (name, v) in positive {
            if v <= 0.0 {
                return Err(EngineError::config(format!("score cap {name} must be positive")));
            }
        }
        if self.severity_high < self.severity_medium || self.severity_medium < self.severity_low {
            return Err(EngineError::config(format!(
                "severity weights must be ordered high >= medium >= low, got {}/{}/{}",
                self.severity_high, self.severity_medium, self.severity_low
            )));
        }
        Ok(())
    }
}

/// The built-in detector registry.
///
/// Confidence, severity, and fix texts follow the heuristic dictionary the
/// engine grew out of; everything here is overridable.
pub fn default_detectors() -> Vec<DetectorSpec> {
    fn spec(
        kind: FindingKind,
        base_confidence: f64,
        severity: Severity,
        description: &str,
        fix_text: &str,
        pattern: Option<&str>,
        threshold: Option<usize>,
    ) -> DetectorSpec {
        DetectorSpec {
            kind,
            base_confidence,
            severity,
            description: description.to_string(),
            fix_text: fix_text.to_string(),
            pattern: pattern.map(str::to_string),
            threshold,
        }
    }

    vec![
        spec(
            FindingKind::LongLine,
            0.9,
            Severity::Low,
            "line exceeds 120 characters",
            "wrap or restructure the expression",
            Some(r"^.{121,}"),
            None,
        ),
        spec(
            FindingKind::MagicNumber,
            0.5,
            Severity::Low,
            "unexplained numeric literal",
            "name the constant",
            Some(r"(^|[^\w.])\d{2,}([^\w.]|$)"),
            None,
        ),
        spec(
            FindingKind::MutableDefault,
            0.8,
            Severity::High,
            "mutable default argument",
            "default to None and construct inside the function",
            Some(r"def\s+\w+\([^)]*=\s*[\[\{]"),
            None,
        ),
        spec(
            FindingKind::GlobalVariable,
            0.7,
            Severity::Medium,
            "global statement mutates module state",
            "pass state explicitly or wrap it in a class",
            Some(r"^\s*global\s+\w+"),
            None,
        ),
        spec(
            FindingKind::UnusedVariable,
            0.6,
            Severity::Medium,
            "variable assigned but never read",
            "remove the assignment or use the value",
            None,
            None,
        ),
        spec(
            FindingKind::BareHandler,
            0.9,
            Severity::High,
            "exception handler with no type filter",
            "catch specific exception types",
            None,
            None,
        ),
        spec(
            FindingKind::DeepNesting,
            0.7,
            Severity::Medium,
            "deeply nested control flow",
            "flatten with early returns or helper functions",
            None,
            Some(3),
        ),
        spec(
            FindingKind::HighBranchCount,
            0.6,
            Severity::Medium,
            "function branches heavily",
            "split decision logic or use a dispatch table",
            None,
            Some(8),
        ),
        spec(
            FindingKind::TooManyArguments,
            0.6,
            Severity::Low,
            "function takes many arguments",
            "group related parameters into a value object",
            None,
            Some(5),
        ),
        spec(
            FindingKind::MissingDocstring,
            0.5,
            Severity::Low,
            "function has no docstring",
            "document what the function does",
            None,
            None,
        ),
        spec(
            FindingKind::LongFunction,
            0.6,
            Severity::Medium,
            "function body is very long",
            "extract cohesive sections into helpers",
            None,
            Some(50),
        ),
    ]
}

/// Complete engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_detectors")]
    pub detectors: Vec<DetectorSpec>,
    #[serde(default)]
    pub learning: LearningParams,
    #[serde(default)]
    pub suggestions: SuggestionRules,
    #[serde(default)]
    pub score: ScoreWeights,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            detectors: default_detectors(),
            learning: LearningParams::default(),
            suggestions: SuggestionRules::default(),
            score: ScoreWeights::default(),
        }
    }
}

impl EngineConfig {
    /// Load a configuration from a YAML file. Missing sections fall back to
    /// the defaults.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            EngineError::config(format!("reading {}: {e}", path.as_ref().display()))
        })?;
        let config: EngineConfig = serde_yaml::from_str(&content)
            .map_err(|e| EngineError::config(format!("decoding config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate parameter ranges. Regex compilation is checked separately
    /// when the engine compiles the registries.
    pub fn validate(&self) -> Result<(), EngineError> {
        self.learning.validate()?;
        self.suggestions.validate()?;
        self.score.validate()?;
        Ok(())
    }
}
