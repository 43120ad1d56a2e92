//! Quality scoring.
//!
//! `score = clamp(100 - metric penalties - finding penalties, 0, 100)`.
//! Every metric penalty is individually capped so one outlier metric cannot
//! floor the score alone; finding penalties are severity-weighted, scaled by
//! final confidence, and capped as a group. Pure function of
//! (CodeMetrics, Findings) - no hidden state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::ScoreWeights;
use crate::detect::{Finding, Severity};
use crate::extract::CodeMetrics;

/// The calculated quality score with its penalty breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityScore {
    /// Bounded score in [0,100]; higher is better.
    pub score: f64,
    /// Total penalty from metrics, after per-metric caps.
    pub metric_penalty: f64,
    /// Total penalty from findings, after the group cap.
    pub finding_penalty: f64,
    /// Penalty per source, keyed by metric or finding-kind name.
    pub breakdown: BTreeMap<String, f64>,
}

/// Severity weight for a finding.
pub fn severity_weight(weights: &ScoreWeights, severity: Severity) -> f64 {
    match severity {
        Severity::High => weights.severity_high,
        Severity::Medium => weights.severity_medium,
        Severity::Low => weights.severity_low,
    }
}

/// Score one file from its metrics and calibrated findings.
pub fn evaluate(metrics: &CodeMetrics, findings: &[Finding], weights: &ScoreWeights) -> QualityScore {
    let mut breakdown = BTreeMap::new();

    // Piecewise metric penalties, each capped on its own.
    let mut metric_penalty = 0.0;

    if metrics.cyclomatic_max > weights.complexity_threshold {
        let over = (metrics.cyclomatic_max - weights.complexity_threshold) as f64;
        let p = (over * weights.complexity_per_point).min(weights.complexity_cap);
        breakdown.insert("cyclomatic_max".to_string(), p);
        metric_penalty += p;
    }

    if metrics.max_nesting_depth > weights.nesting_threshold {
        let over = (metrics.max_nesting_depth - weights.nesting_threshold) as f64;
        let p = (over * weights.nesting_per_level).min(weights.nesting_cap);
        breakdown.insert("max_nesting_depth".to_string(), p);
        metric_penalty += p;
    }

    if metrics.doc_ratio < weights.min_doc_ratio {
        let gap = weights.min_doc_ratio - metrics.doc_ratio;
        let p = (gap / weights.min_doc_ratio * weights.doc_penalty_cap).min(weights.doc_penalty_cap);
        breakdown.insert("doc_ratio".to_string(), p);
        metric_penalty += p;
    }

    // Severity-weighted finding penalties, scaled by calibrated confidence.
    let mut finding_penalty = 0.0;
    for finding in findings {
        let p = severity_weight(weights, finding.severity) * finding.final_confidence;
        *breakdown.entry(finding.kind.as_str().to_string()).or_insert(0.0) += p;
        finding_penalty += p;
    }
    finding_penalty = finding_penalty.min(weights.findings_cap);

    QualityScore {
        score: (100.0 - metric_penalty - finding_penalty).clamp(0.0, 100.0),
        metric_penalty,
        finding_penalty,
        breakdown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::FindingKind;

    fn finding(kind: FindingKind, severity: Severity, confidence: f64) -> Finding {
        Finding {
            file: "t.py".to_string(),
            line: 1,
            kind,
            base_confidence: confidence,
            final_confidence: confidence,
            severity,
            description: "d".to_string(),
            fix_text: "f".to_string(),
        }
    }

    fn clean_metrics() -> CodeMetrics {
        CodeMetrics {
            doc_ratio: 1.0,
            ..Default::default()
        }
    }

    #[test]
    fn clean_file_scores_100() {
        let score = evaluate(&clean_metrics(), &[], &ScoreWeights::default());
        assert_eq!(score.score, 100.0);
        assert!(score.breakdown.is_empty());
    }

    #[test]
    fn no_findings_means_metric_penalties_only() {
        let metrics = CodeMetrics {
            cyclomatic_max: 14,
            doc_ratio: 1.0,
            ..Default::default()
        };
        let weights = ScoreWeights::default();
        let score = evaluate(&metrics, &[], &weights);

        let expected = (14 - weights.complexity_threshold) as f64 * weights.complexity_per_point;
        assert_eq!(score.score, 100.0 - expected);
        assert_eq!(score.finding_penalty, 0.0);
    }

    #[test]
    fn finding_penalties_are_severity_weighted_and_confidence_scaled() {
        let weights = ScoreWeights::default();
        let findings = vec![
            finding(FindingKind::BareHandler, Severity::High, 0.9),
            finding(FindingKind::UnusedVariable, Severity::Medium, 0.5),
        ];
        let score = evaluate(&clean_metrics(), &findings, &weights);

        let expected = weights.severity_high * 0.9 + weights.severity_medium * 0.5;
        assert!((score.finding_penalty - expected).abs() < 1e-9);
        assert!((score.score - (100.0 - expected)).abs() < 1e-9);
    }

    #[test]
    fn single_outlier_metric_cannot_floor_the_score() {
        let metrics = CodeMetrics {
            cyclomatic_max: 10_000,
            doc_ratio: 1.0,
            ..Default::default()
        };
        let weights = ScoreWeights::default();
        let score = evaluate(&metrics, &[], &weights);
        assert_eq!(score.metric_penalty, weights.complexity_cap);
        assert!(score.score >= 100.0 - weights.complexity_cap);
    }

    #[test]
    fn score_floors_at_zero_under_heavy_findings() {
        let metrics = CodeMetrics {
            cyclomatic_max: 10_000,
            max_nesting_depth: 100,
            doc_ratio: 0.0,
            ..Default::default()
        };
        let findings: Vec<_> = (0..50)
            .map(|_| finding(FindingKind::BareHandler, Severity::High, 1.0))
            .collect();
        let score = evaluate(&metrics, &findings, &ScoreWeights::default());
        assert!(score.score >= 0.0);
        assert!(score.score <= 100.0);
        // The group cap bounds findings even when their raw sum is huge.
        assert_eq!(score.finding_penalty, ScoreWeights::default().findings_cap);
    }
}
