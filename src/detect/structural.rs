//! Structural matchers over construct descriptors and name facts.

use crate::facts::{ConstructKind, FileFacts};

use super::{CompiledDetector, Finding, FindingKind};

/// Dispatch a structural detector against the file facts.
pub(super) fn scan(det: &CompiledDetector, facts: &FileFacts, findings: &mut Vec<Finding>) {
    match det.spec.kind {
        FindingKind::BareHandler => bare_handlers(det, facts, findings),
        FindingKind::UnusedVariable => unused_variables(det, facts, findings),
        FindingKind::DeepNesting => {
            function_over(det, facts, findings, |f| f.nesting_depth, 3);
        }
        FindingKind::HighBranchCount => {
            function_over(det, facts, findings, |f| f.branch_count, 8);
        }
        FindingKind::TooManyArguments => {
            function_over(det, facts, findings, |f| f.arg_count, 5);
        }
        FindingKind::LongFunction => {
            function_over(det, facts, findings, |f| f.span.line_count(), 50);
        }
        FindingKind::MissingDocstring => missing_docstrings(det, facts, findings),
        // Line-oriented kinds never reach here.
        _ => {}
    }
}

/// Exception handlers with no type filter.
fn bare_handlers(det: &CompiledDetector, facts: &FileFacts, findings: &mut Vec<Finding>) {
    for handler in facts.constructs_of(ConstructKind::Handler) {
        if !handler.handler_has_filter {
            findings.push(Finding::from_spec(
                &det.spec,
                &facts.path,
                handler.span.start_line,
            ));
        }
    }
}

/// Names assigned but never read.
///
/// A binding whose name occurs exactly once in the file is only ever written.
/// Underscore-prefixed names are conventionally intentional discards.
fn unused_variables(det: &CompiledDetector, facts: &FileFacts, findings: &mut Vec<Finding>) {
    let mut seen = std::collections::HashSet::new();
    for binding in &facts.bindings {
        if binding.name.starts_with('_') {
            continue;
        }
        if facts.name_uses.get(&binding.name).copied().unwrap_or(0) > 1 {
            continue;
        }
        if seen.insert((binding.name.clone(), binding.line)) {
            findings.push(Finding::from_spec(&det.spec, &facts.path, binding.line));
        }
    }
}

/// Functions whose measured value exceeds the configured threshold.
fn function_over(
    det: &CompiledDetector,
    facts: &FileFacts,
    findings: &mut Vec<Finding>,
    measure: impl Fn(&crate::facts::ConstructDescriptor) -> usize,
    default_threshold: usize,
) {
    let threshold = det.spec.threshold.unwrap_or(default_threshold);
    for func in facts.functions() {
        if measure(func) > threshold {
            findings.push(Finding::from_spec(
                &det.spec,
                &facts.path,
                func.span.start_line,
            ));
        }
    }
}

/// Functions without a docstring. Dunder methods are exempt.
fn missing_docstrings(det: &CompiledDetector, facts: &FileFacts, findings: &mut Vec<Finding>) {
    for func in facts.functions() {
        if !func.has_doc && !func.name.starts_with("__") {
            findings.push(Finding::from_spec(
                &det.spec,
                &facts.path,
                func.span.start_line,
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{compile, DetectorSpec, Severity};
    use crate::facts::{Binding, ConstructDescriptor, Span};

    fn detector(kind: FindingKind, threshold: Option<usize>) -> CompiledDetector {
        compile(&[DetectorSpec {
            kind,
            base_confidence: 0.7,
            severity: Severity::Medium,
            description: "test".to_string(),
            fix_text: "fix".to_string(),
            pattern: None,
            threshold,
        }])
        .unwrap()
        .pop()
        .unwrap()
    }

    fn func(name: &str, nesting: usize, args: usize, doc: bool) -> ConstructDescriptor {
        ConstructDescriptor {
            kind: ConstructKind::Function,
            name: name.to_string(),
            span: Span::new(1, 5),
            arg_count: args,
            branch_count: 0,
            loop_count: 0,
            bool_op_count: 0,
            nesting_depth: nesting,
            has_doc: doc,
            has_handler: false,
            handler_has_filter: false,
            handler_count: 0,
        }
    }

    #[test]
    fn bare_handler_flagged_typed_handler_not() {
        let mut handler = func("<except>", 0, 0, false);
        handler.kind = ConstructKind::Handler;
        handler.span = Span::new(12, 13);
        let mut typed = handler.clone();
        typed.handler_has_filter = true;
        typed.span = Span::new(20, 21);

        let facts = FileFacts {
            path: "t.py".to_string(),
            constructs: vec![handler, typed],
            ..Default::default()
        };

        let mut findings = Vec::new();
        scan(&detector(FindingKind::BareHandler, None), &facts, &mut findings);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].line, 12);
    }

    #[test]
    fn unused_variable_skips_underscore_and_read_names() {
        let facts = FileFacts {
            path: "t.py".to_string(),
            bindings: vec![
                Binding {
                    name: "dead".to_string(),
                    line: 3,
                },
                Binding {
                    name: "_ignored".to_string(),
                    line: 4,
                },
                Binding {
                    name: "live".to_string(),
                    line: 5,
                },
            ],
            name_uses: [("dead".to_string(), 1), ("live".to_string(), 3)]
                .into_iter()
                .collect(),
            ..Default::default()
        };

        let mut findings = Vec::new();
        scan(
            &detector(FindingKind::UnusedVariable, None),
            &facts,
            &mut findings,
        );
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].line, 3);
    }

    #[test]
    fn threshold_detectors_respect_config() {
        let facts = FileFacts {
            path: "t.py".to_string(),
            constructs: vec![func("f", 2, 0, true)],
            ..Default::default()
        };

        let mut findings = Vec::new();
        scan(
            &detector(FindingKind::DeepNesting, Some(1)),
            &facts,
            &mut findings,
        );
        assert_eq!(findings.len(), 1);

        findings.clear();
        scan(
            &detector(FindingKind::DeepNesting, Some(4)),
            &facts,
            &mut findings,
        );
        assert!(findings.is_empty());
    }

    #[test]
    fn missing_docstring_exempts_dunders() {
        let facts = FileFacts {
            path: "t.py".to_string(),
            constructs: vec![func("__init__", 0, 1, false), func("work", 0, 1, false)],
            ..Default::default()
        };

        let mut findings = Vec::new();
        scan(
            &detector(FindingKind::MissingDocstring, None),
            &facts,
            &mut findings,
        );
        assert_eq!(findings.len(), 1);
    }
}
