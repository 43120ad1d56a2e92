//! Aggregate per-file metrics from normalized facts.

use serde::{Deserialize, Serialize};

use crate::facts::{ConstructKind, FileFacts, ImportOrigin};

/// Naming and style observations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleFlags {
    /// Whether the module carries a docstring.
    pub has_module_doc: bool,
    /// Whether all function names follow snake_case.
    pub snake_case_names: bool,
}

/// Import counts per origin category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportCounts {
    pub standard: usize,
    pub third_party: usize,
    pub relative: usize,
}

impl ImportCounts {
    pub fn total(&self) -> usize {
        self.standard + self.third_party + self.relative
    }
}

/// Immutable per-file metrics snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeMetrics {
    pub lines_of_code: usize,
    /// Sum of per-function cyclomatic complexity.
    pub cyclomatic_total: usize,
    /// Max per-function cyclomatic complexity.
    pub cyclomatic_max: usize,
    /// Max per-function nesting depth.
    pub max_nesting_depth: usize,
    pub function_count: usize,
    pub class_count: usize,
    /// Mean function span length in lines (0.0 when no functions).
    pub avg_function_length: f64,
    /// Comment lines / total lines.
    pub comment_ratio: f64,
    /// Documented functions / functions (1.0 when no functions).
    pub doc_ratio: f64,
    /// Mean argument count across functions.
    pub avg_args: f64,
    /// Imports grouped by origin.
    pub imports: ImportCounts,
    pub style: StyleFlags,
}

/// Fold facts and raw text into a `CodeMetrics` snapshot.
///
/// Total over well-formed facts; every code shape yields a value.
pub fn metrics(facts: &FileFacts, source: &str) -> CodeMetrics {
    let lines: Vec<&str> = source.lines().collect();
    let lines_of_code = lines.len();
    let comment_lines = lines
        .iter()
        .filter(|l| l.trim_start().starts_with('#'))
        .count();

    let functions: Vec<_> = facts.functions().collect();
    let function_count = functions.len();
    let class_count = facts.constructs_of(ConstructKind::Class).count();

    let cyclomatic_total: usize = functions.iter().map(|f| f.cyclomatic_complexity()).sum();
    let cyclomatic_max = functions
        .iter()
        .map(|f| f.cyclomatic_complexity())
        .max()
        .unwrap_or(0);
    let max_nesting_depth = functions
        .iter()
        .map(|f| f.nesting_depth)
        .max()
        .unwrap_or(0);

    let avg_function_length = if function_count == 0 {
        0.0
    } else {
        functions
            .iter()
            .map(|f| f.span.line_count() as f64)
            .sum::<f64>()
            / function_count as f64
    };

    let doc_ratio = if function_count == 0 {
        1.0
    } else {
        functions.iter().filter(|f| f.has_doc).count() as f64 / function_count as f64
    };

    let avg_args = if function_count == 0 {
        0.0
    } else {
        functions.iter().map(|f| f.arg_count as f64).sum::<f64>() / function_count as f64
    };

    let snake_case_names = functions.iter().all(|f| is_snake_case(&f.name));

    let mut imports = ImportCounts::default();
    for import in &facts.imports {
        match import.origin {
            ImportOrigin::Standard => imports.standard += 1,
            ImportOrigin::ThirdParty => imports.third_party += 1,
            ImportOrigin::Relative => imports.relative += 1,
        }
    }

    CodeMetrics {
        lines_of_code,
        cyclomatic_total,
        cyclomatic_max,
        max_nesting_depth,
        function_count,
        class_count,
        avg_function_length,
        comment_ratio: if lines_of_code == 0 {
            0.0
        } else {
            comment_lines as f64 / lines_of_code as f64
        },
        doc_ratio,
        avg_args,
        imports,
        style: StyleFlags {
            has_module_doc: facts.has_module_doc,
            snake_case_names,
        },
    }
}

fn is_snake_case(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::{ConstructDescriptor, Span};

    fn func(name: &str, span: Span, branches: usize, doc: bool, args: usize) -> ConstructDescriptor {
        ConstructDescriptor {
            kind: ConstructKind::Function,
            name: name.to_string(),
            span,
            arg_count: args,
            branch_count: branches,
            loop_count: 0,
            bool_op_count: 0,
            nesting_depth: 1,
            has_doc: doc,
            has_handler: false,
            handler_has_filter: false,
            handler_count: 0,
        }
    }

    #[test]
    fn aggregates_function_metrics() {
        let facts = FileFacts {
            has_module_doc: true,
            constructs: vec![
                func("alpha", Span::new(1, 10), 3, true, 2),
                func("beta", Span::new(12, 15), 1, false, 4),
            ],
            ..Default::default()
        };
        let source = "# header\n".to_string() + &"x = 1\n".repeat(19);

        let m = metrics(&facts, &source);
        assert_eq!(m.function_count, 2);
        assert_eq!(m.cyclomatic_total, 4 + 2);
        assert_eq!(m.cyclomatic_max, 4);
        assert_eq!(m.avg_function_length, (10.0 + 4.0) / 2.0);
        assert_eq!(m.doc_ratio, 0.5);
        assert_eq!(m.avg_args, 3.0);
        assert_eq!(m.lines_of_code, 20);
        assert!((m.comment_ratio - 0.05).abs() < 1e-9);
        assert!(m.style.has_module_doc);
        assert!(m.style.snake_case_names);
    }

    #[test]
    fn empty_facts_are_total() {
        let m = metrics(&FileFacts::default(), "");
        assert_eq!(m.function_count, 0);
        assert_eq!(m.cyclomatic_max, 0);
        assert_eq!(m.doc_ratio, 1.0);
        assert_eq!(m.avg_function_length, 0.0);
    }

    #[test]
    fn import_counts_group_by_origin() {
        use crate::facts::{Import, ImportOrigin};

        let facts = FileFacts {
            imports: vec![
                Import {
                    module: "os".to_string(),
                    origin: ImportOrigin::Standard,
                    line: 1,
                },
                Import {
                    module: "json".to_string(),
                    origin: ImportOrigin::Standard,
                    line: 2,
                },
                Import {
                    module: "requests".to_string(),
                    origin: ImportOrigin::ThirdParty,
                    line: 3,
                },
                Import {
                    module: ".util".to_string(),
                    origin: ImportOrigin::Relative,
                    line: 4,
                },
            ],
            ..Default::default()
        };

        let m = metrics(&facts, "import os\n");
        assert_eq!(m.imports.standard, 2);
        assert_eq!(m.imports.third_party, 1);
        assert_eq!(m.imports.relative, 1);
        assert_eq!(m.imports.total(), 4);
    }

    #[test]
    fn camel_case_clears_style_flag() {
        let facts = FileFacts {
            constructs: vec![func("doThing", Span::new(1, 2), 0, false, 0)],
            ..Default::default()
        };
        assert!(!metrics(&facts, "pass\n").style.snake_case_names);
    }
}
