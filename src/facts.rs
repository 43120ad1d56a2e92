//! Normalized facts supplied by a parser front end.
//!
//! The core never inspects syntax trees directly. A front end (see the
//! `frontend` module) reduces each file to `FileFacts`: one descriptor per
//! syntactic construct plus the line-level name facts detectors need. Any
//! front end that fills these structures can drive the engine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Source location span (1-indexed lines).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start_line: usize,
    pub end_line: usize,
}

impl Span {
    pub fn new(start_line: usize, end_line: usize) -> Self {
        Self {
            start_line,
            end_line,
        }
    }

    /// Whether a line falls inside this span.
    pub fn contains_line(&self, line: usize) -> bool {
        line >= self.start_line && line <= self.end_line
    }

    /// Number of source lines covered.
    pub fn line_count(&self) -> usize {
        self.end_line.saturating_sub(self.start_line) + 1
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start_line, self.end_line)
    }
}

/// Kind of syntactic construct a descriptor summarizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstructKind {
    Function,
    Class,
    Loop,
    Handler,
}

impl ConstructKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConstructKind::Function => "function",
            ConstructKind::Class => "class",
            ConstructKind::Loop => "loop",
            ConstructKind::Handler => "handler",
        }
    }

    /// Stable numeric tag used in signature feature vectors.
    pub fn tag(&self) -> u8 {
        match self {
            ConstructKind::Function => 0,
            ConstructKind::Class => 1,
            ConstructKind::Loop => 2,
            ConstructKind::Handler => 3,
        }
    }
}

impl fmt::Display for ConstructKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Shape summary of one syntactic construct.
///
/// Everything the signature builder hashes lives here; names are carried for
/// reporting but are excluded from signatures by construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstructDescriptor {
    pub kind: ConstructKind,
    /// Declared name, or a placeholder like `<loop>` for anonymous constructs.
    pub name: String,
    pub span: Span,
    /// Declared parameter count (functions only, 0 otherwise).
    pub arg_count: usize,
    /// Number of conditional branches (if/elif, ternaries, match arms).
    pub branch_count: usize,
    /// Number of loop statements.
    pub loop_count: usize,
    /// Number of boolean combinators (and/or).
    pub bool_op_count: usize,
    /// Max nested compound-statement depth inside the construct body.
    pub nesting_depth: usize,
    /// Whether a docstring/documentation comment is present.
    pub has_doc: bool,
    /// Whether the construct contains exception handling.
    pub has_handler: bool,
    /// Handlers only: whether an exception type filter is present.
    pub handler_has_filter: bool,
    /// Number of exception handler clauses inside the construct.
    pub handler_count: usize,
}

impl ConstructDescriptor {
    /// Cyclomatic complexity: 1 + decision points.
    ///
    /// Decision points: branches, loops, boolean combinators, handlers.
    pub fn cyclomatic_complexity(&self) -> usize {
        1 + self.branch_count + self.loop_count + self.bool_op_count + self.handler_count
    }
}

/// A name bound by an assignment, with the line it occurs on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Binding {
    pub name: String,
    pub line: usize,
}

/// Where an imported module comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportOrigin {
    Standard,
    ThirdParty,
    Relative,
}

impl ImportOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportOrigin::Standard => "standard",
            ImportOrigin::ThirdParty => "third_party",
            ImportOrigin::Relative => "relative",
        }
    }
}

impl fmt::Display for ImportOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One imported module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Import {
    /// Dotted module path as written (leading dots kept for relative
    /// imports).
    pub module: String,
    pub origin: ImportOrigin,
    pub line: usize,
}

/// All normalized facts extracted from a single file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileFacts {
    /// File path as reported to callers.
    pub path: String,
    /// Whether the module itself carries a docstring.
    pub has_module_doc: bool,
    /// Construct descriptors in source order.
    pub constructs: Vec<ConstructDescriptor>,
    /// Assignment targets, in source order.
    pub bindings: Vec<Binding>,
    /// Imported modules, in source order.
    pub imports: Vec<Import>,
    /// Identifier occurrence counts across the file (reads and writes).
    pub name_uses: std::collections::HashMap<String, usize>,
}

impl FileFacts {
    /// Descriptors of a given kind, in source order.
    pub fn constructs_of(&self, kind: ConstructKind) -> impl Iterator<Item = &ConstructDescriptor> {
        self.constructs.iter().filter(move |c| c.kind == kind)
    }

    /// Functions only.
    pub fn functions(&self) -> impl Iterator<Item = &ConstructDescriptor> {
        self.constructs_of(ConstructKind::Function)
    }

    /// The innermost construct whose span contains the given line.
    pub fn construct_at_line(&self, line: usize) -> Option<&ConstructDescriptor> {
        self.construct_index_at_line(line).map(|i| &self.constructs[i])
    }

    /// Index of the innermost construct containing the given line.
    pub fn construct_index_at_line(&self, line: usize) -> Option<usize> {
        self.constructs
            .iter()
            .enumerate()
            .filter(|(_, c)| c.span.contains_line(line))
            .min_by_key(|(_, c)| c.span.line_count())
            .map(|(i, _)| i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(kind: ConstructKind, start: usize, end: usize) -> ConstructDescriptor {
        ConstructDescriptor {
            kind,
            name: "x".to_string(),
            span: Span::new(start, end),
            arg_count: 0,
            branch_count: 0,
            loop_count: 0,
            bool_op_count: 0,
            nesting_depth: 0,
            has_doc: false,
            has_handler: false,
            handler_has_filter: false,
            handler_count: 0,
        }
    }

    #[test]
    fn cyclomatic_complexity_counts_decision_points() {
        let mut d = descriptor(ConstructKind::Function, 1, 10);
        assert_eq!(d.cyclomatic_complexity(), 1);

        d.branch_count = 2;
        d.loop_count = 1;
        d.bool_op_count = 1;
        d.handler_count = 1;
        assert_eq!(d.cyclomatic_complexity(), 6);
    }

    #[test]
    fn construct_at_line_prefers_innermost() {
        let facts = FileFacts {
            constructs: vec![
                descriptor(ConstructKind::Function, 1, 20),
                descriptor(ConstructKind::Loop, 5, 8),
            ],
            ..Default::default()
        };

        let hit = facts.construct_at_line(6).unwrap();
        assert_eq!(hit.kind, ConstructKind::Loop);
        let hit = facts.construct_at_line(15).unwrap();
        assert_eq!(hit.kind, ConstructKind::Function);
        assert!(facts.construct_at_line(40).is_none());
    }
}
