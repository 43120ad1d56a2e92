//! Python front end using tree-sitter.

use tree_sitter::{Language, Node, Parser};

use crate::error::EngineError;
use crate::facts::{
    Binding, ConstructDescriptor, ConstructKind, FileFacts, Import, ImportOrigin, Span,
};
use crate::frontend::FrontEnd;

/// Standard-library root modules, sorted for binary search.
const STDLIB_MODULES: &[&str] = &[
    "calendar",
    "collections",
    "csv",
    "dataclasses",
    "datetime",
    "email",
    "enum",
    "functools",
    "html",
    "http",
    "itertools",
    "json",
    "locale",
    "logging",
    "operator",
    "os",
    "pathlib",
    "pickle",
    "platform",
    "sqlite3",
    "sys",
    "time",
    "typing",
    "unittest",
    "urllib",
    "xml",
];

/// Tree-sitter backed Python parser producing normalized facts.
pub struct PythonFrontEnd {
    language: Language,
}

impl PythonFrontEnd {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_python::LANGUAGE.into(),
        }
    }

    fn create_parser(&self) -> Result<Parser, EngineError> {
        let mut parser = Parser::new();
        parser
            .set_language(&self.language)
            .map_err(|e| EngineError::config(format!("loading python grammar: {e}")))?;
        Ok(parser)
    }
}

impl Default for PythonFrontEnd {
    fn default() -> Self {
        Self::new()
    }
}

impl FrontEnd for PythonFrontEnd {
    fn language_id(&self) -> &'static str {
        "python"
    }

    fn extract(&self, path: &str, source: &str) -> Result<FileFacts, EngineError> {
        if source.trim().is_empty() {
            return Err(EngineError::parse(path, "empty source"));
        }

        let mut parser = self.create_parser()?;
        let tree = parser
            .parse(source.as_bytes(), None)
            .ok_or_else(|| EngineError::parse(path, "tree-sitter returned no tree"))?;

        let root = tree.root_node();
        if root.has_error() {
            return Err(EngineError::parse(path, "syntax errors in source"));
        }

        let mut facts = FileFacts {
            path: path.to_string(),
            has_module_doc: block_has_docstring(root, source),
            ..Default::default()
        };

        collect_constructs(root, source, &mut facts);
        collect_name_facts(root, source, &mut facts);

        // Source order keeps detector and signature output deterministic.
        facts
            .constructs
            .sort_by_key(|c| (c.span.start_line, c.kind.tag()));
        Ok(facts)
    }
}

fn node_text<'a>(node: Node, source: &'a str) -> &'a str {
    &source[node.byte_range()]
}

fn span_of(node: Node) -> Span {
    Span::new(node.start_position().row + 1, node.end_position().row + 1)
}

/// Walk the tree and emit one descriptor per function, class, loop and
/// exception handler, including nested ones.
fn collect_constructs(node: Node, source: &str, facts: &mut FileFacts) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "function_definition" => {
                facts.constructs.push(function_descriptor(child, source));
            }
            "class_definition" => {
                facts.constructs.push(class_descriptor(child, source));
            }
            "for_statement" | "while_statement" => {
                facts.constructs.push(loop_descriptor(child, source));
            }
            "except_clause" => {
                facts.constructs.push(handler_descriptor(child, source));
            }
            "import_statement" | "import_from_statement" => {
                collect_imports(child, source, facts);
            }
            _ => {}
        }
        collect_constructs(child, source, facts);
    }
}

/// Subtree shape counters, excluding the node itself.
#[derive(Default)]
struct ShapeCounts {
    branches: usize,
    loops: usize,
    bool_ops: usize,
    handlers: usize,
    max_depth: usize,
}

fn tally_shape(node: Node, depth: usize, counts: &mut ShapeCounts) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "if_statement" | "elif_clause" | "conditional_expression" | "case_clause" => {
                counts.branches += 1
            }
            "for_statement" | "while_statement" => counts.loops += 1,
            "boolean_operator" => counts.bool_ops += 1,
            "except_clause" => counts.handlers += 1,
            _ => {}
        }
        let next_depth = if is_compound(child.kind()) {
            depth + 1
        } else {
            depth
        };
        counts.max_depth = counts.max_depth.max(next_depth);
        tally_shape(child, next_depth, counts);
    }
}

// elif_clause counts too: a statement under an elif sits as deep as it would
// under the equivalent nested if.
fn is_compound(kind: &str) -> bool {
    matches!(
        kind,
        "if_statement"
            | "elif_clause"
            | "for_statement"
            | "while_statement"
            | "try_statement"
            | "with_statement"
            | "match_statement"
            | "function_definition"
            | "class_definition"
    )
}

fn shape_of(node: Node) -> ShapeCounts {
    let mut counts = ShapeCounts::default();
    tally_shape(node, 0, &mut counts);
    counts
}

fn name_of(node: Node, source: &str) -> String {
    node.child_by_field_name("name")
        .map(|n| node_text(n, source).to_string())
        .unwrap_or_default()
}

fn function_descriptor(node: Node, source: &str) -> ConstructDescriptor {
    let arg_count = node
        .child_by_field_name("parameters")
        .map(|p| {
            let mut cursor = p.walk();
            p.named_children(&mut cursor)
                .filter(|c| c.kind() != "comment")
                .count()
        })
        .unwrap_or(0);

    let body = node.child_by_field_name("body");
    let counts = shape_of(node);

    ConstructDescriptor {
        kind: ConstructKind::Function,
        name: name_of(node, source),
        span: span_of(node),
        arg_count,
        branch_count: counts.branches,
        loop_count: counts.loops,
        bool_op_count: counts.bool_ops,
        nesting_depth: counts.max_depth,
        has_doc: body.map(|b| block_has_docstring(b, source)).unwrap_or(false),
        has_handler: counts.handlers > 0,
        handler_has_filter: false,
        handler_count: counts.handlers,
    }
}

fn class_descriptor(node: Node, source: &str) -> ConstructDescriptor {
    let body = node.child_by_field_name("body");
    let counts = shape_of(node);

    ConstructDescriptor {
        kind: ConstructKind::Class,
        name: name_of(node, source),
        span: span_of(node),
        arg_count: 0,
        branch_count: counts.branches,
        loop_count: counts.loops,
        bool_op_count: counts.bool_ops,
        nesting_depth: counts.max_depth,
        has_doc: body.map(|b| block_has_docstring(b, source)).unwrap_or(false),
        has_handler: counts.handlers > 0,
        handler_has_filter: false,
        handler_count: counts.handlers,
    }
}

fn loop_descriptor(node: Node, _source: &str) -> ConstructDescriptor {
    let counts = shape_of(node);

    ConstructDescriptor {
        kind: ConstructKind::Loop,
        name: "<loop>".to_string(),
        span: span_of(node),
        arg_count: 0,
        branch_count: counts.branches,
        loop_count: counts.loops,
        bool_op_count: counts.bool_ops,
        nesting_depth: counts.max_depth,
        has_doc: false,
        has_handler: counts.handlers > 0,
        handler_has_filter: false,
        handler_count: counts.handlers,
    }
}

fn handler_descriptor(node: Node, _source: &str) -> ConstructDescriptor {
    // A bare `except:` has only the block (and punctuation) as children; a
    // typed handler carries an expression or as-pattern before the block.
    let mut cursor = node.walk();
    let has_filter = node
        .named_children(&mut cursor)
        .any(|c| !matches!(c.kind(), "block" | "comment"));

    let counts = shape_of(node);

    ConstructDescriptor {
        kind: ConstructKind::Handler,
        name: "<except>".to_string(),
        span: span_of(node),
        arg_count: 0,
        branch_count: counts.branches,
        loop_count: counts.loops,
        bool_op_count: counts.bool_ops,
        nesting_depth: counts.max_depth,
        has_doc: false,
        has_handler: true,
        handler_has_filter: has_filter,
        handler_count: 1 + counts.handlers,
    }
}

/// Categorize a module path: leading dot means relative, a standard-library
/// root means standard, anything else is third party.
fn import_origin(module: &str) -> ImportOrigin {
    if module.starts_with('.') {
        return ImportOrigin::Relative;
    }
    let root = module.split('.').next().unwrap_or(module);
    if STDLIB_MODULES.binary_search(&root).is_ok() {
        ImportOrigin::Standard
    } else {
        ImportOrigin::ThirdParty
    }
}

/// Record imports: `import a.b, c as d` and `from x import y`, including
/// `from . import y` relative forms.
fn collect_imports(node: Node, source: &str, facts: &mut FileFacts) {
    let line = node.start_position().row + 1;
    match node.kind() {
        "import_statement" => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                let target = match child.kind() {
                    "dotted_name" => Some(child),
                    "aliased_import" => child.child_by_field_name("name"),
                    _ => None,
                };
                if let Some(target) = target {
                    let module = node_text(target, source).to_string();
                    facts.imports.push(Import {
                        origin: import_origin(&module),
                        module,
                        line,
                    });
                }
            }
        }
        "import_from_statement" => {
            if let Some(module_node) = node.child_by_field_name("module_name") {
                let module = node_text(module_node, source).to_string();
                facts.imports.push(Import {
                    origin: import_origin(&module),
                    module,
                    line,
                });
            }
        }
        _ => {}
    }
}

/// Whether a module or block starts with a docstring.
fn block_has_docstring(block: Node, _source: &str) -> bool {
    let mut cursor = block.walk();
    let first = block
        .named_children(&mut cursor)
        .find(|c| c.kind() != "comment");
    match first {
        Some(stmt) if stmt.kind() == "expression_statement" => stmt
            .named_child(0)
            .map(|c| c.kind() == "string")
            .unwrap_or(false),
        _ => false,
    }
}

/// Collect assignment targets and identifier use counts.
fn collect_name_facts(node: Node, source: &str, facts: &mut FileFacts) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "identifier" => {
                let name = node_text(child, source).to_string();
                *facts.name_uses.entry(name).or_insert(0) += 1;
            }
            "assignment" => {
                if let Some(left) = child.child_by_field_name("left") {
                    collect_targets(left, source, facts);
                }
            }
            _ => {}
        }
        collect_name_facts(child, source, facts);
    }
}

fn collect_targets(node: Node, source: &str, facts: &mut FileFacts) {
    match node.kind() {
        "identifier" => facts.bindings.push(Binding {
            name: node_text(node, source).to_string(),
            line: node.start_position().row + 1,
        }),
        "pattern_list" | "tuple_pattern" => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                collect_targets(child, source, facts);
            }
        }
        // Attribute/subscript targets mutate existing objects, not bindings.
        _ => {}
    }
}
