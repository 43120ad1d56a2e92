//! Line-oriented matchers.

use crate::facts::FileFacts;

use super::{CompiledDetector, Finding};

/// Scan source lines with the detector's pre-compiled regex.
///
/// Matches that fall inside a string literal are skipped so quoted examples
/// of an anti-pattern don't trip the detector.
pub(super) fn scan(
    det: &CompiledDetector,
    facts: &FileFacts,
    source: &str,
    findings: &mut Vec<Finding>,
) {
    let regex = match det.regex.as_ref() {
        Some(r) => r,
        None => return,
    };

    for (idx, line) in source.lines().enumerate() {
        let line_number = idx + 1;
        for m in regex.find_iter(line) {
            if is_inside_string_literal(line, m.start()) {
                continue;
            }
            findings.push(Finding::from_spec(&det.spec, &facts.path, line_number));
            // One finding per line per kind is enough.
            break;
        }
    }
}

/// Heuristic check for a position being inside a quoted string.
fn is_inside_string_literal(line: &str, pos: usize) -> bool {
    let mut in_single = false;
    let mut in_double = false;
    let mut escaped = false;

    for (i, c) in line.char_indices() {
        if i >= pos {
            break;
        }
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            _ => {}
        }
    }

    in_single || in_double
}
