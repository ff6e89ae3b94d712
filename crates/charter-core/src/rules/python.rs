// python.rs: tree-sitter helpers for the AST-based rules.
//
// tree-sitter always produces a tree, even for broken input. A tree whose
// root reports `has_error()` is treated as unparsable: the AST scans are
// skipped and the rule records a parse failure instead of guessing.

use tree_sitter::{Node, Parser, Tree};

use crate::error::RuleError;
use crate::principle::Principle;
use crate::violation::{Severity, Violation};

/// Parse `source` as Python.
///
/// A fresh parser per call keeps the rules `Sync` without locking.
pub(crate) fn parse(source: &str) -> Result<Tree, RuleError> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| RuleError::Grammar(e.to_string()))?;
    parser.parse(source, None).ok_or(RuleError::NoTree)
}

/// 1-based line of the first ERROR or MISSING node, if any.
pub(crate) fn first_error_line(root: Node) -> Option<usize> {
    if !root.has_error() {
        return None;
    }
    let mut found = None;
    walk(root, |node| {
        if found.is_none() && (node.is_error() || node.is_missing()) {
            found = Some(line_of(node));
        }
    });
    // has_error() with no explicit error node: report the root.
    Some(found.unwrap_or_else(|| line_of(root)))
}

/// The violation recorded when an artifact is not valid Python.
pub(crate) fn parse_failure(principle: Principle, line: usize) -> Violation {
    Violation::rule_failure(
        principle,
        Severity::Info,
        format!(
            "Could not parse artifact as Python (syntax error near line {}); AST checks skipped",
            line
        ),
    )
    .at_line(line)
    .with_remedy("Fix the syntax error so the artifact can be fully checked")
}

/// Pre-order traversal. Iterative, so deeply nested input cannot exhaust
/// the stack.
pub(crate) fn walk<'t>(root: Node<'t>, mut visit: impl FnMut(Node<'t>)) {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        visit(node);
        for i in (0..node.child_count()).rev() {
            if let Some(child) = node.child(i) {
                stack.push(child);
            }
        }
    }
}

/// Source text covered by `node`.
pub(crate) fn text<'s>(node: Node, source: &'s str) -> &'s str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

/// 1-based line on which `node` starts.
pub(crate) fn line_of(node: Node) -> usize {
    node.start_position().row + 1
}

/// The full source line on which `node` starts, trimmed.
pub(crate) fn source_line<'s>(node: Node, source: &'s str) -> &'s str {
    source
        .lines()
        .nth(node.start_position().row)
        .unwrap_or("")
        .trim()
}

/// Whether `node` is a string literal.
pub(crate) fn is_string(node: Node) -> bool {
    matches!(node.kind(), "string" | "concatenated_string")
}
