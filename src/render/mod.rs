//! Template variable and conditional renderer
//!
//! Renders email templates and page snippets containing `{{variable}}`
//! placeholders and `{{#if cond}}...{{else}}...{{/if}}` /
//! `{{#unless cond}}...{{/unless}}` blocks.
//!
//! The scanner makes one left-to-right pass resolving conditional blocks
//! (tracking nesting depth per block type, recursing into the selected
//! branch), then substitutes the remaining placeholders. Malformed input
//! never panics: the unprocessed tail is emitted verbatim and a diagnostic
//! is logged.
//!
//! Values are `serde_json::Value`, which matches how guest attributes are
//! assembled for campaign sends.

use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

/// Variable mapping passed to the renderer
pub type Variables = HashMap<String, Value>;

const IF_OPEN: &str = "{{#if ";
const UNLESS_OPEN: &str = "{{#unless ";
const IF_CLOSE: &str = "{{/if}}";
const UNLESS_CLOSE: &str = "{{/unless}}";
const ELSE_TAG: &str = "{{else}}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    If,
    Unless,
}

impl BlockKind {
    fn open_tag(self) -> &'static str {
        match self {
            Self::If => IF_OPEN,
            Self::Unless => UNLESS_OPEN,
        }
    }

    fn close_tag(self) -> &'static str {
        match self {
            Self::If => IF_CLOSE,
            Self::Unless => UNLESS_CLOSE,
        }
    }
}

/// Render a template: resolve conditional blocks, then substitute
/// `{{name}}` placeholders. Unresolved placeholders render as the empty
/// string.
pub fn render(template: &str, vars: &Variables) -> String {
    let resolved = render_conditionals(template, vars);
    substitute_vars(&resolved, vars)
}

/// Resolve `{{#if}}` / `{{#unless}}` blocks left to right.
fn render_conditionals(input: &str, vars: &Variables) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    loop {
        let next_if = rest.find(IF_OPEN).map(|p| (p, BlockKind::If));
        let next_unless = rest.find(UNLESS_OPEN).map(|p| (p, BlockKind::Unless));

        let (pos, kind) = match (next_if, next_unless) {
            (Some(a), Some(b)) => {
                if a.0 <= b.0 {
                    a
                } else {
                    b
                }
            }
            (Some(a), None) => a,
            (None, Some(b)) => b,
            (None, None) => {
                out.push_str(rest);
                return out;
            }
        };

        out.push_str(&rest[..pos]);
        let tag = &rest[pos..];

        let cond_start = kind.open_tag().len();
        let Some(cond_end) = tag[cond_start..].find("}}") else {
            warn!("Template opening tag is missing '}}}}', emitting tail verbatim");
            out.push_str(tag);
            return out;
        };
        let condition = tag[cond_start..cond_start + cond_end].trim();
        let body = &tag[cond_start + cond_end + 2..];

        let Some(span) = scan_block(body, kind) else {
            warn!(
                "Unmatched {} block, emitting tail verbatim",
                kind.open_tag().trim()
            );
            out.push_str(tag);
            return out;
        };

        let mut take_branch = eval_condition(condition, vars);
        if kind == BlockKind::Unless {
            take_branch = !take_branch;
        }

        let branch = if take_branch {
            &body[..span.then_end]
        } else {
            span.else_range
                .map(|(start, end)| &body[start..end])
                .unwrap_or("")
        };

        out.push_str(&render_conditionals(branch, vars));

        rest = &body[span.resume_at..];
    }
}

/// Location of a block's branches within its body text
struct BlockSpan {
    /// End of the if-true branch (byte offset into the body)
    then_end: usize,
    /// Else branch byte range, when an `{{else}}` at the current depth exists
    else_range: Option<(usize, usize)>,
    /// Offset just past the closing tag
    resume_at: usize,
}

/// Find the closing tag matching an already-consumed opening tag, tracking
/// `if` and `unless` nesting depth independently. The `{{else}}` recorded is
/// the nearest one with both depths at zero.
fn scan_block(body: &str, kind: BlockKind) -> Option<BlockSpan> {
    let mut if_depth: u32 = 0;
    let mut unless_depth: u32 = 0;
    let mut else_pos: Option<usize> = None;
    let mut i = 0;

    while let Some(off) = body[i..].find("{{") {
        let j = i + off;
        let tail = &body[j..];

        if tail.starts_with(IF_OPEN) {
            if_depth += 1;
            i = j + IF_OPEN.len();
        } else if tail.starts_with(UNLESS_OPEN) {
            unless_depth += 1;
            i = j + UNLESS_OPEN.len();
        } else if tail.starts_with(IF_CLOSE) {
            if if_depth > 0 {
                if_depth -= 1;
            } else if kind == BlockKind::If {
                return Some(close_span(j, kind, else_pos));
            }
            // Stray {{/if}} inside an unless block is skipped
            i = j + IF_CLOSE.len();
        } else if tail.starts_with(UNLESS_CLOSE) {
            if unless_depth > 0 {
                unless_depth -= 1;
            } else if kind == BlockKind::Unless {
                return Some(close_span(j, kind, else_pos));
            }
            i = j + UNLESS_CLOSE.len();
        } else if tail.starts_with(ELSE_TAG) {
            if if_depth == 0 && unless_depth == 0 && else_pos.is_none() {
                else_pos = Some(j);
            }
            i = j + ELSE_TAG.len();
        } else {
            i = j + 2;
        }
    }

    None
}

fn close_span(close_at: usize, kind: BlockKind, else_pos: Option<usize>) -> BlockSpan {
    match else_pos {
        Some(e) => BlockSpan {
            then_end: e,
            else_range: Some((e + ELSE_TAG.len(), close_at)),
            resume_at: close_at + kind.close_tag().len(),
        },
        None => BlockSpan {
            then_end: close_at,
            else_range: None,
            resume_at: close_at + kind.close_tag().len(),
        },
    }
}

/// Evaluate a block condition.
///
/// Grammar, in priority order: `===`, `!==`, `==`, `!=`, else a bare
/// identifier truthy check. The left operand is looked up in the variable
/// mapping; the right operand is a literal. Quotes around operands are
/// stripped before comparison. Strict and loose operators share semantics
/// here: both compare the display-string coercion of the variable value.
fn eval_condition(condition: &str, vars: &Variables) -> bool {
    for (op, negate) in [("===", false), ("!==", true), ("==", false), ("!=", true)] {
        if let Some((lhs, rhs)) = condition.split_once(op) {
            let lhs = strip_quotes(lhs.trim());
            let rhs = strip_quotes(rhs.trim());
            let value = vars.get(lhs).map(display_value).unwrap_or_default();
            let equal = value == rhs;
            return if negate { !equal } else { equal };
        }
    }

    let ident = strip_quotes(condition.trim());
    vars.get(ident).map(is_truthy).unwrap_or(false)
}

/// Strip one pair of matching surrounding quotes
fn strip_quotes(s: &str) -> &str {
    let bytes = s.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && (first == b'"' || first == b'\'') {
            return &s[1..s.len() - 1];
        }
    }
    s
}

/// Truthiness rules for condition checks
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty() && s != "null" && s != "undefined",
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::Array(items) => !items.is_empty(),
        Value::Null => false,
        Value::Object(_) => true,
    }
}

/// Coerce a value to its display string
fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Replace remaining `{{name}}` placeholders. Unknown names become the
/// empty string. Block tags encountered here are leftovers of malformed
/// input and are emitted verbatim, ending the scan.
fn substitute_vars(input: &str, vars: &Variables) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find("{{") {
        out.push_str(&rest[..pos]);
        let tag = &rest[pos..];

        let Some(end) = tag.find("}}") else {
            warn!("Placeholder is missing '}}}}', emitting tail verbatim");
            out.push_str(tag);
            return out;
        };

        let token = tag[2..end].trim();
        if token.starts_with('#') || token.starts_with('/') || token == "else" {
            warn!("Stray block tag '{}' left after conditional pass", token);
            out.push_str(tag);
            return out;
        }

        if let Some(value) = vars.get(token) {
            out.push_str(&display_value(value));
        }
        // Unresolved placeholders render as the empty string

        rest = &tag[end + 2..];
    }

    out.push_str(rest);
    out
}
