//! Source code heuristics.

use crate::models::ValidationResult;
use crate::validation::{details, weighted, TopicValidator};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```.*```|\{.*\}").expect("valid regex"));
static DECLARATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(var|let|const|int|string|float|def|function|class|fn)\b")
        .expect("valid regex")
});
static CONTROL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(if|for|while|switch|case|try|catch|return|match)\b").expect("valid regex")
});
static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"//|/\*|#|'''|""""#).expect("valid regex"));

const CHECK_WEIGHT: f64 = 0.16;

/// Brackets pair up and nest correctly.
fn brackets_balanced(code: &str) -> bool {
    let mut stack = Vec::new();
    for c in code.chars() {
        match c {
            '(' | '[' | '{' => stack.push(c),
            ')' | ']' | '}' => {
                let expected = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                if stack.pop() != Some(expected) {
                    return false;
                }
            }
            _ => {}
        }
    }
    stack.is_empty()
}

/// Share of non-empty lines that are flush left, tab-indented or indented by
/// at least four spaces.
fn indentation_ratio(code: &str) -> f64 {
    let lines: Vec<&str> = code.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.is_empty() {
        return 1.0;
    }
    let proper = lines
        .iter()
        .filter(|l| l.starts_with("    ") || l.starts_with('\t') || !l.starts_with(' '))
        .count();
    proper as f64 / lines.len() as f64
}

/// Six structural checks on a code answer.
#[derive(Debug, Clone, Copy, Default)]
pub struct CodeValidator;

impl TopicValidator for CodeValidator {
    fn topic(&self) -> &'static str {
        "code"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["programming"]
    }

    fn validate(&self, text: &str) -> ValidationResult {
        let has_block = BLOCK_RE.is_match(text);
        let has_declarations = DECLARATION_RE.is_match(text);
        let has_control_flow = CONTROL_RE.is_match(text);
        let balanced = brackets_balanced(text);
        let has_comments = COMMENT_RE.is_match(text);
        let indentation = indentation_ratio(text);

        let score = weighted(&[
            (has_block, CHECK_WEIGHT),
            (has_declarations, CHECK_WEIGHT),
            (has_control_flow, CHECK_WEIGHT),
            (balanced, CHECK_WEIGHT),
            (has_comments, CHECK_WEIGHT),
            (indentation > 0.6, CHECK_WEIGHT),
        ]);

        let mut issues = Vec::new();
        if !balanced {
            issues.push("Unbalanced brackets".to_string());
        }
        if !has_block {
            issues.push("No code block".to_string());
        }

        ValidationResult::new(
            score,
            details([
                ("has_code_block", Value::from(has_block)),
                ("has_declarations", Value::from(has_declarations)),
                ("has_control_flow", Value::from(has_control_flow)),
                ("has_comments", Value::from(has_comments)),
                ("syntax_balanced", Value::from(balanced)),
                ("indentation_ratio", Value::from(indentation)),
                ("line_count", Value::from(text.lines().count())),
            ]),
            issues,
        )
    }
}
