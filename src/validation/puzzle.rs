//! Structured puzzle (crossword) heuristics over a JSON answer.

use crate::models::ValidationResult;
use crate::validation::{details, weighted, TopicValidator};
use serde_json::Value;

const CHECK_WEIGHT: f64 = 0.16;
const WORD_BONUS: f64 = 0.04;
/// Score when the answer is not JSON at all.
const UNPARSEABLE_SCORE: f64 = 0.1;

/// Drop a surrounding Markdown code fence (```json ... ```), if any.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Skip the info string on the opening line
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

fn is_filled(cell: &Value) -> bool {
    match cell {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !matches!(s.trim(), "" | "."),
        _ => true,
    }
}

/// More than 30% of the grid's cells carry a letter.
fn fill_density(grid: &[Value]) -> f64 {
    let (filled, total) = grid
        .iter()
        .filter_map(Value::as_array)
        .flatten()
        .fold((0usize, 0usize), |(filled, total), cell| {
            (filled + usize::from(is_filled(cell)), total + 1)
        });
    if total == 0 {
        0.0
    } else {
        filled as f64 / total as f64
    }
}

fn clue_text(clue: &Value) -> Option<&str> {
    clue.get("clue")
        .or_else(|| clue.get("text"))
        .and_then(Value::as_str)
}

/// Scores crossword-style JSON: grid, clues, words and fill.
#[derive(Debug, Clone, Copy, Default)]
pub struct PuzzleValidator;

impl TopicValidator for PuzzleValidator {
    fn topic(&self) -> &'static str {
        "puzzle"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["crossword"]
    }

    fn validate(&self, text: &str) -> ValidationResult {
        let parsed: Value = match serde_json::from_str(strip_code_fence(text)) {
            Ok(value) => value,
            Err(e) => {
                return ValidationResult::new(
                    UNPARSEABLE_SCORE,
                    details([
                        ("valid_json", Value::from(false)),
                        ("error", Value::from(e.to_string())),
                        ("raw_length", Value::from(text.chars().count())),
                    ]),
                    vec!["Output is not valid JSON".to_string()],
                );
            }
        };

        let grid = parsed.get("grid").and_then(Value::as_array);
        let words = parsed.get("words").and_then(Value::as_array);
        let clues = parsed.get("clues").and_then(Value::as_array);
        let across = parsed.get("across").filter(|v| is_filled(v));
        let down = parsed.get("down").filter(|v| is_filled(v));
        let clue_list = clues.or_else(|| across.and_then(Value::as_array));

        let has_grid = grid.is_some();
        let has_clues = clues.is_some() || (across.is_some() && down.is_some());
        let has_dimensions = grid.is_some_and(|g| g.len() >= 3 && g.iter().all(Value::is_array));
        let has_words = words.is_some();
        let density = grid.map_or(0.0, |g| fill_density(g));
        let has_fill = density > 0.3;
        let has_clue_format = clue_list.is_some_and(|list| {
            list.iter()
                .all(|c| clue_text(c).is_some_and(|t| t.chars().count() > 5))
        });
        let word_count = words.map_or(0, Vec::len);

        let mut score = weighted(&[
            (has_grid, CHECK_WEIGHT),
            (has_clues, CHECK_WEIGHT),
            (has_dimensions, CHECK_WEIGHT),
            (has_words, CHECK_WEIGHT),
            (has_fill, CHECK_WEIGHT),
            (has_clue_format, CHECK_WEIGHT),
        ]);
        if word_count >= 8 {
            score += WORD_BONUS;
        }

        let mut issues = Vec::new();
        if !has_grid {
            issues.push("Missing grid".to_string());
        }
        if !has_clues {
            issues.push("Missing clues".to_string());
        }
        if has_grid && !has_fill {
            issues.push("Grid is mostly empty".to_string());
        }

        let grid_size = grid.map_or_else(
            || "N/A".to_string(),
            |g| {
                let cols = g.first().and_then(Value::as_array).map_or(0, Vec::len);
                format!("{}x{}", g.len(), cols)
            },
        );
        let keys = parsed
            .as_object()
            .map(|o| o.keys().cloned().collect::<Vec<_>>().join(", "))
            .unwrap_or_default();

        ValidationResult::new(
            score.min(1.0),
            details([
                ("valid_json", Value::from(true)),
                ("grid_size", Value::from(grid_size)),
                ("fill_density", Value::from(density)),
                ("word_count", Value::from(word_count)),
                ("clue_count", Value::from(clue_list.map_or(0, Vec::len))),
                ("structure", Value::from(keys)),
            ]),
            issues,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn crossword(words: usize) -> String {
        let words = vec!["CAT"; words];
        json!({
            "grid": [
                ["C", "A", "T"],
                ["A", ".", "O"],
                ["R", "U", "N"]
            ],
            "clues": [
                {"number": 1, "clue": "Feline companion"},
                {"number": 2, "clue": "Moves quickly on foot"}
            ],
            "words": words
        })
        .to_string()
    }

    #[test]
    fn test_complete_crossword() {
        let result = PuzzleValidator.validate(&crossword(3));
        assert!((result.score - 0.96).abs() < 1e-9);
        assert!(result.issues.is_empty());
        assert_eq!(result.details["grid_size"], "3x3");

        let bonus = PuzzleValidator.validate(&crossword(8));
        assert!((bonus.score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_code_fence_is_stripped() {
        let fenced = format!("```json\n{}\n```", crossword(3));
        let result = PuzzleValidator.validate(&fenced);
        assert_eq!(result.details["valid_json"], true);
        assert!(result.score > 0.9);
    }

    #[test]
    fn test_unparseable_scores_point_one() {
        let result = PuzzleValidator.validate("Here is your crossword: CAT, DOG");
        assert_eq!(result.score, 0.1);
        assert!(!result.is_valid);
        assert_eq!(result.details["valid_json"], false);
    }

    #[test]
    fn test_across_down_clues() {
        let text = json!({
            "grid": [["A"], ["B"], ["C"]],
            "across": [{"clue": "Vowel"}],
            "down": [{"clue": "Second letter"}]
        })
        .to_string();
        let result = PuzzleValidator.validate(&text);
        // grid, clues, dimensions, fill; a five-letter across clue is too short
        assert!((result.score - 0.64).abs() < 1e-9);
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("  {\"a\": 1} "), "{\"a\": 1}");
    }
}
