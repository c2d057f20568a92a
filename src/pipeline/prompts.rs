//! Prompt loading.

use crate::models::{PromptSpec, Result, SpectraError};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::info;

/// Load prompts from a JSONL file, one `PromptSpec` per line.
///
/// B_i(file exists, every non-blank line parses) → Result
pub fn load_prompts(path: &Path) -> Result<Vec<PromptSpec>> {
    let file = File::open(path).map_err(|e| SpectraError::io("opening prompts file", e))?;
    let reader = BufReader::new(file);
    let mut prompts = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| SpectraError::io("reading prompts file", e))?;
        if line.trim().is_empty() {
            continue;
        }
        let prompt: PromptSpec = serde_json::from_str(&line)
            .map_err(|e| SpectraError::ParseError(format!("Line {}: {}", line_num + 1, e)))?;
        if prompt.text.trim().is_empty() {
            return Err(SpectraError::InvalidInput(format!(
                "Line {}: prompt text is empty",
                line_num + 1
            )));
        }
        prompts.push(prompt);
    }

    if prompts.is_empty() {
        return Err(SpectraError::InvalidInput(format!(
            "no prompts in {}",
            path.display()
        )));
    }

    info!(count = prompts.len(), "Loaded prompts");
    Ok(prompts)
}

/// Built-in prompt set covering every validator family.
pub fn default_prompts() -> Vec<PromptSpec> {
    vec![
        PromptSpec::new(
            "Solve this math problem: What is 15% of 240?",
            "math",
            "calculation",
        ),
        PromptSpec::new(
            "Generate 5 anagrams of the word 'LISTEN'",
            "anagram",
            "word_list",
        ),
        PromptSpec::new(
            "Create a 5x5 crossword puzzle with clues about animals",
            "crossword",
            "json",
        ),
        PromptSpec::new(
            "Write a creative story about a robot learning to paint",
            "language",
            "narrative",
        ),
        PromptSpec::new(
            "Explain the concept of machine learning in simple terms",
            "language",
            "explanation",
        ),
    ]
}
