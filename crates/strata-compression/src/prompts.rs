//! Prompts for phase-advancement rewrites.

use strata_core::types::CHARS_PER_TOKEN;

/// System prompt shared by every chat-model compressor.
pub const COMPRESSION_SYSTEM_PROMPT: &str = "You condense personal memories. \
Keep names, dates, numbers, outcomes and how the person felt. \
Drop filler, repetition and incidental detail. \
Write in the same person and tense as the original. \
Reply with the condensed memory only, no preamble.";

/// User prompt asking for a rewrite that fits `target_tokens`.
pub fn compression_prompt(content: &str, target_tokens: u32) -> String {
    let words = (target_tokens as usize * CHARS_PER_TOKEN / 5).max(1);
    format!(
        "Condense the memory below to at most {} tokens (about {} words).\n\nMemory:\n{}",
        target_tokens, words, content
    )
}

/// Strip wrappers models like to add around the answer.
pub fn clean_summary(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix("```")
        .and_then(|s| s.strip_suffix("```"))
        .map(|s| s.trim_start_matches(|c: char| c.is_alphanumeric()).trim())
        .unwrap_or(trimmed);
    trimmed
        .trim_start_matches("Condensed memory:")
        .trim_start_matches("Summary:")
        .trim()
        .trim_matches('"')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_mentions_budget() {
        let prompt = compression_prompt("we went hiking", 75);
        assert!(prompt.contains("75 tokens"));
        assert!(prompt.contains("60 words"));
        assert!(prompt.ends_with("we went hiking"));
    }

    #[test]
    fn test_clean_summary() {
        assert_eq!(clean_summary("  Summary: hiked the ridge  "), "hiked the ridge");
        assert_eq!(clean_summary("\"hiked the ridge\""), "hiked the ridge");
        assert_eq!(clean_summary("```text\nhiked the ridge\n```"), "hiked the ridge");
    }
}
