//! Response cleanup: filler stripping, sentence/word truncation, and the
//! "every transmission ends in over." invariant.
//!
//! Grounded on `original_source/src/llm_client.cpp::clean_response` and
//! `::truncate_to_first_sentence`/`::truncate_to_max_words`.

const FILLER_PATTERNS: &[&str] = &[
    "[end conversation]",
    "[pause]",
    "[end]",
    "Remember,",
    "Keep it smooth",
    "Keep it clear",
    "Keep it going",
    "Keep it",
    "Let's keep",
    "we're all in this together",
];

const MAX_WORDS: usize = 75;

/// Trim, collapse whitespace, strip filler phrases, cut at the first
/// sentence terminator, and cap at [`MAX_WORDS`].
pub fn clean_response(text: &str) -> String {
    let mut cleaned = text.trim().to_string();
    for pattern in FILLER_PATTERNS {
        while let Some(pos) = cleaned.find(pattern) {
            cleaned.replace_range(pos..pos + pattern.len(), "");
            let tail_end = cleaned[pos..]
                .find(|c: char| !(c.is_whitespace() || matches!(c, '.' | '!' | '?')))
                .map(|offset| pos + offset)
                .unwrap_or(cleaned.len());
            cleaned.replace_range(pos..tail_end, "");
        }
    }
    cleaned = collapse_whitespace(&cleaned);
    cleaned = truncate_to_first_sentence(&cleaned);
    truncate_to_max_words(&cleaned, MAX_WORDS)
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_was_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !last_was_space {
                out.push(' ');
                last_was_space = true;
            }
        } else {
            out.push(c);
            last_was_space = false;
        }
    }
    out.trim().to_string()
}

fn truncate_to_first_sentence(text: &str) -> String {
    let end = text.find(['.', '!', '?']);
    match end {
        Some(idx) => text[..=idx].to_string(),
        None => text.to_string(),
    }
}

fn truncate_to_max_words(text: &str, max_words: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max_words {
        return text.to_string();
    }
    words[..max_words].join(" ")
}

/// Idempotently normalize `text` to end in exactly `" over."`, collapsing
/// "over and out[.]" variants. Empty input becomes `" over."`.
pub fn ensure_ends_with_over(text: &str) -> String {
    let mut trimmed = text.trim().to_string();

    let lower = trimmed.to_lowercase();
    for variant in ["over and out.", "over and out"] {
        if lower.ends_with(variant) {
            let cut = trimmed.len() - variant.len();
            trimmed.truncate(cut);
            trimmed = trimmed.trim_end().to_string();
            break;
        }
    }

    let lower = trimmed.to_lowercase();
    if lower == "over" || lower == "over." {
        return " over.".to_string();
    }
    if lower.ends_with(" over.") {
        return trimmed;
    }
    if lower.ends_with(" over") {
        trimmed.push('.');
        return trimmed;
    }
    if lower.ends_with("over.") {
        trimmed.insert(trimmed.len() - 5, ' ');
        return trimmed;
    }
    if trimmed.is_empty() {
        return " over.".to_string();
    }
    while trimmed.ends_with(['.', '!', '?']) {
        trimmed.pop();
    }
    trimmed.push_str(" over.");
    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_filler_patterns() {
        let cleaned = clean_response("All clear. Remember, stay safe out there.");
        assert!(!cleaned.to_lowercase().contains("remember"));
    }

    #[test]
    fn truncates_at_first_sentence() {
        let cleaned = clean_response("All clear here. Second sentence should be dropped.");
        assert_eq!(cleaned, "All clear here.");
    }

    #[test]
    fn caps_at_max_words() {
        let long = (0..100).map(|i| format!("word{i}")).collect::<Vec<_>>().join(" ");
        let cleaned = clean_response(&long);
        assert!(cleaned.split_whitespace().count() <= MAX_WORDS);
    }

    #[test]
    fn ensure_ends_with_over_is_idempotent() {
        let once = ensure_ends_with_over("roger that");
        let twice = ensure_ends_with_over(&once);
        assert_eq!(once, twice);
        assert!(once.ends_with(" over."));
    }

    #[test]
    fn ensure_ends_with_over_handles_empty() {
        assert_eq!(ensure_ends_with_over(""), " over.");
    }

    #[test]
    fn ensure_ends_with_over_collapses_over_and_out() {
        let cleaned = ensure_ends_with_over("Copy that, over and out.");
        assert_eq!(cleaned, "Copy that, over.");
    }

    #[test]
    fn ensure_ends_with_over_leaves_existing_suffix_alone() {
        assert_eq!(ensure_ends_with_over("roger. over."), "roger. over.");
    }
}
