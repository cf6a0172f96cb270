//! Transcript type and the low-signal gate.

use crate::config::TranscriptGateConfig;

/// STT output for one finalized speech segment.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    pub text: String,
    pub confidence: f32,
    pub token_count: usize,
    pub processing_ms: u64,
}

/// Canonical noise-word patterns an STT backend emits for non-speech audio,
/// checked both as whole-string matches and substrings of the normalized
/// (lowercased, alphanumeric-and-space-only) transcript.
const NOISE_PATTERNS: &[&str] = &[
    "static",
    "silence",
    "noise",
    "inaudible",
    "unclear",
    "background noise",
    "radio static",
    "interference",
    "nothing",
    "blank",
    "mute",
    "hiss",
    "hissing",
    "click",
    "clicking",
    "beep",
    "beeping",
    "buzz",
    "buzzing",
    "crackle",
    "crackling",
    "hum",
    "humming",
    "whoosh",
    "whooshing",
    "pop",
    "popping",
    "rustle",
    "rustling",
];

fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
        .trim()
        .to_string()
}

/// True if `text` (after normalization) is blank or equals the STT's
/// reserved blank sentinel.
pub fn is_blank_transcript(text: &str, blank_sentinel: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed == blank_sentinel {
        return true;
    }
    let normalized = normalize(text);
    if normalized.is_empty() {
        return true;
    }
    if NOISE_PATTERNS
        .iter()
        .any(|p| normalized == *p || normalized.contains(p))
    {
        return true;
    }
    normalized.len() < 3
}

/// Pure predicate: true if `transcript` carries too little signal to act on.
pub fn is_low_signal(
    transcript: &Transcript,
    gate: &TranscriptGateConfig,
    blank_sentinel: &str,
) -> bool {
    if is_blank_transcript(&transcript.text, blank_sentinel) {
        return true;
    }
    if transcript.token_count < gate.min_transcript_tokens {
        return true;
    }
    if transcript.confidence < gate.min_confidence {
        return true;
    }
    if transcript.text.trim().len() < gate.min_transcript_chars {
        return true;
    }
    false
}
