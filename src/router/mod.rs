//! Pure router mapping a transcript to a [`Plan`].

use crate::config::RouterConfig;
use crate::transcript::Transcript;

#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    NoOp,
    Speak { answer: String, needs_llm: bool },
    AckThenLlm { ack: String },
    Fallback { text: String },
    Repair { phrase: String },
}

/// Priority-ordered fast-path patterns: first substring match wins.
const FAST_PATHS: &[(&str, &str)] = &[
    ("roger", "roger."),
    ("affirmative", "affirmative."),
    ("negative", "negative."),
    ("stand by", "stand by."),
    ("over", "over."),
];

/// Map a transcript to a plan. Pure — performs no I/O.
pub fn decide(transcript: &Transcript, config: &RouterConfig) -> Plan {
    if config.repair_confidence_threshold > 0.0
        && transcript.confidence < config.repair_confidence_threshold
    {
        return Plan::Speak {
            answer: config.repair_phrase.clone(),
            needs_llm: false,
        };
    }

    let normalized = transcript.text.to_lowercase();
    for (pattern, reply) in FAST_PATHS {
        if normalized.contains(pattern) {
            return Plan::Speak {
                answer: reply.to_string(),
                needs_llm: false,
            };
        }
    }

    Plan::AckThenLlm {
        ack: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RouterConfig {
        RouterConfig {
            repair_confidence_threshold: 0.5,
            repair_phrase: "Say again, over".to_string(),
        }
    }

    fn transcript(text: &str, confidence: f32) -> Transcript {
        Transcript {
            text: text.to_string(),
            confidence,
            token_count: text.split_whitespace().count(),
            processing_ms: 0,
        }
    }

    #[test]
    fn low_confidence_triggers_repair_without_llm() {
        let plan = decide(&transcript("mumble", 0.2), &config());
        assert_eq!(
            plan,
            Plan::Speak {
                answer: "Say again, over".to_string(),
                needs_llm: false,
            }
        );
    }

    #[test]
    fn fast_path_matches_before_llm() {
        let plan = decide(&transcript("Roger that", 0.9), &config());
        assert_eq!(
            plan,
            Plan::Speak {
                answer: "roger.".to_string(),
                needs_llm: false,
            }
        );
    }

    #[test]
    fn unmatched_high_confidence_goes_to_llm() {
        let plan = decide(&transcript("what's the weather like", 0.9), &config());
        assert_eq!(
            plan,
            Plan::AckThenLlm {
                ack: String::new()
            }
        );
    }

    #[test]
    fn repair_threshold_zero_disables_repair_path() {
        let mut cfg = config();
        cfg.repair_confidence_threshold = 0.0;
        let plan = decide(&transcript("mumble", 0.01), &cfg);
        assert_eq!(plan, Plan::AckThenLlm { ack: String::new() });
    }
}
