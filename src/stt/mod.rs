//! Speech-to-text collaborator contract (§4.11, §9: "external collaborator,
//! specified only through the interface the core consumes").
//!
//! Grounded on `original_source/include/stt_engine.h`'s `STTEngine::transcribe`
//! shape, narrowed to a trait so the agent loop never depends on a concrete
//! model backend — the same pattern `audio::device::AudioIo` uses for the
//! device driver.

use crate::error::Result;
use crate::transcript::Transcript;

/// Transcribes one finalized speech segment. Implementations wrap whatever
/// model backend is configured (local Whisper, a hosted STT API, ...); the
/// core only ever sees this trait.
pub trait SttEngine: Send + Sync {
    fn transcribe(&self, samples: &[i16]) -> Result<Transcript>;
}

/// Canned-response test double, queued in call order, mirroring
/// [`crate::llm::client::ScriptedLlmClient`]'s role for the LLM client.
pub struct ScriptedSttEngine {
    responses: std::sync::Mutex<std::collections::VecDeque<Transcript>>,
}

impl ScriptedSttEngine {
    pub fn new(responses: Vec<Transcript>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses.into_iter().collect()),
        }
    }
}

impl SttEngine for ScriptedSttEngine {
    fn transcribe(&self, _samples: &[i16]) -> Result<Transcript> {
        Ok(self
            .responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or(Transcript {
                text: String::new(),
                confidence: 0.0,
                token_count: 0,
                processing_ms: 0,
            }))
    }
}
