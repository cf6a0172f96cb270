//! Text-to-speech collaborator contract plus the VOX pre-roll tone (§4.7
//! step 7, §4.10, GLOSSARY "VOX").
//!
//! Grounded on `original_source/src/tts_engine.cpp`'s `TTSEngine::synth_vox`
//! (cache lookup, external synth call, then pre-roll tone prepended) and
//! `::generate_preroll` (440 Hz sine burst at a moderate amplitude, long
//! enough to open a VOX-gated receiver's squelch before speech starts). The
//! pre-roll generator is pure and lives in the core; the speech synth itself
//! is an external collaborator the core only calls through [`TtsEngine`].

use std::f32::consts::PI;

use crate::audio::frame::SAMPLE_RATE_HZ;
use crate::config::TtsConfig;
use crate::error::Result;

const PREROLL_FREQUENCY_HZ: f32 = 440.0;

/// Synthesizes speech audio from text. Implementations wrap whatever model
/// backend is configured (Piper, a hosted TTS API, ...); the core only ever
/// sees this trait.
pub trait TtsEngine: Send + Sync {
    fn synth(&self, text: &str) -> Result<Vec<i16>>;
}

/// Generate a tone-burst pre-roll of `config.vox_preroll_ms` at
/// `config.vox_preroll_amplitude`, meant to trigger a VOX-gated receiver's
/// squelch before the synthesized speech plays.
pub fn generate_preroll(config: &TtsConfig) -> Vec<i16> {
    let sample_count = (config.vox_preroll_ms as usize * SAMPLE_RATE_HZ as usize) / 1000;
    let sample_rate = SAMPLE_RATE_HZ as f32;
    (0..sample_count)
        .map(|i| {
            let t = i as f32 / sample_rate;
            let value = config.vox_preroll_amplitude * (2.0 * PI * PREROLL_FREQUENCY_HZ * t).sin();
            (value * i16::MAX as f32) as i16
        })
        .collect()
}

/// Synthesize `text` through `engine`, apply `config.output_gain`, and
/// prepend the VOX pre-roll. This is the one entry point the agent loop
/// calls — callers never touch [`TtsEngine::synth`] or
/// [`generate_preroll`] directly, matching how the teacher's `synth_vox`
/// wraps `synth` plus `generate_preroll`.
pub fn synth_vox(engine: &dyn TtsEngine, config: &TtsConfig, text: &str) -> Result<Vec<i16>> {
    let mut audio = engine.synth(text)?;
    for sample in audio.iter_mut() {
        let gained = (*sample as f32 * config.output_gain).clamp(i16::MIN as f32, i16::MAX as f32);
        *sample = gained as i16;
    }

    let mut out = generate_preroll(config);
    out.reserve(audio.len());
    out.append(&mut audio);
    Ok(out)
}

/// Canned-response test double, keyed by exact text match, mirroring
/// [`crate::stt::ScriptedSttEngine`]'s role for STT.
pub struct ScriptedTtsEngine {
    samples_per_char: usize,
}

impl ScriptedTtsEngine {
    /// Produces deterministic, non-empty audio whose length depends only on
    /// the input text, so tests can assert "some audio was synthesized"
    /// without depending on a real voice model.
    pub fn new() -> Self {
        Self { samples_per_char: 16 }
    }
}

impl Default for ScriptedTtsEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TtsEngine for ScriptedTtsEngine {
    fn synth(&self, text: &str) -> Result<Vec<i16>> {
        let len = (text.chars().count() * self.samples_per_char).max(1);
        Ok(vec![1000i16; len])
    }
}
