//! Energy-based voice activity detector with adaptive noise floor, hysteresis
//! band, debounce, pre-speech capture, and hangover.

use std::collections::VecDeque;

use crate::audio::frame::{AudioFrame, SAMPLE_RATE_HZ};
use crate::config::VadConfig;

const HYSTERESIS_RATIO: f32 = 0.7;
const DEBOUNCE_FRAMES: u32 = 2;
const ADAPTIVE_THRESHOLD_MULTIPLIER: f32 = 3.0;
const MIN_ADAPTIVE_THRESHOLD: f32 = 0.01;
const MAX_ADAPTIVE_THRESHOLD: f32 = 0.1;
const NOISE_FLOOR_EMA_ALPHA: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadMode {
    Silence,
    Speech,
    Hangover,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadEvent {
    None,
    SpeechStart,
    SpeechEnd,
    SpeechContinue,
}

#[derive(Debug, Clone, Copy)]
pub struct VadStats {
    pub mode: VadMode,
    pub rms: f32,
    pub noise_floor: f32,
    pub effective_threshold: f32,
}

pub struct EnergyVad {
    frame_ms: f32,
    mode: VadMode,
    pre_speech_ring: VecDeque<i16>,
    pre_speech_max_samples: usize,
    speech_buffer: Vec<i16>,
    consecutive_speech_frames: u32,
    silence_samples: u32,
    hangover_samples: u32,
    speech_samples: u32,
    noise_floor: f32,
    current_rms: f32,
    config: VadConfig,
}

impl EnergyVad {
    pub fn new(config: &VadConfig) -> Self {
        let frame_ms = 20.0;
        let pre_speech_max_samples =
            ((config.pre_speech_buffer_ms as f32 / 1000.0) * SAMPLE_RATE_HZ as f32) as usize;
        Self {
            frame_ms,
            mode: VadMode::Silence,
            pre_speech_ring: VecDeque::with_capacity(pre_speech_max_samples),
            pre_speech_max_samples,
            speech_buffer: Vec::new(),
            consecutive_speech_frames: 0,
            silence_samples: 0,
            hangover_samples: 0,
            speech_samples: 0,
            noise_floor: MIN_ADAPTIVE_THRESHOLD,
            current_rms: 0.0,
            config: config.clone(),
        }
    }

    pub fn process_frame(&mut self, frame: &AudioFrame) -> VadEvent {
        let rms = compute_rms(&frame.samples);
        self.current_rms = rms;

        if self.mode == VadMode::Silence && self.config.adaptive_threshold && rms < self.noise_floor * 2.0 {
            self.noise_floor =
                self.noise_floor * (1.0 - NOISE_FLOOR_EMA_ALPHA) + rms * NOISE_FLOOR_EMA_ALPHA;
            self.noise_floor = self.noise_floor.clamp(
                MIN_ADAPTIVE_THRESHOLD / ADAPTIVE_THRESHOLD_MULTIPLIER,
                MAX_ADAPTIVE_THRESHOLD / ADAPTIVE_THRESHOLD_MULTIPLIER,
            );
        }

        self.push_pre_speech(&frame.samples);

        let start_threshold = self.start_threshold();
        let end_threshold = start_threshold * HYSTERESIS_RATIO;

        match self.mode {
            VadMode::Silence => self.process_silence(frame, rms, start_threshold),
            VadMode::Speech => self.process_speech(frame, rms, end_threshold),
            VadMode::Hangover => self.process_hangover(frame, rms, end_threshold),
        }
    }

    fn process_silence(&mut self, frame: &AudioFrame, rms: f32, start_threshold: f32) -> VadEvent {
        if rms > start_threshold {
            self.consecutive_speech_frames += 1;
            if self.consecutive_speech_frames >= DEBOUNCE_FRAMES {
                self.mode = VadMode::Speech;
                self.speech_buffer.clear();
                self.speech_buffer.extend(self.pre_speech_ring.iter());
                self.speech_buffer.extend_from_slice(&frame.samples);
                self.speech_samples = frame.samples.len() as u32;
                self.silence_samples = 0;
                self.hangover_samples = 0;
                self.consecutive_speech_frames = 0;
                return VadEvent::SpeechStart;
            }
            return VadEvent::None;
        }
        self.consecutive_speech_frames = 0;
        VadEvent::None
    }

    fn process_speech(&mut self, frame: &AudioFrame, rms: f32, end_threshold: f32) -> VadEvent {
        self.speech_buffer.extend_from_slice(&frame.samples);
        self.speech_samples += frame.samples.len() as u32;

        if rms > end_threshold {
            self.silence_samples = 0;
            return VadEvent::SpeechContinue;
        }

        self.silence_samples += frame.samples.len() as u32;
        let pause_tolerance_samples = ms_to_samples(self.config.pause_tolerance_ms);
        if self.silence_samples < pause_tolerance_samples {
            return VadEvent::SpeechContinue;
        }

        let end_silence_samples = ms_to_samples(self.config.end_of_utterance_silence_ms);
        if self.silence_samples < end_silence_samples {
            return VadEvent::SpeechContinue;
        }

        let min_speech_samples = ms_to_samples(self.config.min_speech_ms);
        if self.speech_samples >= min_speech_samples {
            self.mode = VadMode::Hangover;
            self.hangover_samples = 0;
            VadEvent::SpeechEnd
        } else {
            self.mode = VadMode::Silence;
            self.speech_buffer.clear();
            self.speech_samples = 0;
            self.silence_samples = 0;
            VadEvent::None
        }
    }

    fn process_hangover(&mut self, frame: &AudioFrame, rms: f32, end_threshold: f32) -> VadEvent {
        let hangover_max_samples = ms_to_samples(self.config.hangover_ms);
        if rms > end_threshold {
            self.mode = VadMode::Speech;
            self.speech_buffer.extend_from_slice(&frame.samples);
            self.speech_samples += frame.samples.len() as u32;
            self.silence_samples = 0;
            return VadEvent::SpeechContinue;
        }
        self.hangover_samples += frame.samples.len() as u32;
        if self.hangover_samples >= hangover_max_samples {
            self.mode = VadMode::Silence;
        }
        VadEvent::None
    }

    fn start_threshold(&self) -> f32 {
        if !self.config.adaptive_threshold {
            return self.config.threshold;
        }
        let adaptive = self.noise_floor * ADAPTIVE_THRESHOLD_MULTIPLIER;
        adaptive.clamp(
            MIN_ADAPTIVE_THRESHOLD,
            self.config.threshold.max(MAX_ADAPTIVE_THRESHOLD),
        )
    }

    fn push_pre_speech(&mut self, samples: &[i16]) {
        for &s in samples {
            if self.pre_speech_ring.len() >= self.pre_speech_max_samples {
                self.pre_speech_ring.pop_front();
            }
            self.pre_speech_ring.push_back(s);
        }
    }

    /// Take ownership of the accumulated speech buffer (including the
    /// prepended pre-speech window) and clear it. Call after `SpeechEnd`.
    pub fn finalize_segment(&mut self) -> Vec<i16> {
        std::mem::take(&mut self.speech_buffer)
    }

    /// Return to `Silence` without losing the pre-speech ring or the
    /// adapted noise floor.
    pub fn reset(&mut self) {
        self.mode = VadMode::Silence;
        self.speech_buffer.clear();
        self.speech_samples = 0;
        self.silence_samples = 0;
        self.hangover_samples = 0;
        self.consecutive_speech_frames = 0;
    }

    pub fn stats(&self) -> VadStats {
        VadStats {
            mode: self.mode,
            rms: self.current_rms,
            noise_floor: self.noise_floor,
            effective_threshold: self.start_threshold(),
        }
    }

    pub fn mode(&self) -> VadMode {
        self.mode
    }
}

fn ms_to_samples(ms: u32) -> u32 {
    (ms as f32 / 1000.0 * SAMPLE_RATE_HZ as f32) as u32
}

fn compute_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples
        .iter()
        .map(|&s| {
            let normalized = s as f64 / i16::MAX as f64;
            normalized * normalized
        })
        .sum();
    ((sum_sq / samples.len() as f64).sqrt()) as f32
}
