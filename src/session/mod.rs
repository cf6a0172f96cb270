//! On-disk session artifacts: the raw input stream, per-utterance and
//! per-response WAV files, and an ordered `session_log.json` event trail.
//!
//! Grounded on `original_source/src/session_recorder.cpp`'s `SessionRecorder`
//! (one directory per session, named by start timestamp; `raw_input.wav`
//! accumulated frame by frame; `utterance_<id>.wav` / `tts_<id>.wav` per
//! turn) but using `hound` for WAV encoding, the way
//! `varunr89-deskmic::audio::file_writer` writes its segment files, instead
//! of hand-rolled WAV headers.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use chrono::Local;
use hound::{SampleFormat, WavSpec, WavWriter};
use serde::Serialize;
use tracing::warn;

use crate::audio::frame::SAMPLE_RATE_HZ;
use crate::error::Result;
use crate::transcript::Transcript;

fn wav_spec() -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE_HZ,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

/// One entry in `session_log.json`, per §6's ordered event trail.
#[derive(Debug, Clone, Serialize)]
pub struct SessionEvent {
    pub timestamp_ms: i64,
    pub event_type: &'static str,
    pub data: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_path: Option<PathBuf>,
}

/// Records one session's audio and event trail to
/// `<session_log_dir>/<timestamp>/`.
pub struct SessionRecorder {
    session_dir: PathBuf,
    raw_input: Option<WavWriter<BufWriter<File>>>,
    events: Vec<SessionEvent>,
    start_ms: i64,
}

impl SessionRecorder {
    /// Create `<session_log_dir>/<start timestamp>/` and open `raw_input.wav`
    /// inside it.
    pub fn start(session_log_dir: &Path, start_ms: i64) -> Result<Self> {
        let session_id = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let session_dir = session_log_dir.join(session_id);
        std::fs::create_dir_all(&session_dir)?;

        let raw_input = WavWriter::create(session_dir.join("raw_input.wav"), wav_spec())?;

        Ok(Self {
            session_dir,
            raw_input: Some(raw_input),
            events: Vec::new(),
            start_ms,
        })
    }

    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    /// Append one captured frame to `raw_input.wav`. Called every frame,
    /// even inside the echo-guard window, so the raw recording reflects
    /// exactly what the microphone produced.
    pub fn record_input_frame(&mut self, samples: &[i16]) {
        let Some(writer) = self.raw_input.as_mut() else {
            return;
        };
        for &sample in samples {
            if let Err(e) = writer.write_sample(sample) {
                warn!(error = %e, "failed writing raw_input.wav sample");
                return;
            }
        }
    }

    /// Write `utterance_<id>.wav` and log a `speech_end` event.
    pub fn record_utterance(&mut self, samples: &[i16], utterance_id: u64, now_ms: i64) {
        let filename = format!("utterance_{utterance_id}.wav");
        let path = self.session_dir.join(&filename);
        if let Err(e) = write_wav(&path, samples) {
            warn!(error = %e, "failed writing utterance wav");
        }
        let duration_ms = (samples.len() as i64 * 1000) / SAMPLE_RATE_HZ as i64;
        self.push_event(
            "speech_end",
            serde_json::json!({ "duration_ms": duration_ms }),
            Some(filename.into()),
            now_ms,
        );
    }

    pub fn record_transcript(&mut self, transcript: &Transcript, now_ms: i64) {
        self.push_event(
            "transcript",
            serde_json::json!({
                "text": transcript.text,
                "confidence": transcript.confidence,
                "token_count": transcript.token_count,
            }),
            None,
            now_ms,
        );
    }

    pub fn record_llm_prompt(&mut self, prompt: &str, now_ms: i64) {
        self.push_event("llm_prompt", serde_json::json!({ "prompt": prompt }), None, now_ms);
    }

    pub fn record_llm_response(&mut self, response: &str, now_ms: i64) {
        self.push_event(
            "llm_response",
            serde_json::json!({ "response": response }),
            None,
            now_ms,
        );
    }

    /// Write `tts_<id>.wav` and log a `tts` event.
    pub fn record_tts_output(&mut self, samples: &[i16], utterance_id: u64, now_ms: i64) {
        let filename = format!("tts_{utterance_id}.wav");
        let path = self.session_dir.join(&filename);
        if let Err(e) = write_wav(&path, samples) {
            warn!(error = %e, "failed writing tts wav");
        }
        self.push_event("tts", serde_json::json!({}), Some(filename.into()), now_ms);
    }

    pub fn record_transmit(&mut self, sample_count: usize, now_ms: i64) {
        self.push_event(
            "transmit",
            serde_json::json!({ "sample_count": sample_count }),
            None,
            now_ms,
        );
    }

    fn push_event(
        &mut self,
        event_type: &'static str,
        data: serde_json::Value,
        audio_path: Option<PathBuf>,
        now_ms: i64,
    ) {
        self.events.push(SessionEvent {
            timestamp_ms: now_ms - self.start_ms,
            event_type,
            data,
            audio_path,
        });
    }

    /// Finalize `raw_input.wav` and flush `session_log.json`. Consumes
    /// `self` so a recorder can't be used after the session ends.
    pub fn finish(mut self) -> Result<()> {
        if let Some(writer) = self.raw_input.take() {
            writer.finalize()?;
        }
        let log_path = self.session_dir.join("session_log.json");
        let json = serde_json::to_string_pretty(&self.events)?;
        std::fs::write(log_path, json)?;
        Ok(())
    }
}

fn write_wav(path: &Path, samples: &[i16]) -> Result<()> {
    let mut writer = WavWriter::create(path, wav_spec())?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}
