//! The agent loop (C10): owns every other collaborator and drives one frame
//! at a time through VAD, the transcript gate, the router, the LLM
//! orchestrator, TTS, and the TX controller.
//!
//! Grounded on `original_source/src/agent.cpp`'s `Agent::run`/`process_frame`/
//! `handle_speech_end` (the guard-period short-circuit, the
//! `WaitingForChannelClear` pending-audio branch, wake-word stripping, and
//! `handle_blank_behavior`), translated from its single always-running
//! thread into the same shape: one blocking loop, no async runtime, matching
//! §5's redesign of the teacher's tokio-based coordinator.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::audio::device::AudioIo;
use crate::audio::frame::AudioFrame;
use crate::config::{AgentConfig, BlankBehavior};
use crate::error::Result;
use crate::llm::orchestrator::Orchestrator;
use crate::router::{self, Plan};
use crate::session::SessionRecorder;
use crate::stt::SttEngine;
use crate::transcript::{self, Transcript};
use crate::tts::{self, TtsEngine};
use crate::tx::{self, TxController};
use crate::vad::{EnergyVad, VadEvent};

/// Milliseconds of silence between frames, used for the clock the loop
/// carries itself (no real-time source is assumed; callers feed `now_ms`).
const IDLE_SLEEP_MS: u64 = 10;
const BUSY_SLEEP_MS: u64 = 1;

/// Everything the agent loop needs to run one session. Built once by the
/// binary (or a test) and handed ownership of the audio device, the STT/TTS
/// collaborators, and the `Orchestrator`.
pub struct AgentLoop {
    config: AgentConfig,
    audio_io: Box<dyn AudioIo>,
    stt: Box<dyn SttEngine>,
    tts: Box<dyn TtsEngine>,
    vad: EnergyVad,
    tx: TxController,
    orchestrator: Orchestrator,
    recorder: Option<SessionRecorder>,
    shutdown: Arc<AtomicBool>,

    current_state: crate::state_machine::StateMachine,
    utterance_id: u64,
    frame_count: u64,
    /// Wall-clock ms, advanced by the caller of [`Self::tick`] (or by
    /// [`Self::run`]'s own clock). Keeping time as an explicit input, rather
    /// than reading `Instant::now()` deep in the pipeline, is what makes
    /// [`Self::tick`] independently testable.
    now_ms: i64,
    transmission_end_ms: i64,
    last_speech_end_ms: i64,
    /// Set when a wake-word response (or repair/fast-path answer produced
    /// while waiting for the channel) needs to play once the channel falls
    /// silent for `tx.channel_clear_silence_ms`.
    pending_response_audio: Vec<i16>,
}

impl AgentLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: AgentConfig,
        audio_io: Box<dyn AudioIo>,
        stt: Box<dyn SttEngine>,
        tts: Box<dyn TtsEngine>,
        orchestrator: Orchestrator,
        recorder: Option<SessionRecorder>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        let vad = EnergyVad::new(&config.vad);
        let tx = TxController::new(&config.tx);
        Self {
            config,
            audio_io,
            stt,
            tts,
            vad,
            tx,
            orchestrator,
            recorder,
            shutdown,
            current_state: crate::state_machine::StateMachine::new(),
            utterance_id: 0,
            frame_count: 0,
            now_ms: 0,
            transmission_end_ms: i64::MIN / 2,
            last_speech_end_ms: i64::MIN / 2,
            pending_response_audio: Vec::new(),
        }
    }

    pub fn state(&self) -> crate::state_machine::AgentState {
        self.current_state.state()
    }

    /// Run until `shutdown` is set, reading frames from the device and
    /// sleeping briefly when none are ready. Advances its own millisecond
    /// clock from [`std::time::Instant`] since real wall time is what a
    /// live device loop needs.
    pub fn run(&mut self) -> Result<()> {
        let start = std::time::Instant::now();
        info!("agent loop starting");
        while !self.shutdown.load(Ordering::Relaxed) {
            self.now_ms = start.elapsed().as_millis() as i64;
            match self.audio_io.read_frame() {
                Some(frame) => {
                    self.tick(&frame)?;
                    std::thread::sleep(Duration::from_millis(BUSY_SLEEP_MS));
                }
                None => std::thread::sleep(Duration::from_millis(IDLE_SLEEP_MS)),
            }
        }
        info!("agent loop shutting down");
        if let Some(recorder) = self.recorder.take() {
            recorder.finish()?;
        }
        self.audio_io.stop();
        Ok(())
    }

    /// Process exactly one captured frame. Public and independent of
    /// `run()`'s sleep/clock machinery so tests can drive the loop
    /// frame-by-frame with [`crate::audio::device::MemoryAudioIo`].
    pub fn tick(&mut self, frame: &AudioFrame) -> Result<()> {
        self.frame_count += 1;

        if let Some(recorder) = self.recorder.as_mut() {
            recorder.record_input_frame(&frame.samples);
        }

        self.poll_playback_complete();

        let state = self.current_state.state();
        use crate::state_machine::AgentState::*;

        // Never run the VAD while thinking or transmitting: the primary
        // defense against the agent hearing (and reacting to) itself.
        if state == Thinking || state == Transmitting {
            return Ok(());
        }

        if state == WaitingForChannelClear && !self.pending_response_audio.is_empty() {
            let silence_ms = self.now_ms - self.last_speech_end_ms;
            if silence_ms >= self.config.tx.channel_clear_silence_ms as i64 {
                self.current_state.apply(crate::state_machine::StateEvent::ChannelClear);
                self.vad.reset();
                let audio = std::mem::take(&mut self.pending_response_audio);
                self.transmit(&audio)?;
                return Ok(());
            }
        }

        if state == IdleListening
            && tx::within_guard_period(self.now_ms, self.transmission_end_ms)
        {
            return Ok(());
        }

        let vad_event = self.vad.process_frame(frame);
        match vad_event {
            VadEvent::SpeechStart => {
                self.current_state.apply(crate::state_machine::StateEvent::SpeechStart);
            }
            VadEvent::SpeechEnd => {
                self.handle_speech_end()?;
            }
            VadEvent::None | VadEvent::SpeechContinue => {}
        }
        Ok(())
    }

    /// Catch the `Transmitting -> IdleListening` edge every frame (not just
    /// on a VAD event) so playback completion is noticed as soon as the
    /// device reports it.
    fn poll_playback_complete(&mut self) {
        if self.current_state.state() != crate::state_machine::AgentState::Transmitting {
            return;
        }
        if self.tx.is_transmitting(self.audio_io.as_ref()) {
            return;
        }
        self.current_state
            .apply(crate::state_machine::StateEvent::PlaybackComplete);
        self.transmission_end_ms = self.now_ms;
        self.vad.reset();
        // Frames that arrived while the loop was blocked in the speech-end
        // handler (STT/LLM/TTS all run synchronously here) are stale by the
        // time playback ends; drop them rather than process them as input.
        self.audio_io.flush_input_queue();
    }

    fn handle_speech_end(&mut self) -> Result<()> {
        self.last_speech_end_ms = self.now_ms;

        // Half-duplex: the far end spoke while we were waiting to transmit
        // our own pending response. Record the state transition and keep
        // waiting; the pending audio still goes out once the channel clears.
        if !self.pending_response_audio.is_empty() {
            self.current_state
                .apply(crate::state_machine::StateEvent::SpeechEndPendingTx);
            return Ok(());
        }

        let samples = self.vad.finalize_segment();
        let min_samples =
            (self.config.vad.min_speech_ms as usize * crate::audio::frame::SAMPLE_RATE_HZ as usize)
                / 1000;
        if samples.len() < min_samples {
            // Belt and suspenders: the VAD's own debounce should already
            // rule this out, but a defensive check here costs nothing.
            self.current_state
                .apply(crate::state_machine::StateEvent::SpeechEndWakeWordIdle);
            return Ok(());
        }

        self.utterance_id += 1;
        let utterance_id = self.utterance_id;
        if let Some(recorder) = self.recorder.as_mut() {
            recorder.record_utterance(&samples, utterance_id, self.now_ms);
        }

        let mut transcript = self.stt.transcribe(&samples)?;
        if let Some(recorder) = self.recorder.as_mut() {
            recorder.record_transcript(&transcript, self.now_ms);
        }

        if transcript::is_low_signal(&transcript, &self.config.transcript_gate, &self.config.stt.blank_sentinel) {
            debug!(utterance_id, "transcript gate failed, low signal");
            return self.handle_blank_behavior();
        }

        if self.config.wake_word.enabled {
            let normalized = transcript.text.to_lowercase();
            let phrase = self.config.wake_word.phrase.to_lowercase();
            let Some(pos) = normalized.find(&phrase) else {
                // No wake word: stay silent and go back to listening.
                self.current_state
                    .apply(crate::state_machine::StateEvent::SpeechEndWakeWordIdle);
                return Ok(());
            };
            let remainder = transcript.text[pos + phrase.len()..].trim().to_string();
            if transcript::is_blank_transcript(&remainder, &self.config.stt.blank_sentinel) {
                return self.handle_blank_behavior();
            }
            transcript.text = remainder;
        }

        let plan = router::decide(&transcript, &self.config.router);

        // Wake-word mode answers only once the channel falls silent; the
        // open-mic path answers immediately after the ack (if any). Drive
        // the state machine through whichever of the two legitimate
        // `WaitingForChannelClear` entry points matches: `IdleListening +
        // ResponseReady` for wake-word mode, `Thinking + ResponseReady ->
        // Transmitting` otherwise.
        let wait_for_channel_clear = self.config.wake_word.enabled;
        let event = if wait_for_channel_clear {
            crate::state_machine::StateEvent::SpeechEndWakeWordIdle
        } else {
            crate::state_machine::StateEvent::SpeechEndNoPending
        };
        self.current_state.apply(event);

        self.execute_plan(plan, &transcript, utterance_id, wait_for_channel_clear)
    }

    fn handle_blank_behavior(&mut self) -> Result<()> {
        match self.config.transcript_blank_behavior.behavior {
            BlankBehavior::None => {
                self.current_state
                    .apply(crate::state_machine::StateEvent::SpeechEndWakeWordIdle);
                self.vad.reset();
            }
            BlankBehavior::SayAgain => {
                let phrase = crate::llm::postprocess::ensure_ends_with_over(
                    &self.config.transcript_blank_behavior.say_again_phrase,
                );
                let audio = tts::synth_vox(self.tts.as_ref(), &self.config.tts, &phrase)?;
                self.current_state
                    .apply(crate::state_machine::StateEvent::SpeechEndNoPending);
                self.current_state
                    .apply(crate::state_machine::StateEvent::ResponseReady);
                self.vad.reset();
                self.transmit(&audio)?;
            }
            BlankBehavior::Beep => {
                let beep = tts::generate_preroll(&self.config.tts);
                self.current_state
                    .apply(crate::state_machine::StateEvent::SpeechEndNoPending);
                self.current_state
                    .apply(crate::state_machine::StateEvent::ResponseReady);
                self.vad.reset();
                self.transmit(&beep)?;
            }
        }
        Ok(())
    }

    fn execute_plan(
        &mut self,
        plan: Plan,
        transcript: &Transcript,
        utterance_id: u64,
        wait_for_channel_clear: bool,
    ) -> Result<()> {
        match plan {
            Plan::NoOp => Ok(()),
            Plan::Speak { answer, .. } | Plan::Fallback { text: answer } | Plan::Repair { phrase: answer } => {
                let text = crate::llm::postprocess::ensure_ends_with_over(&answer);
                let audio = tts::synth_vox(self.tts.as_ref(), &self.config.tts, &text)?;
                if let Some(recorder) = self.recorder.as_mut() {
                    recorder.record_tts_output(&audio, utterance_id, self.now_ms);
                }
                self.deliver(audio, wait_for_channel_clear)
            }
            Plan::AckThenLlm { ack } => self.execute_llm_path(&ack, transcript, utterance_id, wait_for_channel_clear),
        }
    }

    fn execute_llm_path(
        &mut self,
        ack: &str,
        transcript: &Transcript,
        utterance_id: u64,
        wait_for_channel_clear: bool,
    ) -> Result<()> {
        if !wait_for_channel_clear && !ack.is_empty() {
            let ack_text = crate::llm::postprocess::ensure_ends_with_over(ack);
            let ack_audio = tts::synth_vox(self.tts.as_ref(), &self.config.tts, &ack_text)?;
            self.vad.reset();
            self.tx.transmit(self.audio_io.as_mut(), &ack_audio)?;
            while self.tx.is_transmitting(self.audio_io.as_ref()) && !self.shutdown.load(Ordering::Relaxed) {
                std::thread::sleep(Duration::from_millis(IDLE_SLEEP_MS));
            }
            self.transmission_end_ms = self.now_ms;
        }

        if let Some(recorder) = self.recorder.as_mut() {
            recorder.record_llm_prompt(&transcript.text, self.now_ms);
        }

        let response = self
            .orchestrator
            .respond(&transcript.text, transcript.confidence, self.now_ms)?;

        if let Some(recorder) = self.recorder.as_mut() {
            recorder.record_llm_response(&response, self.now_ms);
        }

        let audio = tts::synth_vox(self.tts.as_ref(), &self.config.tts, &response)?;
        if let Some(recorder) = self.recorder.as_mut() {
            recorder.record_tts_output(&audio, utterance_id, self.now_ms);
        }
        self.deliver(audio, wait_for_channel_clear)
    }

    /// Either transmit immediately (open-mic path) or stash the audio as
    /// pending and move to `WaitingForChannelClear` (wake-word path, where
    /// we answer only once the channel has been silent long enough).
    fn deliver(&mut self, audio: Vec<i16>, wait_for_channel_clear: bool) -> Result<()> {
        if wait_for_channel_clear {
            self.pending_response_audio = audio;
            self.current_state
                .apply(crate::state_machine::StateEvent::ResponseReady);
            return Ok(());
        }
        self.current_state
            .apply(crate::state_machine::StateEvent::ResponseReady);
        self.vad.reset();
        self.transmit(&audio)
    }

    fn transmit(&mut self, audio: &[i16]) -> Result<()> {
        self.tx.transmit(self.audio_io.as_mut(), audio)?;
        if let Some(recorder) = self.recorder.as_mut() {
            recorder.record_transmit(audio.len(), self.now_ms);
        }
        if !self.tx.is_transmitting(self.audio_io.as_ref()) {
            // Already done (e.g. zero-length or a test double with instant
            // playback); reflect that in the transition immediately instead
            // of waiting for the next tick to notice.
            self.poll_playback_complete();
        }
        Ok(())
    }
}

/// Installs a `ctrlc` handler that flips a shared flag, mirroring
/// `varunr89-deskmic::recorder::run_recorder`'s shutdown wiring. Returns the
/// flag for the caller to hand to [`AgentLoop::new`].
pub fn install_shutdown_handler() -> Result<Arc<AtomicBool>> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    ctrlc::set_handler(move || {
        warn!("shutdown signal received");
        flag.store(true, Ordering::Relaxed);
    })
    .map_err(|e| crate::error::AgentError::Agent(format!("failed to install signal handler: {e}")))?;
    Ok(shutdown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::device::MemoryAudioIo;
    use crate::audio::frame::{AudioFrame, SAMPLES_PER_FRAME};
    use crate::config::{AgentConfig, MemoryConfig};
    use crate::llm::client::ScriptedLlmClient;
    use crate::llm::summarizer::Summarizer;
    use crate::llm::types::{GenerationResponse, StopReason};
    use crate::memory::ConversationMemory;
    use crate::state_machine::AgentState;
    use crate::stt::ScriptedSttEngine;
    use crate::tools::registry::ToolRegistry;
    use crate::tools::executor::ToolExecutor;
    use crate::tts::ScriptedTtsEngine;

    fn silence_frames(n: usize) -> Vec<AudioFrame> {
        (0..n).map(|_| AudioFrame::silence()).collect()
    }

    fn loud_frame() -> AudioFrame {
        AudioFrame::new(vec![20_000i16; SAMPLES_PER_FRAME])
    }

    fn build_loop(
        config: AgentConfig,
        input_frames: Vec<AudioFrame>,
        stt: Vec<Transcript>,
        llm: Vec<GenerationResponse>,
    ) -> AgentLoop {
        let audio_io = Box::new(MemoryAudioIo::new(input_frames));
        let stt_engine = Box::new(ScriptedSttEngine::new(stt));
        let tts_engine = Box::new(ScriptedTtsEngine::new());

        let client = Arc::new(ScriptedLlmClient::new(llm));
        let memory = Arc::new(ConversationMemory::new(
            config.memory.clone(),
            config.llm.system_prompt.clone(),
            0,
        ));
        let registry = Arc::new(ToolRegistry::new());
        let executor = Arc::new(ToolExecutor::new(registry.clone(), 1));
        let summarizer = Arc::new(Summarizer::spawn(client.clone(), config.llm.model_name.clone()));
        let orchestrator = Orchestrator::new(
            config.llm.clone(),
            config.clarifier.clone(),
            config.tools.clone(),
            client,
            memory,
            registry,
            executor,
            summarizer,
        );

        AgentLoop::new(
            config,
            audio_io,
            stt_engine,
            tts_engine,
            orchestrator,
            None,
            Arc::new(AtomicBool::new(false)),
        )
    }

    fn default_config() -> AgentConfig {
        let mut cfg = AgentConfig::default();
        cfg.memory = MemoryConfig::default();
        cfg.vad.min_speech_ms = 20;
        cfg
    }

    #[test]
    fn silence_only_never_leaves_idle_listening() {
        let mut agent = build_loop(default_config(), vec![], vec![], vec![]);
        for frame in silence_frames(10) {
            agent.tick(&frame).unwrap();
        }
        assert_eq!(agent.state(), AgentState::IdleListening);
    }

    #[test]
    fn short_burst_is_discarded_and_stays_idle() {
        let mut agent = build_loop(default_config(), vec![], vec![], vec![]);
        agent.tick(&loud_frame()).unwrap();
        agent.tick(&loud_frame()).unwrap();
        // One frame of speech is far under min_speech_ms once hangover ends;
        // run enough silence to flush the VAD back to Silence.
        for frame in silence_frames(40) {
            agent.tick(&frame).unwrap();
        }
        assert_eq!(agent.state(), AgentState::IdleListening);
    }

    #[test]
    fn fast_path_roger_transmits_without_calling_llm() {
        let transcript = Transcript {
            text: "roger".to_string(),
            confidence: 0.9,
            token_count: 1,
            processing_ms: 1,
        };
        let mut agent = build_loop(default_config(), vec![], vec![transcript], vec![]);

        for frame in [loud_frame(), loud_frame()] {
            agent.tick(&frame).unwrap();
        }
        for frame in silence_frames(40) {
            agent.tick(&frame).unwrap();
        }

        assert_eq!(agent.state(), AgentState::Transmitting);
    }

    #[test]
    fn llm_truncation_falls_back_to_stand_by() {
        let transcript = Transcript {
            text: "what is the plan".to_string(),
            confidence: 0.95,
            token_count: 4,
            processing_ms: 1,
        };
        let mut cfg = default_config();
        cfg.clarifier.enabled = false;
        let truncated = GenerationResponse {
            text: "partial thought that never finish".to_string(),
            tool_calls: vec![],
            stop_reason: StopReason::Length,
        };
        let mut agent = build_loop(cfg, vec![], vec![transcript], vec![truncated]);

        for frame in [loud_frame(), loud_frame()] {
            agent.tick(&frame).unwrap();
        }
        for frame in silence_frames(40) {
            agent.tick(&frame).unwrap();
        }

        assert_eq!(agent.state(), AgentState::Transmitting);
    }

    #[test]
    fn guard_period_suppresses_vad_after_transmission() {
        let mut agent = build_loop(default_config(), vec![], vec![], vec![]);
        agent.transmission_end_ms = 0;
        agent.now_ms = 100;
        // Still well inside the 1500ms guard window: a loud frame must not
        // start a speech segment.
        agent.tick(&loud_frame()).unwrap();
        assert_eq!(agent.state(), AgentState::IdleListening);
    }

    #[test]
    fn wake_word_disabled_by_default_treats_every_utterance_as_addressed() {
        let cfg = default_config();
        assert!(!cfg.wake_word.enabled);
    }

    #[test]
    fn wake_word_defers_response_until_channel_clears() {
        let transcript = Transcript {
            text: "hey memo roger".to_string(),
            confidence: 0.9,
            token_count: 3,
            processing_ms: 1,
        };
        let mut cfg = default_config();
        cfg.wake_word.enabled = true;
        let mut agent = build_loop(cfg, vec![], vec![transcript], vec![]);

        for frame in [loud_frame(), loud_frame()] {
            agent.tick(&frame).unwrap();
        }
        for frame in silence_frames(40) {
            agent.tick(&frame).unwrap();
        }

        // The channel hasn't been silent long enough yet: the reply is
        // queued, not transmitted.
        assert_eq!(agent.state(), AgentState::WaitingForChannelClear);

        agent.now_ms = 900;
        agent.tick(&AudioFrame::silence()).unwrap();
        assert_eq!(agent.state(), AgentState::Transmitting);
    }

    #[test]
    fn blank_transcript_say_again_transmits_instead_of_stalling() {
        let transcript = Transcript {
            text: String::new(),
            confidence: 0.9,
            token_count: 0,
            processing_ms: 1,
        };
        let mut cfg = default_config();
        cfg.transcript_blank_behavior.behavior = crate::config::BlankBehavior::SayAgain;
        let mut agent = build_loop(cfg, vec![], vec![transcript], vec![]);

        for frame in [loud_frame(), loud_frame()] {
            agent.tick(&frame).unwrap();
        }
        for frame in silence_frames(40) {
            agent.tick(&frame).unwrap();
        }

        assert_eq!(agent.state(), AgentState::Transmitting);
    }
}
