//! Audio I/O contract consumed by the agent loop, plus a `cpal`-backed
//! reference implementation and an in-memory test double.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{debug, error, info, warn};

use crate::audio::frame::{AudioFrame, SAMPLES_PER_FRAME};
use crate::audio::ring_buffer::RingBuffer;
use crate::config::AudioConfig;
use crate::error::{AgentError, Result};

/// The contract the agent loop drives audio through. Implemented by a real
/// device backend and, for tests, an in-memory double.
pub trait AudioIo: Send {
    /// Pull the next input frame if one is ready; non-blocking.
    fn read_frame(&mut self) -> Option<AudioFrame>;

    /// Queue a buffer for playback. Returns once queued, not once played.
    fn play(&mut self, buffer: &[i16]) -> Result<()>;

    /// True once the playback queue is drained and the device is idle.
    fn is_playback_complete(&self) -> bool;

    /// Drop any queued-but-unplayed audio immediately.
    fn stop_playback(&mut self);

    /// Discard any buffered-but-unread input frames.
    fn flush_input_queue(&mut self);

    fn stop(&mut self);
}

/// `cpal`-backed implementation of [`AudioIo`].
///
/// Input samples are pushed by the capture callback into a [`RingBuffer`];
/// output samples are pulled from a playback queue by the render callback.
/// Both streams are built at construction time and kept alive for the
/// lifetime of this struct.
pub struct CpalAudioIo {
    _input_stream: cpal::Stream,
    _output_stream: cpal::Stream,
    input_ring: Arc<RingBuffer>,
    playback_queue: Arc<Mutex<VecDeque<i16>>>,
    playback_active: Arc<AtomicBool>,
}

impl CpalAudioIo {
    pub fn new(config: &AudioConfig) -> Result<Self> {
        let host = cpal::default_host();

        let input_device = select_device(&host, config.input_device.as_deref(), true)?;
        let output_device = select_device(&host, config.output_device.as_deref(), false)?;

        let input_ring = Arc::new(RingBuffer::new(SAMPLES_PER_FRAME * 64));
        let playback_queue: Arc<Mutex<VecDeque<i16>>> = Arc::new(Mutex::new(VecDeque::new()));
        let playback_active = Arc::new(AtomicBool::new(false));

        let input_stream_config = input_device
            .default_input_config()
            .map_err(|e| AgentError::Audio(format!("no default input config: {e}")))?
            .config();

        let ring_for_cb = input_ring.clone();
        let input_stream = input_device
            .build_input_stream(
                &input_stream_config,
                move |data: &[f32], _| {
                    let samples: Vec<i16> = data
                        .iter()
                        .map(|s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                        .collect();
                    let written = ring_for_cb.write(&samples);
                    if written < samples.len() {
                        warn!(
                            dropped = samples.len() - written,
                            "input ring buffer full, dropping samples"
                        );
                    }
                },
                |err| error!(%err, "input stream error"),
                None,
            )
            .map_err(|e| AgentError::Audio(format!("failed to build input stream: {e}")))?;

        let output_stream_config = output_device
            .default_output_config()
            .map_err(|e| AgentError::Audio(format!("no default output config: {e}")))?
            .config();

        let queue_for_cb = playback_queue.clone();
        let active_for_cb = playback_active.clone();
        let output_stream = output_device
            .build_output_stream(
                &output_stream_config,
                move |data: &mut [f32], _| {
                    let mut queue = queue_for_cb.lock().expect("playback queue poisoned");
                    for sample in data.iter_mut() {
                        *sample = match queue.pop_front() {
                            Some(s) => s as f32 / i16::MAX as f32,
                            None => 0.0,
                        };
                    }
                    active_for_cb.store(!queue.is_empty(), Ordering::Release);
                },
                |err| error!(%err, "output stream error"),
                None,
            )
            .map_err(|e| AgentError::Audio(format!("failed to build output stream: {e}")))?;

        input_stream
            .play()
            .map_err(|e| AgentError::Audio(format!("failed to start input stream: {e}")))?;
        output_stream
            .play()
            .map_err(|e| AgentError::Audio(format!("failed to start output stream: {e}")))?;

        info!("audio device streams started");

        Ok(Self {
            _input_stream: input_stream,
            _output_stream: output_stream,
            input_ring,
            playback_queue,
            playback_active,
        })
    }
}

impl AudioIo for CpalAudioIo {
    fn read_frame(&mut self) -> Option<AudioFrame> {
        if self.input_ring.len() < SAMPLES_PER_FRAME {
            return None;
        }
        let mut samples = vec![0i16; SAMPLES_PER_FRAME];
        self.input_ring.read(&mut samples);
        Some(AudioFrame::new(samples))
    }

    fn play(&mut self, buffer: &[i16]) -> Result<()> {
        let mut queue = self
            .playback_queue
            .lock()
            .map_err(|_| AgentError::Audio("playback queue poisoned".into()))?;
        queue.extend(buffer.iter().copied());
        self.playback_active.store(true, Ordering::Release);
        Ok(())
    }

    fn is_playback_complete(&self) -> bool {
        !self.playback_active.load(Ordering::Acquire)
    }

    fn stop_playback(&mut self) {
        if let Ok(mut queue) = self.playback_queue.lock() {
            queue.clear();
        }
        self.playback_active.store(false, Ordering::Release);
    }

    fn flush_input_queue(&mut self) {
        self.input_ring.clear();
    }

    fn stop(&mut self) {
        self.stop_playback();
        self.flush_input_queue();
    }
}

fn select_device(host: &cpal::Host, name: Option<&str>, is_input: bool) -> Result<cpal::Device> {
    if let Some(name) = name {
        let mut devices = if is_input {
            host.input_devices()
        } else {
            host.output_devices()
        }
        .map_err(|e| AgentError::Audio(format!("failed to enumerate devices: {e}")))?;

        if let Some(device) = devices.find(|d| d.name().map(|n| n == name).unwrap_or(false)) {
            debug!(device = name, "using configured device");
            return Ok(device);
        }
        warn!(device = name, "configured device not found, using default");
    }

    let device = if is_input {
        host.default_input_device()
    } else {
        host.default_output_device()
    };
    device.ok_or_else(|| AgentError::Audio("no default audio device available".into()))
}

/// In-memory test double: replays pre-recorded input frames and records
/// everything written to the output, so the agent loop can be exercised
/// deterministically without a physical device.
pub struct MemoryAudioIo {
    pending_input: VecDeque<AudioFrame>,
    pub transmitted: Vec<Vec<i16>>,
    playback_remaining: usize,
}

impl MemoryAudioIo {
    pub fn new(input_frames: Vec<AudioFrame>) -> Self {
        Self {
            pending_input: input_frames.into(),
            transmitted: Vec::new(),
            playback_remaining: 0,
        }
    }

    /// Advance playback state as if `frames` worth of device time elapsed.
    pub fn advance_playback(&mut self, frames: usize) {
        self.playback_remaining = self.playback_remaining.saturating_sub(frames);
    }
}

impl AudioIo for MemoryAudioIo {
    fn read_frame(&mut self) -> Option<AudioFrame> {
        self.pending_input.pop_front()
    }

    fn play(&mut self, buffer: &[i16]) -> Result<()> {
        self.transmitted.push(buffer.to_vec());
        self.playback_remaining += buffer.len() / SAMPLES_PER_FRAME + 1;
        Ok(())
    }

    fn is_playback_complete(&self) -> bool {
        self.playback_remaining == 0
    }

    fn stop_playback(&mut self) {
        self.playback_remaining = 0;
    }

    fn flush_input_queue(&mut self) {
        self.pending_input.clear();
    }

    fn stop(&mut self) {
        self.stop_playback();
        self.flush_input_queue();
    }
}
