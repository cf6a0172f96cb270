//! TX controller and echo guard (C9): enforces the max-transmit cap, hands
//! audio to the device, and times the post-transmit window during which the
//! agent loop must not run the VAD over captured frames.
//!
//! Grounded on `original_source/src/tx_controller.cpp`'s `TXController::Impl`
//! (truncate-then-play, `is_transmitting` delegates to the device's
//! playback-complete flag, `stop` drains) and `::agent.cpp`'s
//! `VAD_GUARD_PERIOD_MS` / echo-probe logic (§4.9, §9 `[EXPANSION]`).

use tracing::warn;

use crate::audio::device::AudioIo;
use crate::audio::frame::SAMPLE_RATE_HZ;
use crate::config::TxConfig;
use crate::error::Result;

/// Taken from `original_source/include/common.h`. While less than this many
/// milliseconds have elapsed since the end of the agent's own transmission,
/// the agent loop must not run the VAD over captured frames — otherwise the
/// agent can hear (and respond to) its own voice through room echo.
pub const VAD_GUARD_PERIOD_MS: i64 = 1500;

/// Truncates outgoing audio to the configured cap and hands it to the audio
/// device. Does not own the device; callers pass one in per call, matching
/// the agent loop's ownership of the single [`AudioIo`] instance.
pub struct TxController {
    max_transmit_samples: usize,
}

impl TxController {
    pub fn new(config: &TxConfig) -> Self {
        Self {
            max_transmit_samples: (config.max_transmit_ms as usize * SAMPLE_RATE_HZ as usize) / 1000,
        }
    }

    /// Truncate `buffer` to the configured cap (0 = no limit) and queue it
    /// for playback.
    pub fn transmit(&self, audio_io: &mut dyn AudioIo, buffer: &[i16]) -> Result<()> {
        let limited = if self.max_transmit_samples > 0 && buffer.len() > self.max_transmit_samples {
            warn!(
                original = buffer.len(),
                truncated = self.max_transmit_samples,
                "transmit buffer exceeds max_transmit_ms, truncating"
            );
            &buffer[..self.max_transmit_samples]
        } else {
            buffer
        };
        audio_io.play(limited)
    }

    pub fn is_transmitting(&self, audio_io: &dyn AudioIo) -> bool {
        !audio_io.is_playback_complete()
    }

    pub fn stop(&self, audio_io: &mut dyn AudioIo) {
        audio_io.stop_playback();
    }
}

/// True while the agent loop is still inside the post-transmit guard window
/// and must suppress VAD processing.
pub fn within_guard_period(now_ms: i64, transmission_end_ms: i64) -> bool {
    now_ms - transmission_end_ms < VAD_GUARD_PERIOD_MS
}

/// Diagnostic-only echo probe: RMS of a frame captured 1-3s after TX ended.
/// Logged, never acted on — purely to measure whether the mic still picks
/// up the agent's own playback through room echo (§4.9).
pub fn echo_probe_rms(samples: &[i16], now_ms: i64, transmission_end_ms: i64) -> Option<f32> {
    let elapsed = now_ms - transmission_end_ms;
    if !(1000..=3000).contains(&elapsed) {
        return None;
    }
    if samples.is_empty() {
        return Some(0.0);
    }
    let sum_sq: f64 = samples
        .iter()
        .map(|&s| {
            let n = s as f64 / i16::MAX as f64;
            n * n
        })
        .sum();
    Some((sum_sq / samples.len() as f64).sqrt() as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::device::MemoryAudioIo;

    fn config(max_transmit_ms: u32) -> TxConfig {
        TxConfig {
            max_transmit_ms,
            standby_delay_ms: 150,
            channel_clear_silence_ms: 800,
        }
    }

    #[test]
    fn truncates_buffer_to_max_transmit_cap() {
        let tx = TxController::new(&config(10));
        let mut io = MemoryAudioIo::new(vec![]);
        let buffer = vec![1i16; 10_000];
        tx.transmit(&mut io, &buffer).unwrap();
        let expected_samples = (10 * SAMPLE_RATE_HZ as usize) / 1000;
        assert_eq!(io.transmitted[0].len(), expected_samples);
    }

    #[test]
    fn zero_cap_means_no_limit() {
        let tx = TxController::new(&config(0));
        let mut io = MemoryAudioIo::new(vec![]);
        let buffer = vec![1i16; 5_000];
        tx.transmit(&mut io, &buffer).unwrap();
        assert_eq!(io.transmitted[0].len(), 5_000);
    }

    #[test]
    fn is_transmitting_reflects_device_playback_state() {
        let tx = TxController::new(&config(0));
        let mut io = MemoryAudioIo::new(vec![]);
        assert!(!tx.is_transmitting(&io));
        tx.transmit(&mut io, &[1, 2, 3]).unwrap();
        assert!(tx.is_transmitting(&io));
        io.advance_playback(100);
        assert!(!tx.is_transmitting(&io));
    }

    #[test]
    fn stop_drains_pending_playback() {
        let tx = TxController::new(&config(0));
        let mut io = MemoryAudioIo::new(vec![]);
        tx.transmit(&mut io, &[1, 2, 3]).unwrap();
        tx.stop(&mut io);
        assert!(!tx.is_transmitting(&io));
    }

    #[test]
    fn guard_period_holds_for_1500ms() {
        assert!(within_guard_period(1499, 0));
        assert!(!within_guard_period(1500, 0));
    }

    #[test]
    fn echo_probe_only_samples_the_one_to_three_second_window() {
        assert!(echo_probe_rms(&[0, 0], 500, 0).is_none());
        assert!(echo_probe_rms(&[0, 0], 4000, 0).is_none());
        assert!(echo_probe_rms(&[0, 0], 2000, 0).is_some());
    }
}
