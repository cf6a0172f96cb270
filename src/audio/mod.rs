//! Audio capture/playback plumbing: frames, ring buffer, and the device I/O
//! contract the agent loop drives.

pub mod device;
pub mod frame;
pub mod ring_buffer;

pub use device::{AudioIo, CpalAudioIo, MemoryAudioIo};
pub use frame::{AudioFrame, SAMPLES_PER_FRAME, SAMPLE_RATE_HZ};
pub use ring_buffer::RingBuffer;
