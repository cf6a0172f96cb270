//! Single-producer/single-consumer audio ring buffer.
//!
//! One thread writes, one thread reads; correctness of the atomic ordering
//! below depends on that split. `peek` never advances the read position.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Fixed-capacity circular buffer of `i16` PCM samples.
///
/// The backing storage is a plain `Mutex<Vec<i16>>` (there is exactly one
/// producer and one consumer, so contention is never real contention) while
/// `size` is tracked separately as an atomic so `available`/`len` can be
/// read without taking the lock.
pub struct RingBuffer {
    capacity: usize,
    storage: Mutex<Vec<i16>>,
    write_pos: AtomicUsize,
    read_pos: AtomicUsize,
    size: AtomicUsize,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            storage: Mutex::new(vec![0i16; capacity]),
            write_pos: AtomicUsize::new(0),
            read_pos: AtomicUsize::new(0),
            size: AtomicUsize::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() == self.capacity
    }

    pub fn available(&self) -> usize {
        self.capacity - self.len()
    }

    /// Write as many samples from `data` as fit in the remaining capacity.
    /// Returns the number actually written.
    pub fn write(&self, data: &[i16]) -> usize {
        let to_write = data.len().min(self.available());
        if to_write == 0 {
            return 0;
        }
        let mut storage = self.storage.lock().expect("ring buffer lock poisoned");
        let write_pos = self.write_pos.load(Ordering::Relaxed);
        let first_chunk = (self.capacity - write_pos).min(to_write);
        storage[write_pos..write_pos + first_chunk].copy_from_slice(&data[..first_chunk]);
        let remaining = to_write - first_chunk;
        if remaining > 0 {
            storage[..remaining].copy_from_slice(&data[first_chunk..first_chunk + remaining]);
        }
        drop(storage);
        self.write_pos
            .store((write_pos + to_write) % self.capacity, Ordering::Relaxed);
        self.size.fetch_add(to_write, Ordering::Release);
        to_write
    }

    /// Read up to `dst.len()` samples, advancing the read position. Returns
    /// the number actually read.
    pub fn read(&self, dst: &mut [i16]) -> usize {
        let to_read = self.copy_out(dst, true);
        to_read
    }

    /// Copy up to `dst.len()` samples without advancing the read position.
    pub fn peek(&self, dst: &mut [i16]) -> usize {
        self.copy_out(dst, false)
    }

    /// Snapshot every currently-buffered sample without consuming it.
    pub fn peek_all(&self) -> Vec<i16> {
        let len = self.len();
        let mut out = vec![0i16; len];
        self.peek(&mut out);
        out
    }

    /// Advance the read position by `count` samples without copying them.
    /// Returns the number actually skipped.
    pub fn skip(&self, count: usize) -> usize {
        let to_skip = count.min(self.len());
        if to_skip == 0 {
            return 0;
        }
        let read_pos = self.read_pos.load(Ordering::Relaxed);
        self.read_pos
            .store((read_pos + to_skip) % self.capacity, Ordering::Relaxed);
        self.size.fetch_sub(to_skip, Ordering::Release);
        to_skip
    }

    pub fn clear(&self) {
        self.write_pos.store(0, Ordering::Relaxed);
        self.read_pos.store(0, Ordering::Relaxed);
        self.size.store(0, Ordering::Release);
    }

    fn copy_out(&self, dst: &mut [i16], consume: bool) -> usize {
        let to_read = dst.len().min(self.len());
        if to_read == 0 {
            return 0;
        }
        let storage = self.storage.lock().expect("ring buffer lock poisoned");
        let read_pos = self.read_pos.load(Ordering::Relaxed);
        let first_chunk = (self.capacity - read_pos).min(to_read);
        dst[..first_chunk].copy_from_slice(&storage[read_pos..read_pos + first_chunk]);
        let remaining = to_read - first_chunk;
        if remaining > 0 {
            dst[first_chunk..first_chunk + remaining].copy_from_slice(&storage[..remaining]);
        }
        drop(storage);
        if consume {
            self.read_pos
                .store((read_pos + to_read) % self.capacity, Ordering::Relaxed);
            self.size.fetch_sub(to_read, Ordering::Release);
        }
        to_read
    }
}
