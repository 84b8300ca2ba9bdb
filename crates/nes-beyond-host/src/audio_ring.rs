use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};

use crate::core::AudioSink;

/// Samples the audio device asks for per callback.
pub const DEFAULT_BLOCK: usize = 4096;

/// Ring capacity; twice the device pull so ordinary jitter cannot overtake.
pub const DEFAULT_CAPACITY: usize = DEFAULT_BLOCK * 2;

/// Single-producer / single-consumer ring of stereo `f32` samples.
///
/// The emulation loop pushes, the audio callback thread pulls, and the two
/// sides only share the cursors. The producer never waits: once it laps the
/// consumer it keeps writing over unread samples.
#[derive(Clone)]
pub struct AudioProducer {
    inner: Arc<Inner>,
}

/// Consumer half, moved into the audio device callback.
#[derive(Clone)]
pub struct AudioConsumer {
    inner: Arc<Inner>,
}

struct Inner {
    // Sample slots hold f32 bit patterns. A lapping producer may store into a
    // slot the consumer is reading; atomics keep that a stale value, not UB.
    left: Box<[AtomicU32]>,
    right: Box<[AtomicU32]>,
    cap: usize,
    // Stored only by the producer.
    write: AtomicUsize,
    // Stored only by the consumer.
    read: AtomicUsize,
    overruns: AtomicU64,
}

impl Inner {
    fn len(&self) -> usize {
        let write = self.write.load(Ordering::Acquire);
        let read = self.read.load(Ordering::Acquire);
        if write >= read {
            write - read
        } else {
            (self.cap - read) + write
        }
    }

    #[inline]
    fn next_index(&self, idx: usize) -> usize {
        let next = idx + 1;
        if next == self.cap { 0 } else { next }
    }
}

fn silent_channel(cap: usize) -> Box<[AtomicU32]> {
    (0..cap).map(|_| AtomicU32::new(0.0f32.to_bits())).collect()
}

/// Create a ring holding `capacity` sample slots (at least 2).
///
/// `write == read` means empty, so at most `capacity - 1` samples are ever
/// readable at once.
pub fn audio_ring(capacity: usize) -> (AudioProducer, AudioConsumer) {
    let cap = capacity.max(2);
    let inner = Arc::new(Inner {
        left: silent_channel(cap),
        right: silent_channel(cap),
        cap,
        write: AtomicUsize::new(0),
        read: AtomicUsize::new(0),
        overruns: AtomicU64::new(0),
    });

    (
        AudioProducer {
            inner: Arc::clone(&inner),
        },
        AudioConsumer { inner },
    )
}

/// Ring sized for a consumer that pulls `block` samples per callback.
pub fn audio_ring_for_block(block: usize) -> (AudioProducer, AudioConsumer) {
    audio_ring(block.saturating_mul(2))
}

impl AudioProducer {
    #[inline]
    pub fn push(&self, left: f32, right: f32) {
        let write = self.inner.write.load(Ordering::Relaxed);
        self.inner.left[write].store(left.to_bits(), Ordering::Relaxed);
        self.inner.right[write].store(right.to_bits(), Ordering::Relaxed);

        let next = self.inner.next_index(write);
        if next == self.inner.read.load(Ordering::Acquire) {
            // Lapped the consumer: everything unread now reads as empty.
            self.inner.overruns.fetch_add(1, Ordering::Relaxed);
        }
        self.inner.write.store(next, Ordering::Release);
    }

    /// Times the producer has overtaken unread data since creation.
    pub fn overruns(&self) -> u64 {
        self.inner.overruns.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.inner.cap
    }
}

impl AudioSink for AudioProducer {
    #[inline]
    fn sample_emitted(&mut self, left: f32, right: f32) {
        self.push(left, right);
    }
}

impl AudioConsumer {
    #[inline]
    pub fn pop_stereo(&self) -> Option<(f32, f32)> {
        let read = self.inner.read.load(Ordering::Relaxed);
        let write = self.inner.write.load(Ordering::Acquire);
        if read == write {
            return None;
        }

        let left = f32::from_bits(self.inner.left[read].load(Ordering::Relaxed));
        let right = f32::from_bits(self.inner.right[read].load(Ordering::Relaxed));
        self.inner
            .read
            .store(self.inner.next_index(read), Ordering::Release);
        Some((left, right))
    }

    /// Fill both blocks from the ring, substituting silence once it runs dry.
    ///
    /// Returns how many real samples were delivered. Blocks of unequal length
    /// are filled up to the shorter one.
    pub fn pull_into(&self, left: &mut [f32], right: &mut [f32]) -> usize {
        let mut delivered = 0;
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            match self.pop_stereo() {
                Some((sl, sr)) => {
                    *l = sl;
                    *r = sr;
                    delivered += 1;
                }
                None => {
                    *l = 0.0;
                    *r = 0.0;
                }
            }
        }
        delivered
    }

    pub fn pull(&self, count: usize) -> (Vec<f32>, Vec<f32>) {
        let mut left = vec![0.0; count];
        let mut right = vec![0.0; count];
        self.pull_into(&mut left, &mut right);
        (left, right)
    }

    pub fn overruns(&self) -> u64 {
        self.inner.overruns.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.inner.cap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn len_wraps_modulo_capacity() {
        let (tx, rx) = audio_ring(4);
        for i in 0..3 {
            tx.push(i as f32, 0.0);
        }
        assert_eq!(rx.len(), 3);
        rx.pop_stereo();
        rx.pop_stereo();
        tx.push(3.0, 0.0);
        tx.push(4.0, 0.0);
        // write has wrapped behind read
        assert_eq!(rx.len(), 3);
        assert_eq!(rx.pop_stereo(), Some((2.0, 0.0)));
    }

    #[test]
    fn capacity_floor() {
        let (tx, _rx) = audio_ring(0);
        assert_eq!(tx.capacity(), 2);
        let (tx, _rx) = audio_ring_for_block(DEFAULT_BLOCK);
        assert_eq!(tx.capacity(), DEFAULT_CAPACITY);
    }
}
