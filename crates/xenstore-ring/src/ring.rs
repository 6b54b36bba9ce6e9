use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use crate::config::RingConfig;
use crate::error::RingError;

/// One direction of a shared-memory byte ring: a fixed-capacity buffer with
/// free-running producer/consumer cursors (§4.A).
///
/// Only the cursor arithmetic needs to be lock-free-shaped to match the
/// wire's ABI (two `u32` indices, wrapped at `capacity`); the backing buffer
/// itself is guarded by a plain mutex since frames are variable-length byte
/// runs rather than fixed-size slots, so there's no SPSC slot ownership to
/// exploit for lock-free access the way a generic `Ring<T>` can.
pub struct ByteRing {
    config: RingConfig,
    buf: Mutex<Box<[u8]>>,
    cons: AtomicU32,
    prod: AtomicU32,
}

impl ByteRing {
    #[must_use]
    pub fn new(config: RingConfig) -> Self {
        Self {
            config,
            buf: Mutex::new(vec![0u8; config.capacity() as usize].into_boxed_slice()),
            cons: AtomicU32::new(0),
            prod: AtomicU32::new(0),
        }
    }

    #[inline]
    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.config.capacity()
    }

    #[inline]
    fn mask(&self) -> u32 {
        self.config.mask()
    }

    #[inline]
    #[must_use]
    pub fn consumer_index(&self) -> u32 {
        self.cons.load(Ordering::Relaxed)
    }

    #[inline]
    #[must_use]
    pub fn producer_index(&self) -> u32 {
        self.prod.load(Ordering::Relaxed)
    }

    /// Directly overwrites the producer index, as an untrusted peer writing
    /// raw shared memory would. Exists so a simulated-guest test harness can
    /// drive the ring-corruption recovery path (S6).
    pub fn poke_producer_index(&self, value: u32) {
        self.prod.store(value, Ordering::Release);
    }

    /// Directly overwrites the consumer index. See [`Self::poke_producer_index`].
    pub fn poke_consumer_index(&self, value: u32) {
        self.cons.store(value, Ordering::Release);
    }

    /// Number of bytes available to read, per §4.A "readable span".
    ///
    /// If the peer has advanced the producer index further than the ring can
    /// hold, the ring is reset to empty and `0` is returned rather than an
    /// error: corruption recovery is silent from the reader's perspective.
    #[must_use]
    pub fn readable(&self) -> u32 {
        let cons = self.cons.load(Ordering::Relaxed);
        let prod = self.prod.load(Ordering::Acquire);
        let delta = prod.wrapping_sub(cons);
        if delta > self.capacity() {
            tracing::warn!(prod, cons, capacity = self.capacity(), "ring indices corrupted, resetting");
            self.cons.store(0, Ordering::Release);
            self.prod.store(0, Ordering::Release);
            return 0;
        }
        delta
    }

    /// Contiguous run length starting at free-running index `idx`, capped at
    /// `remaining` and at the wrap boundary (§4.A "contiguous slice").
    #[inline]
    fn contiguous(&self, idx: u32, remaining: u32) -> u32 {
        let slot = idx & self.mask();
        (self.capacity() - slot).min(remaining)
    }

    /// Copies up to `dst.len()` readable bytes out of the ring, advancing the
    /// consumer index by the amount actually copied. May require two copies
    /// internally if the readable span crosses the wrap boundary.
    pub fn copy_out(&self, dst: &mut [u8]) -> u32 {
        let avail = self.readable();
        let mut remaining = avail.min(dst.len() as u32);
        if remaining == 0 {
            return 0;
        }

        let mut cons = self.cons.load(Ordering::Relaxed);
        let mut copied = 0u32;
        {
            let buf = self.buf.lock().unwrap();
            while remaining > 0 {
                let run = self.contiguous(cons, remaining);
                let slot = (cons & self.mask()) as usize;
                dst[copied as usize..(copied + run) as usize]
                    .copy_from_slice(&buf[slot..slot + run as usize]);
                copied += run;
                cons = cons.wrapping_add(run);
                remaining -= run;
            }
        }
        self.cons.store(cons, Ordering::Release);
        copied
    }

    /// Copies as much of `src` as fits into the ring's current free space,
    /// advancing the producer index. Returns the number of bytes written;
    /// callers write frames in a loop until the full frame has been copied.
    ///
    /// Mirrors §4.A's producer-side corruption check: before writing, if the
    /// span already exceeds capacity the ring is reset and the write is
    /// reported as failed for this call (the caller retries against a clean
    /// ring).
    pub fn copy_in(&self, src: &[u8]) -> Result<u32, RingError> {
        let cons = self.cons.load(Ordering::Acquire);
        let prod = self.prod.load(Ordering::Relaxed);
        let used = prod.wrapping_sub(cons);
        if used > self.capacity() {
            self.cons.store(0, Ordering::Release);
            self.prod.store(0, Ordering::Release);
            return Err(RingError::Corrupted { prod, cons, capacity: self.capacity() });
        }

        let space = self.capacity() - used;
        let mut remaining = space.min(src.len() as u32);
        if remaining == 0 {
            return Ok(0);
        }

        let mut p = prod;
        let mut written = 0u32;
        {
            let mut buf = self.buf.lock().unwrap();
            while remaining > 0 {
                let run = self.contiguous(p, remaining);
                let slot = (p & self.mask()) as usize;
                buf[slot..slot + run as usize]
                    .copy_from_slice(&src[written as usize..(written + run) as usize]);
                written += run;
                p = p.wrapping_add(run);
                remaining -= run;
            }
        }
        self.prod.store(p, Ordering::Release);
        Ok(written)
    }

    /// Writes the whole of `frame`, retrying `copy_in` until every byte has
    /// landed. The ring is local shared memory (§5: "no timeouts on ring
    /// I/O"), so this only loops while the consumer is making progress;
    /// space always frees up because the worker is the sole consumer.
    pub fn write_all(&self, mut frame: &[u8]) -> Result<(), RingError> {
        while !frame.is_empty() {
            let n = self.copy_in(frame)?;
            if n == 0 {
                std::thread::yield_now();
                continue;
            }
            frame = &frame[n as usize..];
        }
        Ok(())
    }
}
