//! Monotonic microsecond time base advanced from the 1 ms system tick.
//!
//! Cortex-M0 class cores have no 64-bit atomics, so the counter is stored as
//! two 32-bit halves guarded by a sequence number. There is a single writer
//! (the tick handler); readers retry when they observe a write in progress.
//! A reader must never preempt the writer, so the tick interrupt has to run
//! at a higher priority than any interrupt that reads the clock.

use core::sync::atomic::{fence, AtomicU32, Ordering};

pub const US_PER_TICK: u64 = 1000;

pub trait Monotonic {
    fn now_us(&self) -> u64;
}

pub struct MicrosClock {
    seq: AtomicU32,
    lo: AtomicU32,
    hi: AtomicU32,
}

impl MicrosClock {
    pub const fn new() -> Self {
        Self {
            seq: AtomicU32::new(0),
            lo: AtomicU32::new(0),
            hi: AtomicU32::new(0),
        }
    }

    /// Must be called from the 1 ms system tick
    pub fn tick(&self) {
        self.advance(US_PER_TICK);
    }

    pub fn advance(&self, us: u64) {
        let seq = self.seq.load(Ordering::Relaxed);
        // Odd sequence number marks the update in progress
        self.seq.store(seq.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);

        let now = self.raw().wrapping_add(us);
        self.lo.store(now as u32, Ordering::Relaxed);
        self.hi.store((now >> 32) as u32, Ordering::Relaxed);

        self.seq.store(seq.wrapping_add(2), Ordering::Release);
    }

    /// Tear-free snapshot of the counter
    pub fn now(&self) -> u64 {
        loop {
            let before = self.seq.load(Ordering::Acquire);
            if before & 1 != 0 {
                core::hint::spin_loop();
                continue;
            }
            let value = self.raw();
            fence(Ordering::Acquire);
            if self.seq.load(Ordering::Relaxed) == before {
                return value;
            }
        }
    }

    fn raw(&self) -> u64 {
        let lo = self.lo.load(Ordering::Relaxed) as u64;
        let hi = self.hi.load(Ordering::Relaxed) as u64;
        (hi << 32) | lo
    }
}

impl Default for MicrosClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Monotonic for MicrosClock {
    fn now_us(&self) -> u64 {
        self.now()
    }
}

impl<T: Monotonic> Monotonic for &T {
    fn now_us(&self) -> u64 {
        (**self).now_us()
    }
}
