//! Byte ring buffer holding whole frames for pull-style consumers.
//!
//! Frames are stored as their packed byte image and are written and read
//! whole, so the number of stored bytes is always a multiple of
//! `Frame::<N>::SIZE`. When there is no room for another frame the new one is
//! refused; stored frames are never overwritten.

use crate::error::FifoError;
use crate::frame::Frame;

/// Default ring size in bytes
pub const DEFAULT_FIFO_SIZE: usize = 4096;

pub struct FrameFifo<const N: usize, const SIZE: usize> {
    buf: [u8; SIZE],
    head: usize,
    tail: usize,
    count: usize,
}

impl<const N: usize, const SIZE: usize> FrameFifo<N, SIZE> {
    pub const fn new() -> Self {
        Self {
            buf: [0; SIZE],
            head: 0,
            tail: 0,
            count: 0,
        }
    }

    /// Append one frame, or refuse it if it does not fit entirely
    pub fn push(&mut self, frame: &Frame<N>) -> Result<(), FifoError> {
        if self.count + Frame::<N>::SIZE > SIZE {
            return Err(FifoError::Full);
        }

        // Same byte image as `Frame::write_to`
        for value in frame.values.iter() {
            self.put(&value.to_le_bytes());
        }
        self.put(&frame.timestamp.to_le_bytes());
        self.count += Frame::<N>::SIZE;
        Ok(())
    }

    /// Remove the oldest frame
    pub fn pop(&mut self) -> Option<Frame<N>> {
        if self.count < Frame::<N>::SIZE {
            return None;
        }

        let mut frame = Frame::new();
        for value in frame.values.iter_mut() {
            let mut raw = [0u8; 4];
            self.take(&mut raw);
            *value = u32::from_le_bytes(raw);
        }
        let mut raw = [0u8; 8];
        self.take(&mut raw);
        frame.timestamp = u64::from_le_bytes(raw);
        self.count -= Frame::<N>::SIZE;
        Some(frame)
    }

    /// Number of complete frames available
    pub fn frames(&self) -> usize {
        self.count / Frame::<N>::SIZE
    }

    /// Stored bytes
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub const fn capacity(&self) -> usize {
        SIZE
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.count = 0;
    }

    fn put(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.buf[self.head] = b;
            self.head = (self.head + 1) % SIZE;
        }
    }

    fn take(&mut self, bytes: &mut [u8]) {
        for b in bytes.iter_mut() {
            *b = self.buf[self.tail];
            self.tail = (self.tail + 1) % SIZE;
        }
    }
}

impl<const N: usize, const SIZE: usize> Default for FrameFifo<N, SIZE> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub mod test {
    use super::*;

    fn frame(seed: u32) -> Frame<2> {
        Frame {
            values: [seed, seed * 2],
            timestamp: seed as u64 * 1000,
        }
    }

    #[test]
    fn round_trip() {
        let mut fifo: FrameFifo<2, 64> = FrameFifo::new();
        let f = frame(7);
        fifo.push(&f).unwrap();
        assert_eq!(fifo.frames(), 1);
        assert_eq!(fifo.pop(), Some(f));
        assert_eq!(fifo.pop(), None);
        assert!(fifo.is_empty());
    }

    #[test]
    fn fills_to_capacity_then_drops() {
        // Exactly three frames fit
        let mut fifo: FrameFifo<2, 48> = FrameFifo::new();
        fifo.push(&frame(1)).unwrap();
        fifo.push(&frame(2)).unwrap();
        assert_eq!(fifo.len(), fifo.capacity() - Frame::<2>::SIZE);

        fifo.push(&frame(3)).unwrap();
        assert_eq!(fifo.len(), fifo.capacity());
        assert_eq!(fifo.push(&frame(4)), Err(FifoError::Full));
        assert_eq!(fifo.frames(), 3);

        // Oldest frames are kept, the refused one is gone
        assert_eq!(fifo.pop(), Some(frame(1)));
        assert_eq!(fifo.pop(), Some(frame(2)));
        assert_eq!(fifo.pop(), Some(frame(3)));
        assert_eq!(fifo.pop(), None);
    }

    #[test]
    fn wraps_around_unaligned_size() {
        // 40 bytes is not a multiple of the 16-byte frame, so writes straddle the end
        let mut fifo: FrameFifo<2, 40> = FrameFifo::new();
        for i in 0..20 {
            fifo.push(&frame(i)).unwrap();
            fifo.push(&frame(i + 100)).unwrap();
            assert!(fifo.push(&frame(0)).is_err());
            assert_eq!(fifo.len() % Frame::<2>::SIZE, 0);
            assert_eq!(fifo.pop(), Some(frame(i)));
            assert_eq!(fifo.pop(), Some(frame(i + 100)));
        }
    }

    #[test]
    fn stores_packed_frame_image() {
        let mut fifo: FrameFifo<2, 64> = FrameFifo::new();
        let f = frame(0x0102_0304);
        fifo.push(&f).unwrap();

        let mut image = [0u8; 16];
        f.write_to(&mut image);
        assert_eq!(&fifo.buf[..16], &image);
    }

    #[test]
    fn wide_frames() {
        let mut fifo: FrameFifo<100, 2048> = FrameFifo::new();
        let mut f = Frame::<100>::new();
        for (i, value) in f.values.iter_mut().enumerate() {
            *value = i as u32 * 3;
        }
        f.timestamp = 42;

        fifo.push(&f).unwrap();
        fifo.push(&f).unwrap();
        assert_eq!(fifo.frames(), 2);
        assert_eq!(fifo.pop(), Some(f));
        assert_eq!(fifo.pop(), Some(f));
        assert_eq!(fifo.pop(), None);
    }

    #[test]
    fn clear_is_idempotent() {
        let mut fifo: FrameFifo<2, 64> = FrameFifo::new();
        fifo.push(&frame(1)).unwrap();
        fifo.clear();
        assert_eq!(fifo.frames(), 0);
        fifo.clear();
        assert_eq!(fifo.frames(), 0);
        assert_eq!(fifo.pop(), None);

        fifo.push(&frame(5)).unwrap();
        assert_eq!(fifo.pop(), Some(frame(5)));
    }
}
