//! One snapshot of every electrode plus the time it completed.

/// Capture values are 16-bit timer counts held in 32-bit slots. The byte
/// image used by the FIFO is the packed little-endian layout: `N` values
/// followed by the 64-bit timestamp, no padding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Frame<const N: usize> {
    pub values: [u32; N],
    /// Microseconds since start-up, stamped when the last electrode completed
    pub timestamp: u64,
}

impl<const N: usize> Frame<N> {
    /// Size of the packed byte image
    pub const SIZE: usize = 4 * N + 8;

    pub const fn new() -> Self {
        Self {
            values: [0; N],
            timestamp: 0,
        }
    }

    /// Write the packed image into the first `SIZE` bytes of `buf`
    pub fn write_to(&self, buf: &mut [u8]) {
        let (values, timestamp) = buf[..Self::SIZE].split_at_mut(4 * N);
        for (chunk, value) in values.chunks_exact_mut(4).zip(self.values.iter()) {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        timestamp.copy_from_slice(&self.timestamp.to_le_bytes());
    }

    /// Rebuild a frame from the first `SIZE` bytes of `buf`
    pub fn read_from(buf: &[u8]) -> Self {
        let (values_raw, timestamp_raw) = buf[..Self::SIZE].split_at(4 * N);
        let mut values = [0u32; N];
        for (value, chunk) in values.iter_mut().zip(values_raw.chunks_exact(4)) {
            *value = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        let mut ts = [0u8; 8];
        ts.copy_from_slice(timestamp_raw);
        Self {
            values,
            timestamp: u64::from_le_bytes(ts),
        }
    }
}

impl<const N: usize> Default for Frame<N> {
    fn default() -> Self {
        Self::new()
    }
}
