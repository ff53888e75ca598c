use thiserror::Error;

/// Rejected [`ScanConfig`](crate::ScanConfig) values
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("capture filter {0} outside 3..=15")]
    Filter(u8),
    #[error("capture timeout {timeout:#x} must be non-zero and below period {period:#x}")]
    Timeout { timeout: u16, period: u16 },
    #[error("count clock must be non-zero")]
    CountClock,
    #[error("pad table is empty")]
    NoPads,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum FifoError {
    /// Not enough free space for a whole frame
    #[error("frame fifo full")]
    Full,
}

/// Reasons a received packet is rejected
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum PacketError {
    #[error("packet length {got}, expected {expected}")]
    Length { got: usize, expected: usize },
    #[error("bad packet magic")]
    Magic,
    #[error("checksum mismatch: computed {computed:#x}, received {received:#x}")]
    Checksum { computed: u16, received: u16 },
}
