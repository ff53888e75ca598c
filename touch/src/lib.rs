#![cfg_attr(not(test), no_std)]

//! Interrupt-driven capacitive touch scanner.
//!
//! Each electrode is discharged through its GPIO, then released to the
//! alternate function of a timer input-capture channel while an external
//! pull-up charges it. The capture value is the RC charge time in timer
//! counts. Electrodes are visited round-robin; one visit of every electrode
//! yields a [`Frame`](frame::Frame).

pub mod clock;
pub mod error;
pub mod fifo;
pub mod frame;
pub mod hal;
pub mod packet;
pub mod pad;
pub mod scanner;

#[cfg(test)]
mod mock;

pub use error::{ConfigError, FifoError, PacketError};
pub use frame::Frame;
pub use scanner::Scanner;

/// Measurement state of a single electrode
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElectrodeState {
    /// Pad not yet configured
    Init,
    /// Pad driven low, draining the electrode
    Discharge,
    /// Timer armed and pad released, waiting for the rising edge
    WaitCapture,
    /// Not entered by the sequencer; treated like `Init` by `process`
    Done,
}

/// Configuration shared by all electrodes of a scanner
#[derive(Clone, Copy, Debug)]
pub struct ScanConfig {
    /// Counter value at which a pending capture is abandoned. At an 8 MHz
    /// count clock 0x1FFF is roughly 1 ms.
    pub capture_timeout: u16,
    /// Number of `process` calls an electrode is held low before arming
    pub discharge_cycles: u8,
    /// Hardware input filter code applied to the capture input (3..=15)
    pub capture_filter: u8,
    /// Timer count clock after prescaling
    pub count_clock_hz: u32,
    /// Timer auto-reload value
    pub period: u16,
    /// Interrupt controller priority for the capture interrupts
    pub irq_priority: u8,
}

impl ScanConfig {
    const fn default() -> Self {
        Self {
            capture_timeout: 0x1FFF,
            discharge_cycles: 10,
            capture_filter: 3,
            count_clock_hz: 8_000_000,
            period: 0xFFFF,
            irq_priority: 3,
        }
    }

    /// Check the configuration for values the scanner cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capture_filter < 3 || self.capture_filter > 15 {
            return Err(ConfigError::Filter(self.capture_filter));
        }
        if self.capture_timeout == 0 || self.capture_timeout >= self.period {
            return Err(ConfigError::Timeout {
                timeout: self.capture_timeout,
                period: self.period,
            });
        }
        if self.count_clock_hz == 0 {
            return Err(ConfigError::CountClock);
        }
        Ok(())
    }

    /// Duration of one timer count in nanoseconds
    pub fn count_period_ns(&self) -> u32 {
        1_000_000_000 / self.count_clock_hz
    }
}

pub const DEFAULT_SCAN_CONFIG: ScanConfig = ScanConfig::default();
