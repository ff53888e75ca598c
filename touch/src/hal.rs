//! Hardware seams consumed by the scanner.
//!
//! The board crate implements these on top of its register access layer.
//! Every method takes the pad or timer it acts on, so one implementation
//! can serve any number of ports and timers.

use crate::pad::{Channel, PadDescriptor, Port, TimerId};

/// Time base setup applied to every timer referenced by the pad table
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimerConfig {
    /// Desired count clock; the implementation derives its prescaler from it
    pub count_clock_hz: u32,
    pub period: u16,
}

/// Input capture channel setup. Captures are always on the direct input with
/// no prescaler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureConfig {
    pub edge: Edge,
    pub filter: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
}

pub trait PadIo {
    /// Enable the peripheral clock of a GPIO port
    fn enable_port(&mut self, port: Port);

    /// Configure the pad as a push-pull output and drive it low
    fn drive_low(&mut self, pad: &PadDescriptor);

    /// Hand the pad over to its alternate function (the timer input)
    fn release(&mut self, pad: &PadDescriptor);
}

pub trait CaptureTimer {
    /// Enable the timer clock, configure it as a free running up-counter and
    /// start it
    fn enable_timer(&mut self, timer: TimerId, config: &TimerConfig);

    fn configure_capture(&mut self, timer: TimerId, channel: Channel, config: &CaptureConfig);

    fn set_counter(&mut self, timer: TimerId, value: u16);

    fn counter(&self, timer: TimerId) -> u16;

    /// Latched capture value of a channel
    fn capture(&self, timer: TimerId, channel: Channel) -> u16;

    /// Enable or disable the capture channel (CCxE)
    fn set_channel_enabled(&mut self, timer: TimerId, channel: Channel, enabled: bool);

    /// Enable or mask the channel's capture interrupt
    fn set_interrupt_enabled(&mut self, timer: TimerId, channel: Channel, enabled: bool);

    fn interrupt_pending(&self, timer: TimerId, channel: Channel) -> bool;

    fn clear_interrupt(&mut self, timer: TimerId, channel: Channel);

    /// Unmask an interrupt line in the interrupt controller
    fn unmask_irq(&mut self, irq: u16, priority: u8);
}
