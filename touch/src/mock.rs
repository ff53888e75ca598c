//! Test double for the hardware seams.
//!
//! Records every call in order and models just enough of a capture timer to
//! exercise the scanner: a rising edge is only latched when the pad has been
//! released to its alternate function and the channel is enabled.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::frame::Frame;
use crate::hal::{CaptureConfig, CaptureTimer, PadIo, TimerConfig};
use crate::pad::{Channel, PadDescriptor, Port, TimerId};

pub const TIM1_CC_IRQ: u16 = 13;
pub const TIM16_IRQ: u16 = 21;
pub const TIM17_IRQ: u16 = 22;

const fn pad(pin: u8, af: u8, timer: u8, channel: Channel, irq: u16) -> PadDescriptor {
    PadDescriptor {
        port: Port::A,
        pin,
        af,
        timer: TimerId(timer),
        channel,
        irq,
    }
}

pub const SIX_PADS: [PadDescriptor; 6] = [
    pad(8, 2, 1, Channel::Ch1, TIM1_CC_IRQ),
    pad(9, 2, 1, Channel::Ch2, TIM1_CC_IRQ),
    pad(10, 2, 1, Channel::Ch3, TIM1_CC_IRQ),
    pad(11, 2, 1, Channel::Ch4, TIM1_CC_IRQ),
    pad(6, 5, 16, Channel::Ch1, TIM16_IRQ),
    pad(7, 5, 17, Channel::Ch1, TIM17_IRQ),
];

pub const TWO_PADS: [PadDescriptor; 2] = [SIX_PADS[0], SIX_PADS[1]];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    EnablePort(Port),
    DriveLow(Port, u8),
    Release(Port, u8),
    EnableTimer(TimerId),
    ConfigureCapture(TimerId, Channel, CaptureConfig),
    SetCounter(TimerId, u16),
    ChannelEnabled(TimerId, Channel, bool),
    InterruptEnabled(TimerId, Channel, bool),
    ClearInterrupt(TimerId, Channel),
    UnmaskIrq(u16, u8),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PadMode {
    Unconfigured,
    OutputLow,
    Alternate,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ChannelState {
    pub config: Option<CaptureConfig>,
    pub enabled: bool,
    pub irq_enabled: bool,
    pub pending: bool,
    pub capture: u16,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TimerState {
    pub config: Option<TimerConfig>,
    pub counter: u16,
    pub channels: [ChannelState; 4],
}

#[derive(Default)]
pub struct MockHal {
    pub ops: Vec<Op>,
    pub timers: HashMap<u8, TimerState>,
    pub pads: HashMap<(Port, u8), PadMode>,
}

impl MockHal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timer(&self, timer: TimerId) -> TimerState {
        self.timers.get(&timer.0).copied().unwrap_or_default()
    }

    pub fn channel(&self, timer: TimerId, channel: Channel) -> ChannelState {
        self.timer(timer).channels[channel.index()]
    }

    pub fn pad_mode(&self, pad: &PadDescriptor) -> PadMode {
        self.pads
            .get(&(pad.port, pad.pin))
            .copied()
            .unwrap_or(PadMode::Unconfigured)
    }

    fn channel_mut(&mut self, timer: TimerId, channel: Channel) -> &mut ChannelState {
        &mut self.timers.entry(timer.0).or_default().channels[channel.index()]
    }

    /// Rising edge on `pad` while the counter reads `count`. Returns whether
    /// the timer latched it.
    pub fn edge(&mut self, pad: &PadDescriptor, count: u16) -> bool {
        if self.pad_mode(pad) != PadMode::Alternate {
            return false;
        }
        let ch = self.channel_mut(pad.timer, pad.channel);
        if !ch.enabled {
            return false;
        }
        ch.capture = count;
        ch.pending = true;
        true
    }

    /// Set a channel flag without a capture, as a glitch would
    pub fn raise_flag(&mut self, timer: TimerId, channel: Channel) {
        self.channel_mut(timer, channel).pending = true;
    }

    /// Let the free running counter reach `count`
    pub fn run_counter(&mut self, timer: TimerId, count: u16) {
        self.timers.entry(timer.0).or_default().counter = count;
    }

    /// Interrupt request asserted for this timer
    pub fn irq_asserted(&self, timer: TimerId) -> bool {
        self.timer(timer)
            .channels
            .iter()
            .any(|c| c.pending && c.irq_enabled)
    }
}

impl PadIo for MockHal {
    fn enable_port(&mut self, port: Port) {
        self.ops.push(Op::EnablePort(port));
    }

    fn drive_low(&mut self, pad: &PadDescriptor) {
        self.ops.push(Op::DriveLow(pad.port, pad.pin));
        self.pads.insert((pad.port, pad.pin), PadMode::OutputLow);
    }

    fn release(&mut self, pad: &PadDescriptor) {
        self.ops.push(Op::Release(pad.port, pad.pin));
        self.pads.insert((pad.port, pad.pin), PadMode::Alternate);
    }
}

impl CaptureTimer for MockHal {
    fn enable_timer(&mut self, timer: TimerId, config: &TimerConfig) {
        self.ops.push(Op::EnableTimer(timer));
        self.timers.entry(timer.0).or_default().config = Some(*config);
    }

    fn configure_capture(&mut self, timer: TimerId, channel: Channel, config: &CaptureConfig) {
        self.ops.push(Op::ConfigureCapture(timer, channel, *config));
        self.channel_mut(timer, channel).config = Some(*config);
    }

    fn set_counter(&mut self, timer: TimerId, value: u16) {
        self.ops.push(Op::SetCounter(timer, value));
        self.run_counter(timer, value);
    }

    fn counter(&self, timer: TimerId) -> u16 {
        self.timer(timer).counter
    }

    fn capture(&self, timer: TimerId, channel: Channel) -> u16 {
        self.channel(timer, channel).capture
    }

    fn set_channel_enabled(&mut self, timer: TimerId, channel: Channel, enabled: bool) {
        self.ops.push(Op::ChannelEnabled(timer, channel, enabled));
        self.channel_mut(timer, channel).enabled = enabled;
    }

    fn set_interrupt_enabled(&mut self, timer: TimerId, channel: Channel, enabled: bool) {
        self.ops.push(Op::InterruptEnabled(timer, channel, enabled));
        self.channel_mut(timer, channel).irq_enabled = enabled;
    }

    fn interrupt_pending(&self, timer: TimerId, channel: Channel) -> bool {
        self.channel(timer, channel).pending
    }

    fn clear_interrupt(&mut self, timer: TimerId, channel: Channel) {
        self.ops.push(Op::ClearInterrupt(timer, channel));
        self.channel_mut(timer, channel).pending = false;
    }

    fn unmask_irq(&mut self, irq: u16, priority: u8) {
        self.ops.push(Op::UnmaskIrq(irq, priority));
    }
}

thread_local! {
    static FRAMES: RefCell<Vec<(Vec<u32>, u64)>> = const { RefCell::new(Vec::new()) };
}

/// Frame callback storing every delivered frame for the current test thread
pub fn record<const N: usize>(frame: &Frame<N>) {
    FRAMES.with(|f| f.borrow_mut().push((frame.values.to_vec(), frame.timestamp)));
}

pub fn recorded() -> Vec<(Vec<u32>, u64)> {
    FRAMES.with(|f| f.borrow().clone())
}

pub fn reset_recorder() {
    FRAMES.with(|f| f.borrow_mut().clear());
}
