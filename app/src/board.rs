//! Touch pads of the board and the register level glue behind the scanner's
//! hardware traits.
//!
//! Electrodes 0-3 share TIM1 on four channels (PA8-PA11, AF2). Electrodes 4
//! and 5 each have a single channel timer: TIM16 on PA6 and TIM17 on PA7
//! (AF5). Every pad has an external pull-up to VDD.
//!
//! Pins are reconfigured on every measurement, so this goes to the registers
//! directly instead of owning typed HAL pins.

use cortex_m::interrupt::InterruptNumber;
use cortex_m::peripheral::NVIC;

use touch::hal::{CaptureConfig, CaptureTimer, Edge, PadIo, TimerConfig};
use touch::pad::{Channel, PadDescriptor, Port, TimerId};

use crate::hal::pac;

pub const TIM1: TimerId = TimerId(1);
pub const TIM16: TimerId = TimerId(16);
pub const TIM17: TimerId = TimerId(17);

pub const CHANNELS: usize = 6;

const fn pad(pin: u8, af: u8, timer: TimerId, channel: Channel, irq: pac::Interrupt) -> PadDescriptor {
    PadDescriptor {
        port: Port::A,
        pin,
        af,
        timer,
        channel,
        irq: irq as u16,
    }
}

pub const PADS: [PadDescriptor; CHANNELS] = [
    pad(8, 2, TIM1, Channel::Ch1, pac::Interrupt::TIM1_CC),   // TOUCH_IN1
    pad(9, 2, TIM1, Channel::Ch2, pac::Interrupt::TIM1_CC),   // TOUCH_IN2
    pad(10, 2, TIM1, Channel::Ch3, pac::Interrupt::TIM1_CC),  // TOUCH_IN3
    pad(11, 2, TIM1, Channel::Ch4, pac::Interrupt::TIM1_CC),  // TOUCH_IN4
    pad(6, 5, TIM16, Channel::Ch1, pac::Interrupt::TIM16),    // TOUCH_IN5
    pad(7, 5, TIM17, Channel::Ch1, pac::Interrupt::TIM17),    // TOUCH_IN6
];

const _: () = touch::pad::assert_unique_channels(&PADS);

/// The F0 NVIC implements the top two priority bits only
const NVIC_PRIO_SHIFT: u8 = 6;

#[derive(Clone, Copy)]
struct Irq(u16);

unsafe impl InterruptNumber for Irq {
    fn number(self) -> u16 {
        self.0
    }
}

macro_rules! with_timer {
    ($timer:expr, $tim:ident => $body:expr) => {
        match $timer.0 {
            1 => {
                let $tim = unsafe { &*pac::TIM1::ptr() };
                $body
            }
            16 => {
                let $tim = unsafe { &*pac::TIM16::ptr() };
                $body
            }
            17 => {
                let $tim = unsafe { &*pac::TIM17::ptr() };
                $body
            }
            _ => Default::default(),
        }
    };
}

macro_rules! with_port {
    ($port:expr, $gpio:ident => $body:expr) => {
        match $port {
            Port::A => {
                let $gpio = unsafe { &*pac::GPIOA::ptr() };
                $body
            }
            Port::B => {
                let $gpio = unsafe { &*pac::GPIOB::ptr() };
                $body
            }
            Port::C => {
                let $gpio = unsafe { &*pac::GPIOC::ptr() };
                $body
            }
            Port::D => {
                let $gpio = unsafe { &*pac::GPIOD::ptr() };
                $body
            }
            Port::F => {
                let $gpio = unsafe { &*pac::GPIOF::ptr() };
                $body
            }
        }
    };
}

pub struct Board {
    nvic: NVIC,
    /// Clock fed into the timers
    tclk: u32,
}

impl Board {
    pub fn new(nvic: NVIC, tclk: u32) -> Self {
        Self { nvic, tclk }
    }
}

/// Replace the `width` bit wide field of `pin` in a per-pin register value
fn pin_field(reg: u32, pin: u8, width: u32, value: u32) -> u32 {
    let shift = pin as u32 * width;
    let mask = ((1 << width) - 1) << shift;
    (reg & !mask) | ((value << shift) & mask)
}

impl PadIo for Board {
    fn enable_port(&mut self, port: Port) {
        let rcc = unsafe { &*pac::RCC::ptr() };
        rcc.ahbenr.modify(|_, w| match port {
            Port::A => w.iopaen().set_bit(),
            Port::B => w.iopben().set_bit(),
            Port::C => w.iopcen().set_bit(),
            Port::D => w.iopden().set_bit(),
            Port::F => w.iopfen().set_bit(),
        });
    }

    fn drive_low(&mut self, pad: &PadDescriptor) {
        let pin = pad.pin;
        with_port!(pad.port, gpio => {
            // Output latch low before the driver turns on
            gpio.bsrr.write(|w| unsafe { w.bits(1 << (pin as u32 + 16)) });
            gpio.otyper.modify(|r, w| unsafe { w.bits(r.bits() & !(1 << pin)) });
            // Lowest slew rate to keep the edge quiet
            gpio.ospeedr.modify(|r, w| unsafe { w.bits(pin_field(r.bits(), pin, 2, 0b00)) });
            gpio.pupdr.modify(|r, w| unsafe { w.bits(pin_field(r.bits(), pin, 2, 0b00)) });
            gpio.moder.modify(|r, w| unsafe { w.bits(pin_field(r.bits(), pin, 2, 0b01)) });
        });
    }

    fn release(&mut self, pad: &PadDescriptor) {
        let pin = pad.pin;
        let af = pad.af as u32;
        with_port!(pad.port, gpio => {
            if pin < 8 {
                gpio.afrl.modify(|r, w| unsafe { w.bits(pin_field(r.bits(), pin, 4, af)) });
            } else {
                gpio.afrh.modify(|r, w| unsafe { w.bits(pin_field(r.bits(), pin - 8, 4, af)) });
            }
            gpio.moder.modify(|r, w| unsafe { w.bits(pin_field(r.bits(), pin, 2, 0b10)) });
        });
    }
}

/// Bit offset of a channel in CCER
fn ccer_shift(channel: Channel) -> u32 {
    4 * channel.index() as u32
}

/// Flag / enable bit of a channel in SR and DIER
fn cc_bit(channel: Channel) -> u32 {
    1 << (channel.index() + 1)
}

impl CaptureTimer for Board {
    fn enable_timer(&mut self, timer: TimerId, config: &TimerConfig) {
        let rcc = unsafe { &*pac::RCC::ptr() };
        match timer.0 {
            1 => {
                rcc.apb2enr.modify(|_, w| w.tim1en().set_bit());
                rcc.apb2rstr.modify(|_, w| w.tim1rst().set_bit());
                rcc.apb2rstr.modify(|_, w| w.tim1rst().clear_bit());
            }
            16 => {
                rcc.apb2enr.modify(|_, w| w.tim16en().set_bit());
                rcc.apb2rstr.modify(|_, w| w.tim16rst().set_bit());
                rcc.apb2rstr.modify(|_, w| w.tim16rst().clear_bit());
            }
            17 => {
                rcc.apb2enr.modify(|_, w| w.tim17en().set_bit());
                rcc.apb2rstr.modify(|_, w| w.tim17rst().set_bit());
                rcc.apb2rstr.modify(|_, w| w.tim17rst().clear_bit());
            }
            _ => return,
        }

        let psc = (self.tclk / config.count_clock_hz).saturating_sub(1) as u16;
        let period = config.period as u32;
        with_timer!(timer, tim => {
            tim.psc.write(|w| unsafe { w.bits(psc as u32) });
            tim.arr.write(|w| unsafe { w.bits(period) });
            // Load the prescaler now rather than at the first overflow
            tim.egr.write(|w| w.ug().set_bit());
            tim.sr.write(|w| unsafe { w.bits(0) });
            // Up-counting, edge aligned
            tim.cr1.modify(|_, w| w.cen().set_bit());
        });
    }

    fn configure_capture(&mut self, timer: TimerId, channel: Channel, config: &CaptureConfig) {
        // CCxS = 01 (direct input), ICxPSC = 0, ICxF = filter
        let bits = ((config.filter as u32 & 0xf) << 4) | 0b01;
        let shift = if channel.index() % 2 == 0 { 0 } else { 8 };
        let update = |r: u32| (r & !(0xff << shift)) | (bits << shift);

        // The channel must be off while CCxS is written
        self.set_channel_enabled(timer, channel, false);
        match (timer.0, channel) {
            (1, Channel::Ch1 | Channel::Ch2) => {
                let tim = unsafe { &*pac::TIM1::ptr() };
                tim.ccmr1_input().modify(|r, w| unsafe { w.bits(update(r.bits())) });
            }
            (1, Channel::Ch3 | Channel::Ch4) => {
                let tim = unsafe { &*pac::TIM1::ptr() };
                tim.ccmr2_input().modify(|r, w| unsafe { w.bits(update(r.bits())) });
            }
            (16, Channel::Ch1) => {
                let tim = unsafe { &*pac::TIM16::ptr() };
                tim.ccmr1_input().modify(|r, w| unsafe { w.bits(update(r.bits())) });
            }
            (17, Channel::Ch1) => {
                let tim = unsafe { &*pac::TIM17::ptr() };
                tim.ccmr1_input().modify(|r, w| unsafe { w.bits(update(r.bits())) });
            }
            _ => return,
        }

        // CCxP / CCxNP select the edge
        let shift = ccer_shift(channel);
        let polarity = match config.edge {
            Edge::Rising => 0b0000,
            Edge::Falling => 0b0010,
        };
        with_timer!(timer, tim => {
            tim.ccer.modify(|r, w| unsafe { w.bits((r.bits() & !(0b1010 << shift)) | (polarity << shift)) });
        });
    }

    fn set_counter(&mut self, timer: TimerId, value: u16) {
        with_timer!(timer, tim => tim.cnt.write(|w| unsafe { w.bits(value as u32) }));
    }

    fn counter(&self, timer: TimerId) -> u16 {
        with_timer!(timer, tim => tim.cnt.read().bits() as u16)
    }

    fn capture(&self, timer: TimerId, channel: Channel) -> u16 {
        let tim1 = unsafe { &*pac::TIM1::ptr() };
        match (timer.0, channel) {
            (1, Channel::Ch1) => tim1.ccr1.read().bits() as u16,
            (1, Channel::Ch2) => tim1.ccr2.read().bits() as u16,
            (1, Channel::Ch3) => tim1.ccr3.read().bits() as u16,
            (1, Channel::Ch4) => tim1.ccr4.read().bits() as u16,
            (16, Channel::Ch1) => unsafe { &*pac::TIM16::ptr() }.ccr1.read().bits() as u16,
            (17, Channel::Ch1) => unsafe { &*pac::TIM17::ptr() }.ccr1.read().bits() as u16,
            _ => 0,
        }
    }

    fn set_channel_enabled(&mut self, timer: TimerId, channel: Channel, enabled: bool) {
        let bit = 1 << ccer_shift(channel);
        with_timer!(timer, tim => {
            tim.ccer.modify(|r, w| unsafe {
                w.bits(if enabled { r.bits() | bit } else { r.bits() & !bit })
            });
        });
    }

    fn set_interrupt_enabled(&mut self, timer: TimerId, channel: Channel, enabled: bool) {
        let bit = cc_bit(channel);
        with_timer!(timer, tim => {
            tim.dier.modify(|r, w| unsafe {
                w.bits(if enabled { r.bits() | bit } else { r.bits() & !bit })
            });
        });
    }

    fn interrupt_pending(&self, timer: TimerId, channel: Channel) -> bool {
        with_timer!(timer, tim => tim.sr.read().bits() & cc_bit(channel) != 0)
    }

    fn clear_interrupt(&mut self, timer: TimerId, channel: Channel) {
        // rc_w0: writing 1 leaves the other flags alone
        let bit = cc_bit(channel);
        with_timer!(timer, tim => tim.sr.write(|w| unsafe { w.bits(!bit & 0xffff) }));
    }

    fn unmask_irq(&mut self, irq: u16, priority: u8) {
        unsafe {
            self.nvic.set_priority(Irq(irq), priority << NVIC_PRIO_SHIFT);
            NVIC::unmask(Irq(irq));
        }
    }
}
