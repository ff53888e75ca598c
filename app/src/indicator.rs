//! One LED per electrode on PB0-PB5, lit while the electrode reads as
//! touched.

use core::cell::RefCell;
use cortex_m::interrupt::Mutex;

use crate::board::CHANNELS;
use crate::hal::gpio::{Output, Pin, PushPull};
use crate::hal::prelude::*;

/// Raw capture count above which an electrode counts as touched
pub const TOUCH_THRESHOLD: u32 = 150;

pub struct Indicators {
    leds: [Pin<Output<PushPull>>; CHANNELS],
}

static INDICATORS: Mutex<RefCell<Option<Indicators>>> = Mutex::new(RefCell::new(None));

impl Indicators {
    pub fn new(mut leds: [Pin<Output<PushPull>>; CHANNELS]) -> Self {
        for led in leds.iter_mut() {
            led.set_low().ok();
        }
        Self { leds }
    }

    pub fn set(&mut self, values: &[u32; CHANNELS]) {
        for (led, value) in self.leds.iter_mut().zip(values.iter()) {
            if *value > TOUCH_THRESHOLD {
                led.set_high().ok();
            } else {
                led.set_low().ok();
            }
        }
    }
}

pub fn init(indicators: Indicators) {
    cortex_m::interrupt::free(|cs| {
        INDICATORS.borrow(cs).borrow_mut().replace(indicators);
    });
}

/// Update the LEDs from one frame of values. Does nothing before `init`.
pub fn show(values: &[u32; CHANNELS]) {
    cortex_m::interrupt::free(|cs| {
        if let Some(indicators) = INDICATORS.borrow(cs).borrow_mut().as_mut() {
            indicators.set(values);
        }
    });
}
