//! Round-robin electrode scanner.
//!
//! A single cursor selects the electrode that currently owns its timer
//! channel and pad. `process`, called from the main loop, steps that
//! electrode through INIT -> DISCHARGE -> WAIT_CAPTURE. The capture interrupt
//! (via [`Scanner::service_interrupt`] or [`Scanner::isr_dispatch`]) or a
//! counter timeout ends the measurement and moves the cursor on. When the
//! cursor wraps to 0 the frame is time-stamped and marked ready; the next
//! `process` call hands it to the registered callback and the FIFO, so user
//! code never runs in interrupt context.
//!
//! In the firmware the scanner lives behind a critical-section mutex shared
//! by the main loop and the timer interrupts, which serializes `process`
//! against the interrupt shim.

use crate::clock::Monotonic;
use crate::error::ConfigError;
use crate::fifo::{FrameFifo, DEFAULT_FIFO_SIZE};
use crate::frame::Frame;
use crate::hal::{CaptureConfig, CaptureTimer, Edge, PadIo, TimerConfig};
use crate::pad::{self, Channel, PadDescriptor, TimerId};
use crate::{ElectrodeState, ScanConfig, DEFAULT_SCAN_CONFIG};

/// Frame-ready notification. Runs on the `process` call stack and must not
/// block.
pub type FrameCallback<const N: usize> = fn(&Frame<N>);

#[derive(Clone, Copy, Debug)]
struct Electrode {
    state: ElectrodeState,
    discharge_ticks: u8,
}

impl Electrode {
    const fn new() -> Self {
        Self {
            state: ElectrodeState::Init,
            discharge_ticks: 0,
        }
    }
}

pub struct Scanner<'a, H, C, const N: usize, const FIFO: usize = DEFAULT_FIFO_SIZE> {
    hal: H,
    clock: C,
    pads: &'a [PadDescriptor; N],
    config: &'a ScanConfig,
    electrodes: [Electrode; N],
    cursor: usize,
    frame: Frame<N>,
    frame_ready: bool,
    callback: Option<FrameCallback<N>>,
    fifo: FrameFifo<N, FIFO>,
    wraps: u32,
    timeouts: u32,
    spurious: u32,
    dropped: u32,
}

impl<'a, H, C, const N: usize, const FIFO: usize> Scanner<'a, H, C, N, FIFO>
where
    H: PadIo + CaptureTimer,
    C: Monotonic,
{
    pub fn new(
        hal: H,
        clock: C,
        pads: &'a [PadDescriptor; N],
        config: Option<&'a ScanConfig>,
    ) -> Result<Self, ConfigError> {
        let config = config.unwrap_or(&DEFAULT_SCAN_CONFIG);
        config.validate()?;
        if N == 0 {
            return Err(ConfigError::NoPads);
        }

        Ok(Self {
            hal,
            clock,
            pads,
            config,
            electrodes: [Electrode::new(); N],
            cursor: 0,
            frame: Frame::new(),
            frame_ready: false,
            callback: None,
            fifo: FrameFifo::new(),
            wraps: 0,
            timeouts: 0,
            spurious: 0,
            dropped: 0,
        })
    }

    /// Bring up clocks, timers and interrupt lines for every referenced port
    /// and timer, then start discharging electrode 0.
    pub fn init(&mut self) {
        let pads = self.pads;
        let hal = &mut self.hal;

        pad::for_each_port(pads, |port| hal.enable_port(port));

        let timer_config = TimerConfig {
            count_clock_hz: self.config.count_clock_hz,
            period: self.config.period,
        };
        pad::for_each_timer(pads, |timer| hal.enable_timer(timer, &timer_config));

        let priority = self.config.irq_priority;
        pad::for_each_irq(pads, |irq| hal.unmask_irq(irq, priority));

        self.electrodes = [Electrode::new(); N];
        self.cursor = 0;
        self.frame = Frame::new();
        self.frame_ready = false;
        self.fifo.clear();
        self.start_discharge(0);

        log::debug!(
            "touch: {} electrodes, timeout {:#x} counts, {} ns/count",
            N,
            self.config.capture_timeout,
            self.config.count_period_ns()
        );
    }

    /// Advance the current electrode one step. Call continuously from the
    /// main loop.
    pub fn process(&mut self) {
        if self.frame_ready {
            self.frame_ready = false;
            self.deliver();
        }

        let i = self.cursor;
        match self.electrodes[i].state {
            ElectrodeState::Init | ElectrodeState::Done => self.start_discharge(i),
            ElectrodeState::Discharge => {
                let electrode = &mut self.electrodes[i];
                if electrode.discharge_ticks < self.config.discharge_cycles {
                    electrode.discharge_ticks += 1;
                } else {
                    self.arm(i);
                }
            }
            ElectrodeState::WaitCapture => {
                // Register reads only until the measurement is known to be over
                let pad = self.pads[i];
                if self.hal.counter(pad.timer) >= self.config.capture_timeout {
                    // An edge latched while interrupts were held off still counts
                    if self.hal.interrupt_pending(pad.timer, pad.channel) {
                        self.hal.clear_interrupt(pad.timer, pad.channel);
                        self.isr_dispatch(pad.timer, pad.channel);
                        return;
                    }
                    self.timeouts = self.timeouts.wrapping_add(1);
                    log::trace!("touch: electrode {} timed out", i);
                    // Previous value stays in the frame
                    self.disarm(i);
                    self.advance();
                }
            }
        }
    }

    /// Demultiplex a timer interrupt: for every asserted channel flag, clear
    /// it and dispatch the capture. Call from the timer's interrupt handler.
    pub fn service_interrupt(&mut self, timer: TimerId) {
        for channel in Channel::ALL {
            if self.hal.interrupt_pending(timer, channel) {
                self.hal.clear_interrupt(timer, channel);
                self.isr_dispatch(timer, channel);
            }
        }
    }

    /// Handle a capture on `(timer, channel)` whose flag has already been
    /// cleared. Returns `false` and leaves everything untouched if the
    /// channel does not belong to an electrode waiting for its capture.
    pub fn isr_dispatch(&mut self, timer: TimerId, channel: Channel) -> bool {
        let i = self.cursor;
        if !self.pads[i].is(timer, channel) || self.electrodes[i].state != ElectrodeState::WaitCapture {
            self.spurious = self.spurious.wrapping_add(1);
            log::trace!(
                "touch: spurious capture {:?} {:?} (electrode {:?}) at cursor {}",
                timer,
                channel,
                pad::find(self.pads, timer, channel),
                i
            );
            return false;
        }

        self.frame.values[i] = self.hal.capture(timer, channel) as u32;
        self.disarm(i);
        self.advance();
        true
    }

    /// Stop the measurement in flight. The current electrode is forced back
    /// to DISCHARGE with its channel and interrupt off; the next `process`
    /// call repeats its measurement.
    pub fn pause(&mut self) {
        let i = self.cursor;
        if self.electrodes[i].state == ElectrodeState::WaitCapture {
            self.disarm(i);
            let pad = self.pads[i];
            self.hal.clear_interrupt(pad.timer, pad.channel);
        }
    }

    /// Replace the frame-ready callback. `None` clears it.
    pub fn register_callback(&mut self, callback: Option<FrameCallback<N>>) {
        self.callback = callback;
    }

    /// Take the oldest frame from the FIFO
    pub fn fifo_read(&mut self) -> Option<Frame<N>> {
        self.fifo.pop()
    }

    /// Number of complete frames waiting in the FIFO
    pub fn fifo_count(&self) -> usize {
        self.fifo.frames()
    }

    pub fn fifo_clear(&mut self) {
        self.fifo.clear();
    }

    pub fn fifo(&self) -> &FrameFifo<N, FIFO> {
        &self.fifo
    }

    /// Latest value of one electrode
    pub fn value(&self, channel: usize) -> Option<u32> {
        self.frame.values.get(channel).copied()
    }

    pub fn values(&self) -> &[u32; N] {
        &self.frame.values
    }

    /// The latest-frame slot, updated in place as captures complete
    pub fn frame(&self) -> &Frame<N> {
        &self.frame
    }

    /// A wrapped frame is waiting for the next `process` call
    pub fn frame_pending(&self) -> bool {
        self.frame_ready
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn state(&self, index: usize) -> Option<ElectrodeState> {
        self.electrodes.get(index).map(|e| e.state)
    }

    pub fn pads(&self) -> &'a [PadDescriptor; N] {
        self.pads
    }

    pub fn config(&self) -> &ScanConfig {
        self.config
    }

    /// Completed frames since `init`
    pub fn frames_completed(&self) -> u32 {
        self.wraps
    }

    pub fn timeouts(&self) -> u32 {
        self.timeouts
    }

    pub fn spurious(&self) -> u32 {
        self.spurious
    }

    /// Frames refused by a full FIFO
    pub fn dropped_frames(&self) -> u32 {
        self.dropped
    }

    pub fn hal(&self) -> &H {
        &self.hal
    }

    pub fn hal_mut(&mut self) -> &mut H {
        &mut self.hal
    }

    fn start_discharge(&mut self, i: usize) {
        self.hal.drive_low(&self.pads[i]);
        let electrode = &mut self.electrodes[i];
        electrode.state = ElectrodeState::Discharge;
        electrode.discharge_ticks = 0;
    }

    /// The timer must be armed before the pad is released, otherwise the
    /// first rising edge can be missed.
    fn arm(&mut self, i: usize) {
        let pad = self.pads[i];
        let capture = CaptureConfig {
            edge: Edge::Rising,
            filter: self.config.capture_filter,
        };

        self.hal.configure_capture(pad.timer, pad.channel, &capture);
        self.hal.set_counter(pad.timer, 0);
        self.hal.clear_interrupt(pad.timer, pad.channel);
        self.hal.set_interrupt_enabled(pad.timer, pad.channel, true);
        self.hal.set_channel_enabled(pad.timer, pad.channel, true);

        self.electrodes[i].state = ElectrodeState::WaitCapture;
        self.hal.release(&pad);
    }

    /// Disable only this electrode's channel; the timer may serve others.
    fn disarm(&mut self, i: usize) {
        let pad = self.pads[i];
        self.hal.set_channel_enabled(pad.timer, pad.channel, false);
        self.hal.set_interrupt_enabled(pad.timer, pad.channel, false);
        self.start_discharge(i);
    }

    fn advance(&mut self) {
        self.cursor = (self.cursor + 1) % N;
        if self.cursor == 0 {
            self.frame.timestamp = self.clock.now_us();
            self.frame_ready = true;
            self.wraps = self.wraps.wrapping_add(1);
        }
    }

    fn deliver(&mut self) {
        if let Some(callback) = self.callback {
            callback(&self.frame);
        }
        if self.fifo.push(&self.frame).is_err() {
            self.dropped = self.dropped.wrapping_add(1);
            log::debug!("touch: fifo full, dropped frame at {} us", self.frame.timestamp);
        }
    }
}
