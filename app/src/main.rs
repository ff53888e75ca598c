#![no_main]
#![no_std]

use core::cell::RefCell;
use core::sync::atomic::{AtomicU32, Ordering};
use cortex_m;
use cortex_m::interrupt::Mutex;
use cortex_m_rt::{entry, exception};
use panic_halt as _;

use stm32f0xx_hal as hal;

use touch::clock::MicrosClock;
use touch::packet::{DefaultPacket, PacketFormat};
use touch::pad::TimerId;
use touch::{Frame, ScanConfig, Scanner};

use crate::board::{Board, CHANNELS};
use crate::hal::pac;
use crate::hal::pac::interrupt;
use crate::hal::prelude::*;

mod board;
mod indicator;
mod serial;

/// Frames buffered for the main loop. The 4 KiB default does not fit next to
/// everything else in 8 KiB of RAM.
const FIFO_SIZE: usize = 1024;

const REPORT_INTERVAL_US: u64 = 1_000_000;

static SCAN_CONFIG: ScanConfig = ScanConfig {
    capture_timeout: 0x1FFF,
    discharge_cycles: 10,
    capture_filter: 3,
    count_clock_hz: 8_000_000,
    period: 0xFFFF,
    irq_priority: 3,
};

type TouchScanner = Scanner<'static, Board, &'static MicrosClock, CHANNELS, FIFO_SIZE>;

static CLOCK: MicrosClock = MicrosClock::new();
static SCANNER: Mutex<RefCell<Option<TouchScanner>>> = Mutex::new(RefCell::new(None));
static PACKETS_DROPPED: AtomicU32 = AtomicU32::new(0);

/// Per-electrode min/max and frame rate over one report interval
struct Stats {
    frames: u32,
    min: [u32; CHANNELS],
    max: [u32; CHANNELS],
    last_timestamp: u64,
    max_gap_us: u64,
}

impl Stats {
    const fn new() -> Self {
        Self {
            frames: 0,
            min: [u32::MAX; CHANNELS],
            max: [0; CHANNELS],
            last_timestamp: 0,
            max_gap_us: 0,
        }
    }

    fn push(&mut self, frame: &Frame<CHANNELS>) {
        if self.frames > 0 {
            let gap = frame.timestamp.saturating_sub(self.last_timestamp);
            self.max_gap_us = self.max_gap_us.max(gap);
        }
        self.last_timestamp = frame.timestamp;
        self.frames += 1;
        for i in 0..CHANNELS {
            self.min[i] = self.min[i].min(frame.values[i]);
            self.max[i] = self.max[i].max(frame.values[i]);
        }
    }

    /// Start a new interval, keeping the gap reference
    fn reset(&mut self) {
        *self = Self {
            last_timestamp: self.last_timestamp,
            ..Self::new()
        };
    }
}

/// Frame-ready callback, run from `process` in the main loop
fn frame_ready(frame: &Frame<CHANNELS>) {
    indicator::show(&frame.values);

    let packet = DefaultPacket::encode(&frame.values);
    if !serial::uart1::write_bytes(packet.as_ref()) {
        // Only the main loop writes this, so no read-modify-write race
        let dropped = PACKETS_DROPPED.load(Ordering::Relaxed);
        PACKETS_DROPPED.store(dropped.wrapping_add(1), Ordering::Relaxed);
    }
}

fn init_logging() {
    use rtt_logger::RTTLogger;

    static LOGGER: RTTLogger = RTTLogger::new(log::LevelFilter::Info);
    rtt_target::rtt_init_print!();
    // No compare-and-swap on this core. Nothing else runs yet.
    unsafe {
        log::set_logger_racy(&LOGGER)
            .map(|()| log::set_max_level_racy(log::LevelFilter::Info))
            .ok();
    }
    log::info!("Starting");
}

#[entry]
fn main() -> ! {
    init_logging();

    let dp = pac::Peripherals::take().unwrap();
    let cp = cortex_m::Peripherals::take().unwrap();

    let mut flash = dp.FLASH;
    let mut rcc = dp.RCC.configure().sysclk(48.mhz()).freeze(&mut flash);
    let gpiob = dp.GPIOB.split(&mut rcc);

    // If pclk is prescaled from hclk, the frequency fed into the timers is doubled
    let tclk = if rcc.clocks.hclk().0 == rcc.clocks.pclk().0 {
        rcc.clocks.pclk().0
    } else {
        rcc.clocks.pclk().0 * 2
    };

    // A library requiring a critical section to set a gpio AF register is bad and I just won't.
    let fake_cs = unsafe { cortex_m::interrupt::CriticalSection::new() };

    indicator::init(indicator::Indicators::new([
        gpiob.pb0.into_push_pull_output(&fake_cs).downgrade(),
        gpiob.pb1.into_push_pull_output(&fake_cs).downgrade(),
        gpiob.pb2.into_push_pull_output(&fake_cs).downgrade(),
        gpiob.pb3.into_push_pull_output(&fake_cs).downgrade(),
        gpiob.pb4.into_push_pull_output(&fake_cs).downgrade(),
        gpiob.pb5.into_push_pull_output(&fake_cs).downgrade(),
    ]));

    let tx_pin = gpiob.pb6.into_alternate_af0(&fake_cs);
    let rx_pin = gpiob.pb7.into_alternate_af0(&fake_cs);
    let uart = hal::serial::Serial::usart1(dp.USART1, (tx_pin, rx_pin), 115200.bps(), &mut rcc);
    serial::uart1::init(uart, 2 << 6);

    // 1 ms tick for the frame timestamps. SysTick resets to the highest
    // priority, above every reader of the clock.
    let mut syst = hal::timers::Timer::syst(cp.SYST, 1000.hz(), &mut rcc);
    syst.listen(&hal::timers::Event::TimeOut);

    let scanner = match Scanner::new(Board::new(cp.NVIC, tclk), &CLOCK, &board::PADS, Some(&SCAN_CONFIG)) {
        Ok(scanner) => scanner,
        Err(e) => {
            log::error!("touch: {}", e);
            loop {
                cortex_m::asm::wfi();
            }
        }
    };

    // Interrupts are unmasked by init, so the scanner must be in place first
    cortex_m::interrupt::free(|cs| {
        let mut cell = SCANNER.borrow(cs).borrow_mut();
        let scanner = cell.insert(scanner);
        scanner.register_callback(Some(frame_ready));
        scanner.init();
    });
    log::info!(
        "touch: {} electrodes, {} byte packets, {} byte frame fifo",
        CHANNELS,
        DefaultPacket::LEN,
        FIFO_SIZE
    );

    let mut stats = Stats::new();
    let mut next_report = REPORT_INTERVAL_US;

    loop {
        let frame = cortex_m::interrupt::free(|cs| {
            let mut cell = SCANNER.borrow(cs).borrow_mut();
            let scanner = cell.as_mut()?;
            scanner.process();
            scanner.fifo_read()
        });
        if let Some(frame) = frame {
            stats.push(&frame);
        }

        let now = CLOCK.now();
        if now >= next_report {
            next_report = now + REPORT_INTERVAL_US;

            let (timeouts, spurious, dropped) = cortex_m::interrupt::free(|cs| {
                SCANNER
                    .borrow(cs)
                    .borrow()
                    .as_ref()
                    .map(|s| (s.timeouts(), s.spurious(), s.dropped_frames()))
                    .unwrap_or_default()
            });
            log::info!(
                "{} frames/s, max gap {} us, min {:?}, max {:?}",
                stats.frames,
                stats.max_gap_us,
                stats.min,
                stats.max
            );
            log::info!(
                "timeouts {}, spurious {}, fifo drops {}, packet drops {}",
                timeouts,
                spurious,
                dropped,
                PACKETS_DROPPED.load(Ordering::Relaxed)
            );
            stats.reset();
        }
    }
}

fn service_timer(timer: TimerId) {
    cortex_m::interrupt::free(|cs| {
        if let Some(scanner) = SCANNER.borrow(cs).borrow_mut().as_mut() {
            scanner.service_interrupt(timer);
        }
    });
}

#[exception]
fn SysTick() {
    CLOCK.tick();
}

#[interrupt]
fn TIM1_CC() {
    service_timer(board::TIM1);
}

#[interrupt]
fn TIM16() {
    service_timer(board::TIM16);
}

#[interrupt]
fn TIM17() {
    service_timer(board::TIM17);
}
