//! Static description of the electrodes: which pin each one sits on and which
//! timer capture channel is wired to it.
//!
//! Several electrodes may share one timer on different channels. A table is
//! a plain `[PadDescriptor; N]`, normally a `static` in the board crate.

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Port {
    A,
    B,
    C,
    D,
    F,
}

/// Timer capture/compare channel. Channel numbering starts at 1 to match the
/// reference manuals (`TIMx_CH1`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    Ch1 = 1,
    Ch2 = 2,
    Ch3 = 3,
    Ch4 = 4,
}

impl Channel {
    pub const ALL: [Channel; 4] = [Channel::Ch1, Channel::Ch2, Channel::Ch3, Channel::Ch4];

    /// Zero based index, handy for register bit offsets
    pub const fn index(self) -> usize {
        self as usize - 1
    }
}

/// Timer instance number, e.g. `TimerId(1)` for TIM1
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimerId(pub u8);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PadDescriptor {
    pub port: Port,
    pub pin: u8,
    /// Alternate function code routing the pin to the timer input
    pub af: u8,
    pub timer: TimerId,
    pub channel: Channel,
    /// Interrupt number of the timer's capture interrupt
    pub irq: u16,
}

impl PadDescriptor {
    pub fn is(&self, timer: TimerId, channel: Channel) -> bool {
        self.timer == timer && self.channel == channel
    }
}

/// Index of the electrode wired to `(timer, channel)`
pub fn find(pads: &[PadDescriptor], timer: TimerId, channel: Channel) -> Option<usize> {
    pads.iter().position(|p| p.is(timer, channel))
}

/// Call `f` once for every distinct value of `key` over the table, in table
/// order.
fn for_each_unique<T, F>(pads: &[PadDescriptor], key: fn(&PadDescriptor) -> T, mut f: F)
where
    T: PartialEq,
    F: FnMut(T),
{
    for (i, pad) in pads.iter().enumerate() {
        let k = key(pad);
        if !pads[..i].iter().any(|p| key(p) == k) {
            f(k);
        }
    }
}

pub fn for_each_port<F: FnMut(Port)>(pads: &[PadDescriptor], f: F) {
    for_each_unique(pads, |p| p.port, f)
}

pub fn for_each_timer<F: FnMut(TimerId)>(pads: &[PadDescriptor], f: F) {
    for_each_unique(pads, |p| p.timer, f)
}

pub fn for_each_irq<F: FnMut(u16)>(pads: &[PadDescriptor], f: F) {
    for_each_unique(pads, |p| p.irq, f)
}

/// Panics (at compile time when used in a `const`) if two electrodes claim the
/// same timer channel.
pub const fn assert_unique_channels(pads: &[PadDescriptor]) {
    let mut i = 0;
    while i < pads.len() {
        let mut j = i + 1;
        while j < pads.len() {
            assert!(
                !(pads[i].timer.0 == pads[j].timer.0
                    && pads[i].channel as u8 == pads[j].channel as u8),
                "two electrodes share a timer channel"
            );
            j += 1;
        }
        i += 1;
    }
}
