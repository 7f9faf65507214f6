//! Generic Clock Controller (GCLK)
//!
//! Twelve generators, each selecting one source and an optional integer
//! divider. Generator 0 always drives the CPU and the synchronous bus clocks;
//! the others feed peripheral channels (see [`crate::pclk`]).
// See [Chapter 14](https://ww1.microchip.com/downloads/en/DeviceDoc/SAM_D5x_E5x_Family_Data_Sheet_DS60001507G.pdf) for more details

use crate::reg::{Reg, RegisterFile};
use crate::wait::{wait_until_clear, Wait};

const GCLK_BASE: usize = 0x4000_1c00;

pub(crate) const CTRLA: Reg<u8> = Reg::new(GCLK_BASE);
pub(crate) const SYNCBUSY: Reg<u32> = Reg::new(GCLK_BASE + 0x04);
pub(crate) const GENCTRL0: Reg<u32> = Reg::new(GCLK_BASE + 0x20);
pub(crate) const PCHCTRL0: Reg<u32> = Reg::new(GCLK_BASE + 0x80);

pub(crate) const CTRLA_SWRST: u8 = 1 << 0;
pub(crate) const SYNCBUSY_SWRST: u32 = 1 << 0;

/// Number of clock generators.
pub const NUM_GENERATORS: usize = 12;

/// A clock generator.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum GclkId {
    /// Generator 0, the main clock
    Gclk0 = 0,
    /// Generator 1, the only one with a 16-bit divider
    Gclk1 = 1,
    /// Generator 2
    Gclk2 = 2,
    /// Generator 3
    Gclk3 = 3,
    /// Generator 4
    Gclk4 = 4,
    /// Generator 5
    Gclk5 = 5,
    /// Generator 6
    Gclk6 = 6,
    /// Generator 7
    Gclk7 = 7,
    /// Generator 8
    Gclk8 = 8,
    /// Generator 9
    Gclk9 = 9,
    /// Generator 10
    Gclk10 = 10,
    /// Generator 11
    Gclk11 = 11,
}

impl GclkId {
    /// Generator number, as used in `PCHCTRL.GEN`.
    pub const fn num(self) -> u8 {
        self as u8
    }

    /// Largest division factor the generator's `DIV` field holds.
    pub const fn max_div(self) -> u32 {
        match self {
            GclkId::Gclk1 => u16::MAX as u32,
            _ => u8::MAX as u32,
        }
    }

    pub(crate) const fn genctrl(self) -> Reg<u32> {
        GENCTRL0.offset(4 * self as usize)
    }

    pub(crate) const fn syncbusy_mask(self) -> u32 {
        1 << (2 + self as u32)
    }
}

/// Source of a clock generator, as encoded in `GENCTRL.SRC`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum GenSrc {
    /// External oscillator 0
    Xosc0 = 0,
    /// External oscillator 1
    Xosc1 = 1,
    /// Generator input pad
    GclkIn = 2,
    /// Output of generator 1
    Gclk1 = 3,
    /// Always-on internal ultra low power 32 kHz oscillator
    OscUlp32k = 4,
    /// External 32 kHz oscillator
    Xosc32k = 5,
    /// Internal 48 MHz DFLL
    Dfll = 6,
    /// Digital PLL 0
    Dpll0 = 7,
    /// Digital PLL 1
    Dpll1 = 8,
}

bitfield::bitfield! {
    /// Generator control word (`GENCTRLn`).
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    #[derive(Copy, Clone, PartialEq, Eq, Default)]
    pub struct GenCtrl(u32);
    impl Debug;
    /// Source select.
    pub u8, src, set_src: 3, 0;
    /// Generator enable.
    pub genen, set_genen: 8;
    /// Improve duty cycle.
    pub idc, set_idc: 9;
    /// Output off value.
    pub oov, set_oov: 10;
    /// Output enable.
    pub oe, set_oe: 11;
    /// Divide by 2^(DIV+1) instead of by DIV.
    pub divsel, set_divsel: 12;
    /// Run in standby.
    pub runstdby, set_runstdby: 13;
    /// Division factor. 0 and 1 both mean undivided.
    pub u16, div, set_div: 31, 16;
}

impl GenCtrl {
    /// A control word selecting `src`, undivided.
    pub fn new(src: GenSrc) -> Self {
        let mut ctrl = GenCtrl(0);
        ctrl.set_src(src as u8);
        ctrl
    }

    /// The same control word with an integer division factor.
    pub fn with_div(mut self, div: u16) -> Self {
        self.set_div(div);
        self
    }

    /// Raw register value.
    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Decode a raw register value.
    pub fn from_bits(bits: u32) -> Self {
        GenCtrl(bits)
    }
}

/// Software reset of the whole GCLK block.
///
/// All generators except generator 0 are disabled and every peripheral channel
/// is disconnected. Generator 0 falls back to its reset source.
pub fn reset<R, W>(regs: &mut R, wait: &mut W) -> Result<(), W::Error>
where
    R: RegisterFile,
    W: Wait,
{
    regs.write(CTRLA, CTRLA_SWRST);
    wait_until_clear(&*regs, wait, SYNCBUSY, SYNCBUSY_SWRST)
}

/// Point generator `id` at the source in `ctrl` and enable it.
///
/// The whole control word is replaced; `GENEN` is always set. Returns once the
/// generator has acknowledged the write. Calling it twice with the same
/// arguments leaves the registers as calling it once does.
pub fn route_generator<R, W>(
    regs: &mut R,
    wait: &mut W,
    id: GclkId,
    ctrl: GenCtrl,
) -> Result<(), W::Error>
where
    R: RegisterFile,
    W: Wait,
{
    let mut ctrl = ctrl;
    ctrl.set_genen(true);

    #[cfg(feature = "defmt")]
    defmt::trace!("route {} <- {:#010x}", id, ctrl.bits());

    regs.write(id.genctrl(), ctrl.bits());
    wait_until_clear(&*regs, wait, SYNCBUSY, id.syncbusy_mask())
}

/// Read back the control word of generator `id`.
pub fn generator<R: RegisterFile + ?Sized>(regs: &R, id: GclkId) -> GenCtrl {
    GenCtrl::from_bits(regs.read(id.genctrl()))
}
