//! Fractional Digital Phase-Locked Loops (DPLL)
// See [Chapter 28 Section 6.5](https://ww1.microchip.com/downloads/en/DeviceDoc/SAM_D5x_E5x_Family_Data_Sheet_DS60001507G.pdf) for more details

use core::convert::Infallible;

use fugit::HertzU32;
use nb::Error::WouldBlock;

use crate::gclk::GenSrc;
use crate::pclk::PclkId;
use crate::reg::{Reg, RegisterFile};
use crate::typelevel::Sealed;
use crate::wait::{poll_set, wait_until_clear, Wait};

const DPLL0_BASE: usize = 0x4000_1000 + 0x30;
const DPLL_STRIDE: usize = 0x14;

pub(crate) const DPLLCTRLA_ENABLE: u8 = 1 << 1;

pub(crate) const DPLLSYNCBUSY_ENABLE: u32 = 1 << 1;
pub(crate) const DPLLSYNCBUSY_DPLLRATIO: u32 = 1 << 2;

pub(crate) const DPLLSTATUS_LOCK: u32 = 1 << 0;
pub(crate) const DPLLSTATUS_CLKRDY: u32 = 1 << 1;

/// Largest multiplier `DPLLRATIO.LDR` can express.
pub const MAX_MULTIPLIER: u32 = 1 << 13;

/// One of the two DPLLs.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum DpllId {
    /// DPLL0
    Dpll0 = 0,
    /// DPLL1
    Dpll1 = 1,
}

impl DpllId {
    const fn base(self) -> usize {
        DPLL0_BASE + DPLL_STRIDE * self as usize
    }

    pub(crate) const fn ctrla(self) -> Reg<u8> {
        Reg::new(self.base())
    }

    pub(crate) const fn ratio(self) -> Reg<u32> {
        Reg::new(self.base() + 0x04)
    }

    pub(crate) const fn ctrlb(self) -> Reg<u32> {
        Reg::new(self.base() + 0x08)
    }

    pub(crate) const fn syncbusy(self) -> Reg<u32> {
        Reg::new(self.base() + 0x0c)
    }

    pub(crate) const fn status(self) -> Reg<u32> {
        Reg::new(self.base() + 0x10)
    }

    /// The generator source that selects this PLL's output.
    pub const fn gen_src(self) -> GenSrc {
        match self {
            DpllId::Dpll0 => GenSrc::Dpll0,
            DpllId::Dpll1 => GenSrc::Dpll1,
        }
    }

    /// The peripheral channel carrying this PLL's reference when it is
    /// referenced to a generator.
    pub const fn reference_pclk(self) -> PclkId {
        match self {
            DpllId::Dpll0 => PclkId::OSCCTRL_FDPLL0,
            DpllId::Dpll1 => PclkId::OSCCTRL_FDPLL1,
        }
    }
}

/// Reference clock of a DPLL, as encoded in `DPLLCTRLB.REFCLK`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum RefClk {
    /// The peripheral channel of the PLL, fed by a generator
    Gclk = 0,
    /// External 32 kHz oscillator
    Xosc32 = 1,
    /// External oscillator 0
    Xosc0 = 2,
    /// External oscillator 1
    Xosc1 = 3,
}

bitfield::bitfield! {
    /// DPLL control B (`DPLLCTRLB`).
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    #[derive(Copy, Clone, PartialEq, Eq, Default)]
    pub struct DpllCtrlB(u32);
    impl Debug;
    /// Proportional integral filter selection.
    pub u8, filter, set_filter: 3, 0;
    /// Wake up fast.
    pub wuf, set_wuf: 4;
    /// Reference clock selection.
    pub u8, refclk, set_refclk: 7, 5;
    /// Lock time-out.
    pub u8, ltime, set_ltime: 10, 8;
    /// Lock bypass: the output is gated only while the loop is unlocked.
    pub lbypass, set_lbypass: 11;
    /// Sigma-delta DCO filter selection.
    pub u8, dcofilter, set_dcofilter: 14, 12;
    /// DCO filter enable.
    pub dcoen, set_dcoen: 15;
    /// Clock divider for the XOSC references.
    pub u16, div, set_div: 26, 16;
}

impl DpllCtrlB {
    /// Raw register value.
    pub fn bits(&self) -> u32 {
        self.0
    }
}

bitfield::bitfield! {
    /// DPLL loop divider ratio (`DPLLRATIO`).
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    #[derive(Copy, Clone, PartialEq, Eq, Default)]
    pub struct DpllRatio(u32);
    impl Debug;
    /// Integer part of the ratio, minus one.
    pub u16, ldr, set_ldr: 12, 0;
    /// Fractional part of the ratio, in sixteenths.
    pub u8, ldrfrac, set_ldrfrac: 20, 16;
}

impl DpllRatio {
    /// Raw register value.
    pub fn bits(&self) -> u32 {
        self.0
    }
}

/// Error type for the DPLL module.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Multiplier is zero or does not fit `DPLLRATIO.LDR`.
    MultiplierOutOfRange,

    /// Reference frequency is zero.
    ZeroReference,

    /// Reference times multiplier overflows.
    FrequencyOverflow,
}

/// Parameters for a DPLL: an integer multiple of a reference clock.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DpllConfig {
    multiplier: u16,
    reference: RefClk,
    reference_freq: HertzU32,
}

impl DpllConfig {
    /// A PLL multiplying `reference` (running at `reference_freq`) by
    /// `multiplier`.
    pub const fn new(
        reference: RefClk,
        reference_freq: HertzU32,
        multiplier: u32,
    ) -> Result<Self, Error> {
        if multiplier == 0 || multiplier > MAX_MULTIPLIER {
            return Err(Error::MultiplierOutOfRange);
        }
        if reference_freq.raw() == 0 {
            return Err(Error::ZeroReference);
        }
        if reference_freq.raw().checked_mul(multiplier).is_none() {
            return Err(Error::FrequencyOverflow);
        }

        Ok(DpllConfig {
            multiplier: multiplier as u16,
            reference,
            reference_freq,
        })
    }

    /// Integer loop ratio.
    pub const fn multiplier(&self) -> u32 {
        self.multiplier as u32
    }

    /// Reference clock selection.
    pub const fn reference(&self) -> RefClk {
        self.reference
    }

    /// Frequency of the reference clock.
    pub const fn reference_freq(&self) -> HertzU32 {
        self.reference_freq
    }

    /// Output frequency once locked.
    pub const fn output_freq(&self) -> HertzU32 {
        HertzU32::from_raw(self.reference_freq.raw() * self.multiplier as u32)
    }

    fn ratio(&self) -> DpllRatio {
        let mut ratio = DpllRatio(0);
        ratio.set_ldr(self.multiplier - 1);
        ratio
    }

    fn ctrlb(&self) -> DpllCtrlB {
        let mut ctrlb = DpllCtrlB(0);
        ctrlb.set_refclk(self.reference as u8);
        ctrlb.set_lbypass(true);
        ctrlb
    }
}

/// State of the DPLL (typestate trait)
pub trait State: Sealed {}

/// DPLL has been given its parameters but not touched yet (typestate)
pub struct Disabled {
    config: DpllConfig,
}

/// DPLL is configured, enabled and locking into its frequency (typestate)
pub struct Locking {
    frequency: HertzU32,
}

/// DPLL is locked and its output is ready (typestate)
pub struct Locked {
    frequency: HertzU32,
}

impl State for Disabled {}
impl Sealed for Disabled {}
impl State for Locking {}
impl Sealed for Locking {}
impl State for Locked {}
impl Sealed for Locked {}

/// A DPLL.
pub struct Dpll<S: State> {
    id: DpllId,
    state: S,
}

impl<S: State> Dpll<S> {
    fn transition<To: State>(self, state: To) -> Dpll<To> {
        Dpll { id: self.id, state }
    }

    /// Which of the PLLs this is.
    pub fn id(&self) -> DpllId {
        self.id
    }
}

impl Dpll<Disabled> {
    /// Instantiates a new DPLL.
    pub fn new(id: DpllId, config: DpllConfig) -> Self {
        Dpll {
            id,
            state: Disabled { config },
        }
    }

    /// Disables the PLL, programs its ratio and reference, and enables it
    /// again: it switches to Locking state.
    pub fn initialize<R, W>(self, regs: &mut R, wait: &mut W) -> Result<Dpll<Locking>, W::Error>
    where
        R: RegisterFile,
        W: Wait,
    {
        let id = self.id;
        let config = self.state.config;

        #[cfg(feature = "defmt")]
        defmt::trace!(
            "{}: {} x {=u32} Hz",
            id,
            config.reference(),
            config.reference_freq().raw()
        );

        regs.write(id.ctrla(), 0);
        wait_until_clear(&*regs, wait, id.syncbusy(), DPLLSYNCBUSY_ENABLE)?;

        regs.write(id.ratio(), config.ratio().bits());
        wait_until_clear(&*regs, wait, id.syncbusy(), DPLLSYNCBUSY_DPLLRATIO)?;

        regs.write(id.ctrlb(), config.ctrlb().bits());
        regs.write(id.ctrla(), DPLLCTRLA_ENABLE);

        Ok(self.transition(Locking {
            frequency: config.output_freq(),
        }))
    }
}

/// A token that's given when the DPLL is properly locked, so we can safely transition to the
/// next state.
pub struct LockedDpllToken {
    _private: (),
}

impl Dpll<Locking> {
    /// Awaits locking of the PLL and readiness of its output.
    pub fn await_lock<R: RegisterFile + ?Sized>(
        &self,
        regs: &R,
    ) -> nb::Result<LockedDpllToken, Infallible> {
        match poll_set(regs, self.id.status(), DPLLSTATUS_LOCK | DPLLSTATUS_CLKRDY) {
            Ok(()) => Ok(LockedDpllToken { _private: () }),
            Err(_) => Err(WouldBlock),
        }
    }

    /// Exchanges a token for a Locked DPLL.
    pub fn get_locked(self, _token: LockedDpllToken) -> Dpll<Locked> {
        let frequency = self.state.frequency;
        self.transition(Locked { frequency })
    }
}

impl Dpll<Locked> {
    /// Get the operating frequency for the PLL
    pub fn operating_frequency(&self) -> HertzU32 {
        self.state.frequency
    }
}

/// Blocking helper method to setup a DPLL without going through all the steps.
pub fn setup_dpll_blocking<R, W>(
    regs: &mut R,
    wait: &mut W,
    id: DpllId,
    config: DpllConfig,
) -> Result<Dpll<Locked>, W::Error>
where
    R: RegisterFile,
    W: Wait,
{
    let initialized_dpll = Dpll::new(id, config).initialize(regs, wait)?;

    let locked_dpll_token = wait.wait(|| initialized_dpll.await_lock(&*regs))?;

    Ok(initialized_dpll.get_locked(locked_dpll_token))
}
