//! External 32.768 kHz Crystal Oscillator (XOSC32K)
// See [Chapter 29 Section 6.3](https://ww1.microchip.com/downloads/en/DeviceDoc/SAM_D5x_E5x_Family_Data_Sheet_DS60001507G.pdf) for more details

use core::convert::Infallible;

use fugit::HertzU32;
use nb::Error::WouldBlock;

use crate::reg::{Reg, RegisterFile};
use crate::typelevel::Sealed;
use crate::wait::{poll_set, Wait};

const OSC32KCTRL_BASE: usize = 0x4000_1400;

pub(crate) const STATUS: Reg<u32> = Reg::new(OSC32KCTRL_BASE + 0x0c);
pub(crate) const XOSC32K: Reg<u16> = Reg::new(OSC32KCTRL_BASE + 0x14);

pub(crate) const STATUS_XOSC32KRDY: u32 = 1 << 0;

/// Nominal frequency of a watch crystal.
pub const CRYSTAL_FREQ: HertzU32 = HertzU32::from_raw(32_768);

/// Control gain mode, as encoded in `XOSC32K.CGM`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum GainMode {
    /// Standard mode
    Xt = 1,
    /// High speed mode
    Hs = 2,
}

bitfield::bitfield! {
    /// 32 kHz external oscillator control (`XOSC32K`).
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    #[derive(Copy, Clone, PartialEq, Eq, Default)]
    pub struct Xosc32kCtrl(u16);
    impl Debug;
    /// Oscillator enable.
    pub enable, set_enable: 1;
    /// Crystal oscillator enable, as opposed to an external clock on XIN32.
    pub xtalen, set_xtalen: 2;
    /// 32 kHz output enable.
    pub en32k, set_en32k: 3;
    /// 1 kHz output enable.
    pub en1k, set_en1k: 4;
    /// Run in standby.
    pub runstdby, set_runstdby: 6;
    /// Run only when requested by a peripheral.
    pub ondemand, set_ondemand: 7;
    /// Start-up time.
    pub u8, startup, set_startup: 10, 8;
    /// Write lock, until the next reset.
    pub wrtlock, set_wrtlock: 12;
    /// Control gain mode.
    pub u8, cgm, set_cgm: 14, 13;
}

impl Xosc32kCtrl {
    /// Raw register value.
    pub fn bits(&self) -> u16 {
        self.0
    }

    /// Decode a raw register value.
    pub fn from_bits(bits: u16) -> Self {
        Xosc32kCtrl(bits)
    }
}

/// State of the 32 kHz oscillator (typestate trait)
pub trait State: Sealed {}

/// XOSC32K is disabled (typestate)
pub struct Disabled;

/// XOSC32K is enabled and starting up (typestate)
pub struct Initialized {
    freq_hz: HertzU32,
}

/// Stable state (typestate)
pub struct Stable {
    freq_hz: HertzU32,
}

impl State for Disabled {}
impl Sealed for Disabled {}
impl State for Initialized {}
impl Sealed for Initialized {}
impl State for Stable {}
impl Sealed for Stable {}

/// Blocking helper method to setup the XOSC32K without going through all the steps.
pub fn setup_xosc32k_blocking<R, W>(
    regs: &mut R,
    wait: &mut W,
    frequency: HertzU32,
) -> Result<Xosc32k<Stable>, W::Error>
where
    R: RegisterFile,
    W: Wait,
{
    let initialized_xosc = Xosc32k::new().initialize(regs, frequency);

    let stable_xosc_token = wait.wait(|| initialized_xosc.await_stabilization(&*regs))?;

    Ok(initialized_xosc.get_stable(stable_xosc_token))
}

/// The external 32 kHz crystal oscillator.
pub struct Xosc32k<S: State> {
    state: S,
}

impl<S: State> Xosc32k<S> {
    fn transition<To: State>(self, state: To) -> Xosc32k<To> {
        Xosc32k { state }
    }
}

impl Default for Xosc32k<Disabled> {
    fn default() -> Self {
        Self::new()
    }
}

impl Xosc32k<Disabled> {
    /// Creates a new, disabled Xosc32k.
    pub fn new() -> Self {
        Xosc32k { state: Disabled }
    }

    /// Starts the crystal with its 32 kHz output in standard gain mode.
    pub fn initialize<R: RegisterFile>(
        self,
        regs: &mut R,
        frequency: HertzU32,
    ) -> Xosc32k<Initialized> {
        let mut ctrl = Xosc32kCtrl(0);
        ctrl.set_enable(true);
        ctrl.set_en32k(true);
        ctrl.set_cgm(GainMode::Xt as u8);
        ctrl.set_xtalen(true);

        regs.write(XOSC32K, ctrl.bits());

        self.transition(Initialized { freq_hz: frequency })
    }
}

/// A token that's given when the oscillator is stabilized, and can be exchanged to proceed to
/// the next stage.
pub struct StableOscillatorToken {
    _private: (),
}

impl Xosc32k<Initialized> {
    /// One has to wait for the startup delay before using the oscillator, ie awaiting
    /// stabilization of the XOSC32K
    pub fn await_stabilization<R: RegisterFile + ?Sized>(
        &self,
        regs: &R,
    ) -> nb::Result<StableOscillatorToken, Infallible> {
        match poll_set(regs, STATUS, STATUS_XOSC32KRDY) {
            Ok(()) => Ok(StableOscillatorToken { _private: () }),
            Err(_) => Err(WouldBlock),
        }
    }

    /// Returns the stabilized oscillator
    pub fn get_stable(self, _token: StableOscillatorToken) -> Xosc32k<Stable> {
        let freq_hz = self.state.freq_hz;
        self.transition(Stable { freq_hz })
    }
}

impl Xosc32k<Stable> {
    /// Operating frequency of the XOSC32K in hertz
    pub fn operating_frequency(&self) -> HertzU32 {
        self.state.freq_hz
    }
}
