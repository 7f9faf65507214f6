//! 48 MHz Digital Frequency-Locked Loop (DFLL48M)
//!
//! Out of reset the DFLL runs open-loop from its factory calibration, which is
//! what the internal clock path uses by default. When a USB host is present the
//! loop can instead be closed against the 1 kHz start-of-frame packets (USB
//! clock recovery), which keeps the output within the tolerance USB needs.
// See [Chapter 28 Section 6.4](https://ww1.microchip.com/downloads/en/DeviceDoc/SAM_D5x_E5x_Family_Data_Sheet_DS60001507G.pdf) for more details

use fugit::HertzU32;

use crate::gclk::{self, GclkId, GenCtrl, GenSrc};
use crate::reg::{Reg, RegisterFile};
use crate::wait::{wait_until_clear, Wait};

const OSCCTRL_BASE: usize = 0x4000_1000;

pub(crate) const DFLLCTRLA: Reg<u8> = Reg::new(OSCCTRL_BASE + 0x1c);
pub(crate) const DFLLCTRLB: Reg<u8> = Reg::new(OSCCTRL_BASE + 0x20);
pub(crate) const DFLLVAL: Reg<u32> = Reg::new(OSCCTRL_BASE + 0x24);
pub(crate) const DFLLMUL: Reg<u32> = Reg::new(OSCCTRL_BASE + 0x28);
pub(crate) const DFLLSYNC: Reg<u8> = Reg::new(OSCCTRL_BASE + 0x2c);

pub(crate) const DFLLCTRLA_ENABLE: u8 = 1 << 1;

pub(crate) const DFLLSYNC_ENABLE: u8 = 1 << 1;
pub(crate) const DFLLSYNC_DFLLCTRLB: u8 = 1 << 2;
pub(crate) const DFLLSYNC_DFLLVAL: u8 = 1 << 3;
pub(crate) const DFLLSYNC_DFLLMUL: u8 = 1 << 4;

/// Output frequency of the DFLL, open or closed loop.
pub const DFLL_FREQ: HertzU32 = HertzU32::from_raw(48_000_000);

/// Fine step used while locking in closed-loop mode.
pub const USB_RECOVERY_FINE_STEP: u8 = 10;

bitfield::bitfield! {
    /// DFLL control B (`DFLLCTRLB`).
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    #[derive(Copy, Clone, PartialEq, Eq, Default)]
    pub struct DfllCtrlB(u8);
    impl Debug;
    /// Closed-loop mode.
    pub mode, set_mode: 0;
    /// Stable DFLL frequency.
    pub stable, set_stable: 1;
    /// Lose lock after wake.
    pub llaw, set_llaw: 2;
    /// USB clock recovery mode.
    pub usbcrm, set_usbcrm: 3;
    /// Chill cycle disable.
    pub ccdis, set_ccdis: 4;
    /// Quick lock disable.
    pub qldis, set_qldis: 5;
    /// Bypass coarse lock.
    pub bplckc, set_bplckc: 6;
    /// Wait for lock before gating the output.
    pub waitlock, set_waitlock: 7;
}

impl DfllCtrlB {
    /// Closed loop against the USB start-of-frame.
    pub fn usb_clock_recovery() -> Self {
        let mut ctrlb = DfllCtrlB(0);
        ctrlb.set_mode(true);
        ctrlb.set_usbcrm(true);
        ctrlb.set_ccdis(true);
        ctrlb
    }

    /// Raw register value.
    pub fn bits(&self) -> u8 {
        self.0
    }
}

bitfield::bitfield! {
    /// DFLL multiplier (`DFLLMUL`).
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    #[derive(Copy, Clone, PartialEq, Eq, Default)]
    pub struct DfllMul(u32);
    impl Debug;
    /// Ratio of the output to the reference frequency.
    pub u16, mul, set_mul: 15, 0;
    /// Largest fine step taken while locking.
    pub u8, fstep, set_fstep: 23, 16;
    /// Largest coarse step taken while locking.
    pub u8, cstep, set_cstep: 31, 26;
}

impl DfllMul {
    /// Lock at `multiplier` times the reference, with fine steps of at most
    /// `fine_step`.
    pub fn new(multiplier: u16, fine_step: u8) -> Self {
        let mut mul = DfllMul(0);
        mul.set_mul(multiplier);
        mul.set_fstep(fine_step);
        mul
    }

    /// Raw register value.
    pub fn bits(&self) -> u32 {
        self.0
    }
}

/// Reprogram the DFLL with `mul` and `ctrlb`.
///
/// The DFLL is disabled, given its multiplier and a cleared control word,
/// enabled, has its current `DFLLVAL` written back to itself, and only then
/// receives `ctrlb`. Writing the control word any earlier can leave the loop
/// unable to lock (silicon erratum).
pub fn configure<R, W>(
    regs: &mut R,
    wait: &mut W,
    mul: DfllMul,
    ctrlb: DfllCtrlB,
) -> Result<(), W::Error>
where
    R: RegisterFile,
    W: Wait,
{
    regs.write(DFLLCTRLA, 0);
    wait_until_clear(&*regs, wait, DFLLSYNC, DFLLSYNC_ENABLE)?;

    regs.write(DFLLMUL, mul.bits());
    wait_until_clear(&*regs, wait, DFLLSYNC, DFLLSYNC_DFLLMUL)?;

    regs.write(DFLLCTRLB, 0);
    wait_until_clear(&*regs, wait, DFLLSYNC, DFLLSYNC_DFLLCTRLB)?;

    regs.write(DFLLCTRLA, DFLLCTRLA_ENABLE);
    wait_until_clear(&*regs, wait, DFLLSYNC, DFLLSYNC_ENABLE)?;

    let calibration = regs.read(DFLLVAL);
    regs.write(DFLLVAL, calibration);
    wait_until_clear(&*regs, wait, DFLLSYNC, DFLLSYNC_DFLLVAL)?;

    regs.write(DFLLCTRLB, ctrlb.bits());
    wait_until_clear(&*regs, wait, DFLLSYNC, DFLLSYNC_DFLLCTRLB)
}

/// Blocking helper to lock the DFLL onto the USB start-of-frame.
///
/// `main` is moved to the always-on ultra low power oscillator first, so the
/// CPU keeps a clock while the DFLL is down.
pub fn setup_usb_recovery_blocking<R, W>(
    regs: &mut R,
    wait: &mut W,
    main: GclkId,
    multiplier: u16,
) -> Result<(), W::Error>
where
    R: RegisterFile,
    W: Wait,
{
    gclk::route_generator(regs, wait, main, GenCtrl::new(GenSrc::OscUlp32k))?;

    configure(
        regs,
        wait,
        DfllMul::new(multiplier, USB_RECOVERY_FINE_STEP),
        DfllCtrlB::usb_clock_recovery(),
    )
}
