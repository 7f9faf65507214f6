//! Peripheral channels of the Generic Clock Controller
//!
//! Each peripheral that needs an asynchronous clock has a channel
//! (`PCHCTRLm`) that connects it to one of the generators.

use crate::gclk::{GclkId, PCHCTRL0};
use crate::reg::{Reg, RegisterFile};
use crate::wait::{wait_until_equal, Wait};

/// Number of peripheral channels.
pub const NUM_CHANNELS: u8 = 48;

/// A peripheral channel index (0..=47).
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PclkId(u8);

#[allow(missing_docs)]
impl PclkId {
    pub const OSCCTRL_DFLL48: PclkId = PclkId(0);
    pub const OSCCTRL_FDPLL0: PclkId = PclkId(1);
    pub const OSCCTRL_FDPLL1: PclkId = PclkId(2);
    pub const OSCCTRL_FDPLL_32K: PclkId = PclkId(3);
    pub const EIC: PclkId = PclkId(4);
    pub const FREQM_MSR: PclkId = PclkId(5);
    pub const FREQM_REF: PclkId = PclkId(6);
    pub const SERCOM0_CORE: PclkId = PclkId(7);
    pub const SERCOM1_CORE: PclkId = PclkId(8);
    pub const TC0_TC1: PclkId = PclkId(9);
    pub const USB: PclkId = PclkId(10);
    pub const SERCOM2_CORE: PclkId = PclkId(23);
    pub const SERCOM3_CORE: PclkId = PclkId(24);
    pub const TCC0_TCC1: PclkId = PclkId(25);
    pub const TC2_TC3: PclkId = PclkId(26);
    pub const CAN0: PclkId = PclkId(27);
    pub const CAN1: PclkId = PclkId(28);
    pub const TCC2_TCC3: PclkId = PclkId(29);
    pub const TC4_TC5: PclkId = PclkId(30);
    pub const SERCOM4_CORE: PclkId = PclkId(34);
    pub const SERCOM5_CORE: PclkId = PclkId(35);
    pub const SERCOM6_CORE: PclkId = PclkId(36);
    pub const SERCOM7_CORE: PclkId = PclkId(37);
    pub const TCC4: PclkId = PclkId(38);
    pub const TC6_TC7: PclkId = PclkId(39);
    pub const ADC0: PclkId = PclkId(40);
    pub const ADC1: PclkId = PclkId(41);
    pub const DAC: PclkId = PclkId(42);
}

impl PclkId {
    /// Channel `id`, if the chip has one.
    pub const fn new(id: u8) -> Option<Self> {
        if id < NUM_CHANNELS {
            Some(PclkId(id))
        } else {
            None
        }
    }

    /// Channel index.
    pub const fn num(self) -> u8 {
        self.0
    }

    pub(crate) const fn pchctrl(self) -> Reg<u32> {
        PCHCTRL0.offset(4 * self.0 as usize)
    }
}

bitfield::bitfield! {
    /// Peripheral channel control (`PCHCTRLm`).
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    #[derive(Copy, Clone, PartialEq, Eq, Default)]
    pub struct PchCtrl(u32);
    impl Debug;
    /// Generator feeding the channel.
    pub u8, gen, set_gen: 3, 0;
    /// Channel enable.
    pub chen, set_chen: 6;
    /// Write lock, until the next reset.
    pub wrtlock, set_wrtlock: 7;
}

impl PchCtrl {
    /// An enabled channel fed by `gen`.
    pub fn enabled(gen: GclkId) -> Self {
        let mut ctrl = PchCtrl(0);
        ctrl.set_gen(gen.num());
        ctrl.set_chen(true);
        ctrl
    }

    /// Raw register value.
    pub fn bits(&self) -> u32 {
        self.0
    }
}

/// Connect channel `pclk` to generator `gen` and enable it.
///
/// Returns once the channel reads back exactly what was written, which is
/// how the hardware signals that the channel has switched over.
pub fn route_pclock<R, W>(
    regs: &mut R,
    wait: &mut W,
    pclk: PclkId,
    gen: GclkId,
) -> Result<(), W::Error>
where
    R: RegisterFile,
    W: Wait,
{
    let value = PchCtrl::enabled(gen).bits();

    regs.write(pclk.pchctrl(), value);
    wait_until_equal(&*regs, wait, pclk.pchctrl(), value)
}
