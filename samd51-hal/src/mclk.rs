//! Main Clock (MCLK) bus clock masks
//!
//! Every peripheral's bus interface is gated by one bit in one of the
//! `APBxMASK` registers. Those registers are laid out consecutively, so a
//! peripheral's power id selects the register (`id / 32`) and the bit
//! (`id % 32`).

use crate::reg::{Reg, RegisterFile};

const MCLK_BASE: usize = 0x4000_0800;

pub(crate) const APBAMASK: Reg<u32> = Reg::new(MCLK_BASE + 0x14);

/// Number of `APBxMASK` registers.
pub const NUM_GROUPS: u8 = 4;

/// Position of a peripheral's bit in the `APBxMASK` registers.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PowerId(u8);

#[allow(missing_docs)]
impl PowerId {
    pub const PAC: PowerId = PowerId(0);
    pub const PM: PowerId = PowerId(1);
    pub const MCLK: PowerId = PowerId(2);
    pub const RSTC: PowerId = PowerId(3);
    pub const OSCCTRL: PowerId = PowerId(4);
    pub const OSC32KCTRL: PowerId = PowerId(5);
    pub const SUPC: PowerId = PowerId(6);
    pub const GCLK: PowerId = PowerId(7);
    pub const WDT: PowerId = PowerId(8);
    pub const RTC: PowerId = PowerId(9);
    pub const EIC: PowerId = PowerId(10);
    pub const FREQM: PowerId = PowerId(11);
    pub const SERCOM0: PowerId = PowerId(12);
    pub const SERCOM1: PowerId = PowerId(13);
    pub const TC0: PowerId = PowerId(14);
    pub const TC1: PowerId = PowerId(15);

    pub const USB: PowerId = PowerId(32);
    pub const DSU: PowerId = PowerId(33);
    pub const NVMCTRL: PowerId = PowerId(34);
    pub const PORT: PowerId = PowerId(36);
    pub const EVSYS: PowerId = PowerId(39);
    pub const SERCOM2: PowerId = PowerId(41);
    pub const SERCOM3: PowerId = PowerId(42);
    pub const TCC0: PowerId = PowerId(43);
    pub const TCC1: PowerId = PowerId(44);
    pub const TC2: PowerId = PowerId(45);
    pub const TC3: PowerId = PowerId(46);

    pub const TCC2: PowerId = PowerId(67);
    pub const TCC3: PowerId = PowerId(68);
    pub const TC4: PowerId = PowerId(69);
    pub const TC5: PowerId = PowerId(70);

    pub const SERCOM4: PowerId = PowerId(96);
    pub const SERCOM5: PowerId = PowerId(97);
    pub const SERCOM6: PowerId = PowerId(98);
    pub const SERCOM7: PowerId = PowerId(99);
    pub const TCC4: PowerId = PowerId(100);
    pub const TC6: PowerId = PowerId(101);
    pub const TC7: PowerId = PowerId(102);
    pub const ADC0: PowerId = PowerId(103);
    pub const ADC1: PowerId = PowerId(104);
    pub const DAC: PowerId = PowerId(105);
}

impl PowerId {
    /// Power id `id`, if it falls within the mask registers.
    pub const fn new(id: u8) -> Option<Self> {
        if id < NUM_GROUPS * 32 {
            Some(PowerId(id))
        } else {
            None
        }
    }

    /// Which `APBxMASK` register holds the bit: 0 for A, 1 for B and so on.
    pub const fn group(self) -> usize {
        self.0 as usize / 32
    }

    /// Bit position within the register.
    pub const fn bit(self) -> u32 {
        self.0 as u32 % 32
    }

    pub(crate) const fn mask_reg(self) -> Reg<u32> {
        APBAMASK.offset(4 * self.group())
    }
}

/// Enable the bus clock of peripheral `id`.
///
/// The mask registers are shared by every peripheral, so the
/// read-modify-write runs in a critical section. Takes effect immediately;
/// there is nothing to wait for.
pub fn enable<R: RegisterFile>(regs: &mut R, id: PowerId) {
    critical_section::with(|_| {
        regs.modify(id.mask_reg(), |mask| mask | (1 << id.bit()));
    });
}

/// Whether the bus clock of peripheral `id` is enabled.
pub fn is_enabled<R: RegisterFile + ?Sized>(regs: &R, id: PowerId) -> bool {
    regs.read(id.mask_reg()) & (1 << id.bit()) != 0
}
