//! Cortex M Cache Controller (CMCC)

use crate::reg::{Reg, RegisterFile};

const CMCC_BASE: usize = 0x4100_6000;

pub(crate) const CTRL: Reg<u32> = Reg::new(CMCC_BASE + 0x08);

pub(crate) const CTRL_CEN: u32 = 1 << 0;

/// Turn the instruction and data cache on.
///
/// Only do this once the clocks are final: the cache is not flushed here.
pub fn enable<R: RegisterFile>(regs: &mut R) {
    regs.write(CTRL, CTRL_CEN);
    crate::arch::dsb();
    crate::arch::isb();
}
