//! Simulated clock registers for host tests
//!
//! Plain registers behave as memory. The registers the clock code waits on
//! are modelled: a write that needs synchronisation keeps its sync-busy bit
//! set for a configurable number of reads, oscillators report ready once
//! enabled and their startup has elapsed, and DPLLs lock once enabled. Every
//! access is recorded in order.

use core::cell::RefCell;
use std::collections::BTreeMap;
use std::vec::Vec;

use crate::dfll::{
    DFLLCTRLA, DFLLCTRLB, DFLLMUL, DFLLSYNC, DFLLSYNC_DFLLCTRLB, DFLLSYNC_DFLLMUL,
    DFLLSYNC_DFLLVAL, DFLLSYNC_ENABLE, DFLLVAL,
};
use crate::dpll::{
    DpllId, DPLLCTRLA_ENABLE, DPLLSTATUS_CLKRDY, DPLLSTATUS_LOCK, DPLLSYNCBUSY_DPLLRATIO,
    DPLLSYNCBUSY_ENABLE,
};
use crate::gclk::{GclkId, CTRLA, CTRLA_SWRST, GENCTRL0, PCHCTRL0, SYNCBUSY, SYNCBUSY_SWRST};
use crate::pclk::NUM_CHANNELS;
use crate::reg::{Reg, RegisterFile, Width};
use crate::xosc32k::{Xosc32kCtrl, STATUS, STATUS_XOSC32KRDY, XOSC32K};

/// One register access.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Access {
    Read { addr: usize, value: u32 },
    Write { addr: usize, value: u32 },
}

/// Bits still reported busy (or not yet ready) by a status register.
#[derive(Copy, Clone, Debug, Default)]
struct Pending {
    bits: u32,
    reads_left: u32,
}

#[derive(Debug)]
pub(crate) struct SimRegisters {
    values: BTreeMap<usize, u32>,
    pending: RefCell<BTreeMap<usize, Pending>>,
    log: RefCell<Vec<Access>>,
    busy_polls: u32,
    dplls_lock: bool,
    pchctrl_stuck: bool,
}

const DPLLS: [DpllId; 2] = [DpllId::Dpll0, DpllId::Dpll1];

impl SimRegisters {
    /// Every write is acknowledged on the first poll.
    pub(crate) fn new() -> Self {
        SimRegisters {
            values: BTreeMap::new(),
            pending: RefCell::new(BTreeMap::new()),
            log: RefCell::new(Vec::new()),
            busy_polls: 0,
            dplls_lock: true,
            pchctrl_stuck: false,
        }
    }

    /// Keep each sync-busy bit set, and each ready bit clear, for `polls`
    /// reads after the write that caused it.
    pub(crate) fn with_busy_polls(mut self, polls: u32) -> Self {
        self.busy_polls = polls;
        self
    }

    /// Start with `value` as the DFLL's factory calibration.
    pub(crate) fn with_dfllval(mut self, value: u32) -> Self {
        self.values.insert(DFLLVAL.addr(), value);
        self
    }

    /// DPLLs never report lock.
    pub(crate) fn never_lock(mut self) -> Self {
        self.dplls_lock = false;
        self
    }

    /// Peripheral channels never read back with `CHEN` set.
    pub(crate) fn stick_pchctrl(mut self) -> Self {
        self.pchctrl_stuck = true;
        self
    }

    /// Let peripheral channels read back normally again.
    pub(crate) fn release_pchctrl(&mut self) {
        self.pchctrl_stuck = false;
    }

    /// All accesses so far, oldest first.
    pub(crate) fn log(&self) -> Vec<Access> {
        self.log.borrow().clone()
    }

    /// All writes so far as `(address, value)`, oldest first.
    pub(crate) fn writes(&self) -> Vec<(usize, u32)> {
        self.log
            .borrow()
            .iter()
            .filter_map(|access| match *access {
                Access::Write { addr, value } => Some((addr, value)),
                Access::Read { .. } => None,
            })
            .collect()
    }

    /// Index in the log of the first write of `value` to `reg`.
    pub(crate) fn position_of_write<T: Width>(&self, reg: Reg<T>, value: T) -> Option<usize> {
        let wanted = Access::Write {
            addr: reg.addr(),
            value: value.to_word(),
        };
        self.log.borrow().iter().position(|access| *access == wanted)
    }

    /// Index in the log of the first write to `reg`.
    pub(crate) fn position_of_any_write<T: Width>(&self, reg: Reg<T>) -> Option<usize> {
        self.log
            .borrow()
            .iter()
            .position(|access| matches!(access, Access::Write { addr, .. } if *addr == reg.addr()))
    }

    /// Stored register contents, without the modelled status registers.
    pub(crate) fn snapshot(&self) -> BTreeMap<usize, u32> {
        self.values.clone()
    }

    fn stored(&self, addr: usize) -> u32 {
        self.values.get(&addr).copied().unwrap_or(0)
    }

    fn set_pending(&mut self, status: usize, bits: u32) {
        if self.busy_polls == 0 {
            return;
        }
        let mut pending = self.pending.borrow_mut();
        let entry = pending.entry(status).or_default();
        entry.bits |= bits;
        entry.reads_left = self.busy_polls;
    }

    /// Bits of `status` still pending, counting this read against them.
    fn take_pending(&self, status: usize) -> u32 {
        let mut pending = self.pending.borrow_mut();
        match pending.get_mut(&status) {
            Some(entry) if entry.reads_left > 0 => {
                entry.reads_left -= 1;
                let bits = entry.bits;
                if entry.reads_left == 0 {
                    entry.bits = 0;
                }
                bits
            }
            _ => 0,
        }
    }

    fn read_word(&self, addr: usize) -> u32 {
        if addr == SYNCBUSY.addr() || addr == DFLLSYNC.addr() {
            return self.take_pending(addr);
        }

        if let Some(dpll) = DPLLS.iter().find(|dpll| dpll.syncbusy().addr() == addr) {
            return self.take_pending(dpll.syncbusy().addr());
        }

        if let Some(dpll) = DPLLS.iter().find(|dpll| dpll.status().addr() == addr) {
            let enabled = self.stored(dpll.ctrla().addr()) & u32::from(DPLLCTRLA_ENABLE) != 0;
            let ready = if enabled && self.dplls_lock {
                DPLLSTATUS_LOCK | DPLLSTATUS_CLKRDY
            } else {
                0
            };
            return ready & !self.take_pending(addr);
        }

        if addr == STATUS.addr() {
            let enabled = Xosc32kCtrl::from_bits(self.stored(XOSC32K.addr()) as u16).enable();
            let ready = if enabled { STATUS_XOSC32KRDY } else { 0 };
            return ready & !self.take_pending(addr);
        }

        if self.pchctrl_stuck && is_pchctrl(addr) {
            return self.stored(addr) & !(1 << 6);
        }

        self.stored(addr)
    }

    fn write_word(&mut self, addr: usize, value: u32) {
        if addr == CTRLA.addr() && value & u32::from(CTRLA_SWRST) != 0 {
            let generators = GENCTRL0.addr()..GENCTRL0.addr() + 4 * crate::gclk::NUM_GENERATORS;
            let channels = PCHCTRL0.addr()..PCHCTRL0.addr() + 4 * usize::from(NUM_CHANNELS);
            self.values
                .retain(|addr, _| !generators.contains(addr) && !channels.contains(addr));
            self.set_pending(SYNCBUSY.addr(), SYNCBUSY_SWRST);
            return;
        }

        self.values.insert(addr, value);

        if let Some(id) = generator_at(addr) {
            self.set_pending(SYNCBUSY.addr(), id.syncbusy_mask());
        } else if addr == DFLLCTRLA.addr() {
            self.set_pending(DFLLSYNC.addr(), u32::from(DFLLSYNC_ENABLE));
        } else if addr == DFLLCTRLB.addr() {
            self.set_pending(DFLLSYNC.addr(), u32::from(DFLLSYNC_DFLLCTRLB));
        } else if addr == DFLLVAL.addr() {
            self.set_pending(DFLLSYNC.addr(), u32::from(DFLLSYNC_DFLLVAL));
        } else if addr == DFLLMUL.addr() {
            self.set_pending(DFLLSYNC.addr(), u32::from(DFLLSYNC_DFLLMUL));
        } else if addr == XOSC32K.addr() {
            self.set_pending(STATUS.addr(), STATUS_XOSC32KRDY);
        } else if let Some(dpll) = DPLLS.iter().copied().find(|dpll| dpll.ctrla().addr() == addr) {
            self.set_pending(dpll.syncbusy().addr(), DPLLSYNCBUSY_ENABLE);
            if value & u32::from(DPLLCTRLA_ENABLE) != 0 {
                self.set_pending(dpll.status().addr(), DPLLSTATUS_LOCK | DPLLSTATUS_CLKRDY);
            }
        } else if let Some(dpll) = DPLLS.iter().copied().find(|dpll| dpll.ratio().addr() == addr) {
            self.set_pending(dpll.syncbusy().addr(), DPLLSYNCBUSY_DPLLRATIO);
        }
    }
}

fn generator_at(addr: usize) -> Option<GclkId> {
    const IDS: [GclkId; crate::gclk::NUM_GENERATORS] = [
        GclkId::Gclk0,
        GclkId::Gclk1,
        GclkId::Gclk2,
        GclkId::Gclk3,
        GclkId::Gclk4,
        GclkId::Gclk5,
        GclkId::Gclk6,
        GclkId::Gclk7,
        GclkId::Gclk8,
        GclkId::Gclk9,
        GclkId::Gclk10,
        GclkId::Gclk11,
    ];
    IDS.iter().copied().find(|id| id.genctrl().addr() == addr)
}

fn is_pchctrl(addr: usize) -> bool {
    (PCHCTRL0.addr()..PCHCTRL0.addr() + 4 * usize::from(NUM_CHANNELS)).contains(&addr)
}

impl RegisterFile for SimRegisters {
    fn read<T: Width>(&self, reg: Reg<T>) -> T {
        let value = self.read_word(reg.addr());
        self.log.borrow_mut().push(Access::Read {
            addr: reg.addr(),
            value,
        });
        T::from_word(value)
    }

    fn write<T: Width>(&mut self, reg: Reg<T>, value: T) {
        let value = value.to_word();
        self.log.borrow_mut().push(Access::Write {
            addr: reg.addr(),
            value,
        });
        self.write_word(reg.addr(), value);
    }
}
