//! Register access
//!
//! Every clock block is reached through a [`RegisterFile`] rather than through
//! global pointers, so the boot sequence can run against the real peripherals
//! ([`Mmio`]) or against a simulated register model.
//!
//! Registers are accessed at their natural width. Several of the SAMD51 clock
//! registers are 8 or 16 bits wide and share a word with unrelated registers,
//! so a 32-bit store to them would clobber their neighbours.

use core::marker::PhantomData;
use core::ptr::{read_volatile, write_volatile};

use crate::typelevel::Sealed;

/// Natural width of a register: `u8`, `u16` or `u32`.
pub trait Width: Sealed + Copy {
    /// Zero-extend to a 32-bit word.
    fn to_word(self) -> u32;

    /// Truncate a 32-bit word to this width.
    fn from_word(word: u32) -> Self;
}

impl Width for u8 {
    fn to_word(self) -> u32 {
        u32::from(self)
    }

    fn from_word(word: u32) -> Self {
        word as u8
    }
}

impl Width for u16 {
    fn to_word(self) -> u32 {
        u32::from(self)
    }

    fn from_word(word: u32) -> Self {
        word as u16
    }
}

impl Width for u32 {
    fn to_word(self) -> u32 {
        self
    }

    fn from_word(word: u32) -> Self {
        word
    }
}

/// Address of a register of width `T`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Reg<T> {
    addr: usize,
    _width: PhantomData<T>,
}

impl<T: Width> Reg<T> {
    /// A register at the given physical address.
    pub const fn new(addr: usize) -> Self {
        Reg {
            addr,
            _width: PhantomData,
        }
    }

    /// Physical address of the register.
    pub const fn addr(&self) -> usize {
        self.addr
    }

    /// The register `bytes` further along, for indexing register arrays.
    pub const fn offset(self, bytes: usize) -> Self {
        Reg::new(self.addr + bytes)
    }
}

/// Read and write access to the clock system's registers.
pub trait RegisterFile {
    /// Read a register.
    fn read<T: Width>(&self, reg: Reg<T>) -> T;

    /// Unconditionally write a register.
    fn write<T: Width>(&mut self, reg: Reg<T>, value: T);

    /// Read a register, let `f` compute the new value, and write it back.
    fn modify<T: Width, F: FnOnce(T) -> T>(&mut self, reg: Reg<T>, f: F) {
        let value = self.read(reg);
        self.write(reg, f(value));
    }
}

impl<R: RegisterFile + ?Sized> RegisterFile for &mut R {
    fn read<T: Width>(&self, reg: Reg<T>) -> T {
        (**self).read(reg)
    }

    fn write<T: Width>(&mut self, reg: Reg<T>, value: T) {
        (**self).write(reg, value)
    }
}

/// The memory-mapped registers of the chip itself.
#[derive(Debug)]
pub struct Mmio {
    _private: (),
}

impl Mmio {
    /// Get access to the memory-mapped clock registers.
    ///
    /// # Safety
    ///
    /// Only one `Mmio` may be in use at a time, and only on a SAMD51 where
    /// the register addresses used by this crate are backed by the GCLK,
    /// OSCCTRL, OSC32KCTRL, MCLK and CMCC peripherals.
    pub const unsafe fn steal() -> Self {
        Mmio { _private: () }
    }
}

impl RegisterFile for Mmio {
    #[inline]
    fn read<T: Width>(&self, reg: Reg<T>) -> T {
        // Safety: `Mmio::steal` requires the address to be a valid register
        unsafe { read_volatile(reg.addr() as *const T) }
    }

    #[inline]
    fn write<T: Width>(&mut self, reg: Reg<T>, value: T) {
        // Safety: `Mmio::steal` requires the address to be a valid register
        unsafe { write_volatile(reg.addr() as *mut T, value) }
    }
}
