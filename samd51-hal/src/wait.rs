//! Waiting on hardware acknowledgments
//!
//! Writes to the clock registers cross into other clock domains and only take
//! effect once the hardware clears a sync-busy bit or sets a ready bit. All of
//! those waits go through a [`Wait`] policy, which drives a non-blocking poll
//! (in the `nb` style used across the HAL) to completion.
//!
//! [`Spin`] is the policy for firmware: it polls forever. A clock that never
//! becomes ready is a hardware fault, and running on with unstable clocks is
//! worse than hanging where a debugger can see it. Its error type is
//! [`Infallible`], so code driven by it has no failure path to take.
//!
//! [`Bounded`] gives up after a fixed number of polls and is meant for
//! diagnostics and tests only.

use core::convert::Infallible;

use nb::Error::WouldBlock;

use crate::reg::{Reg, RegisterFile, Width};

/// A policy for driving a non-blocking poll to completion.
pub trait Wait {
    /// Returned when the policy gives up.
    type Error: core::fmt::Debug;

    /// Call `poll` until it stops returning `WouldBlock`.
    fn wait<T, F>(&mut self, poll: F) -> Result<T, Self::Error>
    where
        F: FnMut() -> nb::Result<T, Infallible>;
}

impl<W: Wait + ?Sized> Wait for &mut W {
    type Error = W::Error;

    fn wait<T, F>(&mut self, poll: F) -> Result<T, Self::Error>
    where
        F: FnMut() -> nb::Result<T, Infallible>,
    {
        (**self).wait(poll)
    }
}

/// Busy-wait without a timeout.
#[derive(Copy, Clone, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Spin;

impl Wait for Spin {
    type Error = Infallible;

    fn wait<T, F>(&mut self, mut poll: F) -> Result<T, Infallible>
    where
        F: FnMut() -> nb::Result<T, Infallible>,
    {
        loop {
            match poll() {
                Ok(value) => return Ok(value),
                Err(WouldBlock) => crate::arch::nop(),
                Err(nb::Error::Other(never)) => match never {},
            }
        }
    }
}

/// The poll limit of a [`Bounded`] wait was reached.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timeout {
    /// Number of polls made before giving up.
    pub polls: u32,
}

/// Busy-wait for at most `max_polls` polls per wait.
#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Bounded {
    max_polls: u32,
    total_polls: u32,
}

impl Bounded {
    /// Give up on any single wait after `max_polls` polls.
    pub const fn new(max_polls: u32) -> Self {
        Bounded {
            max_polls,
            total_polls: 0,
        }
    }

    /// Polls made so far, over all waits.
    pub fn total_polls(&self) -> u32 {
        self.total_polls
    }
}

impl Wait for Bounded {
    type Error = Timeout;

    fn wait<T, F>(&mut self, mut poll: F) -> Result<T, Timeout>
    where
        F: FnMut() -> nb::Result<T, Infallible>,
    {
        for _ in 0..self.max_polls {
            self.total_polls = self.total_polls.saturating_add(1);
            match poll() {
                Ok(value) => return Ok(value),
                Err(WouldBlock) => crate::arch::nop(),
                Err(nb::Error::Other(never)) => match never {},
            }
        }

        Err(Timeout {
            polls: self.max_polls,
        })
    }
}

/// Non-blocking check that all bits of `mask` read as zero.
pub fn poll_clear<R, T>(regs: &R, reg: Reg<T>, mask: T) -> nb::Result<(), Infallible>
where
    R: RegisterFile + ?Sized,
    T: Width,
{
    if regs.read(reg).to_word() & mask.to_word() != 0 {
        return Err(WouldBlock);
    }
    Ok(())
}

/// Non-blocking check that all bits of `mask` read as one.
pub fn poll_set<R, T>(regs: &R, reg: Reg<T>, mask: T) -> nb::Result<(), Infallible>
where
    R: RegisterFile + ?Sized,
    T: Width,
{
    let mask = mask.to_word();
    if regs.read(reg).to_word() & mask != mask {
        return Err(WouldBlock);
    }
    Ok(())
}

/// Non-blocking check that a register reads back exactly `value`.
pub fn poll_equal<R, T>(regs: &R, reg: Reg<T>, value: T) -> nb::Result<(), Infallible>
where
    R: RegisterFile + ?Sized,
    T: Width,
{
    if regs.read(reg).to_word() != value.to_word() {
        return Err(WouldBlock);
    }
    Ok(())
}

/// Wait until all bits of `mask` in `reg` are clear.
pub fn wait_until_clear<R, W, T>(
    regs: &R,
    wait: &mut W,
    reg: Reg<T>,
    mask: T,
) -> Result<(), W::Error>
where
    R: RegisterFile + ?Sized,
    W: Wait + ?Sized,
    T: Width,
{
    wait.wait(|| poll_clear(regs, reg, mask))
}

/// Wait until all bits of `mask` in `reg` are set.
pub fn wait_until_set<R, W, T>(
    regs: &R,
    wait: &mut W,
    reg: Reg<T>,
    mask: T,
) -> Result<(), W::Error>
where
    R: RegisterFile + ?Sized,
    W: Wait + ?Sized,
    T: Width,
{
    wait.wait(|| poll_set(regs, reg, mask))
}

/// Wait until `reg` reads back exactly `value`.
pub fn wait_until_equal<R, W, T>(
    regs: &R,
    wait: &mut W,
    reg: Reg<T>,
    value: T,
) -> Result<(), W::Error>
where
    R: RegisterFile + ?Sized,
    W: Wait + ?Sized,
    T: Width,
{
    wait.wait(|| poll_equal(regs, reg, value))
}
