//! HAL for the Microchip SAMD51 microcontrollers
//!
//! This crate brings the SAMD51 clock tree from its reset state to a stable
//! operating frequency at boot: it starts the chosen time base, locks the
//! DPLLs, routes the generic clock generators and gates the peripheral clocks.
//!
//! NOTE This HAL is still under active development. This API will remain volatile until 1.0.0
//!
//! # Crate features
//!
//! * **clock-ref-x32k** -
//!   Reference the DPLLs to an external 32.768 kHz crystal
//! * **usb-sof-recovery** -
//!   Discipline the internal DFLL48M against the 1 kHz USB start-of-frame
//! * **defmt** -
//!   Implement `defmt::Format` for several types and log the boot sequence
//! * **critical-section-impl** -
//!   Use the single-core `critical-section` implementation from `cortex-m`

#![warn(missing_docs)]
#![no_std]

#[cfg(test)]
extern crate std;

pub mod arch;
pub mod clocks;
pub mod cmcc;
pub mod dfll;
pub mod dpll;
pub mod gclk;
pub mod mclk;
pub mod pclk;
pub mod reg;
#[cfg(test)]
pub(crate) mod sim;
pub(crate) mod typelevel;
pub mod wait;
pub mod xosc32k;

pub use clocks::{ClockConfig, ClockPlan, ClocksManager};
#[cfg(all(target_arch = "arm", target_os = "none"))]
pub use clocks::{enable_peripheral_clock, peripheral_clock_frequency, system_init};
pub use reg::{Mmio, RegisterFile};
pub use wait::{Bounded, Spin, Wait};

// Re-export crates used in samd51-hal's public API
pub extern crate fugit;
