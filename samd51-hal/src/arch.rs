//! Portable in-line assembly
//!
//! Wraps the few `cortex_m::asm` intrinsics the clock code needs, so that the
//! crate also builds (and its tests run) on the host.

#[cfg(all(target_arch = "arm", target_os = "none"))]
mod inner {
    #[doc(inline)]
    pub use cortex_m::asm::{dsb, isb, nop};
}

#[cfg(not(all(target_arch = "arm", target_os = "none")))]
mod inner {
    /// Placeholder function to do nothing
    pub fn nop() {
        core::hint::spin_loop();
    }

    /// Placeholder function to do nothing
    pub fn dsb() {}

    /// Placeholder function to do nothing
    pub fn isb() {}
}

pub use inner::*;
