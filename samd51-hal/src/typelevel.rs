//! Module supporting type-level programming
//!
//! Only the sealing half of the pattern is needed here: register widths and
//! DPLL states form closed sets that downstream crates must not extend.

mod private {
    /// Super trait used to mark traits with an exhaustive set of
    /// implementations
    pub trait Sealed {}
}

pub(crate) use private::Sealed;

impl Sealed for u8 {}
impl Sealed for u16 {}
impl Sealed for u32 {}
