//! Clock tree configuration
//!
//! [`ClockConfig`] holds the frequencies the boot sequence aims for.
//! [`ClockPlan::new`] checks that they can be programmed and works out every
//! multiplier and divider up front, so the sequence itself has nothing left
//! to validate.

use fugit::HertzU32;

use crate::dfll::DFLL_FREQ;
use crate::dpll::{self, DpllConfig, RefClk};
use crate::gclk::GclkId;
use crate::pclk::PclkId;
use crate::xosc32k::CRYSTAL_FREQ;

/// Generator driving the CPU and the synchronous bus clocks.
pub const MAIN_GCLK: GclkId = GclkId::Gclk0;

/// Generator feeding every peripheral channel routed at runtime.
pub const PERIPHERAL_GCLK: GclkId = GclkId::Gclk3;

/// Generator feeding the DPLL0 reference on the internal path.
pub const INTERMEDIATE_GCLK: GclkId = GclkId::Gclk4;

/// Where the main PLL takes its reference from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InitPath {
    /// Both PLLs multiply the external 32.768 kHz crystal.
    ExternalCrystal,
    /// The factory-calibrated DFLL48M feeds the peripherals directly and,
    /// divided down, the main PLL.
    Internal {
        /// Close the DFLL loop against the USB start-of-frame first.
        usb_sof_recovery: bool,
    },
}

impl InitPath {
    /// The path selected by the crate features.
    pub const DEFAULT: InitPath = if cfg!(feature = "clock-ref-x32k") {
        InitPath::ExternalCrystal
    } else {
        InitPath::Internal {
            usb_sof_recovery: cfg!(feature = "usb-sof-recovery"),
        }
    };
}

/// Target frequencies of the clock tree.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockConfig {
    /// Reference path.
    pub path: InitPath,
    /// CPU clock, generator 0.
    pub main_freq: HertzU32,
    /// Peripheral clock, generator 3.
    pub peripheral_freq: HertzU32,
    /// DPLL0 reference on the internal path, generator 4.
    pub intermediate_freq: HertzU32,
    /// Frequency of the external crystal.
    pub crystal_freq: HertzU32,
    /// USB start-of-frame rate.
    pub usb_sof_freq: HertzU32,
}

impl ClockConfig {
    /// 120 MHz CPU, 48 MHz peripherals, on the path selected by the crate
    /// features.
    pub const DEFAULT: ClockConfig = ClockConfig {
        path: InitPath::DEFAULT,
        main_freq: HertzU32::from_raw(120_000_000),
        peripheral_freq: HertzU32::from_raw(48_000_000),
        intermediate_freq: HertzU32::from_raw(2_000_000),
        crystal_freq: CRYSTAL_FREQ,
        usb_sof_freq: HertzU32::from_raw(1_000),
    };

    /// The default frequencies on another path.
    pub const fn with_path(path: InitPath) -> Self {
        ClockConfig {
            path,
            ..Self::DEFAULT
        }
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Reasons a [`ClockConfig`] cannot be programmed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// A frequency is zero.
    ZeroFrequency,
    /// A DPLL multiplier is zero or too large for `DPLLRATIO.LDR`.
    DpllMultiplierOutOfRange,
    /// A DPLL output frequency does not fit in 32 bits.
    DpllFrequencyOverflow,
    /// The DFLL multiplier does not fit in `DFLLMUL.MUL`.
    DfllMultiplierOutOfRange,
    /// A generator divider is zero or too large for the generator.
    DividerOutOfRange,
    /// On the internal path the peripheral clock is the DFLL itself, so it
    /// can only run at 48 MHz.
    PeripheralFrequencyUnreachable,
}

impl ConfigError {
    const fn from_dpll(err: dpll::Error) -> Self {
        match err {
            dpll::Error::MultiplierOutOfRange => ConfigError::DpllMultiplierOutOfRange,
            dpll::Error::ZeroReference => ConfigError::ZeroFrequency,
            dpll::Error::FrequencyOverflow => ConfigError::DpllFrequencyOverflow,
        }
    }
}

/// Integer division rounding to the nearest result, halves rounding up.
///
/// `denominator` must not be zero.
pub const fn div_round_closest(numerator: u32, denominator: u32) -> u32 {
    let numerator = numerator as u64;
    let denominator = denominator as u64;
    ((numerator + denominator / 2) / denominator) as u32
}

/// Per-path register values.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PathPlan {
    /// Crystal-referenced PLLs.
    ExternalCrystal {
        /// DPLL0, for the main clock.
        main: DpllConfig,
        /// DPLL1, for the peripheral clock.
        peripheral: DpllConfig,
    },
    /// DFLL-based clocks.
    Internal {
        /// `DFLLMUL.MUL` when disciplining against USB.
        usb_sof_multiplier: Option<u16>,
        /// Divider of the intermediate generator.
        intermediate_div: u16,
        /// DPLL0, for the main clock.
        main: DpllConfig,
    },
}

/// A validated [`ClockConfig`], with every register value worked out.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockPlan {
    config: ClockConfig,
    path: PathPlan,
}

impl ClockPlan {
    /// The plan for [`ClockConfig::DEFAULT`]. Evaluated at compile time, so a
    /// default that cannot be programmed fails the build.
    pub const DEFAULT: ClockPlan = match ClockPlan::new(ClockConfig::DEFAULT) {
        Ok(plan) => plan,
        Err(_) => panic!("the default clock configuration cannot be programmed"),
    };

    /// Validate `config` and compute its register values.
    pub const fn new(config: ClockConfig) -> Result<Self, ConfigError> {
        if config.main_freq.raw() == 0 || config.peripheral_freq.raw() == 0 {
            return Err(ConfigError::ZeroFrequency);
        }

        let path = match config.path {
            InitPath::ExternalCrystal => {
                let crystal = config.crystal_freq;
                if crystal.raw() == 0 {
                    return Err(ConfigError::ZeroFrequency);
                }

                let main = match DpllConfig::new(
                    RefClk::Xosc32,
                    crystal,
                    div_round_closest(config.main_freq.raw(), crystal.raw()),
                ) {
                    Ok(main) => main,
                    Err(err) => return Err(ConfigError::from_dpll(err)),
                };
                let peripheral = match DpllConfig::new(
                    RefClk::Xosc32,
                    crystal,
                    div_round_closest(config.peripheral_freq.raw(), crystal.raw()),
                ) {
                    Ok(peripheral) => peripheral,
                    Err(err) => return Err(ConfigError::from_dpll(err)),
                };

                PathPlan::ExternalCrystal { main, peripheral }
            }
            InitPath::Internal { usb_sof_recovery } => {
                if config.intermediate_freq.raw() == 0 {
                    return Err(ConfigError::ZeroFrequency);
                }
                if config.peripheral_freq.raw() != DFLL_FREQ.raw() {
                    return Err(ConfigError::PeripheralFrequencyUnreachable);
                }

                let usb_sof_multiplier = if usb_sof_recovery {
                    if config.usb_sof_freq.raw() == 0 {
                        return Err(ConfigError::ZeroFrequency);
                    }
                    let mul = div_round_closest(DFLL_FREQ.raw(), config.usb_sof_freq.raw());
                    if mul == 0 || mul > u16::MAX as u32 {
                        return Err(ConfigError::DfllMultiplierOutOfRange);
                    }
                    Some(mul as u16)
                } else {
                    None
                };

                let div = div_round_closest(DFLL_FREQ.raw(), config.intermediate_freq.raw());
                if div == 0 || div > INTERMEDIATE_GCLK.max_div() {
                    return Err(ConfigError::DividerOutOfRange);
                }

                // the PLL sees the divided DFLL, which may differ from the
                // nominal intermediate frequency when the division is inexact
                let reference = HertzU32::from_raw(DFLL_FREQ.raw() / div);
                let main = match DpllConfig::new(
                    RefClk::Gclk,
                    reference,
                    div_round_closest(config.main_freq.raw(), config.intermediate_freq.raw()),
                ) {
                    Ok(main) => main,
                    Err(err) => return Err(ConfigError::from_dpll(err)),
                };

                PathPlan::Internal {
                    usb_sof_multiplier,
                    intermediate_div: div as u16,
                    main,
                }
            }
        };

        Ok(ClockPlan { config, path })
    }

    /// The configuration this plan was made from.
    pub const fn config(&self) -> &ClockConfig {
        &self.config
    }

    /// Register values for the selected path.
    pub const fn path(&self) -> &PathPlan {
        &self.path
    }

    /// Frequency the main clock runs at once the sequence has finished.
    pub const fn main_clock_frequency(&self) -> HertzU32 {
        match &self.path {
            PathPlan::ExternalCrystal { main, .. } | PathPlan::Internal { main, .. } => {
                main.output_freq()
            }
        }
    }

    /// Frequency of the clock a peripheral channel is routed to.
    ///
    /// Every channel enabled through this crate runs from the peripheral
    /// generator, so this is its nominal frequency regardless of `pclk`.
    pub const fn peripheral_clock_frequency(&self, _pclk: PclkId) -> HertzU32 {
        self.config.peripheral_freq
    }
}

impl Default for ClockPlan {
    fn default() -> Self {
        Self::DEFAULT
    }
}
