//! Clocks
//!
//! Brings the clock tree from its reset state to the configuration described
//! by a [`ClockPlan`], then hands out peripheral clocks.
//!
//! At reset the CPU runs from the DFLL48M through generator 0. The boot
//! sequence resets the generic clock controller, starts the reference
//! selected by the plan, locks DPLL0 (and on the crystal path DPLL1), moves
//! generator 0 onto DPLL0 and finally turns the cache on. Generator 3 is left
//! running at 48 MHz for the peripherals.
//!
//! ## Usage simple
//! ```no_run
//! // Before anything else in `main`, with interrupts still disabled
//! # #[cfg(all(target_arch = "arm", target_os = "none"))]
//! samd51_hal::system_init();
//! ```
//!
//! ## Usage extended
//! ```no_run
//! use samd51_hal::{
//!     clocks::{init_clocks, ClockConfig, ClockPlan, InitPath},
//!     mclk::PowerId,
//!     pclk::PclkId,
//!     Mmio, Spin,
//! };
//!
//! const PLAN: ClockPlan =
//!     match ClockPlan::new(ClockConfig::with_path(InitPath::ExternalCrystal)) {
//!         Ok(plan) => plan,
//!         Err(_) => panic!("bad clock configuration"),
//!     };
//!
//! // Safety: nothing else accesses the clock registers
//! let regs = unsafe { Mmio::steal() };
//! let mut clocks = match init_clocks(regs, Spin, &PLAN) {
//!     Ok(clocks) => clocks,
//!     Err(never) => match never {},
//! };
//!
//! let _ = clocks.enable_peripheral_clock(PclkId::SERCOM0_CORE, PowerId::SERCOM0);
//! let baud_clock = clocks.peripheral_clock_frequency(PclkId::SERCOM0_CORE);
//! ```

use fugit::HertzU32;

use crate::cmcc;
use crate::dfll;
use crate::dpll::{self, DpllId};
use crate::gclk::{self, GenCtrl, GenSrc};
use crate::mclk::{self, PowerId};
use crate::pclk::{self, PclkId};
use crate::reg::RegisterFile;
use crate::wait::{Spin, Wait};
use crate::xosc32k;

mod config;

pub use config::*;

/// Progress of the boot sequence: the last step that completed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BootState {
    /// Nothing touched yet.
    Reset,
    /// The generic clock controller has been reset.
    RoutingReset,
    /// The crystal-referenced PLLs are locked and generator 0 runs from DPLL0.
    ExternalPath,
    /// The DFLL-referenced PLL is locked and generator 0 runs from DPLL0.
    InternalPath,
    /// Clocks are final and the cache is on.
    CacheEnabled,
}

/// Abstraction layer providing Clock Management.
pub struct ClocksManager<R: RegisterFile, W: Wait = Spin> {
    regs: R,
    wait: W,
    plan: ClockPlan,
    state: BootState,
}

impl<R: RegisterFile, W: Wait> ClocksManager<R, W> {
    /// Takes over clocks that have already been brought up according to
    /// `plan`, for instance by `system_init` or an earlier boot stage.
    pub fn assume_initialized(regs: R, wait: W, plan: ClockPlan) -> Self {
        ClocksManager {
            regs,
            wait,
            plan,
            state: BootState::CacheEnabled,
        }
    }

    /// Where the boot sequence got to.
    pub fn state(&self) -> BootState {
        self.state
    }

    /// The plan the clocks follow.
    pub fn plan(&self) -> &ClockPlan {
        &self.plan
    }

    /// The register file in use.
    pub fn registers(&self) -> &R {
        &self.regs
    }

    /// Frequency of the main clock.
    pub fn main_clock_frequency(&self) -> HertzU32 {
        self.plan.main_clock_frequency()
    }

    /// Clock peripheral channel `pclk` from the peripheral generator and
    /// ungate the bus clock at `power`.
    ///
    /// The bus clock is only ungated once the channel has been seen to switch
    /// over. Repeating the call changes nothing.
    pub fn enable_peripheral_clock(
        &mut self,
        pclk: PclkId,
        power: PowerId,
    ) -> Result<(), W::Error> {
        pclk::route_pclock(&mut self.regs, &mut self.wait, pclk, PERIPHERAL_GCLK)?;
        mclk::enable(&mut self.regs, power);
        Ok(())
    }

    /// Frequency of the clock channel `pclk` runs from.
    pub fn peripheral_clock_frequency(&self, pclk: PclkId) -> HertzU32 {
        self.plan.peripheral_clock_frequency(pclk)
    }

    /// Releases the register file and the wait policy.
    pub fn free(self) -> (R, W) {
        (self.regs, self.wait)
    }

    fn new(regs: R, wait: W, plan: ClockPlan) -> Self {
        ClocksManager {
            regs,
            wait,
            plan,
            state: BootState::Reset,
        }
    }

    fn boot(&mut self) -> Result<(), W::Error> {
        while let Some(next) = self.advance()? {
            #[cfg(feature = "defmt")]
            defmt::debug!("clocks: {} -> {}", self.state, next);

            self.state = next;
        }
        Ok(())
    }

    /// Run the step that follows the current state and return the state it
    /// reaches, or `None` once the sequence is complete.
    ///
    /// On error the state is left where it was, so it names the last step
    /// that completed.
    fn advance(&mut self) -> Result<Option<BootState>, W::Error> {
        let regs = &mut self.regs;
        let wait = &mut self.wait;

        let next = match self.state {
            BootState::Reset => {
                gclk::reset(regs, wait)?;
                BootState::RoutingReset
            }
            BootState::RoutingReset => match *self.plan.path() {
                PathPlan::ExternalCrystal { main, peripheral } => {
                    init_external(regs, wait, self.plan.config(), main, peripheral)?;
                    BootState::ExternalPath
                }
                PathPlan::Internal {
                    usb_sof_multiplier,
                    intermediate_div,
                    main,
                } => {
                    init_internal(regs, wait, usb_sof_multiplier, intermediate_div, main)?;
                    BootState::InternalPath
                }
            },
            BootState::ExternalPath | BootState::InternalPath => {
                cmcc::enable(regs);
                BootState::CacheEnabled
            }
            BootState::CacheEnabled => return Ok(None),
        };
        Ok(Some(next))
    }
}

fn init_external<R: RegisterFile, W: Wait>(
    regs: &mut R,
    wait: &mut W,
    config: &ClockConfig,
    main: dpll::DpllConfig,
    peripheral: dpll::DpllConfig,
) -> Result<(), W::Error> {
    xosc32k::setup_xosc32k_blocking(regs, wait, config.crystal_freq)?;

    let dpll0 = dpll::setup_dpll_blocking(regs, wait, DpllId::Dpll0, main)?;
    gclk::route_generator(regs, wait, MAIN_GCLK, GenCtrl::new(dpll0.id().gen_src()))?;

    let dpll1 = dpll::setup_dpll_blocking(regs, wait, DpllId::Dpll1, peripheral)?;
    gclk::route_generator(regs, wait, PERIPHERAL_GCLK, GenCtrl::new(dpll1.id().gen_src()))
}

fn init_internal<R: RegisterFile, W: Wait>(
    regs: &mut R,
    wait: &mut W,
    usb_sof_multiplier: Option<u16>,
    intermediate_div: u16,
    main: dpll::DpllConfig,
) -> Result<(), W::Error> {
    if let Some(multiplier) = usb_sof_multiplier {
        dfll::setup_usb_recovery_blocking(regs, wait, MAIN_GCLK, multiplier)?;
    }

    gclk::route_generator(regs, wait, PERIPHERAL_GCLK, GenCtrl::new(GenSrc::Dfll))?;

    // Generators cannot take another generator as source (except generator
    // 1), so the intermediate clock divides the DFLL itself.
    gclk::route_generator(
        regs,
        wait,
        INTERMEDIATE_GCLK,
        GenCtrl::new(GenSrc::Dfll).with_div(intermediate_div),
    )?;

    pclk::route_pclock(regs, wait, DpllId::Dpll0.reference_pclk(), INTERMEDIATE_GCLK)?;
    let dpll0 = dpll::setup_dpll_blocking(regs, wait, DpllId::Dpll0, main)?;

    gclk::route_generator(regs, wait, MAIN_GCLK, GenCtrl::new(dpll0.id().gen_src()))
}

/// Bring the clock tree up according to `plan`.
///
/// Returns once every clock is stable. With [`Spin`] this cannot fail; a
/// clock that never becomes ready hangs here.
pub fn init_clocks<R: RegisterFile, W: Wait>(
    regs: R,
    wait: W,
    plan: &ClockPlan,
) -> Result<ClocksManager<R, W>, W::Error> {
    let mut clocks = ClocksManager::new(regs, wait, *plan);
    clocks.boot()?;
    Ok(clocks)
}

/// Bring the clock tree up according to [`ClockPlan::DEFAULT`].
///
/// Call once, first thing after reset. Runs inside a critical section.
#[cfg(all(target_arch = "arm", target_os = "none"))]
pub fn system_init() {
    critical_section::with(|_| {
        // Safety: the clock registers are not in use by anything else yet
        let regs = unsafe { crate::reg::Mmio::steal() };
        match init_clocks(regs, Spin, &ClockPlan::DEFAULT) {
            Ok(_) => {}
            Err(never) => match never {},
        }
    });
}

/// Clock peripheral channel `pclk` and ungate the bus clock at `power`.
///
/// Call only after [`system_init`].
#[cfg(all(target_arch = "arm", target_os = "none"))]
pub fn enable_peripheral_clock(pclk: PclkId, power: PowerId) {
    // Safety: both registers touched are owned by the peripheral being enabled
    // and the shared mask is updated in a critical section
    let regs = unsafe { crate::reg::Mmio::steal() };
    let mut clocks = ClocksManager::assume_initialized(regs, Spin, ClockPlan::DEFAULT);
    match clocks.enable_peripheral_clock(pclk, power) {
        Ok(()) => {}
        Err(never) => match never {},
    }
}

/// Frequency of the clock channel `pclk` runs from.
#[cfg(all(target_arch = "arm", target_os = "none"))]
pub fn peripheral_clock_frequency(pclk: PclkId) -> HertzU32 {
    ClockPlan::DEFAULT.peripheral_clock_frequency(pclk)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gclk::GclkId;
    use crate::sim::{Access, SimRegisters};
    use crate::wait::{Bounded, Timeout};
    use std::vec::Vec;

    fn plan(path: InitPath) -> ClockPlan {
        ClockPlan::new(ClockConfig::with_path(path)).unwrap()
    }

    fn boot(path: InitPath) -> SimRegisters {
        let mut regs = SimRegisters::new().with_busy_polls(2);
        let clocks = init_clocks(&mut regs, Spin, &plan(path)).unwrap();
        assert_eq!(clocks.state(), BootState::CacheEnabled);
        regs
    }

    fn genctrl(src: GenSrc) -> u32 {
        GenCtrl::new(src).bits() | 1 << 8
    }

    #[test]
    fn external_path_programs_both_plls_from_the_crystal() {
        let regs = boot(InitPath::ExternalCrystal);

        assert_eq!(regs.read(DpllId::Dpll0.ratio()), 3661);
        assert_eq!(regs.read(DpllId::Dpll1.ratio()), 1464);
        assert_eq!(regs.read(GclkId::Gclk0.genctrl()), genctrl(GenSrc::Dpll0));
        assert_eq!(regs.read(GclkId::Gclk3.genctrl()), genctrl(GenSrc::Dpll1));
        assert_eq!(regs.read(crate::cmcc::CTRL), 1);
    }

    #[test]
    fn external_path_order() {
        let regs = boot(InitPath::ExternalCrystal);

        let steps = [
            regs.position_of_write(gclk::CTRLA, gclk::CTRLA_SWRST),
            regs.position_of_any_write(xosc32k::XOSC32K),
            regs.position_of_any_write(DpllId::Dpll0.ratio()),
            regs.position_of_any_write(GclkId::Gclk0.genctrl()),
            regs.position_of_any_write(DpllId::Dpll1.ratio()),
            regs.position_of_any_write(GclkId::Gclk3.genctrl()),
            regs.position_of_any_write(crate::cmcc::CTRL),
        ];
        assert!(steps.iter().all(Option::is_some));
        assert!(steps.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn internal_path_routes_the_dfll() {
        let regs = boot(InitPath::Internal {
            usb_sof_recovery: false,
        });

        assert_eq!(regs.read(GclkId::Gclk3.genctrl()), genctrl(GenSrc::Dfll));
        assert_eq!(
            regs.read(GclkId::Gclk4.genctrl()),
            GenCtrl::new(GenSrc::Dfll).with_div(24).bits() | 1 << 8
        );
        assert_eq!(regs.read(PclkId::OSCCTRL_FDPLL0.pchctrl()), 0x44);
        assert_eq!(regs.read(DpllId::Dpll0.ratio()), 59);
        assert_eq!(regs.read(DpllId::Dpll0.ctrlb()) >> 5 & 0b111, 0);
        assert_eq!(regs.read(GclkId::Gclk0.genctrl()), genctrl(GenSrc::Dpll0));
        assert_eq!(regs.position_of_any_write(dfll::DFLLCTRLB), None);
        assert_eq!(regs.position_of_any_write(xosc32k::XOSC32K), None);
    }

    #[test]
    fn intermediate_generator_is_ready_before_the_pll_is_touched() {
        let regs = boot(InitPath::Internal {
            usb_sof_recovery: false,
        });
        let log = regs.log();

        let gclk4 = regs.position_of_any_write(GclkId::Gclk4.genctrl()).unwrap();
        let dpll0 = regs.position_of_any_write(DpllId::Dpll0.ctrla()).unwrap();
        let acknowledged = log[gclk4..dpll0].iter().any(|access| {
            matches!(access, Access::Read { addr, value }
                if *addr == gclk::SYNCBUSY.addr() && value & GclkId::Gclk4.syncbusy_mask() == 0)
        });

        assert!(gclk4 < dpll0);
        assert!(acknowledged);
        assert!(regs.position_of_any_write(PclkId::OSCCTRL_FDPLL0.pchctrl()).unwrap() < dpll0);
    }

    #[test]
    fn usb_recovery_runs_before_the_dfll_is_routed() {
        let regs = boot(InitPath::Internal {
            usb_sof_recovery: true,
        });

        let park = regs
            .position_of_write(GclkId::Gclk0.genctrl(), genctrl(GenSrc::OscUlp32k))
            .unwrap();
        let ctrlb = regs
            .position_of_write(dfll::DFLLCTRLB, dfll::DfllCtrlB::usb_clock_recovery().bits())
            .unwrap();
        let peripheral = regs.position_of_any_write(GclkId::Gclk3.genctrl()).unwrap();

        assert!(park < ctrlb);
        assert!(ctrlb < peripheral);
        assert_eq!(regs.read(dfll::DFLLMUL) & 0xffff, 48_000);
        assert_eq!(regs.read(GclkId::Gclk0.genctrl()), genctrl(GenSrc::Dpll0));
    }

    #[test]
    fn boot_starts_with_a_generator_reset_and_ends_with_the_cache() {
        for path in [
            InitPath::ExternalCrystal,
            InitPath::Internal {
                usb_sof_recovery: false,
            },
            InitPath::Internal {
                usb_sof_recovery: true,
            },
        ] {
            let writes = boot(path).writes();
            assert_eq!(writes.first(), Some(&(gclk::CTRLA.addr(), 1)));
            assert_eq!(writes.last(), Some(&(crate::cmcc::CTRL.addr(), 1)));
        }
    }

    #[test]
    fn each_step_is_observable_and_the_cache_comes_last() {
        for (path, clocks_up) in [
            (InitPath::ExternalCrystal, BootState::ExternalPath),
            (
                InitPath::Internal {
                    usb_sof_recovery: false,
                },
                BootState::InternalPath,
            ),
        ] {
            let mut regs = SimRegisters::new().with_busy_polls(1);
            let mut clocks = ClocksManager::new(&mut regs, Spin, plan(path));
            assert_eq!(clocks.state(), BootState::Reset);

            let mut steps = Vec::new();
            while let Some(next) = clocks.advance().unwrap() {
                clocks.state = next;
                let cache_on = clocks
                    .registers()
                    .position_of_any_write(crate::cmcc::CTRL)
                    .is_some();
                steps.push((next, cache_on));
            }

            assert_eq!(
                steps,
                [
                    (BootState::RoutingReset, false),
                    (clocks_up, false),
                    (BootState::CacheEnabled, true),
                ]
            );
            assert_eq!(clocks.advance(), Ok(None));
        }
    }

    #[test]
    fn a_failed_boot_reports_the_last_completed_step() {
        let mut regs = SimRegisters::new().never_lock();
        let mut clocks =
            ClocksManager::new(&mut regs, Bounded::new(100), plan(InitPath::ExternalCrystal));

        assert_eq!(clocks.boot(), Err(Timeout { polls: 100 }));
        assert_eq!(clocks.state(), BootState::RoutingReset);
    }

    #[test]
    fn a_pll_that_never_locks_stops_the_sequence() {
        let mut regs = SimRegisters::new().never_lock();
        let result = init_clocks(&mut regs, Bounded::new(100), &plan(InitPath::ExternalCrystal));

        assert!(matches!(result, Err(Timeout { polls: 100 })));
        assert_eq!(regs.position_of_any_write(GclkId::Gclk0.genctrl()), None);
        assert_eq!(regs.position_of_any_write(crate::cmcc::CTRL), None);
    }

    #[test]
    fn peripheral_clock_is_ungated_only_after_the_channel_switches() {
        let mut regs = SimRegisters::new();
        let mut clocks =
            init_clocks(&mut regs, Bounded::new(100), &plan(InitPath::ExternalCrystal)).unwrap();
        let power = PowerId::new(40).unwrap();

        clocks
            .enable_peripheral_clock(PclkId::SERCOM2_CORE, power)
            .unwrap();
        drop(clocks);

        let routed = regs
            .position_of_write(PclkId::SERCOM2_CORE.pchctrl(), 0x43)
            .unwrap();
        let confirmed = regs
            .log()
            .iter()
            .position(|access| {
                *access
                    == Access::Read {
                        addr: PclkId::SERCOM2_CORE.pchctrl().addr(),
                        value: 0x43,
                    }
            })
            .unwrap();
        let ungated = regs.position_of_any_write(power.mask_reg()).unwrap();

        assert!(routed < confirmed);
        assert!(confirmed < ungated);
        assert_eq!(regs.read(crate::mclk::APBAMASK.offset(4)), 1 << 8);
    }

    #[test]
    fn a_channel_that_never_switches_leaves_the_bus_clock_gated() {
        let mut regs = SimRegisters::new();
        init_clocks(&mut regs, Spin, &plan(InitPath::ExternalCrystal)).unwrap();

        regs = regs.stick_pchctrl();
        let mut clocks = ClocksManager::assume_initialized(
            &mut regs,
            Bounded::new(50),
            plan(InitPath::ExternalCrystal),
        );
        assert_eq!(
            clocks.enable_peripheral_clock(PclkId::SERCOM2_CORE, PowerId::SERCOM2),
            Err(Timeout { polls: 50 })
        );
        let (_, wait) = clocks.free();
        assert_eq!(wait.total_polls(), 50);
        assert!(!crate::mclk::is_enabled(&regs, PowerId::SERCOM2));

        regs.release_pchctrl();
        let mut clocks = ClocksManager::assume_initialized(
            &mut regs,
            Bounded::new(50),
            plan(InitPath::ExternalCrystal),
        );
        clocks
            .enable_peripheral_clock(PclkId::SERCOM2_CORE, PowerId::SERCOM2)
            .unwrap();
        drop(clocks);
        assert!(crate::mclk::is_enabled(&regs, PowerId::SERCOM2));
    }

    #[test]
    fn enabling_a_peripheral_twice_changes_nothing() {
        let mut regs = SimRegisters::new();
        let mut clocks = init_clocks(&mut regs, Spin, &ClockPlan::DEFAULT).unwrap();

        clocks.enable_peripheral_clock(PclkId::ADC0, PowerId::ADC0).unwrap();
        let once = clocks.registers().snapshot();
        clocks.enable_peripheral_clock(PclkId::ADC0, PowerId::ADC0).unwrap();
        assert_eq!(clocks.registers().snapshot(), once);
    }

    #[test]
    fn reported_frequencies() {
        let clocks =
            init_clocks(SimRegisters::new(), Spin, &plan(InitPath::ExternalCrystal)).unwrap();
        assert_eq!(clocks.main_clock_frequency(), HertzU32::from_raw(32_768 * 3662));
        assert_eq!(clocks.peripheral_clock_frequency(PclkId::USB), HertzU32::MHz(48));

        let clocks = init_clocks(
            SimRegisters::new(),
            Spin,
            &plan(InitPath::Internal {
                usb_sof_recovery: false,
            }),
        )
        .unwrap();
        assert_eq!(clocks.main_clock_frequency(), HertzU32::MHz(120));
        assert_eq!(clocks.peripheral_clock_frequency(PclkId::TC0_TC1), HertzU32::MHz(48));
    }
}
