/* Copyright (C) 2022 Antmicro
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     https://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use replace_with::replace_with_or_abort;
use serde::Serialize;

use crate::common::{Period, PS_PER_SECOND};
use crate::constraints::{ConstraintSet, Target};
use crate::registry::ResolvedBinding;
#[allow(unused)]
use crate::log::*;

#[cfg(test)]
mod tests;

pub const SYS_DOMAIN: &str = "sys";
pub const SYS4X_DOMAIN: &str = "sys4x";
pub const SYS4X_DQS_DOMAIN: &str = "sys4x_dqs";
pub const IDELAY_DOMAIN: &str = "idelay";

/// IDELAYCTRL reference clock
pub const IDELAY_FREQ: u64 = 200_000_000;

/// Name of the clock generator, used to name its outputs.
pub const CLKGEN_NAME: &str = "crg_mmcm";

/// Internal soft reset OR-ed with the external reset
pub const SOFT_RESET_SIGNAL: &str = "crg_rst";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    ZeroFrequency { what: String },
    /// The 90° shifted 4x clock would need a fractional picosecond delay
    PhaseShift { sys_clk_freq: u64 },
    TapFrequency { name: String, freq: u64 },
    DuplicateDomain(String),
    NotConfigured,
}

impl std::fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ZeroFrequency { what } => write!(f, "{} frequency is zero", what),
            Self::PhaseShift { sys_clk_freq } => write!(f,
                "a 90 degree shift of 4x{} Hz is not a whole number of picoseconds",
                sys_clk_freq
            ),
            Self::TapFrequency { name, freq } => write!(f,
                "clock output {} at {} Hz has a period that is not a whole number of picoseconds",
                name, freq
            ),
            Self::DuplicateDomain(name) => write!(f, "clock domain {} already exists", name),
            Self::NotConfigured => write!(f, "clock generator is not configured"),
        }
    }
}

impl std::error::Error for ConfigurationError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetPolicy {
    None,
    Synchronous,
    Asynchronous,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockSource {
    /// Driven straight from a board pin
    Port(String),
    /// Output of a clock generator
    Derived { generator: String, output: u32, phase: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClockDomain {
    pub name: String,
    pub source: ClockSource,
    pub reset: ResetPolicy,
    pub period: Option<Period>,
}

impl ClockDomain {
    pub fn target(&self) -> Target {
        Target::Domain(self.name.clone())
    }
}

/// Every clock domain of a composition, in creation order. Domains live
/// until the end of the run, there is no way to remove one.
#[derive(Debug, Clone, Default)]
pub struct DomainTable {
    domains: Vec<ClockDomain>,
}

impl DomainTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, domain: ClockDomain) -> Result<&ClockDomain, ConfigurationError> {
        if self.contains(&domain.name) {
            return Err(ConfigurationError::DuplicateDomain(domain.name));
        }
        dbg_log!(DBG_INFO, "New clock domain {} ({:?})", domain.name, domain.period);
        self.domains.push(domain);
        Ok(&self.domains[self.domains.len() - 1])
    }

    pub fn get<'s>(&'s self, name: &str) -> Option<&'s ClockDomain> {
        self.domains.iter().find(|d| d.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter<'s>(&'s self) -> std::slice::Iter<'s, ClockDomain> {
        self.domains.iter()
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

/// Reset condition of a domain, as a small boolean expression over pins and
/// internal signals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetExpr {
    Port(String),
    Signal(String),
    Not(Box<ResetExpr>),
    Or(Box<ResetExpr>, Box<ResetExpr>),
}

impl std::fmt::Display for ResetExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Port(name) | Self::Signal(name) => write!(f, "{}", name),
            Self::Not(e) => write!(f, "~{}", e),
            Self::Or(a, b) => write!(f, "{} | {}", a, b),
        }
    }
}

fn period_of(what: &str, freq: u64) -> Result<Period, ConfigurationError> {
    Period::from_freq(freq)
        .ok_or_else(|| ConfigurationError::ZeroFrequency { what: what.to_string() })
}

#[derive(Debug)]
enum CrgState {
    Unconfigured {
        clkin: ResolvedBinding,
        clkin_freq: u64,
        rst: ResolvedBinding,
    },
    Configured {
        clkin: Target,
        reset: ResetExpr,
        outputs: u32,
    },
}

/// Clock and reset generator. A clock generator fed from one board clock
/// produces the system clock, the 4x DDR clocks and the IDELAY reference.
pub struct Crg {
    state: CrgState,
    sys_clk_freq: u64,
}

impl Crg {
    /// Builds the clock tree and registers its domains and constraints.
    ///
    /// # Arguments
    /// * `clkin` - board clock feeding the generator
    /// * `clkin_freq` - frequency of `clkin` in Hz
    /// * `rst` - active-low board reset
    /// * `sys_clk_freq` - target system clock frequency in Hz
    pub fn new(
        clkin: ResolvedBinding,
        clkin_freq: u64,
        rst: ResolvedBinding,
        sys_clk_freq: u64,
        domains: &mut DomainTable,
        constraints: &mut ConstraintSet,
    ) -> Result<Self, ConfigurationError> {
        let mut crg = Self {
            state: CrgState::Unconfigured { clkin, clkin_freq, rst },
            sys_clk_freq,
        };
        crg.configure(domains, constraints)?;
        Ok(crg)
    }

    fn configure(
        &mut self,
        domains: &mut DomainTable,
        constraints: &mut ConstraintSet
    ) -> Result<(), ConfigurationError> {
        let (clkin, clkin_freq, rst) = match &self.state {
            CrgState::Unconfigured { clkin, clkin_freq, rst } => (clkin, *clkin_freq, rst),
            CrgState::Configured { .. } => return Ok(()),
        };

        period_of("input clock", clkin_freq)?;
        let sys = period_of("system clock", self.sys_clk_freq)?;
        /* The DQS clock is sys4x delayed by a quarter of its period */
        let phase_error = ConfigurationError::PhaseShift { sys_clk_freq: self.sys_clk_freq };
        if PS_PER_SECOND as u128 % (16 * self.sys_clk_freq as u128) != 0 {
            return Err(phase_error);
        }
        let sys4x = sys.divided(4).ok_or(phase_error)?;
        let idelay = period_of("IDELAY reference", IDELAY_FREQ)?;

        let derived = |output, phase| ClockSource::Derived {
            generator: CLKGEN_NAME.to_string(),
            output,
            phase
        };
        let outputs = [
            (SYS_DOMAIN, derived(0, 0), ResetPolicy::Synchronous, sys),
            (SYS4X_DOMAIN, derived(1, 0), ResetPolicy::None, sys4x),
            (SYS4X_DQS_DOMAIN, derived(2, 90), ResetPolicy::None, sys4x),
            (IDELAY_DOMAIN, derived(3, 0), ResetPolicy::Synchronous, idelay),
        ];
        /* Fail before touching the table or the constraints */
        for (name, ..) in &outputs {
            if domains.contains(name) {
                return Err(ConfigurationError::DuplicateDomain(name.to_string()));
            }
        }

        let clkin_target = clkin.target();
        let reset = ResetExpr::Or(
            Box::new(ResetExpr::Not(Box::new(ResetExpr::Port(rst.target().to_string())))),
            Box::new(ResetExpr::Signal(SOFT_RESET_SIGNAL.to_string())),
        );

        let output_count = outputs.len() as u32;
        for (name, source, policy, period) in outputs {
            domains.create(ClockDomain {
                name: name.to_string(),
                source,
                reset: policy,
                period: Some(period),
            })?;
        }

        /* The generator output and its input are unrelated as far as timing
         * analysis is concerned */
        constraints.add_false_path(Target::Domain(SYS_DOMAIN.to_string()), clkin_target.clone());
        for domain in [SYS_DOMAIN, SYS4X_DOMAIN, SYS4X_DQS_DOMAIN, IDELAY_DOMAIN] {
            if let Some(period) = domains.get(domain).and_then(|d| d.period) {
                constraints.add_period(Target::Domain(domain.to_string()), period);
            }
        }

        dbg_log!(DBG_INFO, "CRG configured, reset = {}", reset);

        replace_with_or_abort(&mut self.state, |state| match state {
            CrgState::Unconfigured { .. } => CrgState::Configured {
                clkin: clkin_target,
                reset,
                outputs: output_count,
            },
            configured => configured,
        });
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        matches!(self.state, CrgState::Configured { .. })
    }

    pub fn sys_clk_freq(&self) -> u64 {
        self.sys_clk_freq
    }

    /// Input clock the generator is fed from.
    pub fn clkin(&self) -> Option<&Target> {
        match &self.state {
            CrgState::Configured { clkin, .. } => Some(clkin),
            CrgState::Unconfigured { .. } => None,
        }
    }

    pub fn reset(&self) -> Option<&ResetExpr> {
        match &self.state {
            CrgState::Configured { reset, .. } => Some(reset),
            CrgState::Unconfigured { .. } => None,
        }
    }

    /// Adds one more output to the clock generator and a domain driven by it.
    /// Used for reference clocks of peripherals which must not come from a
    /// separate board clock.
    pub fn create_clkout(
        &mut self,
        name: &str,
        freq: u64,
        domains: &mut DomainTable,
        constraints: &mut ConstraintSet,
    ) -> Result<ClockDomain, ConfigurationError> {
        let output = match &self.state {
            CrgState::Configured { outputs, .. } => *outputs,
            CrgState::Unconfigured { .. } => return Err(ConfigurationError::NotConfigured),
        };

        let period = period_of(name, freq)?;
        if period.as_whole_ps().is_none() {
            return Err(ConfigurationError::TapFrequency { name: name.to_string(), freq });
        }

        let domain = domains.create(ClockDomain {
            name: name.to_string(),
            source: ClockSource::Derived {
                generator: CLKGEN_NAME.to_string(),
                output,
                phase: 0,
            },
            reset: ResetPolicy::Synchronous,
            period: Some(period),
        })?.clone();
        constraints.add_period(domain.target(), period);

        if let CrgState::Configured { outputs, .. } = &mut self.state {
            *outputs += 1;
        }
        Ok(domain)
    }
}
