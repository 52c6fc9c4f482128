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

//! Assembles a system out of a board: clock tree first, then memory, network
//! interfaces, storage and LEDs, and finally the constraint set.
//!
//! The order is fixed and the first failure aborts the whole run. Nothing is
//! returned for a failed composition, so no constraint registered by a later
//! step can leak into the toolchain output.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use serde::{Serialize, Deserialize};

use crate::boards::Board;
use crate::catalogue::loader::LoadError;
use crate::common::Period;
use crate::constraints::{ConstraintError, ConstraintSet, FinalizedConstraint};
use crate::crg::*;
use crate::peripherals::{BusInterface, Peripheral, PeripheralFactory};
use crate::registry::{DeclarationError, LookupError, ResolvedBinding, ResourceRegistry};
#[allow(unused)]
use crate::log::*;

#[cfg(test)]
mod tests;

pub const MEMORY_RESOURCE: &str = "ddram";
pub const ETH_RESOURCE: &str = "eth";
pub const SDCARD_RESOURCE: &str = "sdcard";
pub const LED_RESOURCE: &str = "user_led";

/// GMII runs at 125 MHz on every interface
pub const ETH_CLK_FREQ: u64 = 125_000_000;

pub const SDCARD_DOMAIN: &str = "sdcard";
pub const SDCARD_REFCLK_FREQ: u64 = 50_000_000;

/// Companion clock resource of network interface `index`.
pub fn eth_clocks_name(index: usize) -> String {
    match index {
        0 => "eth_clocks_ext".to_string(),
        i => format!("eth{}_clocks_ext", i),
    }
}

/// Clock domain of network interface `index` out of `count`.
pub fn eth_domain_name(index: usize, count: usize) -> String {
    match count {
        1 => "eth".to_string(),
        _ => format!("eth{}_eth", index),
    }
}

fn eth_mac_name(index: usize, count: usize) -> String {
    match count {
        1 => "ethmac".to_string(),
        _ => format!("ethmac{}", index),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SocConfig {
    pub sys_clk_freq: u64,
    /// Size of on-chip main RAM in bytes. Zero means external DRAM.
    pub integrated_main_ram_size: u64,
    pub eth_count: usize,
    pub with_sdcard: bool,
    pub with_led_chaser: bool,
}

impl Default for SocConfig {
    fn default() -> Self {
        Self {
            sys_clk_freq: 100_000_000,
            integrated_main_ram_size: 0,
            eth_count: 1,
            with_sdcard: false,
            with_led_chaser: false,
        }
    }
}

impl SocConfig {
    pub fn open<P>(path: P) -> Result<Self, LoadError> where P: AsRef<Path> {
        let file = File::open(path)
            .map_err(|e| LoadError::CantOpenFile(e.to_string()))?;
        serde_yaml::from_reader(BufReader::new(file))
            .map_err(|e| LoadError::YamlError(e.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Declare,
    ClockReset,
    Memory,
    Ethernet(usize),
    Storage,
    Leds,
    Finalize,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Declare => write!(f, "resource declaration"),
            Self::ClockReset => write!(f, "clock and reset"),
            Self::Memory => write!(f, "main memory"),
            Self::Ethernet(idx) => write!(f, "network interface {}", idx),
            Self::Storage => write!(f, "storage"),
            Self::Leds => write!(f, "LED chaser"),
            Self::Finalize => write!(f, "finalization"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompositionCause {
    Declaration(DeclarationError),
    Lookup(LookupError),
    Configuration(ConfigurationError),
    Constraint(ConstraintError),
}

impl From<DeclarationError> for CompositionCause {
    fn from(e: DeclarationError) -> Self {
        Self::Declaration(e)
    }
}

impl From<LookupError> for CompositionCause {
    fn from(e: LookupError) -> Self {
        Self::Lookup(e)
    }
}

impl From<ConfigurationError> for CompositionCause {
    fn from(e: ConfigurationError) -> Self {
        Self::Configuration(e)
    }
}

impl From<ConstraintError> for CompositionCause {
    fn from(e: ConstraintError) -> Self {
        Self::Constraint(e)
    }
}

impl std::fmt::Display for CompositionCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Declaration(e) => write!(f, "{}", e),
            Self::Lookup(e) => write!(f, "{}", e),
            Self::Configuration(e) => write!(f, "{}", e),
            Self::Constraint(e) => write!(f, "{}", e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositionError {
    pub step: Step,
    pub cause: CompositionCause,
}

impl std::fmt::Display for CompositionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "composition failed at {}: {}", self.step, self.cause)
    }
}

impl std::error::Error for CompositionError {}

fn at<E>(step: Step) -> impl Fn(E) -> CompositionError where E: Into<CompositionCause> {
    move |e| CompositionError { step, cause: e.into() }
}

fn required_domain(
    domains: &DomainTable,
    name: &str,
    step: Step
) -> Result<ClockDomain, CompositionError> {
    domains.get(name).cloned().ok_or(CompositionError {
        step,
        cause: CompositionCause::Configuration(ConfigurationError::NotConfigured),
    })
}

fn period_of(freq: u64, step: Step) -> Result<Period, CompositionError> {
    Period::from_freq(freq).ok_or(CompositionError {
        step,
        cause: CompositionCause::Configuration(ConfigurationError::ZeroFrequency {
            what: step.to_string(),
        }),
    })
}

/// What the toolchain needs to know about an instantiated peripheral.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeripheralInfo {
    pub name: String,
    pub bus: BusInterface,
    pub pads: Vec<String>,
}

impl PeripheralInfo {
    fn of(peripheral: &dyn Peripheral) -> Self {
        Self {
            name: peripheral.name().to_string(),
            bus: peripheral.bus().clone(),
            pads: peripheral.pads().iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// Output of a successful composition, handed to the toolchain boundary.
#[derive(Debug, Clone, Serialize)]
pub struct Composition {
    pub board: String,
    pub device: String,
    pub toolchain: String,
    pub sys_clk_freq: u64,
    pub reset: String,
    pub domains: Vec<ClockDomain>,
    /// Claimed bindings, in claim order
    pub bindings: Vec<ResolvedBinding>,
    pub constraints: Vec<FinalizedConstraint>,
    pub peripherals: Vec<PeripheralInfo>,
}

struct Composer<'b, 'f> {
    board: &'b Board,
    config: &'b SocConfig,
    factory: &'f mut dyn PeripheralFactory,
    registry: ResourceRegistry<'b>,
    domains: DomainTable,
    constraints: ConstraintSet,
    peripherals: Vec<Box<dyn Peripheral>>,
}

impl<'b, 'f> Composer<'b, 'f> {
    fn add_peripheral(&mut self, peripheral: Box<dyn Peripheral>) {
        dbg_log!(DBG_INFO, "Instantiated {} on domain {}",
            peripheral.name(), peripheral.bus().domain);
        for entry in peripheral.constraints() {
            self.constraints.add(entry);
        }
        self.peripherals.push(peripheral);
    }

    fn clock_reset(&mut self) -> Result<Crg, CompositionError> {
        let step = Step::ClockReset;
        let clkin = self.registry.request(&self.board.default_clk_name, 0, None, false)
            .map_err(at(step))?;
        let rst = self.registry.request(&self.board.reset_name, 0, None, false)
            .map_err(at(step))?;

        Crg::new(
            clkin,
            self.board.default_clk_freq,
            rst,
            self.config.sys_clk_freq,
            &mut self.domains,
            &mut self.constraints
        ).map_err(at(step))
    }

    fn memory(&mut self) -> Result<(), CompositionError> {
        let step = Step::Memory;
        let pads = self.registry.request(MEMORY_RESOURCE, 0, None, false)
            .map_err(at(step))?;
        let sys4x = required_domain(&self.domains, SYS4X_DOMAIN, step)?;
        let sys4x_dqs = required_domain(&self.domains, SYS4X_DQS_DOMAIN, step)?;

        let phy = self.factory.memory(pads, &sys4x, &sys4x_dqs, self.config.sys_clk_freq);
        self.add_peripheral(phy);
        Ok(())
    }

    fn ethernet(&mut self, index: usize) -> Result<(), CompositionError> {
        let step = Step::Ethernet(index);
        let count = self.config.eth_count;

        let pads = self.registry.request(ETH_RESOURCE, index as u32, None, false)
            .map_err(at(step))?;
        let clock_pads = self.registry.request(&eth_clocks_name(index), 0, None, false)
            .map_err(at(step))?;

        let period = period_of(ETH_CLK_FREQ, step)?;
        let rx = clock_pads.signal("rx")
            .map(|s| s.port.clone())
            .unwrap_or_else(|| clock_pads.target().to_string());
        let domain = self.domains.create(ClockDomain {
            name: eth_domain_name(index, count),
            source: ClockSource::Port(rx),
            reset: ResetPolicy::Synchronous,
            period: Some(period),
        }).map_err(at(step))?.clone();

        self.constraints.add_period(domain.target(), period);
        let mac = self.factory.ethernet(&eth_mac_name(index, count), clock_pads, pads, &domain);
        self.add_peripheral(mac);
        Ok(())
    }

    fn storage(&mut self, crg: &mut Crg) -> Result<(), CompositionError> {
        let step = Step::Storage;
        let pads = self.registry.request(SDCARD_RESOURCE, 0, None, false)
            .map_err(at(step))?;
        let refclk = crg.create_clkout(
            SDCARD_DOMAIN,
            SDCARD_REFCLK_FREQ,
            &mut self.domains,
            &mut self.constraints
        ).map_err(at(step))?;

        let sdcard = self.factory.storage(pads, &refclk, self.config.sys_clk_freq);
        self.add_peripheral(sdcard);
        Ok(())
    }

    fn leds(&mut self) -> Result<(), CompositionError> {
        let step = Step::Leds;
        let pads = self.registry.request_all(LED_RESOURCE).map_err(at(step))?;
        let sys = required_domain(&self.domains, SYS_DOMAIN, step)?;

        let chaser = self.factory.led_chaser(pads, &sys, self.config.sys_clk_freq);
        self.add_peripheral(chaser);
        Ok(())
    }

    fn finish(mut self, crg: Crg) -> Result<Composition, CompositionError> {
        if let Some(hook) = self.board.finalize_hook {
            hook(&self.registry, &mut self.constraints);
        }
        let constraints = self.constraints.finalize(&self.domains)
            .map_err(at(Step::Finalize))?;

        Ok(Composition {
            board: self.board.name.clone(),
            device: self.board.device.clone(),
            toolchain: self.board.toolchain.clone(),
            sys_clk_freq: crg.sys_clk_freq(),
            reset: crg.reset().map(|r| r.to_string()).unwrap_or_default(),
            domains: self.domains.iter().cloned().collect(),
            bindings: self.registry.claimed(),
            constraints,
            peripherals: self.peripherals.iter()
                .map(|p| PeripheralInfo::of(&**p))
                .collect(),
        })
    }
}

/// Runs one composition of `board` with the features selected by `config`.
pub fn compose(
    board: &Board,
    config: &SocConfig,
    factory: &mut dyn PeripheralFactory
) -> Result<Composition, CompositionError> {
    let registry = ResourceRegistry::new(&board.catalogue).map_err(at(Step::Declare))?;
    let mut composer = Composer {
        board,
        config,
        factory,
        registry,
        domains: DomainTable::new(),
        constraints: ConstraintSet::new(),
        peripherals: Vec::new(),
    };

    for command in &board.platform_commands {
        composer.constraints.add_platform_command(command.clone());
    }

    let mut crg = composer.clock_reset()?;
    if config.integrated_main_ram_size == 0 {
        composer.memory()?;
    }
    for index in 0 .. config.eth_count {
        composer.ethernet(index)?;
    }
    if config.with_sdcard {
        composer.storage(&mut crg)?;
    }
    if config.with_led_chaser {
        composer.leds()?;
    }

    let composition = composer.finish(crg)?;
    dbg_log!(DBG_INFO, "Composed {}: {} bindings, {} constraints",
        composition.board, composition.bindings.len(), composition.constraints.len());
    Ok(composition)
}
