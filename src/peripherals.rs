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

//! Boundary to the cores the composition wires together.
//!
//! Memory controllers, Ethernet MACs and SD card cores are black boxes here:
//! each one is handed the binding it drives and the clock domain it runs in,
//! and reports back the bus it exposes together with whatever constraints it
//! wants registered. The models in this module describe what the usual cores
//! for the board look like; real implementations are plugged in through
//! `PeripheralFactory`.

use serde::Serialize;

use crate::common::Period;
use crate::constraints::ConstraintEntry;
use crate::crg::ClockDomain;
use crate::registry::ResolvedBinding;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BusKind {
    /// Memory-mapped system bus
    Wishbone,
    /// DFI interface between a DRAM PHY and its controller
    Dfi,
    /// Packet stream
    Stream,
    /// Plain general purpose outputs
    Gpio,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BusInterface {
    pub name: String,
    pub kind: BusKind,
    pub data_width: u32,
    /// Domain the bus is synchronous to
    pub domain: String,
}

pub trait Peripheral {
    fn name(&self) -> &str;

    fn bus(&self) -> &BusInterface;

    /// Pads the peripheral drives
    fn pads(&self) -> Vec<&ResolvedBinding>;

    /// Constraints originating from the core itself
    fn constraints(&self) -> Vec<ConstraintEntry> {
        Vec::new()
    }
}

/// Creates the peripherals the composition asks for.
pub trait PeripheralFactory {
    fn memory(
        &mut self,
        pads: ResolvedBinding,
        sys4x: &ClockDomain,
        sys4x_dqs: &ClockDomain,
        sys_clk_freq: u64,
    ) -> Box<dyn Peripheral>;

    fn ethernet(
        &mut self,
        name: &str,
        clock_pads: ResolvedBinding,
        pads: ResolvedBinding,
        domain: &ClockDomain,
    ) -> Box<dyn Peripheral>;

    fn storage(
        &mut self,
        pads: ResolvedBinding,
        refclk: &ClockDomain,
        sys_clk_freq: u64,
    ) -> Box<dyn Peripheral>;

    fn led_chaser(
        &mut self,
        pads: Vec<ResolvedBinding>,
        sys: &ClockDomain,
        sys_clk_freq: u64,
    ) -> Box<dyn Peripheral>;
}

fn signal_width(binding: &ResolvedBinding, channel: &str) -> u32 {
    binding.signal(channel).map(|s| s.pins.len() as u32).unwrap_or(0)
}

/// 7-series DDR3 PHY with a 1:4 controller
pub struct DdrPhy {
    pub memtype: &'static str,
    pub module: &'static str,
    pub nphases: u32,
    pub rate: &'static str,
    pub sys_clk_freq: u64,
    pads: ResolvedBinding,
    bus: BusInterface,
    domains: [(String, Option<Period>); 2],
}

impl DdrPhy {
    pub const NPHASES: u32 = 4;

    pub fn new(
        pads: ResolvedBinding,
        sys4x: &ClockDomain,
        sys4x_dqs: &ClockDomain,
        sys_clk_freq: u64
    ) -> Self {
        /* DFI carries both edges of every phase */
        let data_width = signal_width(&pads, "dq") * 2 * Self::NPHASES;
        Self {
            memtype: "DDR3",
            module: "IS43TR16256B",
            nphases: Self::NPHASES,
            rate: "1:4",
            sys_clk_freq,
            bus: BusInterface {
                name: "sdram".to_string(),
                kind: BusKind::Dfi,
                data_width,
                domain: crate::crg::SYS_DOMAIN.to_string(),
            },
            pads,
            domains: [
                (sys4x.name.clone(), sys4x.period),
                (sys4x_dqs.name.clone(), sys4x_dqs.period),
            ],
        }
    }
}

impl Peripheral for DdrPhy {
    fn name(&self) -> &str {
        "ddrphy"
    }

    fn bus(&self) -> &BusInterface {
        &self.bus
    }

    fn pads(&self) -> Vec<&ResolvedBinding> {
        vec![&self.pads]
    }

    /// The serializers are timed on both 4x clocks
    fn constraints(&self) -> Vec<ConstraintEntry> {
        self.domains.iter()
            .filter_map(|(name, period)| Some(ConstraintEntry::Period {
                target: crate::constraints::Target::Domain(name.clone()),
                period: (*period)?,
            }))
            .collect()
    }
}

/// GMII PHY together with the MAC behind it
pub struct GmiiEthernet {
    name: String,
    clock_pads: ResolvedBinding,
    pads: ResolvedBinding,
    bus: BusInterface,
}

impl GmiiEthernet {
    pub fn new(
        name: &str,
        clock_pads: ResolvedBinding,
        pads: ResolvedBinding,
        domain: &ClockDomain
    ) -> Self {
        Self {
            name: name.to_string(),
            bus: BusInterface {
                name: name.to_string(),
                kind: BusKind::Stream,
                data_width: signal_width(&pads, "rx_data"),
                domain: domain.name.clone(),
            },
            clock_pads,
            pads,
        }
    }
}

impl Peripheral for GmiiEthernet {
    fn name(&self) -> &str {
        &self.name
    }

    fn bus(&self) -> &BusInterface {
        &self.bus
    }

    fn pads(&self) -> Vec<&ResolvedBinding> {
        vec![&self.clock_pads, &self.pads]
    }
}

/// SD card PHY and core
pub struct SdCard {
    pads: ResolvedBinding,
    bus: BusInterface,
    pub sys_clk_freq: u64,
}

impl SdCard {
    pub fn new(pads: ResolvedBinding, refclk: &ClockDomain, sys_clk_freq: u64) -> Self {
        Self {
            bus: BusInterface {
                name: "sdcard".to_string(),
                kind: BusKind::Wishbone,
                data_width: signal_width(&pads, "data"),
                domain: refclk.name.clone(),
            },
            pads,
            sys_clk_freq,
        }
    }
}

impl Peripheral for SdCard {
    fn name(&self) -> &str {
        "sdcard"
    }

    fn bus(&self) -> &BusInterface {
        &self.bus
    }

    fn pads(&self) -> Vec<&ResolvedBinding> {
        vec![&self.pads]
    }
}

pub struct LedChaser {
    pads: Vec<ResolvedBinding>,
    bus: BusInterface,
    pub sys_clk_freq: u64,
}

impl LedChaser {
    pub fn new(pads: Vec<ResolvedBinding>, sys: &ClockDomain, sys_clk_freq: u64) -> Self {
        Self {
            bus: BusInterface {
                name: "leds".to_string(),
                kind: BusKind::Gpio,
                data_width: pads.iter().map(|p| p.pins().len() as u32).sum(),
                domain: sys.name.clone(),
            },
            pads,
            sys_clk_freq,
        }
    }
}

impl Peripheral for LedChaser {
    fn name(&self) -> &str {
        "leds"
    }

    fn bus(&self) -> &BusInterface {
        &self.bus
    }

    fn pads(&self) -> Vec<&ResolvedBinding> {
        self.pads.iter().collect()
    }
}

/// Factory producing the models above.
#[derive(Default)]
pub struct ModelPeripherals;

impl PeripheralFactory for ModelPeripherals {
    fn memory(
        &mut self,
        pads: ResolvedBinding,
        sys4x: &ClockDomain,
        sys4x_dqs: &ClockDomain,
        sys_clk_freq: u64,
    ) -> Box<dyn Peripheral> {
        Box::new(DdrPhy::new(pads, sys4x, sys4x_dqs, sys_clk_freq))
    }

    fn ethernet(
        &mut self,
        name: &str,
        clock_pads: ResolvedBinding,
        pads: ResolvedBinding,
        domain: &ClockDomain,
    ) -> Box<dyn Peripheral> {
        Box::new(GmiiEthernet::new(name, clock_pads, pads, domain))
    }

    fn storage(
        &mut self,
        pads: ResolvedBinding,
        refclk: &ClockDomain,
        sys_clk_freq: u64,
    ) -> Box<dyn Peripheral> {
        Box::new(SdCard::new(pads, refclk, sys_clk_freq))
    }

    fn led_chaser(
        &mut self,
        pads: Vec<ResolvedBinding>,
        sys: &ClockDomain,
        sys_clk_freq: u64,
    ) -> Box<dyn Peripheral> {
        Box::new(LedChaser::new(pads, sys, sys_clk_freq))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::{Catalogue, PinGroup, ResourceSpec};
    use crate::crg::{ClockSource, ResetPolicy};
    use crate::registry::ResourceRegistry;

    fn domain(name: &str, period: Option<Period>) -> ClockDomain {
        ClockDomain {
            name: name.to_string(),
            source: ClockSource::Port("clk".to_string()),
            reset: ResetPolicy::None,
            period,
        }
    }

    #[test]
    fn test_ddrphy() {
        let catalogue = Catalogue::new()
            .with(ResourceSpec::composite("ddram", 0)
                .subsignal("dq", PinGroup::new("T1 U3 U2 U1 Y2 W1 Y1 V2 V7 W9 AB7 AA8 AB8 AB6 Y8 Y9")));
        let mut registry = ResourceRegistry::new(&catalogue).unwrap();
        let pads = registry.request("ddram", 0, None, false).unwrap();

        let sys4x = domain("sys4x", Period::from_freq(400_000_000));
        let dqs = domain("sys4x_dqs", None);
        let phy = DdrPhy::new(pads, &sys4x, &dqs, 100_000_000);

        assert_eq!(phy.bus().kind, BusKind::Dfi);
        assert_eq!(phy.bus().data_width, 128);
        assert_eq!(phy.rate, "1:4");
        /* Domains without a period contribute nothing */
        assert_eq!(phy.constraints(), vec![ConstraintEntry::Period {
            target: crate::constraints::Target::Domain("sys4x".into()),
            period: Period::from_ns(5).divided(2).unwrap(),
        }]);
    }
}
