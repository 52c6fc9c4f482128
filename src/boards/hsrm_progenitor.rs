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

//! HSRM Progenitor: Artix-7 200T board with DDR3, four GMII Ethernet ports
//! and an SD card slot.

use crate::catalogue::{io_standard, misc, Attribute, Catalogue, PinGroup, ResourceSpec};
use crate::common::Period;
use crate::constraints::{CommandTemplate, ConstraintSet};
use crate::registry::{parse_request, ResourceRegistry};
#[allow(unused)]
use crate::log::*;

use super::{Board, OpenOcd};

pub const NAME: &str = "hsrm_progenitor";
pub const DEVICE: &str = "xc7a200t-fbg484-1";

pub const CLK0_FREQ: u64 = 200_000_000;
pub const ETH_CLK_FREQ: u64 = 125_000_000;

/// Companion clock resources of the Ethernet ports, by port index
pub const ETH_CLOCKS: [&str; 4] =
    ["eth_clocks_ext", "eth1_clocks_ext", "eth2_clocks_ext", "eth3_clocks_ext"];

fn sstl15() -> Attribute {
    io_standard("SSTL15")
}

fn diff_sstl15() -> Attribute {
    io_standard("DIFF_SSTL15")
}

fn lvcmos33() -> Attribute {
    io_standard("LVCMOS33")
}

fn pins(pins: &str) -> PinGroup {
    PinGroup::new(pins)
}

fn ddram() -> ResourceSpec {
    ResourceSpec::composite("ddram", 0)
        .subsignal("a", pins("J1 P6 N5 N3 G1 M3 N2 J5 L1 P2 L4 P5 K2 M1 M5").attr(sstl15()))
        .subsignal("ba", pins("P4 H5 H2").attr(sstl15()))
        .subsignal("ras_n", pins("M6").attr(sstl15()))
        .subsignal("cas_n", pins("M2").attr(sstl15()))
        .subsignal("we_n", pins("J2").attr(sstl15()))
        .subsignal("dm", pins("W2 Y7 V4 V5").attr(sstl15()))
        .subsignal("dq", pins(
            "T1 U3 U2 U1 Y2 W1 Y1 V2 V7 W9 AB7 AA8 AB8 AB6 Y8 Y9 \
             AB1 AB5 AB3 AA1 Y4 AA5 AB2 W4 T4 U6 T6 AA6 Y6 T5 U5 R6"
        ).attr(sstl15()).attr(misc("IN_TERM=UNTUNED_SPLIT_50")))
        .subsignal("dqs_p", pins("R3 V9 Y3 W6")
            .attr(diff_sstl15()).attr(misc("IN_TERM=UNTUNED_SPLIT_50")))
        .subsignal("dqs_n", pins("R2 V8 AA3 W5")
            .attr(diff_sstl15()).attr(misc("IN_TERM=UNTUNED_SPLIT_50")))
        .subsignal("clk_p", pins("R1").attr(diff_sstl15()))
        .subsignal("clk_n", pins("P1").attr(diff_sstl15()))
        .subsignal("cke", pins("L3").attr(sstl15()))
        .subsignal("odt", pins("K3").attr(sstl15()))
        .subsignal("cs_n", pins("K1").attr(sstl15()))
        .subsignal("reset_n", pins("H3").attr(io_standard("LVCMOS15")))
        .attr(misc("SLEW=FAST"))
}

fn eth_clocks(name: &str, tx: &str, gtx: &str, rx: &str) -> ResourceSpec {
    ResourceSpec::composite(name, 0)
        .subsignal("tx", pins(tx))
        .subsignal("gtx", pins(gtx))
        .subsignal("rx", pins(rx))
        .attr(lvcmos33())
}

struct GmiiPins {
    rst_n: &'static str,
    mdc: &'static str,
    mdio: &'static str,
    rx_dv: &'static str,
    rx_er: &'static str,
    rx_data: &'static str,
    tx_en: &'static str,
    tx_er: &'static str,
    tx_data: &'static str,
    col: &'static str,
    crs: &'static str,
}

/* The PHY interrupt lines are not routed to the FPGA */
fn eth(index: u32, p: GmiiPins) -> ResourceSpec {
    ResourceSpec::composite("eth", index)
        .subsignal("rst_n", pins(p.rst_n))
        .subsignal("mdc", pins(p.mdc))
        .subsignal("mdio", pins(p.mdio))
        .subsignal("rx_dv", pins(p.rx_dv))
        .subsignal("rx_er", pins(p.rx_er))
        .subsignal("rx_data", pins(p.rx_data))
        .subsignal("tx_en", pins(p.tx_en))
        .subsignal("tx_er", pins(p.tx_er))
        .subsignal("tx_data", pins(p.tx_data))
        .subsignal("col", pins(p.col))
        .subsignal("crs", pins(p.crs))
        .attr(lvcmos33())
}

/// Pin table of the board.
pub fn catalogue() -> Catalogue {
    let mut catalogue = Catalogue::new()
        /* Clock and reset */
        .with(ResourceSpec::composite("clk0", 0)
            .subsignal("p", pins("H4").attr(diff_sstl15()))
            .subsignal("n", pins("G4").attr(diff_sstl15())))
        .with(ResourceSpec::pins("cpu_reset", 0, "T3").attr(sstl15()))
        .with(ddram())
        .with(ResourceSpec::composite("serial", 0)
            .subsignal("tx", pins("U18"))
            .subsignal("rx", pins("P16"))
            .attr(lvcmos33()))
        /* GMII Ethernet */
        .with(eth_clocks(ETH_CLOCKS[0], "D19", "C13", "D21"))
        .with(eth_clocks(ETH_CLOCKS[1], "D15", "A13", "A15"))
        .with(eth_clocks(ETH_CLOCKS[2], "M18", "G18", "AB20"))
        .with(eth_clocks(ETH_CLOCKS[3], "H18", "N20", "K19"))
        .with(eth(0, GmiiPins {
            rst_n: "Y22",
            mdc: "AA10",
            mdio: "AA11",
            rx_dv: "E22",
            rx_er: "T21",
            rx_data: "D22 G22 G21 E21 F18 E18 U17 Y21",
            tx_en: "B21",
            tx_er: "B13",
            tx_data: "D17 C17 C14 C15 E19 C19 C18 A21",
            col: "R17",
            crs: "U21",
        }))
        .with(eth(1, GmiiPins {
            rst_n: "A19",
            mdc: "B22",
            mdio: "C22",
            rx_dv: "A14",
            rx_er: "B20",
            rx_data: "B18 B17 B15 B16 A16 F19 F20 A18",
            tx_en: "A20",
            tx_er: "F13",
            tx_data: "D16 E16 E17 F16 D14 E14 E13 F14",
            col: "C20",
            crs: "D20",
        }))
        .with(eth(2, GmiiPins {
            rst_n: "G16",
            mdc: "V19",
            mdio: "V18",
            rx_dv: "Y18",
            rx_er: "J20",
            rx_data: "Y19 V17 W17 AA19 L16 K16 K13 K14",
            tx_en: "J21",
            tx_er: "G17",
            tx_data: "G15 G13 H13 L18 N18 N19 H14 J14",
            col: "J15",
            crs: "H15",
        }))
        .with(eth(3, GmiiPins {
            rst_n: "G20",
            mdc: "L15",
            mdio: "L14",
            rx_dv: "L21",
            rx_er: "K21",
            rx_data: "H19 J19 L20 L19 K18 J22 H22 H20",
            tx_en: "M15",
            tx_er: "M20",
            tx_data: "M13 L13 N22 M22 H17 K17 J17 M16",
            col: "K22",
            crs: "M21",
        }))
        .with(ResourceSpec::composite("sdcard", 0)
            .subsignal("data", pins("AB13 AA13 Y13 AA14").attr(misc("PULLUP True")))
            .subsignal("cmd", pins("Y14").attr(misc("PULLUP True")))
            .subsignal("clk", pins("Y12"))
            .subsignal("cd", pins("Y11"))
            .attr(misc("SLEW=FAST"))
            .attr(lvcmos33()));

    for (index, pin) in ["AB22", "AA21", "AA20", "AB18", "AA18"].iter().enumerate() {
        catalogue.push(ResourceSpec::pins("user_btn", index as u32, pin).attr(lvcmos33()));
    }
    let leds = ["V13", "R18", "T18", "V14", "P19", "T14", "R19", "T15", "V10", "T16", "W10", "U16"];
    for (index, pin) in leds.iter().enumerate() {
        catalogue.push(ResourceSpec::pins("user_led", index as u32, pin).attr(lvcmos33()));
    }

    catalogue
}

fn platform_commands() -> Vec<CommandTemplate> {
    [34, 35].iter()
        .map(|bank| {
            CommandTemplate::new("set_property INTERNAL_VREF {vref} [get_iobanks {bank}]")
                .literal("vref", "0.750")
                .literal("bank", &bank.to_string())
        })
        .collect()
}

/// Times the input clock and every Ethernet reference clock that a
/// peripheral ended up using.
pub fn finalize(registry: &ResourceRegistry, constraints: &mut ConstraintSet) {
    let mut timed = vec![("clk0".to_string(), CLK0_FREQ)];
    for name in ETH_CLOCKS {
        for channel in ["gtx", "tx", "rx"] {
            timed.push((format!("{}:{}", name, channel), ETH_CLK_FREQ));
        }
    }

    for (request, freq) in &timed {
        let (name, channel) = parse_request(request);
        let clock = registry.lookup_request(name, 0, channel);
        if let (Some(clock), Some(period)) = (clock, Period::from_freq(*freq)) {
            dbg_log!(DBG_EXTRA, "Constraining {} to {}ns", clock, period);
            constraints.add_period(clock.target(), period);
        }
    }
}

pub fn board() -> Board {
    Board {
        name: NAME.to_string(),
        device: DEVICE.to_string(),
        toolchain: "vivado".to_string(),
        default_clk_name: "clk0".to_string(),
        default_clk_freq: CLK0_FREQ,
        reset_name: "cpu_reset".to_string(),
        catalogue: catalogue(),
        platform_commands: platform_commands(),
        finalize_hook: Some(finalize),
        programmer: Some(OpenOcd::new("openocd_ax7101.cfg", "bscan_spi_xc7a200t.bit")),
    }
}
