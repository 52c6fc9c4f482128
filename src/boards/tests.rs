use std::path::Path;

use super::*;
use crate::common::Period;
use crate::constraints::{ConstraintEntry, Target};
use crate::crg::DomainTable;

#[test]
fn test_builtin_catalogue_declares() {
    let board = builtin(hsrm_progenitor::NAME).unwrap();
    assert!(ResourceRegistry::new(&board.catalogue).is_ok());

    /* clk0, reset, ddram, serial, 4 clocks, 4 ports, sdcard, 5 buttons, 12 leds */
    assert_eq!(board.catalogue.len(), 30);
    assert_eq!(board.device, "xc7a200t-fbg484-1");
    assert!(builtin("nope").is_none());
}

#[test]
fn test_builtin_pins_are_unique() {
    let catalogue = hsrm_progenitor::catalogue();
    let mut seen = std::collections::HashMap::new();
    for spec in &catalogue {
        for pin in spec.all_pins() {
            if let Some(other) = seen.insert(pin.to_string(), spec.to_string()) {
                panic!("Pin {} used by both {} and {}", pin, other, spec);
            }
        }
    }
}

#[test]
fn test_ddram_pads() {
    let catalogue = hsrm_progenitor::catalogue();
    let mut registry = ResourceRegistry::new(&catalogue).unwrap();

    let ddram = registry.request("ddram", 0, None, false).unwrap();
    assert_eq!(ddram.signal("a").unwrap().pins.len(), 15);
    assert_eq!(ddram.signal("dq").unwrap().pins.len(), 32);
    assert_eq!(ddram.signal("dqs_p").unwrap().attributes, vec![
        crate::catalogue::misc("SLEW=FAST"),
        crate::catalogue::io_standard("DIFF_SSTL15"),
        crate::catalogue::misc("IN_TERM=UNTUNED_SPLIT_50"),
    ]);
}

#[test]
fn test_platform_commands_render() {
    let board = hsrm_progenitor::board();
    let rendered: Vec<String> = board.platform_commands.iter()
        .map(|c| c.render().unwrap())
        .collect();
    assert_eq!(rendered, vec![
        "set_property INTERNAL_VREF 0.750 [get_iobanks 34]",
        "set_property INTERNAL_VREF 0.750 [get_iobanks 35]",
    ]);
}

#[test]
fn test_finalize_hook_only_touches_claimed() {
    let catalogue = hsrm_progenitor::catalogue();
    let mut registry = ResourceRegistry::new(&catalogue).unwrap();
    let mut constraints = ConstraintSet::new();

    /* Nothing claimed, nothing constrained */
    hsrm_progenitor::finalize(&registry, &mut constraints);
    assert!(constraints.is_empty());

    registry.request("clk0", 0, None, false).unwrap();
    registry.request("eth1_clocks_ext", 0, None, false).unwrap();
    registry.request("eth_clocks_ext", 0, Some("rx"), false).unwrap();
    hsrm_progenitor::finalize(&registry, &mut constraints);

    let period = |port: &str, ns| ConstraintEntry::Period {
        target: Target::Port(port.to_string()),
        period: Period::from_ns(ns),
    };
    assert_eq!(constraints.entries(), &[
        period("clk0_p", 5),
        period("eth_clocks_ext_rx", 8),
        period("eth1_clocks_ext_gtx", 8),
        period("eth1_clocks_ext_tx", 8),
        period("eth1_clocks_ext_rx", 8),
    ]);
    assert!(constraints.finalize(&DomainTable::new()).is_ok());
}

#[test]
fn test_programmer() {
    let board = hsrm_progenitor::board();
    let programmer = board.programmer.unwrap();
    assert_eq!(programmer.flash_proxy, "bscan_spi_xc7a200t.bit");
    assert_eq!(programmer.load_command(Path::new("build/top.bit")), vec![
        "openocd", "-f", "openocd_ax7101.cfg", "-c", "init; pld load 0 {build/top.bit}; exit",
    ]);
}
