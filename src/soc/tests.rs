use super::*;
use crate::boards::hsrm_progenitor;
use crate::catalogue::{Catalogue, PinGroup, ResourceSpec};
use crate::constraints::{Directive, Target};
use crate::peripherals::ModelPeripherals;

fn eth_port(index: u32) -> ResourceSpec {
    ResourceSpec::composite("eth", index)
        .subsignal("rx_data", PinGroup::new(&format!("A{} B{}", index, index)))
        .subsignal("tx_data", PinGroup::new(&format!("C{} D{}", index, index)))
}

fn eth_clocks(name: &str, base: u32) -> ResourceSpec {
    ResourceSpec::composite(name, 0)
        .subsignal("tx", PinGroup::new(&format!("E{}", base)))
        .subsignal("gtx", PinGroup::new(&format!("E{}", base + 1)))
        .subsignal("rx", PinGroup::new(&format!("E{}", base + 2)))
}

/// One clock, one reset, one memory resource and two network interfaces
fn two_port_board() -> Board {
    let catalogue = Catalogue::new()
        .with(ResourceSpec::composite("clk0", 0)
            .subsignal("p", PinGroup::new("H4"))
            .subsignal("n", PinGroup::new("G4")))
        .with(ResourceSpec::pins("cpu_reset", 0, "T3"))
        .with(ResourceSpec::composite("ddram", 0)
            .subsignal("a", PinGroup::new("J1 P6 N5"))
            .subsignal("dq", PinGroup::new("T1 U3 U2 U1 Y2 W1 Y1 V2")))
        .with(eth_clocks("eth_clocks_ext", 10))
        .with(eth_clocks("eth1_clocks_ext", 20))
        .with(eth_port(0))
        .with(eth_port(1));
    Board::generic("test", catalogue, 200_000_000)
}

fn eth_periods(composition: &Composition) -> usize {
    let eth = Period::from_freq(ETH_CLK_FREQ).unwrap();
    composition.constraints.iter()
        .filter(|c| c.directive == Directive::Period(eth))
        .count()
}

#[test]
fn test_two_network_interfaces() {
    let board = two_port_board();
    let config = SocConfig { eth_count: 2, ..Default::default() };
    let composition = compose(&board, &config, &mut ModelPeripherals).unwrap();

    let domains: Vec<&str> = composition.domains.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(domains, vec!["sys", "sys4x", "sys4x_dqs", "idelay", "eth0_eth", "eth1_eth"]);

    let claimed: Vec<String> = composition.bindings.iter().map(|b| b.to_string()).collect();
    assert_eq!(claimed, vec![
        "clk0:0", "cpu_reset:0", "ddram:0",
        "eth:0", "eth_clocks_ext:0", "eth:1", "eth1_clocks_ext:0",
    ]);

    assert_eq!(eth_periods(&composition), 2);

    /* The PHY times both of its 4x clocks on top of what the CRG registered */
    let sys4x = Period::from_freq(400_000_000).unwrap();
    let memory_periods: Vec<&Target> = composition.constraints.iter()
        .filter(|c| c.directive == Directive::Period(sys4x))
        .filter_map(|c| c.target.as_ref())
        .collect();
    assert_eq!(memory_periods, vec![
        &Target::Domain("sys4x".into()),
        &Target::Domain("sys4x_dqs".into()),
        &Target::Domain("sys4x".into()),
        &Target::Domain("sys4x_dqs".into()),
    ]);
    assert_eq!(composition.constraints.len(), 9);

    let names: Vec<&str> = composition.peripherals.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["ddrphy", "ethmac0", "ethmac1"]);
    assert_eq!(composition.peripherals[0].bus.data_width, 64);
    assert_eq!(composition.peripherals[2].bus.domain, "eth1_eth");
    assert_eq!(composition.reset, "~cpu_reset | crg_rst");
}

#[test]
fn test_too_many_network_interfaces() {
    let board = two_port_board();
    let config = SocConfig { eth_count: 3, with_sdcard: true, ..Default::default() };

    let err = compose(&board, &config, &mut ModelPeripherals).unwrap_err();
    assert_eq!(err.step, Step::Ethernet(2));
    assert_eq!(err.cause, CompositionCause::Lookup(LookupError::NotFound {
        name: "eth".into(),
        index: Some(2),
        channel: None,
    }));
}

#[test]
fn test_single_interface_domain() {
    let board = two_port_board();
    let config = SocConfig { eth_count: 1, integrated_main_ram_size: 0x4000, ..Default::default() };
    let composition = compose(&board, &config, &mut ModelPeripherals).unwrap();

    assert!(composition.domains.iter().any(|d| d.name == "eth"));
    assert!(!composition.bindings.iter().any(|b| b.name == "ddram"));
    assert_eq!(composition.peripherals.len(), 1);
    assert_eq!(composition.peripherals[0].name, "ethmac");
    assert_eq!(eth_periods(&composition), 1);
}

#[test]
fn test_storage_and_leds() {
    let catalogue = Catalogue::new()
        .with(ResourceSpec::pins("clk0", 0, "R4"))
        .with(ResourceSpec::pins("cpu_reset", 0, "T3"))
        .with(ResourceSpec::composite("sdcard", 0)
            .subsignal("data", PinGroup::new("AB13 AA13 Y13 AA14"))
            .subsignal("cmd", PinGroup::new("Y14"))
            .subsignal("clk", PinGroup::new("Y12")))
        .with(ResourceSpec::pins("user_led", 1, "R18"))
        .with(ResourceSpec::pins("user_led", 0, "V13"))
        .with(ResourceSpec::pins("user_led", 2, "T18"));
    let board = Board::generic("leds", catalogue, 50_000_000);
    let config = SocConfig {
        integrated_main_ram_size: 0x10000,
        eth_count: 0,
        with_sdcard: true,
        with_led_chaser: true,
        ..Default::default()
    };

    let composition = compose(&board, &config, &mut ModelPeripherals).unwrap();
    let sdcard = composition.domains.iter().find(|d| d.name == SDCARD_DOMAIN).unwrap();
    assert_eq!(sdcard.period, Some(Period::from_ns(20)));

    let leds = composition.peripherals.iter().find(|p| p.name == "leds").unwrap();
    assert_eq!(leds.bus.data_width, 3);
    assert_eq!(leds.pads, vec!["user_led:0", "user_led:1", "user_led:2"]);
    assert_eq!(composition.peripherals[0].bus.data_width, 4);
}

#[test]
fn test_clock_failure_stops_composition() {
    let board = two_port_board();
    let config = SocConfig { sys_clk_freq: 3_000_000, eth_count: 2, ..Default::default() };

    let err = compose(&board, &config, &mut ModelPeripherals).unwrap_err();
    assert_eq!(err.step, Step::ClockReset);
    assert_eq!(
        err.cause,
        CompositionCause::Configuration(ConfigurationError::PhaseShift { sys_clk_freq: 3_000_000 })
    );
}

#[test]
fn test_duplicate_declaration() {
    let mut board = two_port_board();
    board.catalogue.push(eth_port(1));

    let err = compose(&board, &SocConfig::default(), &mut ModelPeripherals).unwrap_err();
    assert_eq!(err.step, Step::Declare);
}

struct Recorder {
    calls: Vec<String>,
}

impl PeripheralFactory for Recorder {
    fn memory(
        &mut self,
        pads: ResolvedBinding,
        sys4x: &ClockDomain,
        sys4x_dqs: &ClockDomain,
        sys_clk_freq: u64,
    ) -> Box<dyn Peripheral> {
        self.calls.push(format!("memory {} {} {}", pads, sys4x.name, sys4x_dqs.name));
        ModelPeripherals.memory(pads, sys4x, sys4x_dqs, sys_clk_freq)
    }

    fn ethernet(
        &mut self,
        name: &str,
        clock_pads: ResolvedBinding,
        pads: ResolvedBinding,
        domain: &ClockDomain,
    ) -> Box<dyn Peripheral> {
        self.calls.push(format!("ethernet {} {} {}", clock_pads, pads, domain.name));
        ModelPeripherals.ethernet(name, clock_pads, pads, domain)
    }

    fn storage(
        &mut self,
        pads: ResolvedBinding,
        refclk: &ClockDomain,
        sys_clk_freq: u64,
    ) -> Box<dyn Peripheral> {
        self.calls.push(format!("storage {} {}", pads, refclk.name));
        ModelPeripherals.storage(pads, refclk, sys_clk_freq)
    }

    fn led_chaser(
        &mut self,
        pads: Vec<ResolvedBinding>,
        sys: &ClockDomain,
        sys_clk_freq: u64,
    ) -> Box<dyn Peripheral> {
        self.calls.push(format!("leds {}", pads.len()));
        ModelPeripherals.led_chaser(pads, sys, sys_clk_freq)
    }
}

#[test]
fn test_step_order() {
    let board = hsrm_progenitor::board();
    let config = SocConfig {
        eth_count: 2,
        with_sdcard: true,
        with_led_chaser: true,
        ..Default::default()
    };
    let mut recorder = Recorder { calls: Vec::new() };
    compose(&board, &config, &mut recorder).unwrap();

    assert_eq!(recorder.calls, vec![
        "memory ddram:0 sys4x sys4x_dqs",
        "ethernet eth_clocks_ext:0 eth:0 eth0_eth",
        "ethernet eth1_clocks_ext:0 eth:1 eth1_eth",
        "storage sdcard:0 sdcard",
        "leds 12",
    ]);
}

#[test]
fn test_builtin_board_defaults() {
    let board = hsrm_progenitor::board();
    let composition = compose(&board, &SocConfig::default(), &mut ModelPeripherals).unwrap();

    /* Interface domain plus gtx/tx/rx from the board */
    assert_eq!(eth_periods(&composition), 4);

    let commands: Vec<&FinalizedConstraint> = composition.constraints.iter()
        .filter(|c| matches!(c.directive, Directive::PlatformCommand(_)))
        .collect();
    assert_eq!(commands.len(), 2);
    assert_eq!(composition.constraints[0].directive, Directive::PlatformCommand(
        "set_property INTERNAL_VREF 0.750 [get_iobanks 34]".into()
    ));

    let last = composition.constraints.last().unwrap();
    assert_eq!(last.target, Some(Target::Port("eth_clocks_ext_rx".into())));
    assert!(composition.constraints.iter().any(|c| {
        c.target == Some(Target::Port("clk0_p".into()))
            && c.directive == Directive::Period(Period::from_ns(5))
    }));
}

#[test]
fn test_config_from_yaml() {
    let config: SocConfig = serde_yaml::from_str("sys-clk-freq: 50000000\neth-count: 2\n").unwrap();
    assert_eq!(config, SocConfig { sys_clk_freq: 50_000_000, eth_count: 2, ..Default::default() });
}
