use super::*;
use crate::catalogue::{Catalogue, PinGroup, ResourceSpec};
use crate::constraints::ConstraintEntry;
use crate::registry::ResourceRegistry;

fn clock_catalogue() -> Catalogue {
    Catalogue::new()
        .with(ResourceSpec::pins("clk50", 0, "R4"))
        .with(ResourceSpec::composite("clk0", 0)
            .subsignal("p", PinGroup::new("H4"))
            .subsignal("n", PinGroup::new("G4")))
        .with(ResourceSpec::pins("cpu_reset", 0, "T3"))
}

fn build(
    clk: &str,
    clkin_freq: u64,
    sys_clk_freq: u64
) -> (Result<Crg, ConfigurationError>, DomainTable, ConstraintSet) {
    let catalogue = clock_catalogue();
    let mut registry = ResourceRegistry::new(&catalogue).unwrap();
    let mut domains = DomainTable::new();
    let mut constraints = ConstraintSet::new();

    let clkin = registry.request(clk, 0, None, false).unwrap();
    let rst = registry.request("cpu_reset", 0, None, false).unwrap();
    let crg = Crg::new(clkin, clkin_freq, rst, sys_clk_freq, &mut domains, &mut constraints);
    (crg, domains, constraints)
}

#[test]
fn test_valid_configuration() {
    let (crg, domains, constraints) = build("clk50", 50_000_000, 100_000_000);
    let crg = crg.unwrap();
    assert!(crg.is_configured());

    let names: Vec<&str> = domains.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["sys", "sys4x", "sys4x_dqs", "idelay"]);

    let period = |name| domains.get(name).unwrap().period.unwrap();
    assert_eq!(period("sys"), Period::from_ns(10));
    assert_eq!(period("sys4x"), period("sys").divided(4).unwrap());
    assert_eq!(period("sys4x_dqs"), period("sys4x"));
    assert_eq!(period("idelay"), Period::from_ns(5));

    assert_eq!(domains.get("sys4x").unwrap().reset, ResetPolicy::None);
    assert_eq!(domains.get("sys4x_dqs").unwrap().reset, ResetPolicy::None);
    assert_eq!(domains.get("sys").unwrap().reset, ResetPolicy::Synchronous);
    assert!(matches!(
        domains.get("sys4x_dqs").unwrap().source,
        ClockSource::Derived { phase: 90, .. }
    ));

    /* One false path and one period per domain */
    assert_eq!(constraints.len(), 5);
    assert_eq!(constraints.entries()[0], ConstraintEntry::FalsePath {
        from: Target::Domain("sys".into()),
        to: Target::Port("clk50".into()),
    });
    let periods = constraints.entries().iter()
        .filter(|e| matches!(e, ConstraintEntry::Period { .. }))
        .count();
    assert_eq!(periods, 4);
}

#[test]
fn test_reset_expression() {
    let (crg, _, _) = build("clk0", 200_000_000, 100_000_000);
    let crg = crg.unwrap();

    assert_eq!(crg.reset().unwrap().to_string(), "~cpu_reset | crg_rst");
    assert_eq!(crg.clkin(), Some(&Target::Port("clk0_p".into())));
}

#[test]
fn test_inexpressible_phase_shift() {
    /* A quarter of a 12 MHz period is 20833.33 ps */
    let (crg, domains, constraints) = build("clk50", 50_000_000, 3_000_000);
    assert_eq!(crg.err(), Some(ConfigurationError::PhaseShift { sys_clk_freq: 3_000_000 }));
    assert!(domains.is_empty());
    assert!(constraints.is_empty());
}

#[test]
fn test_huge_system_clock() {
    let (crg, domains, constraints) = build("clk50", 50_000_000, u64::MAX - 2);
    assert_eq!(crg.err(), Some(ConfigurationError::PhaseShift { sys_clk_freq: u64::MAX - 2 }));
    assert!(domains.is_empty());
    assert!(constraints.is_empty());
}

#[test]
fn test_zero_frequency() {
    let (crg, ..) = build("clk50", 0, 100_000_000);
    assert!(matches!(crg, Err(ConfigurationError::ZeroFrequency { .. })));

    let (crg, ..) = build("clk50", 50_000_000, 0);
    assert!(matches!(crg, Err(ConfigurationError::ZeroFrequency { .. })));
}

#[test]
fn test_duplicate_domain() {
    let catalogue = clock_catalogue();
    let mut registry = ResourceRegistry::new(&catalogue).unwrap();
    let mut domains = DomainTable::new();
    let mut constraints = ConstraintSet::new();

    domains.create(ClockDomain {
        name: "sys4x".into(),
        source: ClockSource::Port("clk50".into()),
        reset: ResetPolicy::None,
        period: None,
    }).unwrap();

    let clkin = registry.request("clk50", 0, None, false).unwrap();
    let rst = registry.request("cpu_reset", 0, None, false).unwrap();
    let crg = Crg::new(clkin, 50_000_000, rst, 100_000_000, &mut domains, &mut constraints);
    assert_eq!(crg.err(), Some(ConfigurationError::DuplicateDomain("sys4x".into())));
    assert_eq!(domains.len(), 1);
}

#[test]
fn test_additional_output() {
    let (crg, mut domains, mut constraints) = build("clk50", 50_000_000, 100_000_000);
    let mut crg = crg.unwrap();

    let sd = crg.create_clkout("sdcard", 50_000_000, &mut domains, &mut constraints).unwrap();
    assert_eq!(sd.period, Some(Period::from_ns(20)));
    assert!(matches!(sd.source, ClockSource::Derived { output: 4, .. }));
    assert_eq!(constraints.entries().last(), Some(&ConstraintEntry::Period {
        target: Target::Domain("sdcard".into()),
        period: Period::from_ns(20),
    }));

    let err = crg.create_clkout("odd", 3, &mut domains, &mut constraints);
    assert!(matches!(err, Err(ConfigurationError::TapFrequency { .. })));
    let err = crg.create_clkout("sdcard", 25_000_000, &mut domains, &mut constraints);
    assert_eq!(err, Err(ConfigurationError::DuplicateDomain("sdcard".into())));
}
