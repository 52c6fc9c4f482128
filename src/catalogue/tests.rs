use super::*;

#[test]
fn test_composite_builder() {
    let spec = ResourceSpec::composite("serial", 0)
        .subsignal("tx", PinGroup::new("U18"))
        .subsignal("rx", PinGroup::new("P16"))
        .attr(io_standard("LVCMOS33"));

    assert_eq!(spec.channel_names().collect::<Vec<_>>(), vec!["tx", "rx"]);
    assert_eq!(spec.all_pins().collect::<Vec<_>>(), vec!["U18", "P16"]);
    assert_eq!(spec.to_string(), "serial:0");
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "has no sub-channels")]
fn test_subsignal_on_plain_pins() {
    let _ = ResourceSpec::pins("user_led", 0, "V13")
        .subsignal("p", PinGroup::new("H4"));
}
