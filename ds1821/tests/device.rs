use std::cell::RefCell;
use std::rc::Rc;

use ds1821::{Ds1821, ops, ops::ThresholdKind};
use onewire_bitbang::{BitBangMaster, OneWireError};
use onewire_sim::{Ds1821Slave, RomSlave, SimBus, SimDelay, SimLine};

fn master(bus: &SimBus) -> BitBangMaster<SimLine, SimDelay> {
    BitBangMaster::new(bus.line(), bus.delay()).unwrap()
}

#[test]
fn threshold_byte_roundtrip_all_values() {
    // Every byte pattern written LSB-first comes back intact through the
    // read path of the same simulated line.
    let bus = SimBus::new();
    bus.attach(Ds1821Slave::new());
    let mut ow = master(&bus);
    let mut delay = bus.delay();
    let dev = Ds1821::new();

    for value in 0..=255u8 {
        let degrees = value as i8;
        dev.write_high_threshold(&mut ow, &mut delay, degrees).unwrap();
        assert_eq!(dev.read_high_threshold(&mut ow).unwrap(), degrees);
    }
}

#[test]
fn broadcast_status_read_is_bitwise_and() {
    let bus = SimBus::new();
    bus.attach(Ds1821Slave::new().with_status(0b1000_0001));
    bus.attach(Ds1821Slave::new().with_status(0b0100_0011));

    let mut ow = master(&bus);
    let status = Ds1821::new().read_status(&mut ow).unwrap();
    assert_eq!(status.into_bits(), 0b0000_0001);
}

#[test]
fn empty_bus_fails_fast_without_command_traffic() {
    let bus = SimBus::new();
    let mut ow = master(&bus);
    let mut delay = bus.delay();
    let dev = Ds1821::new();

    let before = bus.pulse_count();
    assert_eq!(dev.read_status(&mut ow), Err(OneWireError::NoDevicePresent));
    // One reset pulse, zero command slots.
    assert_eq!(bus.pulse_count(), before + 1);

    assert_eq!(
        dev.start_conversion(&mut ow),
        Err(OneWireError::NoDevicePresent)
    );
    assert_eq!(
        dev.write_high_threshold(&mut ow, &mut delay, 30),
        Err(OneWireError::NoDevicePresent)
    );
    assert_eq!(
        ops::read_temperature(&mut ow, &mut delay, false).map(|_| ()),
        Err(OneWireError::NoDevicePresent)
    );
}

#[test]
fn read_temperature_runs_a_conversion() {
    let bus = SimBus::new();
    bus.attach(Ds1821Slave::new().with_temperature(20, 10, 16));

    let mut ow = master(&bus);
    let mut delay = bus.delay();
    let report = ops::read_temperature(&mut ow, &mut delay, false).unwrap();

    assert!(report.status.done());
    assert_eq!(report.sample.raw, 20);
    assert_eq!(report.sample.count_remain, 10);
    assert_eq!(report.sample.count_per_c, 16);
    assert_eq!(report.sample.millidegrees(), 20_125);
    assert_eq!(report.output_level, None);
}

#[test]
fn full_status_snapshot() {
    let bus = SimBus::new();
    bus.attach(
        Ds1821Slave::new()
            .with_temperature(-25, 12, 16)
            .with_thresholds(30, -10)
            .with_status(0b0100_0000),
    );

    let mut ow = master(&bus);
    let mut delay = bus.delay();
    let snap = ops::full_status(&mut ow, &mut delay, true).unwrap();

    assert_eq!(snap.millidegrees, -25_000);
    assert!(snap.high_alarm);
    assert!(!snap.low_alarm);
    assert_eq!(snap.thresholds, Some((30, -10)));
    // Idle line pulled high by the pullup.
    assert_eq!(snap.output_level, Some(true));
}

#[test]
fn set_threshold_reports_previous_and_inverted() {
    let bus = SimBus::new();
    let slave = Rc::new(RefCell::new(Ds1821Slave::new().with_thresholds(85, 10)));
    bus.attach(slave.clone());

    let mut ow = master(&bus);
    let mut delay = bus.delay();

    let report = ops::set_threshold(&mut ow, &mut delay, ThresholdKind::High, 40).unwrap();
    assert_eq!(report.previous, (85, 10));
    assert_eq!(report.current, (40, 10));
    assert!(!report.inverted);
    assert_eq!(slave.borrow().th(), 40);

    // Writing TL above TH is carried out and flagged, not refused.
    let report = ops::set_threshold(&mut ow, &mut delay, ThresholdKind::Low, 60).unwrap();
    assert_eq!(report.current, (40, 60));
    assert!(report.inverted);
    assert_eq!(slave.borrow().tl(), 60);
}

#[test]
fn skip_rom_prefix_reaches_transitional_devices_only() {
    let bus = SimBus::new();
    let plain = Rc::new(RefCell::new(Ds1821Slave::new().with_thresholds(85, 10)));
    let transitional = Rc::new(RefCell::new(
        Ds1821Slave::new().with_thresholds(85, 10).accept_skip_rom(),
    ));
    bus.attach(plain.clone());
    bus.attach(transitional.clone());

    let mut ow = master(&bus);
    let mut delay = bus.delay();
    let dev = Ds1821::with_skip_rom();
    dev.write_high_threshold(&mut ow, &mut delay, 50).unwrap();

    assert_eq!(transitional.borrow().th(), 50);
    // The pure thermostat-mode part treats 0xCC as an unknown command
    // and ignores everything after it.
    assert_eq!(plain.borrow().th(), 85);
}

#[test]
fn scan_reports_devices_and_broadcast_state() {
    let bus = SimBus::new();
    bus.attach(RomSlave::with_serial(0x28, [1, 2, 3, 4, 5, 6]));
    bus.attach(
        Ds1821Slave::new()
            .with_status(0b0000_0001)
            .with_thresholds(85, 10),
    );

    let mut ow = master(&bus);
    let report: ops::ScanReport<16> = ops::scan(&mut ow).unwrap();

    // The addressable device is found and valid; the thermostat-mode
    // part is invisible to the ROM layer.
    assert_eq!(report.discovered().len(), 1);
    assert_eq!(report.valid_count(), 1);
    assert_eq!(report.phantom_count(), 0);
    assert!(report.single.is_some());

    let status = report.status.unwrap();
    assert!(status.one_shot());
    assert_eq!(report.thresholds, Some((85, 10)));
}
