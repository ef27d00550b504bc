use onewire_bitbang::{BitBangMaster, OneWireBus, OneWireError, RomCode, RomSearch, read_rom};
use onewire_sim::{Ds1821Slave, RomSlave, SimBus, SimDelay, SimLine};

fn master(bus: &SimBus) -> BitBangMaster<SimLine, SimDelay> {
    BitBangMaster::new(bus.line(), bus.delay()).unwrap()
}

#[test]
fn reset_detects_presence() {
    let bus = SimBus::new();
    bus.attach(RomSlave::with_serial(0x22, [1, 2, 3, 4, 5, 6]));
    let mut ow = master(&bus);
    assert!(ow.reset().unwrap());
    assert_eq!(bus.pulse_count(), 1);
}

#[test]
fn reset_on_empty_bus_reports_no_presence() {
    let bus = SimBus::new();
    let mut ow = master(&bus);
    assert!(!ow.reset().unwrap());
}

#[test]
fn read_rom_returns_single_device_code() {
    let bus = SimBus::new();
    let slave = RomSlave::with_serial(0x28, [0xde, 0xad, 0xbe, 0xef, 0x00, 0x01]);
    let expected = slave.rom();
    bus.attach(slave);

    let mut ow = master(&bus);
    let rom = read_rom(&mut ow).unwrap();
    assert_eq!(rom.bytes(), &expected);
    assert!(rom.is_valid());
    assert_eq!(rom.family(), 0x28);
}

#[test]
fn read_rom_on_empty_bus_fails_fast() {
    let bus = SimBus::new();
    let mut ow = master(&bus);
    assert_eq!(read_rom(&mut ow), Err(OneWireError::NoDevicePresent));
    // Only the reset pulse went out; the command byte was never written.
    assert_eq!(bus.pulse_count(), 1);
}

#[test]
fn read_rom_collision_yields_invalid_code() {
    // Two devices answering Read-ROM at once AND their replies together.
    let bus = SimBus::new();
    bus.attach(RomSlave::new([0x28, 0x0f, 0, 0, 0, 0, 0, 0x55]));
    bus.attach(RomSlave::new([0x28, 0xf0, 0, 0, 0, 0, 0, 0xaa]));

    let mut ow = master(&bus);
    let rom = read_rom(&mut ow).unwrap();
    assert_eq!(rom.bytes(), &[0x28, 0, 0, 0, 0, 0, 0, 0]);
    assert!(!rom.is_valid());
}

fn collect_roms(bus: &SimBus) -> Vec<RomCode> {
    let mut ow = master(bus);
    let mut search = RomSearch::new(&mut ow);
    let mut found = Vec::new();
    while let Some(code) = search.next().unwrap() {
        found.push(code);
    }
    found
}

#[test]
fn search_enumerates_two_devices_zero_branch_first() {
    let bus = SimBus::new();
    // Identical codes except for the first serial bit (bit position 8).
    let a = RomSlave::with_serial(0x28, [0x01, 0x44, 0x55, 0x66, 0x77, 0x88]);
    let b = RomSlave::with_serial(0x28, [0x00, 0x44, 0x55, 0x66, 0x77, 0x88]);
    let (rom_a, rom_b) = (a.rom(), b.rom());
    bus.attach(a);
    bus.attach(b);

    let found = collect_roms(&bus);
    assert_eq!(found.len(), 2);
    // The 0 branch at the discrepancy is explored first.
    assert_eq!(found[0].bytes(), &rom_b);
    assert_eq!(found[1].bytes(), &rom_a);
    assert!(found.iter().all(|r| r.is_valid()));

    // Deterministic: a second enumeration returns the same order.
    assert_eq!(collect_roms(&bus), found);
}

#[test]
fn search_on_empty_bus_is_a_communication_error() {
    let bus = SimBus::new();
    let mut ow = master(&bus);
    let mut search = RomSearch::new(&mut ow);
    assert_eq!(search.next(), Err(OneWireError::NoDevicePresent));
}

#[test]
fn search_with_only_thermostat_devices_finds_nothing() {
    // Thermostat-mode parts answer the presence pulse but ignore the
    // search command, so both read slots come back 1.
    let bus = SimBus::new();
    bus.attach(Ds1821Slave::new());

    let found = collect_roms(&bus);
    assert!(found.is_empty());
}

#[test]
fn byte_framing_is_lsb_first() {
    // 0x33 (Read ROM) reaches the slave as a command only if the bits go
    // out LSB-first; a mis-framed byte would leave it idle and the read
    // below would return all 1s.
    let bus = SimBus::new();
    bus.attach(RomSlave::with_serial(0x10, [9, 8, 7, 6, 5, 4]));
    let mut ow = master(&bus);

    assert!(ow.reset().unwrap());
    ow.write_byte(0x33).unwrap();
    let first = ow.read_byte().unwrap();
    assert_eq!(first, 0x10);
}
