use std::cell::RefCell;
use std::rc::Rc;

use ds1821::oneshot::{self, FixError, WriteStrategy};
use embedded_hal_mock::eh1::delay::NoopDelay;
use embedded_hal_mock::eh1::digital::{
    Mock as PinMock, State as PinState, Transaction as PinTransaction,
};
use onewire_bitbang::{BitBangMaster, OneWireError};
use onewire_sim::{Ds1821Slave, SimBus, SimDelay, SimLine};

fn master(bus: &SimBus) -> BitBangMaster<SimLine, SimDelay> {
    BitBangMaster::new(bus.line(), bus.delay()).unwrap()
}

#[test]
fn set_one_shot_programs_mixed_state_devices() {
    let bus = SimBus::new();
    let plain = Rc::new(RefCell::new(Ds1821Slave::new()));
    let transitional = Rc::new(RefCell::new(Ds1821Slave::new().accept_skip_rom()));
    bus.attach(plain.clone());
    bus.attach(transitional.clone());

    let mut ow = master(&bus);
    let mut delay = bus.delay();
    let report = oneshot::set_one_shot_mode(&mut ow, &mut delay).unwrap();

    assert!(!report.before.one_shot());
    assert_eq!(report.target.into_bits(), 0x01);
    assert_eq!(
        report.attempts.map(|a| a.strategy),
        [
            WriteStrategy::Direct,
            WriteStrategy::SkipRom,
            WriteStrategy::Direct
        ]
    );
    assert!(report.looks_programmed());

    assert_eq!(plain.borrow().status() & 0x01, 0x01);
    assert_eq!(transitional.borrow().status() & 0x01, 0x01);
}

#[test]
fn power_cycle_drives_low_then_high() {
    let mut pin = PinMock::new(&[
        PinTransaction::set(PinState::Low),
        PinTransaction::set(PinState::High),
    ]);
    let mut delay = NoopDelay;
    oneshot::power_cycle(&mut pin, &mut delay).unwrap();
    pin.done();
}

#[test]
fn fix_runs_probe_write_then_power_cycle() {
    let bus = SimBus::new();
    let slave = Rc::new(RefCell::new(Ds1821Slave::new()));
    bus.attach(slave.clone());

    let mut ow = master(&bus);
    let mut delay = bus.delay();
    let mut pin = PinMock::new(&[
        PinTransaction::set(PinState::Low),
        PinTransaction::set(PinState::High),
    ]);

    let report = oneshot::fix(&mut ow, Some(&mut pin), &mut delay).unwrap();
    assert!(report.power_cycled);
    assert!(report.one_shot.looks_programmed());
    assert_eq!(slave.borrow().status() & 0x01, 0x01);
    pin.done();
}

#[test]
fn fix_without_power_pin_skips_only_that_step() {
    let bus = SimBus::new();
    bus.attach(Ds1821Slave::new());

    let mut ow = master(&bus);
    let mut delay = bus.delay();

    let report = oneshot::fix::<_, PinMock, _>(&mut ow, None, &mut delay).unwrap();
    assert!(!report.power_cycled);
    assert!(report.one_shot.looks_programmed());
}

#[test]
fn fix_aborts_before_power_cycle_when_bus_is_dead() {
    let bus = SimBus::new();
    let mut ow = master(&bus);
    let mut delay = bus.delay();
    // No expectations: the pin must never be touched.
    let mut pin = PinMock::new(&[]);

    let err = oneshot::fix(&mut ow, Some(&mut pin), &mut delay).unwrap_err();
    assert!(matches!(err, FixError::Bus(OneWireError::NoDevicePresent)));
    pin.done();
}
