use core::cell::RefCell;
use onewire_bitbang::Crc8;
use std::rc::Rc;

/// One microsecond in simulation clock ticks.
pub const US: u64 = 1_000;

// Slave-side pulse classification. The thresholds sit between the
// master's 6 µs (write-1 / read init) and 60 µs (write-0) pulses, and
// below the 480 µs reset.
const RESET_MIN_NS: u64 = 400 * US;
const ZERO_MIN_NS: u64 = 15 * US;

// Presence pulse: low from 20 µs to 100 µs after the reset release, which
// covers the master's sample point at 70 µs.
const PRESENCE_START_NS: u64 = 20 * US;
const PRESENCE_END_NS: u64 = 100 * US;

// A transmitting slave holds the line low from the read-slot initiation
// release until past the master's sample point at 9 µs.
const TX_HOLD_NS: u64 = 20 * US;

/// A completed master low pulse, as observed by the slaves.
#[derive(Debug, Clone, Copy)]
pub struct Pulse {
    /// How long the master held the line low.
    pub low_ns: u64,
    /// Clock instant of the release edge.
    pub released_at_ns: u64,
}

enum Decoded {
    Reset,
    Bit(bool),
}

impl Pulse {
    fn decode(&self) -> Decoded {
        if self.low_ns >= RESET_MIN_NS {
            Decoded::Reset
        } else {
            Decoded::Bit(self.low_ns < ZERO_MIN_NS)
        }
    }
}

/// A virtual device hanging off the simulated line.
pub trait Slave {
    /// Reacts to a completed master low pulse.
    fn on_pulse(&mut self, pulse: Pulse);

    /// Whether this device is pulling the line low at `now_ns`.
    fn pulls_low(&self, now_ns: u64) -> bool;
}

impl<T: Slave> Slave for Rc<RefCell<T>> {
    fn on_pulse(&mut self, pulse: Pulse) {
        self.borrow_mut().on_pulse(pulse);
    }

    fn pulls_low(&self, now_ns: u64) -> bool {
        self.borrow().pulls_low(now_ns)
    }
}

/// Pull-low window shared by both slave models.
#[derive(Debug, Default, Clone, Copy)]
struct Drive {
    from_ns: u64,
    until_ns: u64,
}

impl Drive {
    fn presence(released_at_ns: u64) -> Self {
        Self {
            from_ns: released_at_ns + PRESENCE_START_NS,
            until_ns: released_at_ns + PRESENCE_END_NS,
        }
    }

    fn transmit_zero(released_at_ns: u64) -> Self {
        Self {
            from_ns: released_at_ns,
            until_ns: released_at_ns + TX_HOLD_NS,
        }
    }

    fn active(&self, now_ns: u64) -> bool {
        self.from_ns <= now_ns && now_ns < self.until_ns
    }
}

// ---------------------------------------------------------------------
// Addressable (1-Wire mode) device

#[derive(Clone, Copy)]
enum RomState {
    Idle,
    Command { acc: u8, bits: u8 },
    SendRom { idx: u8 },
    Search { idx: u8, phase: SearchPhase },
}

#[derive(Clone, Copy)]
enum SearchPhase {
    IdBit,
    Complement,
    Direction,
}

/// A virtual addressable device that answers Read-ROM and Search-ROM.
pub struct RomSlave {
    rom: [u8; 8],
    state: RomState,
    drive: Drive,
}

impl RomSlave {
    /// Creates a device with the given raw ROM code.
    pub fn new(rom: [u8; 8]) -> Self {
        Self {
            rom,
            state: RomState::Idle,
            drive: Drive::default(),
        }
    }

    /// Creates a device from a family byte and serial, with a correct CRC.
    pub fn with_serial(family: u8, serial: [u8; 6]) -> Self {
        let mut rom = [family, 0, 0, 0, 0, 0, 0, 0];
        rom[1..7].copy_from_slice(&serial);
        rom[7] = Crc8::compute(&rom[..7]);
        Self::new(rom)
    }

    /// The device's ROM code.
    pub fn rom(&self) -> [u8; 8] {
        self.rom
    }

    fn rom_bit(&self, idx: u8) -> bool {
        self.rom[(idx / 8) as usize] & (1 << (idx % 8)) != 0
    }
}

impl Slave for RomSlave {
    fn on_pulse(&mut self, pulse: Pulse) {
        let bit = match pulse.decode() {
            Decoded::Reset => {
                self.drive = Drive::presence(pulse.released_at_ns);
                self.state = RomState::Command { acc: 0, bits: 0 };
                return;
            }
            Decoded::Bit(b) => b,
        };
        match self.state {
            RomState::Idle => {}
            RomState::Command { mut acc, mut bits } => {
                if bit {
                    acc |= 1 << bits;
                }
                bits += 1;
                self.state = if bits == 8 {
                    match acc {
                        onewire_bitbang::READ_ROM_CMD => RomState::SendRom { idx: 0 },
                        onewire_bitbang::SEARCH_ROM_CMD => RomState::Search {
                            idx: 0,
                            phase: SearchPhase::IdBit,
                        },
                        onewire_bitbang::SKIP_ROM_CMD => RomState::Command { acc: 0, bits: 0 },
                        _ => RomState::Idle,
                    }
                } else {
                    RomState::Command { acc, bits }
                };
            }
            RomState::SendRom { idx } => {
                // Any short pulse here is a read-slot initiation.
                if !self.rom_bit(idx) {
                    self.drive = Drive::transmit_zero(pulse.released_at_ns);
                }
                self.state = if idx + 1 == 64 {
                    RomState::Idle
                } else {
                    RomState::SendRom { idx: idx + 1 }
                };
            }
            RomState::Search { idx, phase } => match phase {
                SearchPhase::IdBit => {
                    if !self.rom_bit(idx) {
                        self.drive = Drive::transmit_zero(pulse.released_at_ns);
                    }
                    self.state = RomState::Search {
                        idx,
                        phase: SearchPhase::Complement,
                    };
                }
                SearchPhase::Complement => {
                    if self.rom_bit(idx) {
                        self.drive = Drive::transmit_zero(pulse.released_at_ns);
                    }
                    self.state = RomState::Search {
                        idx,
                        phase: SearchPhase::Direction,
                    };
                }
                SearchPhase::Direction => {
                    // The master wrote its branch choice; devices on the
                    // other branch go silent until the next reset.
                    self.state = if bit != self.rom_bit(idx) {
                        RomState::Idle
                    } else if idx + 1 == 64 {
                        RomState::Idle
                    } else {
                        RomState::Search {
                            idx: idx + 1,
                            phase: SearchPhase::IdBit,
                        }
                    };
                }
            },
        }
    }

    fn pulls_low(&self, now_ns: u64) -> bool {
        self.drive.active(now_ns)
    }
}

// ---------------------------------------------------------------------
// Thermostat-mode DS1821

const CMD_START_CONVERT: u8 = 0xee;
const CMD_STOP_CONVERT: u8 = 0x22;
const CMD_READ_TEMP: u8 = 0xaa;
const CMD_READ_COUNTER: u8 = 0xa0;
const CMD_READ_SLOPE: u8 = 0xa9;
const CMD_READ_TH: u8 = 0xa1;
const CMD_READ_TL: u8 = 0xa2;
const CMD_WRITE_TH: u8 = 0x01;
const CMD_WRITE_TL: u8 = 0x02;
const CMD_READ_STATUS: u8 = 0xac;
const CMD_WRITE_STATUS: u8 = 0x0c;

const STATUS_DONE: u8 = 0x80;
// Only 1SHOT and POL survive a status write; the upper bits are outputs.
const STATUS_WRITABLE: u8 = 0x03;

#[derive(Clone, Copy)]
enum DevState {
    Idle,
    Command { acc: u8, bits: u8 },
    Send { value: u8, sent: u8 },
    Recv { target: Target, acc: u8, bits: u8 },
}

#[derive(Clone, Copy)]
enum Target {
    Status,
    Th,
    Tl,
}

/// A virtual DS1821 in thermostat mode.
///
/// Ignores ROM commands entirely (unless built with
/// [accept_skip_rom](Ds1821Slave::accept_skip_rom), modeling a device
/// mid-transition) and interprets the first byte after every reset as a
/// function command.
pub struct Ds1821Slave {
    status: u8,
    th: i8,
    tl: i8,
    temp: i8,
    count_remain: u8,
    count_per_c: u8,
    skip_rom: bool,
    state: DevState,
    drive: Drive,
}

impl Default for Ds1821Slave {
    fn default() -> Self {
        Self::new()
    }
}

impl Ds1821Slave {
    /// A device with datasheet-ish power-on contents.
    pub fn new() -> Self {
        Self {
            status: 0,
            th: 85,
            tl: 10,
            temp: 22,
            count_remain: 10,
            count_per_c: 16,
            skip_rom: false,
            state: DevState::Idle,
            drive: Drive::default(),
        }
    }

    /// Sets the raw status register.
    pub fn with_status(mut self, status: u8) -> Self {
        self.status = status;
        self
    }

    /// Sets the temperature registers reported on conversion.
    pub fn with_temperature(mut self, temp: i8, count_remain: u8, count_per_c: u8) -> Self {
        self.temp = temp;
        self.count_remain = count_remain;
        self.count_per_c = count_per_c;
        self
    }

    /// Sets the threshold registers.
    pub fn with_thresholds(mut self, th: i8, tl: i8) -> Self {
        self.th = th;
        self.tl = tl;
        self
    }

    /// Also honor a Skip-ROM prefix, like a device mid-transition
    /// between addressing modes.
    pub fn accept_skip_rom(mut self) -> Self {
        self.skip_rom = true;
        self
    }

    /// Current raw status register.
    pub fn status(&self) -> u8 {
        self.status
    }

    /// Current high threshold.
    pub fn th(&self) -> i8 {
        self.th
    }

    /// Current low threshold.
    pub fn tl(&self) -> i8 {
        self.tl
    }

    fn dispatch(&mut self, cmd: u8) -> DevState {
        match cmd {
            CMD_READ_STATUS => DevState::Send {
                value: self.status,
                sent: 0,
            },
            CMD_READ_TEMP => DevState::Send {
                value: self.temp as u8,
                sent: 0,
            },
            CMD_READ_COUNTER => DevState::Send {
                value: self.count_remain,
                sent: 0,
            },
            CMD_READ_SLOPE => DevState::Send {
                value: self.count_per_c,
                sent: 0,
            },
            CMD_READ_TH => DevState::Send {
                value: self.th as u8,
                sent: 0,
            },
            CMD_READ_TL => DevState::Send {
                value: self.tl as u8,
                sent: 0,
            },
            CMD_WRITE_STATUS => DevState::Recv {
                target: Target::Status,
                acc: 0,
                bits: 0,
            },
            CMD_WRITE_TH => DevState::Recv {
                target: Target::Th,
                acc: 0,
                bits: 0,
            },
            CMD_WRITE_TL => DevState::Recv {
                target: Target::Tl,
                acc: 0,
                bits: 0,
            },
            CMD_START_CONVERT => {
                // Conversions are instantaneous in simulation.
                self.status |= STATUS_DONE;
                DevState::Idle
            }
            CMD_STOP_CONVERT => DevState::Idle,
            onewire_bitbang::SKIP_ROM_CMD if self.skip_rom => DevState::Command { acc: 0, bits: 0 },
            _ => DevState::Idle,
        }
    }

    fn commit(&mut self, target: Target, value: u8) {
        match target {
            Target::Status => {
                self.status = (self.status & !STATUS_WRITABLE) | (value & STATUS_WRITABLE);
            }
            Target::Th => self.th = value as i8,
            Target::Tl => self.tl = value as i8,
        }
    }
}

impl Slave for Ds1821Slave {
    fn on_pulse(&mut self, pulse: Pulse) {
        let bit = match pulse.decode() {
            Decoded::Reset => {
                self.drive = Drive::presence(pulse.released_at_ns);
                self.state = DevState::Command { acc: 0, bits: 0 };
                return;
            }
            Decoded::Bit(b) => b,
        };
        match self.state {
            DevState::Idle => {}
            DevState::Command { mut acc, mut bits } => {
                if bit {
                    acc |= 1 << bits;
                }
                bits += 1;
                self.state = if bits == 8 {
                    self.dispatch(acc)
                } else {
                    DevState::Command { acc, bits }
                };
            }
            DevState::Send { value, sent } => {
                if value & (1 << sent) == 0 {
                    self.drive = Drive::transmit_zero(pulse.released_at_ns);
                }
                self.state = if sent + 1 == 8 {
                    DevState::Idle
                } else {
                    DevState::Send {
                        value,
                        sent: sent + 1,
                    }
                };
            }
            DevState::Recv { target, mut acc, mut bits } => {
                if bit {
                    acc |= 1 << bits;
                }
                bits += 1;
                if bits == 8 {
                    self.commit(target, acc);
                    self.state = DevState::Idle;
                } else {
                    self.state = DevState::Recv { target, acc, bits };
                }
            }
        }
    }

    fn pulls_low(&self, now_ns: u64) -> bool {
        self.drive.active(now_ns)
    }
}
