//! Deterministic simulated 1-Wire bus for tests.
//!
//! The simulation replaces real time with a virtual nanosecond clock:
//! [SimDelay] advances it, [SimLine] records the master's drive/release
//! edges against it, and attached [Slave] devices react to complete master
//! low pulses. The line level at any instant is the wired-AND of every
//! driver, exactly like the open-drain electrical bus: it is low whenever
//! the master or any slave pulls it low.
//!
//! Everything is single-threaded and repeatable; a test that passes once
//! passes always.

mod slave;

pub use slave::{Ds1821Slave, Pulse, RomSlave, Slave, US};

use core::cell::RefCell;
use core::convert::Infallible;
use embedded_hal::delay::DelayNs;
use onewire_bitbang::BusLine;
use std::rc::Rc;

struct Core {
    now_ns: u64,
    master_low: bool,
    low_since_ns: u64,
    pulses: u64,
    slaves: Vec<Box<dyn Slave>>,
}

impl Core {
    fn line_is_low(&self) -> bool {
        self.master_low || self.slaves.iter().any(|s| s.pulls_low(self.now_ns))
    }
}

/// Handle to a simulated bus. Clones share the same line and clock.
#[derive(Clone)]
pub struct SimBus {
    core: Rc<RefCell<Core>>,
}

impl Default for SimBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SimBus {
    /// Creates an empty bus with the clock at zero.
    pub fn new() -> Self {
        Self {
            core: Rc::new(RefCell::new(Core {
                now_ns: 0,
                master_low: false,
                low_since_ns: 0,
                pulses: 0,
                slaves: Vec::new(),
            })),
        }
    }

    /// Attaches a slave device to the line.
    ///
    /// Pass an `Rc<RefCell<...>>` handle to keep inspecting the device
    /// after attachment.
    pub fn attach(&self, slave: impl Slave + 'static) {
        self.core.borrow_mut().slaves.push(Box::new(slave));
    }

    /// The master-side line endpoint.
    pub fn line(&self) -> SimLine {
        SimLine {
            core: self.core.clone(),
        }
    }

    /// A delay source advancing the shared virtual clock.
    pub fn delay(&self) -> SimDelay {
        SimDelay {
            core: self.core.clone(),
        }
    }

    /// Number of completed master low pulses so far.
    ///
    /// A reset is one pulse, a bit slot is one pulse; a byte is eight.
    /// Lets tests assert that a failed operation issued no traffic beyond
    /// its reset.
    pub fn pulse_count(&self) -> u64 {
        self.core.borrow().pulses
    }

    /// Current virtual time in microseconds.
    pub fn now_us(&self) -> u64 {
        self.core.borrow().now_ns / 1_000
    }
}

/// The master's view of the simulated line.
pub struct SimLine {
    core: Rc<RefCell<Core>>,
}

impl BusLine for SimLine {
    type Error = Infallible;

    fn drive_low(&mut self) -> Result<(), Self::Error> {
        let mut core = self.core.borrow_mut();
        if !core.master_low {
            core.master_low = true;
            core.low_since_ns = core.now_ns;
        }
        Ok(())
    }

    fn release(&mut self) -> Result<(), Self::Error> {
        let mut core = self.core.borrow_mut();
        if core.master_low {
            core.master_low = false;
            core.pulses += 1;
            let pulse = Pulse {
                low_ns: core.now_ns - core.low_since_ns,
                released_at_ns: core.now_ns,
            };
            for slave in core.slaves.iter_mut() {
                slave.on_pulse(pulse);
            }
        }
        Ok(())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(self.core.borrow().line_is_low())
    }
}

/// Virtual-clock implementation of [DelayNs].
pub struct SimDelay {
    core: Rc<RefCell<Core>>,
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.core.borrow_mut().now_ns += ns as u64;
    }
}
