#![no_std]
#![deny(missing_docs)]
//! # onewire-bitbang
//! A no-std bit-banged 1-Wire bus master for a single GPIO data line.
//!
//! The 1-Wire bus is open-drain: the line idles high through an external
//! pullup, and both the master and the slaves only ever pull it low. The
//! [BusLine] trait captures the three pin operations this requires
//! (drive low, release to input, sample), and [BitBangMaster] schedules
//! them into standard-speed reset, write and read slots using a
//! [`DelayNs`](embedded_hal::delay::DelayNs) timer.
//!
//! On top of the bit engine, [OneWireBus] provides LSB-first byte framing,
//! [RomCode]/[read_rom] handle single-device ROM reads, and [RomSearch]
//! implements the binary-tree Search-ROM enumeration. ROM codes that fail
//! CRC or carry family `0x00` are the electrical fingerprint of ROM-less
//! devices colliding on a shared bus; they are yielded as data with a
//! validity flag, never swallowed.

#[cfg(test)]
extern crate std;

mod crc;
mod error;
mod line;
mod master;
mod rom;
mod search;
mod traits;

pub use crc::Crc8;
pub use error::OneWireError;
pub use line::BusLine;
pub use master::BitBangMaster;
pub use rom::{READ_ROM_CMD, SEARCH_ROM_CMD, SKIP_ROM_CMD, RomCode, read_rom};
pub use search::RomSearch;
pub use traits::OneWireBus;

/// Result type for 1-Wire operations.
pub type OneWireResult<T, E> = Result<T, OneWireError<E>>;
