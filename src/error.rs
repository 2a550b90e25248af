//! Error types surfaced to the host.

use std::io;

use thiserror::Error;


/// Everything that can go wrong while loading or running a ROM.
///
/// Only construction and battery RAM I/O produce errors in normal operation.
/// At runtime the single fatal condition is an illegal opcode: the real CPU
/// locks up on those, so the emulation loop refuses to continue. All other
/// odd guest behavior (writes to read-only ranges, out-of-range register
/// bits, triggering disabled channels) is documented hardware behavior and
/// absorbed silently.
#[derive(Debug, Error)]
pub enum Error {
    /// The ROM image is too small or its header fields are nonsensical.
    #[error("invalid ROM header: {0}")]
    InvalidRomHeader(&'static str),

    /// The cartridge type byte names a mapper this core does not implement.
    #[error("unsupported cartridge type {0:#04x}")]
    UnsupportedMbc(u8),

    /// The CPU fetched one of the eleven unused opcodes. On hardware this
    /// locks the CPU until power-off.
    #[error("illegal opcode {opcode:#04x} at {addr:#06x}")]
    IllegalOpcode { addr: u16, opcode: u8 },

    /// Reading or writing a battery RAM image failed.
    #[error("battery RAM I/O failed")]
    IoFailure(#[from] io::Error),
}
