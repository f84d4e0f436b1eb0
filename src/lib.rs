//! Cycle-stepped NES emulation core.
//!
//! The crate models the machine as a handful of clocked devices owned by
//! [`nes::Nes`]: the 6502 interpreter, the dot-stepped PPU, the cartridge
//! with its mapper, work RAM and the controller ports. The scheduler in
//! `nes` drives everything from a single master clock; display and audio
//! belong to the host, which drains the PPU framebuffer once per frame.

pub mod apu;
pub mod bus;
pub mod cart;
pub mod cpu6502;
pub mod mapper;
pub mod nes;
pub mod peripherals;
pub mod ppu;
pub mod ram;
pub mod trace;

// Shared test utilities (only compiled for tests)
#[cfg(test)]
pub mod test_utils;

pub use bus::Bus;
pub use cart::Cart;
pub use cpu6502::Cpu;
pub use nes::{Nes, Region};
pub use ppu::Ppu;
