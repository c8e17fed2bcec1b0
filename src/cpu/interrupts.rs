/*
 * Copyright (C) 2022-2024 by Christian Fischer
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program. If not, see <http://www.gnu.org/licenses/>.
 */

//! The IE/IF registers and the interrupt-master-enable flag, plus the fixed
//! priority order and service vectors of the five 8-bit-family interrupts.

use flagset::FlagSet;

use crate::mmu::locations::{MEMORY_LOCATION_IF, MEMORY_LOCATION_INTERRUPT_ENABLE};
use crate::mmu::memory_bus::{Interrupts, MemoryBusConnection};


/// One of the five interrupt sources, in their fixed hardware priority order.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Interrupt {
    VBlank,
    LcdStat,
    Timer,
    Serial,
    Joypad,
}

impl Interrupt {
    /// Address of this interrupt's service routine.
    pub fn vector(&self) -> u16 {
        match self {
            Interrupt::VBlank  => 0x40,
            Interrupt::LcdStat => 0x48,
            Interrupt::Timer   => 0x50,
            Interrupt::Serial  => 0x58,
            Interrupt::Joypad  => 0x60,
        }
    }

    fn bit(&self) -> u8 {
        match self {
            Interrupt::VBlank  => 0,
            Interrupt::LcdStat => 1,
            Interrupt::Timer   => 2,
            Interrupt::Serial  => 3,
            Interrupt::Joypad  => 4,
        }
    }
}


/// Owns the IE/IF registers and the IME flag, and decides which (if any)
/// interrupt is ready to be serviced next.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InterruptRegisters {
    interrupt_enable: u8,
    interrupt_flag: u8,
    pub ime: bool,
}

impl InterruptRegisters {
    pub fn new() -> Self {
        Self {
            interrupt_enable: 0x00,
            interrupt_flag: 0xe1,
            ime: false,
        }
    }

    /// Merges externally requested interrupts (from peripheral `update()` calls)
    /// into the IF register.
    pub fn request_interrupts(&mut self, interrupts: FlagSet<Interrupts>) {
        if interrupts.contains(Interrupts::VBlank)  { self.interrupt_flag |= 1 << 0; }
        if interrupts.contains(Interrupts::LcdStat) { self.interrupt_flag |= 1 << 1; }
        if interrupts.contains(Interrupts::Timer)   { self.interrupt_flag |= 1 << 2; }
        if interrupts.contains(Interrupts::Serial)  { self.interrupt_flag |= 1 << 3; }
        if interrupts.contains(Interrupts::Joypad)  { self.interrupt_flag |= 1 << 4; }
    }

    /// Returns the highest-priority pending and enabled interrupt, regardless of IME.
    /// The CPU uses this both to decide whether to service an interrupt (when IME is
    /// set) and to decide whether to wake up from HALT (which ignores IME).
    pub fn pending_interrupt(&self) -> Option<Interrupt> {
        let masked = self.interrupt_enable & self.interrupt_flag & 0x1f;

        if masked == 0 {
            return None;
        }

        for interrupt in [
            Interrupt::VBlank,
            Interrupt::LcdStat,
            Interrupt::Timer,
            Interrupt::Serial,
            Interrupt::Joypad,
        ] {
            if (masked & (1 << interrupt.bit())) != 0 {
                return Some(interrupt);
            }
        }

        None
    }

    /// Returns the interrupt to service next, if IME is set and one is pending.
    pub fn should_interrupt(&self) -> Option<Interrupt> {
        if !self.ime {
            return None;
        }

        self.pending_interrupt()
    }

    /// Clears the IF bit belonging to `interrupt`, called once its service routine starts.
    pub fn acknowledge(&mut self, interrupt: Interrupt) {
        self.interrupt_flag &= !(1 << interrupt.bit());
    }
}

impl MemoryBusConnection for InterruptRegisters {
    fn on_read(&self, address: u16) -> u8 {
        match address {
            MEMORY_LOCATION_IF => self.interrupt_flag | 0xe0,
            MEMORY_LOCATION_INTERRUPT_ENABLE => self.interrupt_enable,
            _ => 0xff,
        }
    }

    fn on_write(&mut self, address: u16, value: u8) {
        match address {
            MEMORY_LOCATION_IF => self.interrupt_flag = value & 0x1f,
            MEMORY_LOCATION_INTERRUPT_ENABLE => self.interrupt_enable = value,
            _ => {}
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_order_is_vblank_first() {
        let mut ir = InterruptRegisters::new();
        ir.ime = true;
        ir.on_write(MEMORY_LOCATION_INTERRUPT_ENABLE, 0x1f);
        ir.on_write(MEMORY_LOCATION_IF, 0x1f);
        assert_eq!(ir.should_interrupt(), Some(Interrupt::VBlank));
    }

    #[test]
    fn disabled_ime_blocks_service_but_not_pending() {
        let mut ir = InterruptRegisters::new();
        ir.on_write(MEMORY_LOCATION_INTERRUPT_ENABLE, 0x01);
        ir.on_write(MEMORY_LOCATION_IF, 0x01);
        assert_eq!(ir.should_interrupt(), None);
        assert_eq!(ir.pending_interrupt(), Some(Interrupt::VBlank));
    }

    #[test]
    fn acknowledge_clears_only_that_bit() {
        let mut ir = InterruptRegisters::new();
        ir.ime = true;
        ir.on_write(MEMORY_LOCATION_INTERRUPT_ENABLE, 0x1f);
        ir.on_write(MEMORY_LOCATION_IF, 0x03);
        ir.acknowledge(Interrupt::VBlank);
        assert_eq!(ir.should_interrupt(), Some(Interrupt::LcdStat));
    }
}
