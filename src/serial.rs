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

//! A simplified implementation of the serial port, with the main purpose of
//! receiving data sent by test ROMs like Blargg's. It does not provide
//! precise link-cable timing, an external clock, or double-speed transfer.

#[cfg(feature = "dyn_alloc")]
use alloc::{string::String, vec::Vec};

use crate::debug::DebugEvent;
use crate::mmu::locations::{MEMORY_LOCATION_SB, MEMORY_LOCATION_SC};
use crate::mmu::memory_bus::{Interrupts, MemoryBusConnection, MemoryBusSignals};

type Clock = u64;

const UPDATE_TIME_SERIAL_TRANSFER: Clock = 4096;


/// An implementation of the GameBoy's serial port.
/// The output queue is disabled by default and needs to be enabled to store
/// data sent.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SerialPort {
    clock: Clock,
    sb: u8,
    sc: u8,

    #[cfg(feature = "dyn_alloc")]
    #[cfg_attr(feature = "serde", serde(skip))]
    output_queue: Vec<u8>,

    output_queue_enabled: bool,

    #[cfg_attr(feature = "serde", serde(skip))]
    signals: MemoryBusSignals,
}

impl SerialPort {
    pub fn new() -> SerialPort {
        SerialPort {
            clock: 0,
            sb: 0x00,
            sc: 0x7e,
            #[cfg(feature = "dyn_alloc")]
            output_queue: Vec::new(),
            output_queue_enabled: false,
            signals: MemoryBusSignals::default(),
        }
    }

    fn transfer_enabled(&self) -> bool {
        (self.sc & 0x80) != 0
    }

    /// Updates the SerialPort, perform data transfer if any data is pending.
    pub fn update(&mut self, cycles: Clock) {
        if !self.transfer_enabled() {
            return;
        }

        self.clock += cycles;

        if self.clock >= UPDATE_TIME_SERIAL_TRANSFER {
            self.clock -= UPDATE_TIME_SERIAL_TRANSFER;

            #[cfg(feature = "dyn_alloc")]
            if self.output_queue_enabled {
                self.output_queue.push(self.sb);
            }

            // no link partner is ever connected, so the receiving side just shifts in 1-bits
            self.sb = 0xff;
            self.sc &= 0x7f;

            self.signals.interrupts |= Interrupts::Serial;
            self.signals.events |= DebugEvent::SerialTransferCompleted;
        }
    }

    /// Enables the output queue to store data sent by the program.
    #[cfg(feature = "dyn_alloc")]
    pub fn enable_output_queue(&mut self, enabled: bool) {
        self.output_queue_enabled = enabled;
    }

    /// Takes the data currently in the output queue, clearing it.
    #[cfg(feature = "dyn_alloc")]
    pub fn take_output(&mut self) -> Vec<u8> {
        core::mem::take(&mut self.output_queue)
    }

    /// Takes the data currently in the output queue interpreted as text.
    #[cfg(feature = "dyn_alloc")]
    pub fn take_output_as_text(&mut self) -> String {
        self.take_output().into_iter().map(|b| b as char).collect()
    }

    pub fn take_signals(&mut self) -> MemoryBusSignals {
        core::mem::take(&mut self.signals)
    }
}

impl MemoryBusConnection for SerialPort {
    fn on_read(&self, address: u16) -> u8 {
        match address {
            MEMORY_LOCATION_SB => self.sb,
            MEMORY_LOCATION_SC => self.sc | 0x7e,
            _ => 0xff,
        }
    }

    fn on_write(&mut self, address: u16, value: u8) {
        match address {
            MEMORY_LOCATION_SB => self.sb = value,
            MEMORY_LOCATION_SC => {
                self.sc = value & 0x81;
                if self.transfer_enabled() {
                    self.clock = 0;
                }
            }
            _ => {}
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completed_transfer_requests_interrupt_and_clears_start_bit() {
        let mut serial = SerialPort::new();
        serial.enable_output_queue(true);
        serial.on_write(MEMORY_LOCATION_SB, b'A');
        serial.on_write(MEMORY_LOCATION_SC, 0x81);
        serial.update(UPDATE_TIME_SERIAL_TRANSFER);

        assert!(serial.take_signals().interrupts.contains(Interrupts::Serial));
        assert_eq!(serial.on_read(MEMORY_LOCATION_SC) & 0x80, 0);
        assert_eq!(serial.take_output_as_text(), "A");
    }
}
