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

use flagset::{flags, FlagSet};

use crate::debug::DebugEvents;


/// Implemented by every peripheral which is reachable through the memory-mapped
/// I/O register window. The bus routes reads/writes in that window to the owning
/// peripheral's `on_read`/`on_write` instead of keeping a shadow copy of every register.
pub trait MemoryBusConnection {
    /// Reads a byte from this peripheral's own address space.
    fn on_read(&self, address: u16) -> u8;

    /// Writes a byte into this peripheral's own address space.
    fn on_write(&mut self, address: u16, value: u8);
}


flags! {
    /// Interrupt sources a peripheral may request during an `update` call.
    pub enum Interrupts: u8 {
        VBlank,
        LcdStat,
        Timer,
        Serial,
        Joypad,
    }
}


/// Signals collected from a peripheral during one `update` call: any interrupts
/// it wants to request, and any debug events it wants to surface to the caller.
#[derive(Default, Copy, Clone)]
pub struct MemoryBusSignals {
    pub interrupts: FlagSet<Interrupts>,
    pub events: DebugEvents,
}

impl core::ops::BitOr for MemoryBusSignals {
    type Output = MemoryBusSignals;

    fn bitor(self, rhs: Self) -> Self::Output {
        MemoryBusSignals {
            interrupts: self.interrupts | rhs.interrupts,
            events: self.events | rhs.events,
        }
    }
}

impl core::ops::BitOrAssign for MemoryBusSignals {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = *self | rhs;
    }
}
