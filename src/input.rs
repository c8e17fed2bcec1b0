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

//! JOYP (FF00): button/direction key selection and the joypad interrupt,
//! requested on any high-to-low transition of a selected key line.

use crate::mmu::locations::MEMORY_LOCATION_JOYP;
use crate::mmu::memory_bus::{Interrupts, MemoryBusConnection, MemoryBusSignals};


/// One of the eight buttons on the device. Direction and button keys share
/// the same nibble of the JOYP register depending on which group is selected.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum JoypadKey {
    A, B, Select, Start, Up, Down, Left, Right,
}

impl JoypadKey {
    fn bit(&self) -> u8 {
        match self {
            JoypadKey::A      | JoypadKey::Right => 0,
            JoypadKey::B      | JoypadKey::Left   => 1,
            JoypadKey::Select | JoypadKey::Up     => 2,
            JoypadKey::Start  | JoypadKey::Down   => 3,
        }
    }

    fn is_direction(&self) -> bool {
        matches!(self, JoypadKey::Up | JoypadKey::Down | JoypadKey::Left | JoypadKey::Right)
    }
}


#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Input {
    /// Bits 4/5 (selection) as last written by the program; bits 0-3 are
    /// recomputed from `pressed` on every [Input::update] call.
    select: u8,

    /// Currently pressed keys, bit-per-key per [JoypadKey::bit] with the
    /// direction/button groups distinguished by [JoypadKey::is_direction].
    buttons_pressed: u8,
    directions_pressed: u8,

    last_line: u8,
    signals: MemoryBusSignals,
}

impl Input {
    pub fn new() -> Self {
        Self {
            select: 0x30,
            buttons_pressed: 0,
            directions_pressed: 0,
            last_line: 0x0f,
            signals: MemoryBusSignals::default(),
        }
    }

    pub fn set_key_pressed(&mut self, key: JoypadKey, pressed: bool) {
        let mask = 1 << key.bit();
        let bucket = if key.is_direction() { &mut self.directions_pressed } else { &mut self.buttons_pressed };

        if pressed {
            *bucket |= mask;
        } else {
            *bucket &= !mask;
        }
    }

    fn buttons_selected(&self) -> bool {
        (self.select & 0b0010_0000) == 0
    }

    fn directions_selected(&self) -> bool {
        (self.select & 0b0001_0000) == 0
    }

    fn active_line(&self) -> u8 {
        let mut line = 0x0f;

        if self.buttons_selected() {
            line &= !self.buttons_pressed;
        }

        if self.directions_selected() {
            line &= !self.directions_pressed;
        }

        line
    }

    /// Recomputes the low nibble from currently pressed keys and requests the
    /// joypad interrupt on any bit's high-to-low transition.
    pub fn update(&mut self) {
        let line = self.active_line();

        if (self.last_line & !line) != 0 {
            self.signals.interrupts |= Interrupts::Joypad;
        }

        self.last_line = line;
    }

    pub fn take_signals(&mut self) -> MemoryBusSignals {
        core::mem::take(&mut self.signals)
    }
}

impl MemoryBusConnection for Input {
    fn on_read(&self, address: u16) -> u8 {
        match address {
            MEMORY_LOCATION_JOYP => 0b1100_0000 | self.select | self.active_line(),
            _ => 0xff,
        }
    }

    fn on_write(&mut self, address: u16, value: u8) {
        if address == MEMORY_LOCATION_JOYP {
            self.select = value & 0b0011_0000;
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selecting_buttons_hides_directions() {
        let mut input = Input::new();
        input.set_key_pressed(JoypadKey::A, true);
        input.set_key_pressed(JoypadKey::Up, true);
        input.on_write(MEMORY_LOCATION_JOYP, 0b0001_0000); // select buttons
        input.update();
        assert_eq!(input.on_read(MEMORY_LOCATION_JOYP) & 0x0f, 0b1110);
    }

    #[test]
    fn press_triggers_joypad_interrupt() {
        let mut input = Input::new();
        input.on_write(MEMORY_LOCATION_JOYP, 0b0001_0000);
        input.update();
        input.set_key_pressed(JoypadKey::A, true);
        input.update();
        assert!(input.take_signals().interrupts.contains(Interrupts::Joypad));
    }
}
