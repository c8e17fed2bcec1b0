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

/// The concrete device being emulated within the 8-bit family.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DeviceType {
    GameBoyDmg,
    GameBoyPocket,
    GameBoyColor,
    GameBoyAdvance,
    GameBoyAdvanceSP,
    SuperGameBoy,
    SuperGameBoy2,
}


/// Whether the running cartridge is executed in plain monochrome compatibility
/// mode or with the color extensions enabled.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EmulationType {
    DMG,
    GBC,
}


impl DeviceType {
    /// Whether this device is able to run a cartridge using the GameBoy Color
    /// extensions, independent of whether the current cartridge actually uses them.
    pub fn supports_cgb_mode(&self) -> bool {
        match self {
            DeviceType::GameBoyColor
            | DeviceType::GameBoyAdvance
            | DeviceType::GameBoyAdvanceSP => cfg!(feature = "cgb"),

            _ => false,
        }
    }
}
