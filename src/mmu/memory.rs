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

//! Owns the cartridge slot, boot ROM overlay and the flat RAM regions
//! (WRAM/HRAM) of the 8-bit family's address space. VRAM and OAM live in
//! [crate::ppu::ppu::Ppu] instead, since the PPU is the only component that
//! ever needs to scan them pixel-by-pixel.

use crate::boot_rom::BootRom;
use crate::cartridge::Cartridge;
use crate::gameboy::DeviceConfig;
use crate::mmu::locations::*;
use crate::mmu::memory_data::{MemoryData, MemoryDataFixedSize};


/// Size of one WRAM bank (DMG has two total, CGB has eight, banks 1..=7 switchable).
const WRAM_BANK_SIZE: usize = 0x1000;
const HRAM_SIZE: usize = 0x7f;


#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Memory {
    boot_rom:  Option<BootRom>,
    cartridge: Option<Cartridge>,

    wram: [MemoryDataFixedSize<WRAM_BANK_SIZE>; 8],
    hram: MemoryDataFixedSize<HRAM_SIZE>,

    wram_bank: u8,

    boot_rom_disabled: bool,

    /// KEY1 register (CGB double-speed switch): bit 0 = prepare switch requested,
    /// bit 7 = currently running at double speed.
    key1: u8,

    cgb_enabled: bool,
}

impl Memory {
    pub fn new(device_config: DeviceConfig) -> Self {
        Self {
            boot_rom: None,
            cartridge: None,
            wram: core::array::from_fn(|_| MemoryDataFixedSize::new()),
            hram: MemoryDataFixedSize::new(),
            wram_bank: 1,
            boot_rom_disabled: false,
            key1: 0,
            cgb_enabled: device_config.is_gbc_enabled(),
        }
    }

    pub fn set_boot_rom(&mut self, boot_rom: BootRom) {
        self.boot_rom = Some(boot_rom);
    }

    pub fn has_boot_rom(&self) -> bool {
        self.boot_rom.is_some()
    }

    pub fn set_cartridge(&mut self, cartridge: Cartridge) {
        self.cartridge = Some(cartridge);
    }

    pub fn get_cartridge(&self) -> &Option<Cartridge> {
        &self.cartridge
    }

    pub fn is_double_speed(&self) -> bool {
        (self.key1 & 0x80) != 0
    }

    /// Reads a byte from ROM / boot-ROM-overlay / cartridge-RAM addresses.
    pub fn read_rom_area(&self, address: u16) -> u8 {
        if !self.boot_rom_disabled && address < 0x100 {
            if let Some(boot_rom) = &self.boot_rom {
                return boot_rom.read(address);
            }
        }

        match &self.cartridge {
            Some(cartridge) if address <= MEMORY_LOCATION_ROM_SWITCHABLE_END => cartridge.read_rom(address),
            Some(cartridge) => cartridge.read_ram(address - MEMORY_LOCATION_CARTRIDGE_RAM_BEGIN),
            None => 0xff,
        }
    }

    pub fn write_rom_area(&mut self, address: u16, value: u8) {
        match &mut self.cartridge {
            Some(cartridge) if address <= MEMORY_LOCATION_ROM_SWITCHABLE_END => cartridge.write_rom(address, value),
            Some(cartridge) => cartridge.write_ram(address - MEMORY_LOCATION_CARTRIDGE_RAM_BEGIN, value),
            None => {}
        }
    }

    pub fn read_wram(&self, address: u16) -> u8 {
        if address < MEMORY_LOCATION_WRAM_BANK_BEGIN {
            self.wram[0].get_at((address - MEMORY_LOCATION_WRAM_BEGIN) as usize)
        } else {
            self.wram[self.wram_bank as usize].get_at((address - MEMORY_LOCATION_WRAM_BANK_BEGIN) as usize)
        }
    }

    pub fn write_wram(&mut self, address: u16, value: u8) {
        if address < MEMORY_LOCATION_WRAM_BANK_BEGIN {
            self.wram[0].set_at((address - MEMORY_LOCATION_WRAM_BEGIN) as usize, value);
        } else {
            self.wram[self.wram_bank as usize].set_at((address - MEMORY_LOCATION_WRAM_BANK_BEGIN) as usize, value);
        }
    }

    pub fn read_hram(&self, address: u16) -> u8 {
        self.hram.get_at((address - MEMORY_LOCATION_HRAM_BEGIN) as usize)
    }

    pub fn write_hram(&mut self, address: u16, value: u8) {
        self.hram.set_at((address - MEMORY_LOCATION_HRAM_BEGIN) as usize, value);
    }

    pub fn read_io(&self, address: u16) -> u8 {
        match address {
            MEMORY_LOCATION_SVBK if self.cgb_enabled => 0xf8 | self.wram_bank,
            MEMORY_LOCATION_KEY1 if self.cgb_enabled => self.key1 | 0x7e,
            MEMORY_LOCATION_BOOT_ROM_DISABLE => if self.boot_rom_disabled { 0xff } else { 0xfe },
            _ => 0xff,
        }
    }

    pub fn write_io(&mut self, address: u16, value: u8) {
        match address {
            MEMORY_LOCATION_SVBK if self.cgb_enabled => {
                self.wram_bank = match value & 0x07 {
                    0 => 1,
                    other => other,
                };
            }
            MEMORY_LOCATION_KEY1 if self.cgb_enabled => self.key1 = (self.key1 & 0x80) | (value & 0x01),
            MEMORY_LOCATION_BOOT_ROM_DISABLE => {
                if value != 0 {
                    self.boot_rom_disabled = true;
                }
            }
            _ => {}
        }
    }

    /// Performs the actual speed switch requested through KEY1/STOP.
    pub fn commit_speed_switch(&mut self) -> bool {
        if (self.key1 & 0x01) != 0 {
            self.key1 = (self.key1 & 0x7f) ^ 0x80;
            self.key1 &= 0xfe;
            true
        } else {
            false
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::device_type::{DeviceType, EmulationType};

    fn config() -> DeviceConfig {
        DeviceConfig { device: DeviceType::GameBoyDmg, emulation: EmulationType::DMG, print_opcodes: false }
    }

    #[test]
    fn wram_bank_zero_always_fixed() {
        let mut mem = Memory::new(config());
        mem.write_wram(MEMORY_LOCATION_WRAM_BEGIN, 0x42);
        assert_eq!(mem.read_wram(MEMORY_LOCATION_WRAM_BEGIN), 0x42);
    }

    #[test]
    fn wram_bank_switch_selects_independent_storage() {
        let cgb_config = DeviceConfig { device: DeviceType::GameBoyColor, emulation: EmulationType::GBC, print_opcodes: false };
        let mut mem = Memory::new(cgb_config);
        mem.write_wram(MEMORY_LOCATION_WRAM_BANK_BEGIN, 0x11);
        mem.write_io(MEMORY_LOCATION_SVBK, 2);
        mem.write_wram(MEMORY_LOCATION_WRAM_BANK_BEGIN, 0x22);
        mem.write_io(MEMORY_LOCATION_SVBK, 1);
        assert_eq!(mem.read_wram(MEMORY_LOCATION_WRAM_BANK_BEGIN), 0x11);
    }
}
