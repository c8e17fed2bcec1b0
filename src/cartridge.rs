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

//! Cartridge header parsing and the memory-mapped mapper interface.
//! Per the core's scope, only the header and the byte-level mapper
//! interface live here; each mapper's bank-count/RAM-size lookup tables
//! are an external concern (see SPEC_FULL.md §1).

#[cfg(feature = "dyn_alloc")]
use alloc::{boxed::Box, string::String, vec, vec::Vec};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::mmu::locations::*;


/// Whether a cartridge declares GameBoy Color support.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GameBoyColorSupport {
    None,
    Supported,
    Required,
}


/// The licensee code read from the cartridge header, used to decide whether
/// the boot-skip title checksum applies (see [Cartridge::compute_title_checksum]).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LicenseeCode {
    Old(u8),
    New(u8),
}


/// The mapper (memory bank controller) type declared by the cartridge header.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CartridgeType {
    RomOnly,
    Mbc1,
    Mbc2,
    Mbc3,
    Mbc5,
    Mbc6,
    Mbc7,
    HuC1,
    HuC3,
    Mmm01,
    PocketCamera,
    Unknown(u8),
}

impl CartridgeType {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x00 | 0x08 | 0x09 => CartridgeType::RomOnly,
            0x01..=0x03 => CartridgeType::Mbc1,
            0x05 | 0x06 => CartridgeType::Mbc2,
            0x0b..=0x0d => CartridgeType::Mmm01,
            0x0f..=0x13 => CartridgeType::Mbc3,
            0x19..=0x1e => CartridgeType::Mbc5,
            0x20 => CartridgeType::Mbc6,
            0x22 => CartridgeType::Mbc7,
            0xfc => CartridgeType::PocketCamera,
            0xfe => CartridgeType::HuC3,
            0xff => CartridgeType::HuC1,
            other => CartridgeType::Unknown(other),
        }
    }
}


/// The memory-mapped interface of a cartridge mapper.
/// The core queries only this interface; lookup tables used to pick a ROM/RAM
/// bank given a particular byte value are the mapper's own concern.
pub trait Mbc {
    fn load_rom_byte(&self, address: u16) -> u8;
    fn store_rom_byte(&mut self, address: u16, value: u8);
    fn load_ram_byte(&self, address: u16) -> u8;
    fn store_ram_byte(&mut self, address: u16, value: u8);
}


/// The simplest possible mapper: a single fixed 32 KiB ROM, no switchable RAM.
pub struct NoMbc {
    rom: Vec<u8>,
}

impl NoMbc {
    pub fn new(rom: Vec<u8>) -> Self {
        Self { rom }
    }
}

impl Mbc for NoMbc {
    fn load_rom_byte(&self, address: u16) -> u8 {
        self.rom.get(address as usize).copied().unwrap_or(0xff)
    }

    fn store_rom_byte(&mut self, _address: u16, _value: u8) {
        // plain ROM-only cartridges have no registers to write
    }

    fn load_ram_byte(&self, _address: u16) -> u8 {
        0xff
    }

    fn store_ram_byte(&mut self, _address: u16, _value: u8) {
    }
}


/// A cartridge image: its ROM bytes plus the parsed header fields the core needs
/// in order to pick a device/emulation type and construct the right mapper.
pub struct Cartridge {
    rom: Vec<u8>,
    title: String,
    cgb_support: GameBoyColorSupport,
    cartridge_type: CartridgeType,
    licensee_code: LicenseeCode,
    mbc: Box<dyn Mbc>,
}

impl Cartridge {
    /// Parses a cartridge header from raw ROM bytes and constructs the
    /// matching mapper. Only [CartridgeType::RomOnly] is wired to a real
    /// [Mbc] implementation here; other mapper types fall back to [NoMbc]
    /// reading bank 0 only, since a faithful banked implementation is an
    /// external collaborator's concern per SPEC_FULL.md §1.
    pub fn from_bytes(rom: Vec<u8>) -> Self {
        let cgb_flag = *rom.get(HEADER_CGB_FLAG as usize).unwrap_or(&0);
        let cgb_support = match cgb_flag {
            0xc0 => GameBoyColorSupport::Required,
            0x80 => GameBoyColorSupport::Supported,
            _ => GameBoyColorSupport::None,
        };

        let cartridge_type = CartridgeType::from_byte(
            *rom.get(HEADER_CARTRIDGE_TYPE as usize).unwrap_or(&0)
        );

        let old_licensee = *rom.get(HEADER_OLD_LICENSEE as usize).unwrap_or(&0);
        let licensee_code = if old_licensee == 0x33 {
            let hi = *rom.get(HEADER_NEW_LICENSEE_BEGIN as usize).unwrap_or(&0);
            let lo = *rom.get(HEADER_NEW_LICENSEE_BEGIN as usize + 1).unwrap_or(&0);
            let value = (hi.wrapping_sub(b'0')).wrapping_mul(10) + lo.wrapping_sub(b'0');
            LicenseeCode::New(value)
        } else {
            LicenseeCode::Old(old_licensee)
        };

        // on newer cartridges (CGB-flag byte used for CGB support), the title
        // field shrinks from 16 to 11 bytes to make room for the manufacturer
        // code and CGB flag.
        let title_end = if cgb_flag == 0x80 || cgb_flag == 0xc0 {
            HEADER_TITLE_BEGIN + 10
        } else {
            HEADER_TITLE_END
        };

        let title: String = rom[HEADER_TITLE_BEGIN as usize..=title_end as usize]
            .iter()
            .take_while(|&&b| b != 0)
            .map(|&b| b as char)
            .collect();

        let mbc: Box<dyn Mbc> = Box::new(NoMbc::new(rom.clone()));

        Self {
            rom,
            title,
            cgb_support,
            cartridge_type,
            licensee_code,
            mbc,
        }
    }

    pub fn get_title(&self) -> &str {
        &self.title
    }

    pub fn get_cgb_support(&self) -> GameBoyColorSupport {
        self.cgb_support
    }

    pub fn supports_cgb(&self) -> bool {
        self.cgb_support != GameBoyColorSupport::None
    }

    pub fn get_cartridge_type(&self) -> CartridgeType {
        self.cartridge_type
    }

    pub fn get_licensee_code(&self) -> LicenseeCode {
        self.licensee_code
    }

    /// Computes the checksum the boot ROM would have computed over the
    /// title bytes (used to pick some CGB/GBA boot-skip register values).
    pub fn compute_title_checksum(&self) -> u8 {
        self.title.bytes().fold(0u8, |acc, b| acc.wrapping_add(b))
    }

    pub fn read_rom(&self, address: u16) -> u8 {
        self.mbc.load_rom_byte(address)
    }

    pub fn write_rom(&mut self, address: u16, value: u8) {
        self.mbc.store_rom_byte(address, value);
    }

    pub fn read_ram(&self, address: u16) -> u8 {
        self.mbc.load_ram_byte(address)
    }

    pub fn write_ram(&mut self, address: u16, value: u8) {
        self.mbc.store_ram_byte(address, value);
    }

    pub fn rom_bytes(&self) -> &[u8] {
        &self.rom
    }
}


/// Only [NoMbc] is wired to a real [Mbc] today (see [Cartridge::from_bytes]),
/// so a snapshot only needs to carry the ROM bytes plus the parsed header
/// fields; loading rebuilds the mapper from the ROM bytes rather than trying
/// to serialize `Box<dyn Mbc>` itself.
#[cfg(feature = "serde")]
#[derive(serde::Serialize, serde::Deserialize)]
struct CartridgeSnapshot {
    rom: crate::utils::SerializableBuffer<u8>,
    title: alloc::string::String,
    cgb_support: GameBoyColorSupport,
    cartridge_type: CartridgeType,
    licensee_code: LicenseeCode,
}

#[cfg(feature = "serde")]
impl serde::Serialize for Cartridge {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        CartridgeSnapshot {
            rom: self.rom.clone().into(),
            title: self.title.clone(),
            cgb_support: self.cgb_support,
            cartridge_type: self.cartridge_type,
            licensee_code: self.licensee_code,
        }.serialize(serializer)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Cartridge {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let snapshot = CartridgeSnapshot::deserialize(deserializer)?;
        let rom: Vec<u8> = snapshot.rom.into();
        let mbc: Box<dyn Mbc> = Box::new(NoMbc::new(rom.clone()));

        Ok(Self {
            rom,
            title: snapshot.title,
            cgb_support: snapshot.cgb_support,
            cartridge_type: snapshot.cartridge_type,
            licensee_code: snapshot.licensee_code,
            mbc,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn make_header(cgb_flag: u8, cartridge_type: u8, title: &str) -> Vec<u8> {
        let mut rom = vec![0u8; 0x8000];
        for (i, b) in title.bytes().enumerate() {
            rom[HEADER_TITLE_BEGIN as usize + i] = b;
        }
        rom[HEADER_CGB_FLAG as usize] = cgb_flag;
        rom[HEADER_CARTRIDGE_TYPE as usize] = cartridge_type;
        rom
    }

    #[test]
    fn parses_plain_dmg_header() {
        let cart = Cartridge::from_bytes(make_header(0x00, 0x00, "TETRIS"));
        assert_eq!(cart.get_title(), "TETRIS");
        assert_eq!(cart.get_cgb_support(), GameBoyColorSupport::None);
        assert_eq!(cart.get_cartridge_type(), CartridgeType::RomOnly);
    }

    #[test]
    fn parses_cgb_required_header() {
        let cart = Cartridge::from_bytes(make_header(0xc0, 0x01, "POKEMON"));
        assert_eq!(cart.get_cgb_support(), GameBoyColorSupport::Required);
        assert!(cart.supports_cgb());
        assert_eq!(cart.get_cartridge_type(), CartridgeType::Mbc1);
    }
}
