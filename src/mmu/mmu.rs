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

//! The memory bus: address decoding over the whole 8-bit-family map, plus the
//! one place both OAM DMA and CGB VRAM DMA are actually executed (since those
//! need to read and write across peripheral boundaries).

use crate::gameboy::Peripherals;
use crate::mmu::locations::*;
use crate::mmu::memory_bus::MemoryBusConnection;

type Clock = u64;


#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Mmu {
    peripherals: Peripherals,
}

impl Mmu {
    pub fn new(peripherals: Peripherals) -> Self {
        Self { peripherals }
    }

    pub fn get_peripherals(&self) -> &Peripherals {
        &self.peripherals
    }

    pub fn get_peripherals_mut(&mut self) -> &mut Peripherals {
        &mut self.peripherals
    }

    pub fn read_u8(&self, address: u16) -> u8 {
        match address {
            MEMORY_LOCATION_ROM_BEGIN..=MEMORY_LOCATION_ROM_SWITCHABLE_END => self.peripherals.mem.read_rom_area(address),
            MEMORY_LOCATION_VRAM_BEGIN..=MEMORY_LOCATION_VRAM_END => self.peripherals.ppu.on_read(address),
            MEMORY_LOCATION_CARTRIDGE_RAM_BEGIN..=MEMORY_LOCATION_CARTRIDGE_RAM_END => self.peripherals.mem.read_rom_area(address),
            MEMORY_LOCATION_WRAM_BEGIN..=MEMORY_LOCATION_WRAM_END => self.peripherals.mem.read_wram(address),
            MEMORY_LOCATION_ECHO_BEGIN..=MEMORY_LOCATION_ECHO_END => self.peripherals.mem.read_wram(address - 0x2000),
            MEMORY_LOCATION_OAM_BEGIN..=MEMORY_LOCATION_OAM_END => self.peripherals.ppu.on_read(address),
            MEMORY_LOCATION_UNUSABLE_BEGIN..=MEMORY_LOCATION_UNUSABLE_END => 0xff,

            MEMORY_LOCATION_JOYP => self.peripherals.input.on_read(address),
            MEMORY_LOCATION_SB | MEMORY_LOCATION_SC => self.peripherals.serial.on_read(address),
            MEMORY_LOCATION_DIV..=MEMORY_LOCATION_TAC => self.peripherals.timer.on_read(address),
            MEMORY_LOCATION_IF => self.peripherals.interrupts.on_read(address),

            // no audio subsystem; reads in this range return the bus' idle value.
            0xff10..=0xff3f => 0xff,

            MEMORY_LOCATION_DMA => self.peripherals.dma.read_oam_dma_register(),
            MEMORY_LOCATION_LCDC..=MEMORY_LOCATION_WX => self.peripherals.ppu.on_read(address),
            MEMORY_LOCATION_KEY1 => self.peripherals.mem.read_io(address),
            MEMORY_LOCATION_VBK => self.peripherals.ppu.on_read(address),
            MEMORY_LOCATION_BOOT_ROM_DISABLE => self.peripherals.mem.read_io(address),

            #[cfg(feature = "cgb")]
            MEMORY_LOCATION_HDMA1..=MEMORY_LOCATION_HDMA5 => self.peripherals.dma.read_hdma(address),

            MEMORY_LOCATION_BCPS..=MEMORY_LOCATION_OPRI => self.peripherals.ppu.on_read(address),
            MEMORY_LOCATION_SVBK => self.peripherals.mem.read_io(address),

            MEMORY_LOCATION_HRAM_BEGIN..=MEMORY_LOCATION_HRAM_END => self.peripherals.mem.read_hram(address),
            MEMORY_LOCATION_INTERRUPT_ENABLE => self.peripherals.interrupts.on_read(address),

            _ => 0xff,
        }
    }

    pub fn write_u8(&mut self, address: u16, value: u8) {
        match address {
            MEMORY_LOCATION_ROM_BEGIN..=MEMORY_LOCATION_ROM_SWITCHABLE_END => self.peripherals.mem.write_rom_area(address, value),
            MEMORY_LOCATION_VRAM_BEGIN..=MEMORY_LOCATION_VRAM_END => self.peripherals.ppu.on_write(address, value),
            MEMORY_LOCATION_CARTRIDGE_RAM_BEGIN..=MEMORY_LOCATION_CARTRIDGE_RAM_END => self.peripherals.mem.write_rom_area(address, value),
            MEMORY_LOCATION_WRAM_BEGIN..=MEMORY_LOCATION_WRAM_END => self.peripherals.mem.write_wram(address, value),
            MEMORY_LOCATION_ECHO_BEGIN..=MEMORY_LOCATION_ECHO_END => self.peripherals.mem.write_wram(address - 0x2000, value),
            MEMORY_LOCATION_OAM_BEGIN..=MEMORY_LOCATION_OAM_END => self.peripherals.ppu.on_write(address, value),
            MEMORY_LOCATION_UNUSABLE_BEGIN..=MEMORY_LOCATION_UNUSABLE_END => {}

            MEMORY_LOCATION_JOYP => self.peripherals.input.on_write(address, value),
            MEMORY_LOCATION_SB | MEMORY_LOCATION_SC => self.peripherals.serial.on_write(address, value),
            MEMORY_LOCATION_DIV..=MEMORY_LOCATION_TAC => self.peripherals.timer.on_write(address, value),
            MEMORY_LOCATION_IF => self.peripherals.interrupts.on_write(address, value),

            0xff10..=0xff3f => {}

            MEMORY_LOCATION_DMA => {
                self.peripherals.dma.start_oam_dma(value);
                self.run_oam_dma_immediately();
            }

            MEMORY_LOCATION_LCDC..=MEMORY_LOCATION_WX => self.peripherals.ppu.on_write(address, value),
            MEMORY_LOCATION_KEY1 => self.peripherals.mem.write_io(address, value),
            MEMORY_LOCATION_VBK => self.peripherals.ppu.on_write(address, value),
            MEMORY_LOCATION_BOOT_ROM_DISABLE => self.peripherals.mem.write_io(address, value),

            #[cfg(feature = "cgb")]
            MEMORY_LOCATION_HDMA1..=MEMORY_LOCATION_HDMA5 => self.handle_hdma_write(address, value),

            MEMORY_LOCATION_BCPS..=MEMORY_LOCATION_OPRI => self.peripherals.ppu.on_write(address, value),
            MEMORY_LOCATION_SVBK => self.peripherals.mem.write_io(address, value),

            MEMORY_LOCATION_HRAM_BEGIN..=MEMORY_LOCATION_HRAM_END => self.peripherals.mem.write_hram(address, value),
            MEMORY_LOCATION_INTERRUPT_ENABLE => self.peripherals.interrupts.on_write(address, value),

            _ => {}
        }
    }

    /// Copies all 0xa0 bytes of an OAM DMA transfer in one go. Real hardware
    /// spreads this over 160 M-cycles and locks out all-but-HRAM bus access
    /// while it runs; this core applies it instantly instead, a documented
    /// simplification since no currently-targeted test ROM depends on
    /// mid-transfer bus contention.
    fn run_oam_dma_immediately(&mut self) {
        let source = self.peripherals.dma.oam_dma_source;

        for i in 0..0xa0u16 {
            let byte = self.read_u8(source + i);
            self.peripherals.ppu.on_write(MEMORY_LOCATION_OAM_BEGIN + i, byte);
        }

        self.peripherals.dma.oam_dma_remaining = 0;
    }

    #[cfg(feature = "cgb")]
    fn handle_hdma_write(&mut self, address: u16, value: u8) {
        use crate::dma::HdmaMode;

        if let Some((mode, src, dst, length)) = self.peripherals.dma.write_hdma(address, value) {
            if mode == HdmaMode::General {
                for i in 0..length {
                    let byte = self.read_u8(src + i);
                    self.peripherals.ppu.on_write(dst + i, byte);
                }
            }
            // HBlank-mode transfers are drained incrementally by `update`.
        }
    }

    /// Advances CGB HBlank-mode VRAM DMA by one chunk per HBlank period entered.
    #[cfg(feature = "cgb")]
    fn step_hblank_dma(&mut self) {
        if !self.peripherals.ppu.just_entered_hblank() {
            return;
        }

        if let Some((src, dst, length)) = self.peripherals.dma.take_hblank_chunk() {
            for i in 0..length {
                let byte = self.read_u8(src + i);
                self.peripherals.ppu.on_write(dst + i, byte);
            }
        }
    }

    /// Runs bus-level activity that isn't owned by any single peripheral.
    pub fn update(&mut self, _cycles: Clock) {
        #[cfg(feature = "cgb")]
        self.step_hblank_dma();
    }
}
