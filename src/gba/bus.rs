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

//! The 32-bit family's width-typed memory bus: region decode, the
//! misalignment rotation rules real hardware applies, and the IO register
//! side-effect table (LCD/DMA/timers/interrupts; sound and serial are out
//! of scope and land in a plain byte array).

use alloc::vec::Vec;

use crate::gba::dma::{DmaController, Eeprom};
use crate::gba::lcd::Lcd;
use crate::gba::timer::TimerChain;

const BIOS_SIZE: usize = 0x4000;
const EWRAM_SIZE: usize = 0x4_0000;
const IWRAM_SIZE: usize = 0x8000;
const IO_SIZE: usize = 0x400;
const SRAM_SIZE: usize = 0x1_0000;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bus {
    #[cfg_attr(feature = "serde", serde(skip))]
    bios: alloc::boxed::Box<[u8; BIOS_SIZE]>,
    ewram: alloc::boxed::Box<[u8; EWRAM_SIZE]>,
    iwram: alloc::boxed::Box<[u8; IWRAM_SIZE]>,
    io_raw: alloc::boxed::Box<[u8; IO_SIZE]>,
    rom: Vec<u8>,
    sram: alloc::boxed::Box<[u8; SRAM_SIZE]>,

    pub lcd: Lcd,
    pub dma: DmaController,
    pub timers: TimerChain,
    eeprom: Eeprom,

    interrupt_enable: u16,
    interrupt_flags: u16,
    pub interrupt_master_enable: bool,
    pub system_halted: bool,

    /// The last word fetched by the CPU, used to answer unmapped reads the
    /// way open-bus behaves on real hardware (the last prefetched opcode,
    /// rotated to the read's byte lane).
    last_fetch: u32,
}

impl Bus {
    pub fn new(rom: Vec<u8>) -> Self {
        Self {
            bios: alloc::boxed::Box::new([0; BIOS_SIZE]),
            ewram: alloc::boxed::Box::new([0; EWRAM_SIZE]),
            iwram: alloc::boxed::Box::new([0; IWRAM_SIZE]),
            io_raw: alloc::boxed::Box::new([0; IO_SIZE]),
            rom,
            sram: alloc::boxed::Box::new([0xff; SRAM_SIZE]),
            lcd: Lcd::new(),
            dma: DmaController::new(),
            timers: TimerChain::new(),
            eeprom: Eeprom::new(),
            interrupt_enable: 0,
            interrupt_flags: 0,
            interrupt_master_enable: false,
            system_halted: false,
            last_fetch: 0,
        }
    }

    pub fn interrupt_pending(&self) -> bool {
        self.interrupt_enable & self.interrupt_flags != 0
    }

    pub fn raise_interrupt(&mut self, mask: u16) {
        self.interrupt_flags |= mask;
    }

    /// Advances every time-driven peripheral by `cycles` CPU cycles, wiring
    /// LCD scanline transitions and timer overflows into DMA triggers and
    /// IRQ lines. Returns the LCD events observed, so callers like
    /// [crate::gba::Machine::run_frame] can stop at a frame boundary.
    pub fn tick(&mut self, cycles: u32) -> super::lcd::LcdEvents {
        let lcd_events = self.lcd.step(cycles);
        if lcd_events.entered_vblank {
            self.dma.on_vblank();
            self.interrupt_flags |= super::lcd::IRQ_VBLANK;
        }
        if lcd_events.entered_hblank {
            self.dma.on_hblank();
            self.interrupt_flags |= super::lcd::IRQ_HBLANK;
        }
        if lcd_events.matched_vcount {
            self.interrupt_flags |= super::lcd::IRQ_VCOUNT;
        }

        let timer_overflows = self.timers.step(cycles);
        for (index, overflowed) in timer_overflows.iter().enumerate() {
            if *overflowed && self.timers.irq_enabled(index) {
                self.interrupt_flags |= 1 << (3 + index); // IRQ bits 3-6: Timer0-3
            }
        }

        self.dma.tick_startup_delays(cycles);
        self.run_pending_dma();
        lcd_events
    }

    /// Drains every DMA channel the controller has armed this tick, copying
    /// words directly through the bus's own read/write paths. Pulling the
    /// transfer's parameters out of the controller first (rather than having
    /// it hold `&mut Bus` itself) avoids borrowing `self.dma` and `self` at
    /// the same time.
    fn run_pending_dma(&mut self) {
        while let Some(transfer) = self.dma.take_ready() {
            // The cartridge channel's special path to the EEPROM window is a
            // bit-serial protocol rather than a plain word copy: see
            // `run_eeprom_transfer`.
            if transfer.channel == 3 && Self::is_eeprom_window(transfer.dest) {
                self.run_eeprom_write(&transfer);
            } else if transfer.channel == 3 && Self::is_eeprom_window(transfer.source) {
                self.run_eeprom_read(&transfer);
            } else {
                let mut source = transfer.source;
                let mut dest = transfer.dest;

                for _ in 0..transfer.count {
                    if transfer.word_size == 4 {
                        let word = self.read_32(source);
                        self.write_32(dest, word);
                    } else {
                        let halfword = self.read_16(source);
                        self.write_16(dest, halfword);
                    }
                    source = source.wrapping_add_signed(transfer.source_step);
                    dest = dest.wrapping_add_signed(transfer.dest_step);
                }
            }

            if transfer.irq_on_complete {
                self.interrupt_flags |= 1 << (8 + transfer.channel); // IRQ bits 8-11: DMA0-3
            }
        }
    }

    /// EEPROM carts only ever occupy the third cartridge wait-state window;
    /// this core doesn't model the large-ROM case where EEPROM is mapped to
    /// just the last 256 bytes of it, so the whole window is treated as the
    /// EEPROM's address space.
    fn is_eeprom_window(address: u32) -> bool {
        Self::region(address) == 0xd
    }

    /// Channel 3 writing into the EEPROM window: each transferred halfword
    /// carries one command bit in its low bit.
    fn run_eeprom_write(&mut self, transfer: &super::dma::ReadyTransfer) {
        let mut source = transfer.source;
        let mut bits = Vec::with_capacity(transfer.count as usize);
        for _ in 0..transfer.count {
            bits.push((self.read_16(source) & 1) as u8);
            source = source.wrapping_add_signed(transfer.source_step);
        }
        self.eeprom.on_write_stream(&bits);
    }

    /// Channel 3 reading from the EEPROM window: the chip replies with a
    /// fixed 68-bit stream (4 don't-care bits, then the 64 latched data
    /// bits), one bit per transferred halfword.
    fn run_eeprom_read(&mut self, transfer: &super::dma::ReadyTransfer) {
        let stream = self.eeprom.read_stream();
        let mut dest = transfer.dest;
        for bit in stream.iter().take(transfer.count as usize) {
            self.write_16(dest, *bit as u16);
            dest = dest.wrapping_add_signed(transfer.dest_step);
        }
    }

    fn region(address: u32) -> u32 {
        (address >> 24) & 0xf
    }

    pub fn read_8(&mut self, address: u32) -> u8 {
        match Self::region(address) {
            0x0 => self.bios.get((address & 0x3fff) as usize).copied().unwrap_or(0),
            0x2 => self.ewram[(address & 0x3_ffff) as usize],
            0x3 => self.iwram[(address & 0x7fff) as usize],
            0x4 => self.read_io_8(address & 0x3ff),
            0x5 => self.lcd.palette_byte((address & 0x3ff) as usize),
            0x6 => self.lcd.vram_byte(Self::vram_offset(address)),
            0x7 => self.lcd.oam_byte((address & 0x3ff) as usize),
            0x8..=0x9 | 0xa..=0xb | 0xc..=0xd => {
                self.rom.get((address & 0x01ff_ffff) as usize).copied().unwrap_or(0xff)
            }
            0xe => self.sram[(address & 0xffff) as usize],
            _ => {
                log::trace!("read from unmapped address {address:#010x}, returning open bus");
                (self.last_fetch >> ((address & 0b11) * 8)) as u8
            }
        }
    }

    pub fn write_8(&mut self, address: u32, value: u8) {
        match Self::region(address) {
            0x2 => self.ewram[(address & 0x3_ffff) as usize] = value,
            0x3 => self.iwram[(address & 0x7fff) as usize] = value,
            0x4 => self.write_io_8(address & 0x3ff, value),
            0x5 => self.lcd.write_palette_halfword_mirrored(address, value),
            0x6 => self.lcd.write_vram_byte_mirrored(address, value),
            0x7 => {} // 8-bit OAM writes are dropped on real hardware
            0x8..=0x9 | 0xa..=0xb | 0xc..=0xd => {}
            0xe => self.sram[(address & 0xffff) as usize] = value,
            _ => log::warn!("write to unmapped address {address:#010x} (value {value:#04x})"),
        }
    }

    pub fn read_16(&mut self, address: u32) -> u16 {
        if address & 1 != 0 {
            let aligned = self.read_16_aligned(address & !1);
            return aligned.rotate_right(8);
        }
        self.read_16_aligned(address)
    }

    fn read_16_aligned(&mut self, address: u32) -> u16 {
        let lo = self.read_8(address) as u16;
        let hi = self.read_8(address.wrapping_add(1)) as u16;
        lo | (hi << 8)
    }

    pub fn write_16(&mut self, address: u32, value: u16) {
        let address = address & !1;
        self.write_8(address, value as u8);
        self.write_8(address.wrapping_add(1), (value >> 8) as u8);
    }

    pub fn read_32(&mut self, address: u32) -> u32 {
        let misalignment = address & 0b11;
        let aligned = self.read_32_aligned(address & !0b11);
        if misalignment == 0 { aligned } else { aligned.rotate_right(misalignment * 8) }
    }

    fn read_32_aligned(&mut self, address: u32) -> u32 {
        let b0 = self.read_8(address) as u32;
        let b1 = self.read_8(address.wrapping_add(1)) as u32;
        let b2 = self.read_8(address.wrapping_add(2)) as u32;
        let b3 = self.read_8(address.wrapping_add(3)) as u32;
        b0 | (b1 << 8) | (b2 << 16) | (b3 << 24)
    }

    pub fn write_32(&mut self, address: u32, value: u32) {
        let address = address & !0b11;
        self.write_8(address, value as u8);
        self.write_8(address.wrapping_add(1), (value >> 8) as u8);
        self.write_8(address.wrapping_add(2), (value >> 16) as u8);
        self.write_8(address.wrapping_add(3), (value >> 24) as u8);
    }

    pub fn note_fetch(&mut self, opcode: u32) {
        self.last_fetch = opcode;
    }

    fn vram_offset(address: u32) -> usize {
        // VRAM is 96KiB but decoded across a 128KiB window; the last 32KiB
        // mirror the 16KiB charblock beneath them.
        let offset = address & 0x1_ffff;
        if offset < 0x1_8000 { offset as usize } else { (offset - 0x8000) as usize }
    }

    fn read_io_8(&mut self, offset: u32) -> u8 {
        match offset {
            0x200 => self.interrupt_enable as u8,
            0x201 => (self.interrupt_enable >> 8) as u8,
            0x202 => self.interrupt_flags as u8,
            0x203 => (self.interrupt_flags >> 8) as u8,
            0x208 => self.interrupt_master_enable as u8,
            o if o < 0x60 => self.lcd.read_io_8(o),
            o if (0x100..0x110).contains(&o) => {
                let timer = ((o - 0x100) / 4) as usize;
                match (o - 0x100) % 4 {
                    0 => self.timers.counter(timer) as u8,
                    1 => (self.timers.counter(timer) >> 8) as u8,
                    _ => self.io_raw[o as usize],
                }
            }
            _ => self.io_raw[offset as usize],
        }
    }

    fn write_io_8(&mut self, offset: u32, value: u8) {
        match offset {
            0x200 => self.interrupt_enable = (self.interrupt_enable & 0xff00) | value as u16,
            0x201 => self.interrupt_enable = (self.interrupt_enable & 0x00ff) | ((value as u16) << 8),
            0x202 => self.interrupt_flags &= !(value as u16), // writing 1 acknowledges
            0x203 => self.interrupt_flags &= !((value as u16) << 8),
            0x208 => self.interrupt_master_enable = value & 1 != 0,
            _ => {
                self.io_raw[offset as usize] = value;
                self.lcd.on_io_write(offset, value);
                self.dma.on_io_write(offset, value);
                self.timers.on_io_write(offset, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn misaligned_32bit_read_rotates_by_byte_offset() {
        let mut bus = Bus::new(alloc::vec![0u8; 0x100]);
        bus.write_32(0x0200_0000, 0x1234_5678);
        let misaligned = bus.read_32(0x0200_0001);
        assert_eq!(misaligned, 0x1234_5678u32.rotate_right(8));
    }

    #[test]
    fn ewram_round_trips_a_byte() {
        let mut bus = Bus::new(alloc::vec![0u8; 0x100]);
        bus.write_8(0x0200_1000, 0xab);
        assert_eq!(bus.read_8(0x0200_1000), 0xab);
    }

    #[test]
    fn interrupt_flag_write_acknowledges_bits() {
        let mut bus = Bus::new(alloc::vec![0u8; 0x100]);
        bus.raise_interrupt(0b101);
        bus.write_io_8(0x202, 0b001);
        assert_eq!(bus.interrupt_flags, 0b100);
    }
}
