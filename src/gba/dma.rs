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

//! The 4-channel DMA engine. [DmaController] only latches register state and
//! decides *when* a channel is ready to run (the trigger matrix); the actual
//! byte copy happens in [crate::gba::bus::Bus], since only the bus has both
//! the channel parameters and memory in scope at once. Each ready transfer
//! completes in full the tick it fires rather than draining one unit per
//! cycle, which is close enough for DMA's usual role of bulk VRAM/audio
//! transfers and keeps the channel state machine simple.

use alloc::vec::Vec;

const CHANNEL_COUNT: usize = 4;
const STARTUP_DELAY_CYCLES: u8 = 2;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StartTiming {
    Immediate,
    VBlank,
    HBlank,
    Special,
}

impl StartTiming {
    fn from_bits(bits: u16) -> Self {
        match bits & 0b11 {
            0 => StartTiming::Immediate,
            1 => StartTiming::VBlank,
            2 => StartTiming::HBlank,
            _ => StartTiming::Special,
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AddrControl {
    Increment,
    Decrement,
    Fixed,
    IncrementReload,
}

impl AddrControl {
    fn from_bits(bits: u16) -> Self {
        match bits & 0b11 {
            0 => AddrControl::Increment,
            1 => AddrControl::Decrement,
            2 => AddrControl::Fixed,
            _ => AddrControl::IncrementReload,
        }
    }

    fn step(self, word_size: u32) -> i32 {
        match self {
            AddrControl::Increment | AddrControl::IncrementReload => word_size as i32,
            AddrControl::Decrement => -(word_size as i32),
            AddrControl::Fixed => 0,
        }
    }
}

#[derive(Copy, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
struct DmaChannel {
    source: u32,
    dest: u32,
    count: u16,
    control: u16,
    /// Cycles left before an enabled channel becomes armed and can respond
    /// to its trigger; real hardware takes 2 cycles to latch the channel's
    /// parameters before it can run.
    startup_delay: u8,
}

impl DmaChannel {
    fn enabled(&self) -> bool { self.control & (1 << 15) != 0 }
    fn irq_on_complete(&self) -> bool { self.control & (1 << 14) != 0 }
    fn start_timing(&self) -> StartTiming { StartTiming::from_bits(self.control >> 12) }
    fn word_size(&self) -> u32 { if self.control & (1 << 10) != 0 { 4 } else { 2 } }
    fn repeat(&self) -> bool { self.control & (1 << 9) != 0 }
    fn source_control(&self) -> AddrControl { AddrControl::from_bits(self.control >> 7) }
    fn dest_control(&self) -> AddrControl { AddrControl::from_bits(self.control >> 5) }
}

/// Parameters for a single ready-to-run transfer, extracted from the
/// triggering channel so the bus can perform the copy without holding a
/// borrow on the controller.
pub struct ReadyTransfer {
    pub channel: usize,
    pub source: u32,
    pub dest: u32,
    pub count: u32,
    pub word_size: u32,
    pub source_step: i32,
    pub dest_step: i32,
    pub irq_on_complete: bool,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DmaController {
    channels: [DmaChannel; CHANNEL_COUNT],
    #[cfg_attr(feature = "serde", serde(skip))]
    pending: [bool; CHANNEL_COUNT],
}

impl DmaController {
    pub fn new() -> Self {
        Self {
            channels: [DmaChannel::default(); CHANNEL_COUNT],
            pending: [false; CHANNEL_COUNT],
        }
    }

    pub fn on_vblank(&mut self) {
        for (index, channel) in self.channels.iter().enumerate() {
            if channel.enabled() && channel.startup_delay == 0 && channel.start_timing() == StartTiming::VBlank {
                self.pending[index] = true;
            }
        }
    }

    pub fn on_hblank(&mut self) {
        for (index, channel) in self.channels.iter().enumerate() {
            if channel.enabled() && channel.startup_delay == 0 && channel.start_timing() == StartTiming::HBlank {
                self.pending[index] = true;
            }
        }
    }

    /// Channels 1/2's FIFO-timer trigger and channel 3's cartridge DRQ both
    /// fall under "special" timing; callers identify which channel applies.
    pub fn on_special_trigger(&mut self, channel: usize) {
        if channel >= CHANNEL_COUNT {
            return;
        }
        let ch = &self.channels[channel];
        if ch.enabled() && ch.startup_delay == 0 && ch.start_timing() == StartTiming::Special {
            self.pending[channel] = true;
        }
    }

    /// Counts down every enabled channel's start-up delay; a channel whose
    /// delay reaches zero becomes armed and, if it times on the immediate
    /// trigger, is ready to run the same cycle (per §4.5's state machine).
    pub fn tick_startup_delays(&mut self, cycles: u32) {
        for (index, channel) in self.channels.iter_mut().enumerate() {
            if channel.startup_delay == 0 {
                continue;
            }
            let reduction = cycles.min(channel.startup_delay as u32) as u8;
            channel.startup_delay -= reduction;
            if channel.startup_delay == 0 && channel.enabled() && channel.start_timing() == StartTiming::Immediate {
                self.pending[index] = true;
            }
        }
    }

    pub fn on_io_write(&mut self, offset: u32, value: u8) {
        let Some((channel, field)) = Self::decode_register(offset) else { return };
        let ch = &mut self.channels[channel];

        match field {
            RegisterField::SourceByte(shift) => {
                ch.source = (ch.source & !(0xff << shift)) | ((value as u32) << shift);
            }
            RegisterField::DestByte(shift) => {
                ch.dest = (ch.dest & !(0xff << shift)) | ((value as u32) << shift);
            }
            RegisterField::CountByte(shift) => {
                ch.count = (ch.count & !(0xff << shift)) | ((value as u16) << shift);
            }
            RegisterField::ControlByte(shift) => {
                let was_enabled = ch.enabled();
                ch.control = (ch.control & !(0xff << shift)) | ((value as u16) << shift);
                if !was_enabled && ch.enabled() {
                    ch.startup_delay = STARTUP_DELAY_CYCLES;
                }
            }
        }
    }

    fn decode_register(offset: u32) -> Option<(usize, RegisterField)> {
        // DMA0 registers begin at IO offset 0xB0, each channel block is 12
        // bytes (source u32, dest u32, count u16, control u16).
        if !(0xb0..0xe0).contains(&offset) {
            return None;
        }
        let relative = offset - 0xb0;
        let channel = (relative / 12) as usize;
        let field_offset = relative % 12;

        let field = match field_offset {
            0..=3 => RegisterField::SourceByte(field_offset * 8),
            4..=7 => RegisterField::DestByte((field_offset - 4) * 8),
            8..=9 => RegisterField::CountByte((field_offset - 8) * 8),
            10..=11 => RegisterField::ControlByte((field_offset - 10) * 8),
            _ => return None,
        };

        Some((channel, field))
    }

    /// Pops one ready transfer (if any), clearing its trigger and disabling
    /// the channel unless it repeats.
    pub fn take_ready(&mut self) -> Option<ReadyTransfer> {
        let index = self.pending.iter().position(|&p| p)?;
        self.pending[index] = false;

        let channel = self.channels[index];
        let word_size = channel.word_size();
        let count = if channel.count == 0 { 0x1_0000 } else { channel.count as u32 };

        if !channel.repeat() {
            self.channels[index].control &= !(1 << 15);
        }

        Some(ReadyTransfer {
            channel: index,
            source: channel.source,
            dest: channel.dest,
            count,
            word_size,
            source_step: channel.source_control().step(word_size),
            dest_step: channel.dest_control().step(word_size),
            irq_on_complete: channel.irq_on_complete(),
        })
    }
}

impl Default for DmaController {
    fn default() -> Self {
        Self::new()
    }
}

enum RegisterField {
    SourceByte(u32),
    DestByte(u32),
    CountByte(u32),
    ControlByte(u32),
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
enum EepromSize {
    Small, // 4 Kbit / 512 B, 6-bit address
    Large, // 64 Kbit / 8 KB, 14-bit address
}

impl EepromSize {
    fn address_bits(self) -> u32 {
        match self {
            EepromSize::Small => 6,
            EepromSize::Large => 14,
        }
    }

    fn byte_len(self) -> usize {
        match self {
            EepromSize::Small => 512,
            EepromSize::Large => 8192,
        }
    }
}

/// The cartridge channel's EEPROM backend. Real EEPROM carts serialize every
/// read/write as a stream of single-bit halfwords over DMA3; the chip has no
/// register interface of its own, so the whole protocol is driven by how
/// many bits the triggering transfer carries.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Eeprom {
    size: Option<EepromSize>,
    storage: Vec<u8>,
    read_latch: u64,
}

impl Eeprom {
    pub fn new() -> Self {
        Self { size: None, storage: Vec::new(), read_latch: 0 }
    }

    fn lock_size(&mut self, size: EepromSize) {
        if self.size.is_none() {
            self.storage = alloc::vec![0u8; size.byte_len()];
            self.size = Some(size);
        }
    }

    /// Consumes the bit stream of a write-direction DMA into the EEPROM
    /// window: a 2-bit opcode, an address, and (for writes) 64 data bits.
    /// The stream's own length distinguishes a 6-bit from a 14-bit address
    /// (9/17 bits for a read's address-set, 73/81 bits for a write), and the
    /// first command observed locks the chip's size for the session.
    pub fn on_write_stream(&mut self, bits: &[u8]) {
        if bits.len() < 2 {
            return;
        }
        let is_write = bits[0] == 1 && bits[1] == 0;
        let size = if is_write {
            if bits.len() >= 73 { EepromSize::Large } else { EepromSize::Small }
        } else if bits.len() >= 17 {
            EepromSize::Large
        } else {
            EepromSize::Small
        };
        self.lock_size(size);
        let size = self.size.unwrap_or(size);

        let mut cursor = 2usize;
        let mut address = 0u32;
        for _ in 0..size.address_bits() {
            address = (address << 1) | *bits.get(cursor).unwrap_or(&0) as u32;
            cursor += 1;
        }

        let row = address as usize * 8;
        if is_write {
            let mut data = 0u64;
            for _ in 0..64 {
                data = (data << 1) | *bits.get(cursor).unwrap_or(&0) as u64;
                cursor += 1;
            }
            if row + 8 <= self.storage.len() {
                self.storage[row..row + 8].copy_from_slice(&data.to_be_bytes());
            }
        } else if row + 8 <= self.storage.len() {
            self.read_latch = u64::from_be_bytes(self.storage[row..row + 8].try_into().unwrap());
        } else {
            self.read_latch = 0;
        }
    }

    /// Produces the bit stream for a read-direction DMA: 4 don't-care bits
    /// followed by the 64 data bits latched by the most recent address-set.
    pub fn read_stream(&self) -> [u8; 68] {
        let mut out = [0u8; 68];
        for i in 0..64 {
            out[4 + i] = ((self.read_latch >> (63 - i)) & 1) as u8;
        }
        out
    }
}

impl Default for Eeprom {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn immediate_start_timing_arms_on_enable_bit_transition() {
        let mut dma = DmaController::new();
        // enable bit (15) set, start timing bits (13-12) = 00 (immediate)
        dma.on_io_write(0xba, 0x00);
        dma.on_io_write(0xbb, 0x80);
        assert!(dma.take_ready().is_none()); // still in the 2-cycle start-up delay
        dma.tick_startup_delays(2);
        assert!(dma.take_ready().is_some());
    }

    #[test]
    fn vblank_channel_only_arms_on_vblank_event() {
        let mut dma = DmaController::new();
        // start timing = vblank (01 at bits13-12), enable bit set
        dma.on_io_write(0xba, 0x00);
        dma.on_io_write(0xbb, 0x90);
        dma.on_vblank();
        assert!(dma.take_ready().is_none()); // not armed yet: still mid start-up delay
        dma.tick_startup_delays(2);
        dma.on_vblank();
        assert!(dma.take_ready().is_some());
    }

    #[test]
    fn non_repeating_channel_disables_after_running() {
        let mut dma = DmaController::new();
        dma.on_io_write(0xba, 0x00);
        dma.on_io_write(0xbb, 0x80);
        dma.tick_startup_delays(2);
        let _ = dma.take_ready();
        assert!(!dma.channels[0].enabled());
    }

    #[test]
    fn eeprom_write_then_read_round_trips_through_the_address_set() {
        let mut eeprom = Eeprom::new();
        // opcode 10 (write), 6-bit address 0b000001, 64 bits of data (all 1s)
        let mut write_bits = alloc::vec![1u8, 0];
        write_bits.extend([0, 0, 0, 0, 0, 1]);
        write_bits.extend(core::iter::repeat(1u8).take(64));
        eeprom.on_write_stream(&write_bits);

        // opcode 11 (read address-set), same 6-bit address
        let mut read_request = alloc::vec![1u8, 1];
        read_request.extend([0, 0, 0, 0, 0, 1]);
        eeprom.on_write_stream(&read_request);

        let stream = eeprom.read_stream();
        assert!(stream[..4].iter().all(|&bit| bit == 0));
        assert!(stream[4..].iter().all(|&bit| bit == 1));
    }
}
