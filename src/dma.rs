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

//! OAM DMA (all device families) and the CGB general-purpose/HBlank VRAM DMA.
//!
//! Unlike the other peripherals, DMA needs to read and write *across* the
//! whole bus (cartridge, WRAM, VRAM, OAM), so it holds only latched register
//! state here; [crate::mmu::mmu::Mmu] performs the actual byte copies, since
//! only the MMU has a view of every other component at once.

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Eq, PartialEq)]
pub enum HdmaMode {
    General,
    HBlank,
}


/// Register state for both DMA mechanisms. All actual copying happens in
/// [crate::mmu::mmu::Mmu::update] and in the OAM-DMA special case of
/// [crate::mmu::mmu::Mmu::write_u8].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Dma {
    /// Source page last written to FF46, kept only for register read-back.
    oam_dma_register: u8,

    /// Remaining bytes of an in-flight OAM DMA transfer (counts down from 0xa0).
    pub oam_dma_remaining: u16,
    pub oam_dma_source: u16,

    hdma_src: u16,
    hdma_dst: u16,
    hdma_mode: Option<HdmaMode>,
    hdma_length_remaining: u16,
}

impl Dma {
    pub fn new() -> Self {
        Self {
            oam_dma_register: 0xff,
            oam_dma_remaining: 0,
            oam_dma_source: 0,
            hdma_src: 0,
            hdma_dst: 0,
            hdma_mode: None,
            hdma_length_remaining: 0,
        }
    }

    pub fn is_oam_dma_active(&self) -> bool {
        self.oam_dma_remaining > 0
    }

    pub fn start_oam_dma(&mut self, page: u8) {
        self.oam_dma_register = page;
        self.oam_dma_source = (page as u16) << 8;
        self.oam_dma_remaining = 0xa0;
    }

    pub fn read_oam_dma_register(&self) -> u8 {
        self.oam_dma_register
    }

    #[cfg(feature = "cgb")]
    pub fn read_hdma(&self, address: u16) -> u8 {
        match address & 0xf {
            0x1 => (self.hdma_src >> 8) as u8,
            0x2 => self.hdma_src as u8,
            0x3 => (self.hdma_dst >> 8) as u8,
            0x4 => self.hdma_dst as u8,
            0x5 => {
                if self.hdma_mode.is_some() {
                    ((self.hdma_length_remaining / 0x10).wrapping_sub(1)) as u8 & 0x7f
                } else {
                    0xff
                }
            }
            _ => 0xff,
        }
    }

    #[cfg(feature = "cgb")]
    pub fn write_hdma(&mut self, address: u16, value: u8) -> Option<(HdmaMode, u16, u16, u16)> {
        match address & 0xf {
            0x1 => { self.hdma_src = (self.hdma_src & 0x00ff) | ((value as u16) << 8); None }
            0x2 => { self.hdma_src = (self.hdma_src & 0xff00) | (value & 0xf0) as u16; None }
            0x3 => { self.hdma_dst = (self.hdma_dst & 0x00ff) | (((value & 0x1f) as u16) << 8); None }
            0x4 => { self.hdma_dst = (self.hdma_dst & 0xff00) | (value & 0xf0) as u16; None }
            0x5 => {
                // An HBlank transfer in progress can be cancelled by writing bit 7 = 0.
                if self.hdma_mode == Some(HdmaMode::HBlank) && (value & 0x80) == 0 {
                    self.hdma_mode = None;
                    return None;
                }

                let length = ((value as u16 & 0x7f) + 1) * 0x10;
                let mode = if (value & 0x80) != 0 { HdmaMode::HBlank } else { HdmaMode::General };

                let src = self.hdma_src;
                let dst = 0x8000 + self.hdma_dst;

                self.hdma_length_remaining = length;
                self.hdma_mode = Some(mode);

                Some((mode, src, dst, length))
            }
            _ => None,
        }
    }

    #[cfg(feature = "cgb")]
    pub fn take_hblank_chunk(&mut self) -> Option<(u16, u16, u16)> {
        if self.hdma_mode != Some(HdmaMode::HBlank) || self.hdma_length_remaining == 0 {
            return None;
        }

        let src = self.hdma_src;
        let dst = self.hdma_dst + 0x8000;
        let chunk = 0x10;

        self.hdma_src = self.hdma_src.wrapping_add(chunk);
        self.hdma_dst = self.hdma_dst.wrapping_add(chunk);
        self.hdma_length_remaining -= chunk;

        if self.hdma_length_remaining == 0 {
            self.hdma_mode = None;
        }

        Some((src, dst, chunk))
    }
}
