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

//! Super-adapter command stream: the subset of the 32 possible SGB commands
//! this core cares about, plus the border-ready gate. Commands arrive as
//! 16-byte packets (the joypad-register bit-serial framing that assembles
//! them lives in [crate::input::Input]).

const SYSTEM_PALETTE_COUNT: usize = 4;
const COLORS_PER_PALETTE: usize = 4;
const ATTR_TILES_WIDE: usize = 20;
const ATTR_TILES_HIGH: usize = 18;

#[derive(Copy, Clone, Eq, PartialEq)]
pub enum MaskMode {
    Disabled,
    Freeze,
    Black,
    Color0,
}

#[derive(Copy, Clone, Eq, PartialEq)]
enum Command {
    Pal01,
    Pal23,
    Pal03,
    Pal12,
    PalSet,
    PalTrn,
    AttrTrn,
    MaskEn,
    ChrTrn,
    PicTrn,
    Unhandled,
}

impl Command {
    fn from_id(id: u8) -> Self {
        match id {
            0x00 => Command::Pal01,
            0x01 => Command::Pal23,
            0x02 => Command::Pal03,
            0x03 => Command::Pal12,
            0x0a => Command::PalSet,
            0x0b => Command::PalTrn,
            0x0f => Command::AttrTrn,
            0x11 => Command::MaskEn,
            0x13 => Command::ChrTrn,
            0x14 => Command::PicTrn,
            _ => Command::Unhandled,
        }
    }
}


/// State machine driving the Super-adapter border renderer and its four
/// system background palettes.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SgbController {
    system_palettes: [[u16; COLORS_PER_PALETTE]; SYSTEM_PALETTE_COUNT],
    attribute_map: [u8; ATTR_TILES_WIDE * ATTR_TILES_HIGH],
    mask_mode: MaskModeSerde,

    chr_received: bool,
    pic_received: bool,
    pal_received: bool,

    #[cfg_attr(feature = "serde", serde(skip))]
    border_ready: bool,
}

#[derive(Copy, Clone)]
struct MaskModeSerde(MaskMode);

impl Default for MaskModeSerde {
    fn default() -> Self {
        MaskModeSerde(MaskMode::Disabled)
    }
}

impl SgbController {
    pub fn new() -> Self {
        Self {
            system_palettes: [[0; COLORS_PER_PALETTE]; SYSTEM_PALETTE_COUNT],
            attribute_map: [0; ATTR_TILES_WIDE * ATTR_TILES_HIGH],
            mask_mode: MaskModeSerde::default(),
            chr_received: false,
            pic_received: false,
            pal_received: false,
            border_ready: false,
        }
    }

    pub fn mask_mode(&self) -> MaskMode {
        self.mask_mode.0
    }

    pub fn system_palette(&self, index: usize) -> [u16; COLORS_PER_PALETTE] {
        self.system_palettes[index & 0b11]
    }

    pub fn palette_for_tile(&self, tile_x: usize, tile_y: usize) -> usize {
        if tile_x >= ATTR_TILES_WIDE || tile_y >= ATTR_TILES_HIGH {
            return 0;
        }

        self.attribute_map[tile_y * ATTR_TILES_WIDE + tile_x] as usize & 0b11
    }

    /// Whether the border image is complete and may be drawn: CHR, PIC and
    /// PAL data must each have arrived at least once since reset.
    pub fn border_ready(&self) -> bool {
        self.border_ready
    }

    /// Feeds one assembled 16-byte SGB command packet into the controller.
    pub fn receive_packet(&mut self, packet: &[u8; 16]) {
        let command = Command::from_id(packet[0] >> 3);

        match command {
            Command::Pal01 => self.load_two_palettes(packet, 0, 1),
            Command::Pal23 => self.load_two_palettes(packet, 2, 3),
            Command::Pal03 => self.load_two_palettes(packet, 0, 3),
            Command::Pal12 => self.load_two_palettes(packet, 1, 2),
            Command::PalSet => self.pal_received = true,
            Command::PalTrn => self.pal_received = true,
            Command::AttrTrn => self.pic_received = true,
            Command::ChrTrn => self.chr_received = true,
            Command::PicTrn => self.pic_received = true,
            Command::MaskEn => {
                self.mask_mode.0 = match packet[1] & 0b11 {
                    0 => MaskMode::Disabled,
                    1 => MaskMode::Freeze,
                    2 => MaskMode::Black,
                    _ => MaskMode::Color0,
                };
            }
            Command::Unhandled => {}
        }

        self.border_ready = self.chr_received && self.pic_received && self.pal_received;
    }

    fn load_two_palettes(&mut self, packet: &[u8; 16], first: usize, second: usize) {
        for (slot, palette_index) in [first, second].into_iter().enumerate() {
            for color in 0..COLORS_PER_PALETTE {
                let offset = 1 + slot * 8 + color * 2;
                let lo = packet[offset] as u16;
                let hi = packet[offset + 1] as u16;
                self.system_palettes[palette_index][color] = lo | (hi << 8);
            }
        }
    }

    pub fn set_attribute(&mut self, tile_x: usize, tile_y: usize, palette: u8) {
        if tile_x < ATTR_TILES_WIDE && tile_y < ATTR_TILES_HIGH {
            self.attribute_map[tile_y * ATTR_TILES_WIDE + tile_x] = palette & 0b11;
        }
    }
}

impl Default for SgbController {
    fn default() -> Self {
        Self::new()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn packet_for(command_id: u8) -> [u8; 16] {
        let mut packet = [0u8; 16];
        packet[0] = command_id << 3;
        packet
    }

    #[test]
    fn border_not_ready_until_all_three_kinds_arrive() {
        let mut sgb = SgbController::new();
        assert!(!sgb.border_ready());

        sgb.receive_packet(&packet_for(0x13)); // CHR_TRN
        assert!(!sgb.border_ready());

        sgb.receive_packet(&packet_for(0x14)); // PIC_TRN
        assert!(!sgb.border_ready());

        sgb.receive_packet(&packet_for(0x0b)); // PAL_TRN
        assert!(sgb.border_ready());
    }

    #[test]
    fn pal01_loads_two_palettes_from_packet_body() {
        let mut sgb = SgbController::new();
        let mut packet = packet_for(0x00);
        packet[1] = 0x34; // palette 0, color 0 low byte
        packet[2] = 0x12; // palette 0, color 0 high byte
        sgb.receive_packet(&packet);
        assert_eq!(sgb.system_palette(0)[0], 0x1234);
    }

    #[test]
    fn mask_en_selects_black_mode() {
        let mut sgb = SgbController::new();
        let mut packet = packet_for(0x11);
        packet[1] = 0b10;
        sgb.receive_packet(&packet);
        assert_eq!(sgb.mask_mode(), MaskMode::Black);
    }

    #[test]
    fn attribute_lookup_returns_assigned_palette() {
        let mut sgb = SgbController::new();
        sgb.set_attribute(5, 5, 2);
        assert_eq!(sgb.palette_for_tile(5, 5), 2);
        assert_eq!(sgb.palette_for_tile(0, 0), 0);
    }
}
