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

flags! {
    /// Events raised by components while running, collected and returned
    /// to the caller of [crate::gameboy::GameBoy::run_frame] /
    /// [crate::gameboy::GameBoy::run_single_step].
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub enum DebugEvent: u16 {
        /// The PPU completed rendering of one full frame.
        PpuFrameCompleted,

        /// The CPU executed an opcode which is not implemented.
        UnknownOpcode,

        /// The serial port finished a byte transfer.
        SerialTransferCompleted,

        /// The Super-adapter border received CHR+PIC+PAL since the last reset
        /// and is ready to be rendered.
        SgbBorderReady,
    }
}

/// A set of [DebugEvent]s.
pub type DebugEvents = FlagSet<DebugEvent>;
