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

//! Savestates: the whole [GameBoy] serializes through `serde` (its large byte
//! buffers already compress themselves via [crate::utils::SerializableArray]/
//! [crate::utils::SerializableBuffer]), `bincode` frames that into bytes.

use alloc::vec::Vec;

use crate::gameboy::GameBoy;

/// Bumped whenever the on-disk shape of [GameBoy]'s state changes in a way
/// older snapshots can't be decoded against.
const SNAPSHOT_FORMAT_VERSION: u32 = 1;

#[derive(Debug)]
pub enum SnapshotError {
    Encode(alloc::string::String),
    Decode(alloc::string::String),
    UnsupportedVersion { found: u32, supported: u32 },
}

#[cfg(feature = "std")]
impl std::fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotError::Encode(msg) => write!(f, "failed to encode snapshot: {msg}"),
            SnapshotError::Decode(msg) => write!(f, "failed to decode snapshot: {msg}"),
            SnapshotError::UnsupportedVersion { found, supported } => {
                write!(f, "snapshot format version {found} is newer than the supported version {supported}")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for SnapshotError {}


#[derive(serde::Serialize)]
struct SnapshotEnvelopeOut<'a> {
    version: u32,
    machine: &'a GameBoy,
}

#[derive(serde::Deserialize)]
struct SnapshotEnvelopeIn {
    version: u32,
    machine: GameBoy,
}

/// Serializes a running machine's complete state into a compact byte buffer.
pub fn save_snapshot(gameboy: &GameBoy) -> Result<Vec<u8>, SnapshotError> {
    let envelope = SnapshotEnvelopeOut {
        version: SNAPSHOT_FORMAT_VERSION,
        machine: gameboy,
    };

    bincode::serde::encode_to_vec(&envelope, bincode::config::standard())
        .map_err(|e| SnapshotError::Encode(alloc::format!("{e}")))
}

/// Restores a machine from a buffer produced by [save_snapshot].
pub fn load_snapshot(bytes: &[u8]) -> Result<GameBoy, SnapshotError> {
    let (envelope, _): (SnapshotEnvelopeIn, usize) =
        bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| SnapshotError::Decode(alloc::format!("{e}")))?;

    if envelope.version > SNAPSHOT_FORMAT_VERSION {
        log::warn!(
            "snapshot version {} is newer than the {} this build supports",
            envelope.version,
            SNAPSHOT_FORMAT_VERSION
        );
        return Err(SnapshotError::UnsupportedVersion {
            found: envelope.version,
            supported: SNAPSHOT_FORMAT_VERSION,
        });
    }

    Ok(envelope.machine)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::cpu::RegisterR8;

    fn build_machine() -> GameBoy {
        GameBoy::build().finish().expect("machine without a cartridge still builds")
    }

    #[test]
    fn snapshot_round_trips_cpu_register_state() {
        let mut gb = build_machine();
        gb.cpu.set_r8(RegisterR8::A, 0x42);

        let bytes = save_snapshot(&gb).expect("encode");
        let restored = load_snapshot(&bytes).expect("decode");

        assert_eq!(restored.cpu.get_r8(RegisterR8::A), 0x42);
    }

    #[test]
    fn rejects_snapshot_from_a_newer_format_version() {
        let machine = build_machine();
        let envelope = SnapshotEnvelopeOut {
            version: SNAPSHOT_FORMAT_VERSION + 1,
            machine: &machine,
        };
        let bytes = bincode::serde::encode_to_vec(&envelope, bincode::config::standard()).expect("encode");

        match load_snapshot(&bytes) {
            Err(SnapshotError::UnsupportedVersion { .. }) => {}
            other => panic!("expected UnsupportedVersion, got {other:?}"),
        }
    }
}
