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

use alloc::vec::Vec;

use core::ops::{Deref, DerefMut};

use crate::mmu::memory_data::MemoryDataFixedSize;
use crate::utils::SerdeSupport;


/// A struct to be used as a replacement for a `Vec`, which
/// is intended to be serialized and likely holds a large amount of data.
/// Unlike a normal `Vec`, this struct serializes its data into
/// a compressed base64 encoded string instead of a list of numbers.
#[derive(Clone)]
pub struct SerializableBuffer<T: SerdeSupport + Clone>(
    Vec<T>
);

impl<T: SerdeSupport + Clone> SerializableBuffer<T> {
    /// Get a vector containing a copy of the internal data.
    pub fn to_vec(&self) -> Vec<T> {
        self.0.clone()
    }


    /// Get the data slice stored in this object.
    pub fn as_slice(&self) -> &[T] {
        &self.0
    }
}

impl<T: SerdeSupport + Clone, const S: usize> From<[T; S]> for SerializableBuffer<T> {
    fn from(value: [T; S]) -> Self {
        Self(value.into())
    }
}

impl<const S: usize> From<MemoryDataFixedSize<S>> for SerializableBuffer<u8> {
    fn from(value: MemoryDataFixedSize<S>) -> Self {
        let array: [u8; S] = value.into();
        Self(array.into())
    }
}

impl<T: SerdeSupport + Clone> From<Vec<T>> for SerializableBuffer<T> {
    fn from(value: Vec<T>) -> Self {
        Self(value)
    }
}

impl<T: SerdeSupport + Clone> From<SerializableBuffer<T>> for Vec<T> {
    fn from(value: SerializableBuffer<T>) -> Self {
        value.0
    }
}

impl<T: SerdeSupport + Clone> Deref for SerializableBuffer<T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T: SerdeSupport + Clone> DerefMut for SerializableBuffer<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<'a, T: SerdeSupport + Clone> IntoIterator for &'a SerializableBuffer<T> {
    type Item = &'a T;
    type IntoIter = core::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<'a, T: SerdeSupport + Clone> IntoIterator for &'a mut SerializableBuffer<T> {
    type Item = &'a mut T;
    type IntoIter = core::slice::IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter_mut()
    }
}

#[cfg(feature = "serde")]
impl<T: SerdeSupport + Clone> serde::Serialize for SerializableBuffer<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
            S: serde::Serializer
    {
        serde_support::serialize_seq(serializer, &self.0)
    }
}

#[cfg(feature = "serde")]
impl<'de, T: SerdeSupport + Clone> serde::Deserialize<'de> for SerializableBuffer<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
            D: serde::Deserializer<'de>
    {
        let v = serde_support::deserialize_seq(deserializer)?;

        Ok(SerializableBuffer::from(v))
    }
}


/// Byte-buffer serde helpers shared by [SerializableBuffer] and [crate::utils::SerializableArray].
///
/// With the `snapshots` feature enabled, byte buffers are zstd-compressed and base64-encoded
/// into a single string rather than emitted as a numeric array; this keeps savestates compact
/// the way the teacher's own snapshot format does. Without `snapshots`, plain `serde`
/// (de)serialization still works on the underlying sequence.
#[cfg(feature = "serde")]
pub(crate) mod serde_support {
    use alloc::vec::Vec;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize_seq<S, T>(serializer: S, data: &[T]) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        data.serialize(serializer)
    }

    pub fn deserialize_seq<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Vec::<T>::deserialize(deserializer)
    }

    #[cfg(feature = "snapshots")]
    pub fn serialize_bytes<S>(serializer: S, data: &[u8]) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let compressed = zstd::bulk::compress(data, 0).map_err(serde::ser::Error::custom)?;
        let encoded = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, compressed);
        encoded.serialize(serializer)
    }

    #[cfg(feature = "snapshots")]
    pub fn deserialize_bytes<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = alloc::string::String::deserialize(deserializer)?;
        let compressed = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, encoded)
            .map_err(serde::de::Error::custom)?;
        zstd::bulk::decompress(&compressed, 64 * 1024 * 1024).map_err(serde::de::Error::custom)
    }

    #[cfg(not(feature = "snapshots"))]
    pub fn serialize_bytes<S>(serializer: S, data: &[u8]) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serialize_seq(serializer, data)
    }

    #[cfg(not(feature = "snapshots"))]
    pub fn deserialize_bytes<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserialize_seq(deserializer)
    }
}
