// SPDX-License-Identifier: MIT OR Apache-2.0

//! Internal serde helpers for fields which are hex strings in
//! human-readable formats and plain byte strings otherwise (CBOR).

use serde::{Deserialize, Deserializer, Serializer};
use serde_bytes::ByteBuf;

pub fn serialize_hex<S>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if serializer.is_human_readable() {
        hex::serde::serialize(value, serializer)
    } else {
        serializer.serialize_bytes(value)
    }
}

pub fn deserialize_hex<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    if deserializer.is_human_readable() {
        hex::serde::deserialize(deserializer)
    } else {
        let bytes: ByteBuf = Deserialize::deserialize(deserializer)?;
        Ok(bytes.into_vec())
    }
}
