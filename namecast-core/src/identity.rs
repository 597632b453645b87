// SPDX-License-Identifier: MIT OR Apache-2.0

//! Publisher identities and the signing boundary.
//!
//! Content objects are signed by their publisher. The core never inspects
//! key material beyond this module: construction takes anything
//! implementing [`Signer`] and trust verification takes a [`PublicKey`].

use std::fmt;

use ed25519_dalek::{Signer as _, Verifier};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::serde::{deserialize_hex, serialize_hex};

/// Size of ed25519 public and private keys.
pub const KEY_LEN: usize = 32;

/// Size of ed25519 signatures.
pub const SIGNATURE_LEN: usize = 64;

/// Size of publisher digests.
pub const PUBLISHER_ID_LEN: usize = 32;

/// Capability to sign content objects on behalf of one publisher.
pub trait Signer {
    /// Digest identifying the publisher in signed metadata and in
    /// interest publisher filters.
    fn publisher_id(&self) -> PublisherId;

    fn sign(&self, bytes: &[u8]) -> Signature;
}

/// ed25519 signing key.
pub struct PrivateKey(ed25519_dalek::SigningKey);

impl PrivateKey {
    /// Generate a new signing key from the system's random source.
    pub fn new() -> Self {
        Self(ed25519_dalek::SigningKey::generate(&mut OsRng))
    }

    pub fn from_bytes(bytes: &[u8; KEY_LEN]) -> Self {
        Self(ed25519_dalek::SigningKey::from_bytes(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        self.0.as_bytes()
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.verifying_key())
    }
}

impl Default for PrivateKey {
    fn default() -> Self {
        Self::new()
    }
}

impl Signer for PrivateKey {
    fn publisher_id(&self) -> PublisherId {
        PublisherId::from_public_key(&self.public_key())
    }

    fn sign(&self, bytes: &[u8]) -> Signature {
        Signature(self.0.sign(bytes))
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Key material stays out of logs.
        write!(f, "PrivateKey({})", self.public_key())
    }
}

/// ed25519 verifying key of a publisher.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(ed25519_dalek::VerifyingKey);

impl PublicKey {
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        self.0.as_bytes()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0.as_bytes())
    }

    pub fn verify(&self, bytes: &[u8], signature: &Signature) -> bool {
        self.0.verify(bytes, &signature.0).is_ok()
    }
}

impl TryFrom<&[u8]> for PublicKey {
    type Error = IdentityError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let checked: [u8; KEY_LEN] = value
            .try_into()
            .map_err(|_| IdentityError::InvalidLength(value.len(), KEY_LEN))?;
        let key = ed25519_dalek::VerifyingKey::from_bytes(&checked)
            .map_err(|_| IdentityError::InvalidPublicKey)?;
        Ok(Self(key))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

/// ed25519 signature over the signing-relevant fields of a content object.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(ed25519_dalek::Signature);

impl Signature {
    pub fn to_bytes(self) -> [u8; SIGNATURE_LEN] {
        self.0.to_bytes()
    }
}

impl From<[u8; SIGNATURE_LEN]> for Signature {
    fn from(value: [u8; SIGNATURE_LEN]) -> Self {
        Self(ed25519_dalek::Signature::from_bytes(&value))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", hex::encode(self.0.to_bytes()))
    }
}

impl Serialize for Signature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serialize_hex(&self.0.to_bytes(), serializer)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bytes = deserialize_hex(deserializer)?;
        let checked: [u8; SIGNATURE_LEN] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| serde::de::Error::custom("invalid signature length"))?;
        Ok(Self::from(checked))
    }
}

/// 32-byte BLAKE3 digest of a publisher's public key.
///
/// This is the value carried in [`SignedInfo`](crate::SignedInfo) and
/// matched against interest publisher filters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublisherId([u8; PUBLISHER_ID_LEN]);

impl PublisherId {
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        Self(*blake3::hash(public_key.as_bytes()).as_bytes())
    }

    pub const fn from_bytes(bytes: [u8; PUBLISHER_ID_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; PUBLISHER_ID_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for PublisherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for PublisherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublisherId({})", self.to_hex())
    }
}

impl Serialize for PublisherId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serialize_hex(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for PublisherId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bytes = deserialize_hex(deserializer)?;
        let checked: [u8; PUBLISHER_ID_LEN] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| serde::de::Error::custom("invalid publisher digest length"))?;
        Ok(Self(checked))
    }
}

/// Error types for identity material.
#[derive(Error, Debug)]
pub enum IdentityError {
    /// Key or digest bytes have an invalid length.
    #[error("invalid length {0} bytes, expected {1} bytes")]
    InvalidLength(usize, usize),

    /// Bytes do not form a valid ed25519 public key.
    #[error("invalid ed25519 public key")]
    InvalidPublicKey,
}

#[cfg(test)]
mod tests {
    use super::{PrivateKey, PublicKey, PublisherId, Signer};

    #[test]
    fn sign_and_verify() {
        let key = PrivateKey::new();
        let signature = key.sign(b"some named data");
        assert!(key.public_key().verify(b"some named data", &signature));
        assert!(!key.public_key().verify(b"other data", &signature));
    }

    #[test]
    fn publisher_id_is_stable() {
        let key = PrivateKey::new();
        let a = key.publisher_id();
        let b = PublisherId::from_public_key(&key.public_key());
        assert_eq!(a, b);
        assert_ne!(a, PrivateKey::new().publisher_id());
    }

    #[test]
    fn public_key_round_trip() {
        let key = PrivateKey::new();
        let public = key.public_key();
        let again = PublicKey::try_from(public.as_bytes().as_slice()).unwrap();
        assert_eq!(public, again);
    }
}
