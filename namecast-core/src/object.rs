// SPDX-License-Identifier: MIT OR Apache-2.0

//! Immutable published content objects.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::cbor::encode_cbor;
use crate::identity::{PublicKey, PublisherId, Signature, Signer};
use crate::name::ContentName;
use crate::serde::{deserialize_hex, serialize_hex};

/// Kind of data carried by a content object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ContentType {
    #[default]
    Data,
    Key,
    Link,
    Nack,
}

/// Signed metadata of a content object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedInfo {
    /// Digest of the publisher's public key.
    pub publisher: PublisherId,

    /// Milliseconds since the Unix epoch at object construction.
    pub timestamp: u64,

    pub content_type: ContentType,

    /// How long, in seconds, a cache should consider this object fresh.
    /// `None` means no freshness bound.
    pub freshness_seconds: Option<u64>,
}

/// An immutable, named, signed unit of published data.
///
/// Created once by a producer, then buffered, delivered to zero or more
/// matching interests and finally evicted or retained in a local cache.
/// Never mutated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentObject {
    pub name: ContentName,
    pub signed_info: SignedInfo,
    #[serde(serialize_with = "serialize_hex", deserialize_with = "deserialize_hex")]
    pub content: Vec<u8>,
    pub signature: Signature,
}

// Fields covered by the signature, in signing order.
#[derive(Serialize)]
struct Signable<'a> {
    name: &'a ContentName,
    signed_info: &'a SignedInfo,
    #[serde(with = "serde_bytes")]
    content: &'a [u8],
}

impl ContentObject {
    /// Build and sign a content object with [`ContentType::Data`] and no
    /// freshness bound.
    pub fn build<S: Signer + ?Sized>(
        name: ContentName,
        content: impl Into<Vec<u8>>,
        signer: &S,
    ) -> Self {
        Self::build_with(name, content, ContentType::Data, None, signer)
    }

    /// Build and sign a content object with explicit metadata.
    pub fn build_with<S: Signer + ?Sized>(
        name: ContentName,
        content: impl Into<Vec<u8>>,
        content_type: ContentType,
        freshness_seconds: Option<u64>,
        signer: &S,
    ) -> Self {
        let content = content.into();
        let signed_info = SignedInfo {
            publisher: signer.publisher_id(),
            timestamp: now_millis(),
            content_type,
            freshness_seconds,
        };
        let signature = signer.sign(&signable_bytes(&name, &signed_info, &content));
        Self {
            name,
            signed_info,
            content,
            signature,
        }
    }

    /// Verify the signature against the claimed publisher's public key.
    ///
    /// The caller is responsible for checking that `public_key` digests to
    /// `signed_info.publisher`; this core treats trust decisions as
    /// external.
    pub fn verify(&self, public_key: &PublicKey) -> bool {
        let bytes = signable_bytes(&self.name, &self.signed_info, &self.content);
        public_key.verify(&bytes, &self.signature)
    }

    /// Digest identifying this object instance, used to deduplicate
    /// deliveries.
    pub fn digest(&self) -> ObjectDigest {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&signable_bytes(&self.name, &self.signed_info, &self.content));
        hasher.update(&self.signature.to_bytes());
        ObjectDigest(*hasher.finalize().as_bytes())
    }
}

fn signable_bytes(name: &ContentName, signed_info: &SignedInfo, content: &[u8]) -> Vec<u8> {
    encode_cbor(&Signable {
        name,
        signed_info,
        content,
    })
    // In-memory CBOR encoding of plain serializable fields cannot fail.
    .expect("CBOR encoding of in-memory value failed")
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

/// 32-byte BLAKE3 digest over a whole content object.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectDigest([u8; 32]);

impl ObjectDigest {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ObjectDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for ObjectDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectDigest({})", self)
    }
}
