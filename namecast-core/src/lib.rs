// SPDX-License-Identifier: MIT OR Apache-2.0

//! Data-types for the client-side data plane of a content-centric network.
//!
//! Producers publish immutable, named, signed [`ContentObject`]s; consumers
//! pull content by issuing [`Interest`]s, named queries with matching
//! constraints. This crate holds the pure parts of that protocol: the
//! hierarchical [`ContentName`] model and its canonical ordering, the
//! interest matching predicate, the versioning and segmentation naming
//! profiles and the signing boundary. The stateful plumbing (pending
//! interests, flow control, cache invalidation) lives in `namecast-client`.

pub mod cbor;
pub mod identity;
pub mod interest;
pub mod matching;
pub mod name;
pub mod object;
pub mod profiles;
mod serde;

pub use identity::{IdentityError, PrivateKey, PublicKey, PublisherId, Signature, Signer};
pub use interest::{AnswerOriginKind, ChildSelector, Exclude, Interest, Nonce};
pub use name::{Component, ContentName, NameError};
pub use object::{ContentObject, ContentType, ObjectDigest, SignedInfo};
