// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stateful client plane for content-centric applications.
//!
//! A [`Handle`] is the context object every operation goes through: it
//! keeps the pending-interest table, registered producer filters and a
//! local content store standing in for the forwarding daemon's cache.
//! Producers push signed objects through a [`FlowControl`] buffer that
//! holds them until a matching interest arrives; consumers pull with
//! `get`, `express_interest` and `enumerate`. [`CacheManager`] speaks the
//! mark-stale invalidation protocol against the local store.
//!
//! The pure data-types (names, interests, content objects, matching)
//! live in `namecast-core`.

pub mod cache;
pub mod config;
pub mod flow;
pub mod handle;
pub mod store;
pub mod traits;

pub use cache::{CacheError, CacheManager};
pub use config::{FlowConfig, HandleConfig};
pub use flow::{FlowControl, FlowError};
pub use handle::{Handle, HandleError};
pub use store::ContentStore;
pub use traits::{Forwarder, InterestFilter, InterestListener};
