// SPDX-License-Identifier: MIT OR Apache-2.0

//! Naming profiles: conventions layered on top of plain names.
//!
//! Profiles reserve marker bytes at the start of a component to tag its
//! role. Versioning and segmentation make names of the same base totally
//! ordered; the access-control profile reserves a sub-tree layout for key
//! distribution. Everything here is a pure function over names except the
//! [`Versioner`](versioning::Versioner), which remembers high-water marks.

pub mod access;
pub mod segmentation;
pub mod versioning;
