// SPDX-License-Identifier: MIT OR Apache-2.0

//! Version components: `0xFD` marker followed by a binary timestamp.
//!
//! The timestamp counts units of 2^-12 seconds (sub-millisecond safe) and
//! is encoded minimal-length big-endian, so versions of the same base name
//! order canonically the same way they order numerically. The
//! [`Versioner`] guarantees that versions minted by one process for one
//! base name are strictly increasing even when the wall clock stalls.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

use crate::name::{Component, ContentName};
use crate::profiles::segmentation;

/// Reserved marker byte tagging a version component.
pub const VERSION_MARKER: u8 = 0xfd;

/// Convert milliseconds since the Unix epoch to binary time, units of
/// 2^-12 seconds.
pub fn binary_time(millis: u64) -> u64 {
    millis.saturating_mul(4096) / 1000
}

/// Current wall clock as binary time.
pub fn now_binary_time() -> u64 {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default();
    binary_time(millis)
}

/// Build the version component for a binary-time value.
pub fn version_component(version: u64) -> Component {
    let mut bytes = vec![VERSION_MARKER];
    bytes.extend_from_slice(&minimal_be(version));
    Component::new(bytes)
}

/// Append an explicit version to a base name.
pub fn add_version_at(base: &ContentName, version: u64) -> ContentName {
    base.append_component(version_component(version))
}

pub fn is_version_component(component: &Component) -> bool {
    component.marker() == Some(VERSION_MARKER) && component.len() <= 9
}

/// Binary-time value of a version component.
pub fn version_value(component: &Component) -> Result<u64, VersionError> {
    if component.marker() != Some(VERSION_MARKER) || component.len() > 9 {
        return Err(VersionError::MalformedVersion);
    }
    Ok(component.as_bytes()[1..]
        .iter()
        .fold(0u64, |acc, byte| acc << 8 | u64::from(*byte)))
}

/// Index of the last version component in `name`, if any.
pub fn find_last_version_component(name: &ContentName) -> Option<usize> {
    name.components()
        .iter()
        .rposition(is_version_component)
}

/// True when the name ends in a version, optionally followed by a single
/// segment component.
pub fn has_terminal_version(name: &ContentName) -> bool {
    let components = name.components();
    match components.last() {
        Some(last) if is_version_component(last) => true,
        Some(last) if segmentation::is_segment_component(last) => components
            .len()
            .checked_sub(2)
            .and_then(|index| components.get(index))
            .is_some_and(is_version_component),
        _ => false,
    }
}

/// True when `candidate` is `base` plus a version component (and possibly
/// more components below it).
pub fn is_version_of(candidate: &ContentName, base: &ContentName) -> bool {
    base.is_prefix_of(candidate)
        && candidate
            .get(base.len())
            .is_some_and(is_version_component)
}

/// Binary-time value of the last version component, or
/// [`VersionError::VersionMissing`] when the caller expected a version
/// that is not there.
pub fn last_version_value(name: &ContentName) -> Result<u64, VersionError> {
    let index = find_last_version_component(name)
        .ok_or_else(|| VersionError::VersionMissing(name.clone()))?;
    version_value(&name.components()[index])
}

/// Name truncated just before its last version component.
pub fn version_root(name: &ContentName) -> ContentName {
    match find_last_version_component(name) {
        Some(index) => name.prefix(index),
        None => name.clone(),
    }
}

fn minimal_be(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let start = bytes.iter().position(|byte| *byte != 0).unwrap_or(8);
    bytes[start..].to_vec()
}

/// Error types for version-aware processing.
#[derive(Error, Debug)]
pub enum VersionError {
    /// The caller opted into version-aware processing but the name
    /// carries no version component.
    #[error("name '{0}' carries no version component")]
    VersionMissing(ContentName),

    /// A component tagged as a version does not decode to one.
    #[error("malformed version component")]
    MalformedVersion,
}

/// Mints strictly increasing versions per base name.
///
/// Remembers the last value issued for each base and nudges past it when
/// the wall clock has not sufficiently progressed, so back-to-back mints
/// are safe with no externally observable delay. The high-water map is
/// process-local; persistence across restarts is up to the caller.
#[derive(Debug, Default)]
pub struct Versioner {
    high_water: Mutex<HashMap<ContentName, u64>>,
}

impl Versioner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fresh version to `base`, strictly greater than every
    /// version previously minted for it by this instance.
    pub fn mint(&self, base: &ContentName) -> ContentName {
        self.mint_at(base, now_binary_time())
    }

    /// [`mint`](Self::mint) against an explicit clock reading.
    pub fn mint_at(&self, base: &ContentName, now: u64) -> ContentName {
        let mut high_water = self
            .high_water
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let version = match high_water.get(base) {
            Some(last) if now <= *last => last + 1,
            _ => now,
        };
        high_water.insert(base.clone(), version);
        add_version_at(base, version)
    }
}
