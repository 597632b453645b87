// SPDX-License-Identifier: MIT OR Apache-2.0

//! Segment components: `0x00` marker followed by a zero-based sequence
//! number.
//!
//! The number is encoded minimal-length big-endian (empty for segment 0).
//! Under canonical component order, which compares length before bytes,
//! segments of the same base therefore order numerically.

use thiserror::Error;

use crate::name::{Component, ContentName};

/// Reserved marker byte tagging a segment component.
pub const SEGMENT_MARKER: u8 = 0x00;

/// Segment numbering starts at zero.
pub const fn base_segment() -> u64 {
    0
}

/// Build the segment component for a sequence number.
pub fn segment_component(number: u64) -> Component {
    let mut bytes = vec![SEGMENT_MARKER];
    let be = number.to_be_bytes();
    let start = be.iter().position(|byte| *byte != 0).unwrap_or(8);
    bytes.extend_from_slice(&be[start..]);
    Component::new(bytes)
}

/// Append segment `number` to a (possibly versioned) base name.
pub fn segment(name: &ContentName, number: u64) -> ContentName {
    name.append_component(segment_component(number))
}

/// Append the first segment to a base name.
pub fn first_segment(name: &ContentName) -> ContentName {
    segment(name, base_segment())
}

pub fn is_segment_component(component: &Component) -> bool {
    component.marker() == Some(SEGMENT_MARKER) && component.len() <= 9
}

/// True when the name's last component is a segment.
pub fn is_segmented(name: &ContentName) -> bool {
    name.last().is_some_and(is_segment_component)
}

/// The unsegmented base: the name without its terminal segment component,
/// or the name itself when it carries none.
pub fn segment_root(name: &ContentName) -> ContentName {
    if is_segmented(name) {
        // Non-empty since a last component exists.
        name.prefix(name.len() - 1)
    } else {
        name.clone()
    }
}

/// Sequence number of the terminal segment component.
pub fn segment_number(name: &ContentName) -> Result<u64, SegmentError> {
    let last = name
        .last()
        .filter(|component| is_segment_component(component))
        .ok_or_else(|| SegmentError::SegmentMissing(name.clone()))?;
    Ok(last.as_bytes()[1..]
        .iter()
        .fold(0u64, |acc, byte| acc << 8 | u64::from(*byte)))
}

/// Error types for segment-aware processing.
#[derive(Error, Debug)]
pub enum SegmentError {
    /// The name does not end in a segment component.
    #[error("name '{0}' carries no terminal segment component")]
    SegmentMissing(ContentName),
}
