// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hierarchical content names.
//!
//! A [`ContentName`] is an immutable, ordered sequence of opaque byte
//! [`Component`]s. Names are compared component-by-component in canonical
//! order, where a shorter name is a prefix predecessor of any longer name
//! sharing that prefix. Components themselves order by length first and
//! bytes second, which keeps minimal-length big-endian numeric encodings
//! (versions, segment numbers) in numeric order.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// A single opaque byte-string component of a [`ContentName`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Component(Vec<u8>);

impl Component {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First byte of the component, used by the naming profiles to
    /// recognize reserved markers.
    pub fn marker(&self) -> Option<u8> {
        self.0.first().copied()
    }
}

impl From<&str> for Component {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

impl From<&[u8]> for Component {
    fn from(value: &[u8]) -> Self {
        Self(value.to_vec())
    }
}

impl From<Vec<u8>> for Component {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

impl PartialOrd for Component {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Component {
    /// Canonical component order: shorter components sort before longer
    /// ones, components of equal length compare bytewise.
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            if is_unescaped(*byte) {
                write!(f, "{}", *byte as char)?;
            } else {
                write!(f, "%{:02X}", byte)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Component({})", self)
    }
}

// Unreserved URI characters pass through unescaped in the native form.
fn is_unescaped(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~')
}

// Percent-escaped strings in human-readable formats (JSON), plain byte
// strings otherwise (CBOR).
impl Serialize for Component {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if serializer.is_human_readable() {
            serializer.collect_str(self)
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for Component {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        if deserializer.is_human_readable() {
            let value = String::deserialize(deserializer)?;
            unescape(&value).map_err(serde::de::Error::custom)
        } else {
            let bytes = serde_bytes::ByteBuf::deserialize(deserializer)?;
            Ok(Self(bytes.into_vec()))
        }
    }
}

/// An immutable hierarchical name: an ordered sequence of [`Component`]s.
///
/// All derivations (`append`, `parent`, `cut`) produce new values; a name
/// is never mutated after construction.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct ContentName(Vec<Component>);

impl ContentName {
    /// The empty root name `/`.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn new(components: Vec<Component>) -> Self {
        Self(components)
    }

    /// Parse a name from its native URI-style form, e.g. `/test/key`.
    ///
    /// Components are separated by `/` and may carry `%XX` percent
    /// escapes for arbitrary bytes. The name must begin with `/`; `/` on
    /// its own is the root name.
    pub fn from_native(input: &str) -> Result<Self, NameError> {
        let rest = input
            .strip_prefix('/')
            .ok_or_else(|| NameError::MissingLeadingSlash(input.to_string()))?;
        if rest.is_empty() {
            return Ok(Self::root());
        }
        let mut components = Vec::new();
        for part in rest.split('/') {
            if part.is_empty() {
                return Err(NameError::EmptyComponent(input.to_string()));
            }
            components.push(unescape(part)?);
        }
        Ok(Self(components))
    }

    pub fn components(&self) -> &[Component] {
        &self.0
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Component> {
        self.0.get(index)
    }

    pub fn last(&self) -> Option<&Component> {
        self.0.last()
    }

    /// True when every component of `self` equals the corresponding
    /// component of `other`, in order.
    pub fn is_prefix_of(&self, other: &ContentName) -> bool {
        self.0.len() <= other.0.len() && self.0.iter().zip(&other.0).all(|(a, b)| a == b)
    }

    pub fn starts_with(&self, prefix: &ContentName) -> bool {
        prefix.is_prefix_of(self)
    }

    pub fn contains(&self, component: &Component) -> bool {
        self.0.contains(component)
    }

    /// New name with `component` appended.
    pub fn append_component(&self, component: Component) -> Self {
        let mut components = self.0.clone();
        components.push(component);
        Self(components)
    }

    /// New name with all components of `suffix` appended.
    pub fn append(&self, suffix: &ContentName) -> Self {
        let mut components = self.0.clone();
        components.extend(suffix.0.iter().cloned());
        Self(components)
    }

    /// New name without the last component, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }

    /// New name truncated to its first `count` components.
    pub fn prefix(&self, count: usize) -> Self {
        Self(self.0[..count.min(self.0.len())].to_vec())
    }

    /// Truncate at the first occurrence of `component`, excluding it.
    /// Returns `None` when the component does not occur.
    pub fn cut(&self, component: &Component) -> Option<Self> {
        let index = self.0.iter().position(|c| c == component)?;
        Some(Self(self.0[..index].to_vec()))
    }
}

impl FromStr for ContentName {
    type Err = NameError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::from_native(value)
    }
}

impl FromIterator<Component> for ContentName {
    fn from_iter<I: IntoIterator<Item = Component>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for ContentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        for component in &self.0 {
            write!(f, "/{}", component)?;
        }
        Ok(())
    }
}

impl fmt::Debug for ContentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentName({})", self)
    }
}

fn unescape(part: &str) -> Result<Component, NameError> {
    let bytes = part.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if i + 3 > bytes.len() {
                return Err(NameError::InvalidEscape(part.to_string()));
            }
            let hi = hex_value(bytes[i + 1]);
            let lo = hex_value(bytes[i + 2]);
            match (hi, lo) {
                (Some(hi), Some(lo)) => out.push(hi << 4 | lo),
                _ => return Err(NameError::InvalidEscape(part.to_string())),
            }
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Ok(Component(out))
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Error types for structurally invalid names.
#[derive(Error, Debug)]
pub enum NameError {
    /// The native form must begin with `/`.
    #[error("content name must begin with '/': '{0}'")]
    MissingLeadingSlash(String),

    /// Two consecutive separators or a trailing separator.
    #[error("empty component in content name '{0}'")]
    EmptyComponent(String),

    /// A `%` escape without two valid hex digits.
    #[error("invalid percent escape in component '{0}'")]
    InvalidEscape(String),
}

#[cfg(test)]
mod tests {
    use super::{Component, ContentName, NameError};

    #[test]
    fn parse_and_display() {
        let name = ContentName::from_native("/test/briggs/foo.txt").unwrap();
        assert_eq!(name.len(), 3);
        assert_eq!(name.to_string(), "/test/briggs/foo.txt");

        let root = ContentName::from_native("/").unwrap();
        assert!(root.is_empty());
        assert_eq!(root.to_string(), "/");
    }

    #[test]
    fn percent_escapes_round_trip() {
        let name = ContentName::from_native("/a/%00%FD/b%20c").unwrap();
        assert_eq!(name.get(1).unwrap().as_bytes(), &[0x00, 0xfd]);
        assert_eq!(name.get(2).unwrap().as_bytes(), b"b c");

        let again = ContentName::from_native(&name.to_string()).unwrap();
        assert_eq!(name, again);
    }

    #[test]
    fn json_uses_the_native_form() {
        let name = ContentName::from_native("/a/%00%FD/b").unwrap();
        let json = serde_json::to_string(&name).unwrap();
        assert_eq!(json, r#"["a","%00%FD","b"]"#);

        let again: ContentName = serde_json::from_str(&json).unwrap();
        assert_eq!(name, again);
    }

    #[test]
    fn malformed_names() {
        assert!(matches!(
            ContentName::from_native("no/leading/slash"),
            Err(NameError::MissingLeadingSlash(_))
        ));
        assert!(matches!(
            ContentName::from_native("/a//b"),
            Err(NameError::EmptyComponent(_))
        ));
        assert!(matches!(
            ContentName::from_native("/a/%zz"),
            Err(NameError::InvalidEscape(_))
        ));
        assert!(matches!(
            ContentName::from_native("/a/%F"),
            Err(NameError::InvalidEscape(_))
        ));
    }

    #[test]
    fn prefix_of_append() {
        let base = ContentName::from_native("/CPOF/bar").unwrap();
        for suffix in ["/", "/lid", "/jar/deep", "/%00"] {
            let suffix = ContentName::from_native(suffix).unwrap();
            let full = base.append(&suffix);
            assert!(base.is_prefix_of(&full));
            assert!(full.starts_with(&base));
        }
        assert!(ContentName::root().is_prefix_of(&base));
    }

    #[test]
    fn component_canonical_order_is_length_first() {
        let short = Component::new(vec![0x02]);
        let long = Component::new(vec![0x01, 0x02]);
        assert!(short < long);

        let a = Component::new(vec![0x01, 0x01]);
        let b = Component::new(vec![0x01, 0x02]);
        assert!(a < b);
    }

    #[test]
    fn name_order_puts_prefix_first() {
        let base = ContentName::from_native("/a/b").unwrap();
        let longer = ContentName::from_native("/a/b/c").unwrap();
        let sibling = ContentName::from_native("/a/c").unwrap();
        assert!(base < longer);
        assert!(longer < sibling);
    }

    #[test]
    fn derivations() {
        let name = ContentName::from_native("/a/b/c").unwrap();
        assert_eq!(name.parent().unwrap().to_string(), "/a/b");
        assert_eq!(name.prefix(1).to_string(), "/a");
        assert!(ContentName::root().parent().is_none());

        let b = Component::from("b");
        assert!(name.contains(&b));
        assert_eq!(name.cut(&b).unwrap().to_string(), "/a");
        assert!(name.cut(&Component::from("zz")).is_none());

        let appended = name.append_component(Component::from("d"));
        assert_eq!(appended.to_string(), "/a/b/c/d");
        // The original is untouched.
        assert_eq!(name.len(), 3);
    }
}
