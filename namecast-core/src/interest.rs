// SPDX-License-Identifier: MIT OR Apache-2.0

//! Interests: named queries with matching constraints.

use std::fmt;
use std::ops::BitOr;

use serde::{Deserialize, Serialize};

use crate::identity::PublisherId;
use crate::name::{Component, ContentName};

/// Bit flags selecting where an answer may come from, plus the
/// `MARK_STALE` side channel.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOriginKind(u8);

impl AnswerOriginKind {
    /// Answers may come from a content store (cache).
    pub const CONTENT_STORE: AnswerOriginKind = AnswerOriginKind(0x01);

    /// Answers may be generated on demand by a producer.
    pub const GENERATED: AnswerOriginKind = AnswerOriginKind(0x02);

    /// Stale cache entries are acceptable answers.
    pub const STALE: AnswerOriginKind = AnswerOriginKind(0x04);

    /// Do not answer with data: instruct the local store to mark matched
    /// entries stale instead.
    pub const MARK_STALE: AnswerOriginKind = AnswerOriginKind(0x10);

    pub fn contains(self, flags: AnswerOriginKind) -> bool {
        self.0 & flags.0 == flags.0
    }

    pub fn is_mark_stale(self) -> bool {
        self.contains(Self::MARK_STALE)
    }

    pub fn allows_stale(self) -> bool {
        self.contains(Self::STALE)
    }

    pub fn bits(self) -> u8 {
        self.0
    }
}

impl Default for AnswerOriginKind {
    /// Content store or generated answers, no stale entries.
    fn default() -> Self {
        Self::CONTENT_STORE | Self::GENERATED
    }
}

impl BitOr for AnswerOriginKind {
    type Output = AnswerOriginKind;

    fn bitor(self, rhs: AnswerOriginKind) -> AnswerOriginKind {
        AnswerOriginKind(self.0 | rhs.0)
    }
}

impl fmt::Debug for AnswerOriginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AnswerOriginKind({:#04x})", self.0)
    }
}

/// Tie-break rule choosing among multiple matching candidates sharing a
/// prefix: the candidate whose next component is smallest (leftmost) or
/// largest (rightmost) in canonical order wins. Rightmost over version
/// components expresses "latest version"; leftmost over segments
/// expresses "first segment".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChildSelector {
    #[default]
    Leftmost,
    Rightmost,
}

/// Set of name components an interest refuses as the first component
/// after its prefix.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Exclude(Vec<Component>);

impl Exclude {
    pub fn new(mut components: Vec<Component>) -> Self {
        components.sort();
        components.dedup();
        Self(components)
    }

    pub fn insert(&mut self, component: Component) {
        if let Err(index) = self.0.binary_search(&component) {
            self.0.insert(index, component);
        }
    }

    pub fn excludes(&self, component: &Component) -> bool {
        self.0.binary_search(component).is_ok()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Component> for Exclude {
    fn from_iter<I: IntoIterator<Item = Component>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Random value distinguishing re-expressions of otherwise identical
/// interests. Duplicate-delivery suppression is keyed on it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Nonce([u8; 8]);

impl Nonce {
    pub fn new() -> Self {
        Self(rand::random())
    }
}

impl Default for Nonce {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nonce({})", hex::encode(self.0))
    }
}

/// An immutable query over names.
///
/// A candidate name matches when the interest's name is a prefix of it
/// and the auxiliary constraints hold; see [`crate::matching`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interest {
    pub name: ContentName,
    pub exclude: Option<Exclude>,
    pub child_selector: ChildSelector,
    pub min_suffix_components: Option<usize>,
    pub max_suffix_components: Option<usize>,
    pub publisher: Option<PublisherId>,
    /// `Some(0)` restricts matching to the local store; such an interest
    /// must never reach the network layer.
    pub scope: Option<u8>,
    pub answer_origin_kind: AnswerOriginKind,
    pub nonce: Nonce,
}

impl Interest {
    pub fn new(name: ContentName) -> Self {
        Self {
            name,
            exclude: None,
            child_selector: ChildSelector::default(),
            min_suffix_components: None,
            max_suffix_components: None,
            publisher: None,
            scope: None,
            answer_origin_kind: AnswerOriginKind::default(),
            nonce: Nonce::new(),
        }
    }

    pub fn with_exclude(mut self, exclude: Exclude) -> Self {
        self.exclude = Some(exclude);
        self
    }

    pub fn with_child_selector(mut self, child_selector: ChildSelector) -> Self {
        self.child_selector = child_selector;
        self
    }

    pub fn with_min_suffix_components(mut self, min: usize) -> Self {
        self.min_suffix_components = Some(min);
        self
    }

    pub fn with_max_suffix_components(mut self, max: usize) -> Self {
        self.max_suffix_components = Some(max);
        self
    }

    pub fn with_publisher(mut self, publisher: PublisherId) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn with_scope(mut self, scope: u8) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn with_answer_origin_kind(mut self, answer_origin_kind: AnswerOriginKind) -> Self {
        self.answer_origin_kind = answer_origin_kind;
        self
    }

    /// Same query under a fresh nonce. Re-expressing with a new nonce
    /// resets duplicate-delivery suppression.
    pub fn refreshed(&self) -> Self {
        let mut interest = self.clone();
        interest.nonce = Nonce::new();
        interest
    }

    /// True for `scope = 0` interests, which must never cross the
    /// local-store boundary.
    pub fn is_local_only(&self) -> bool {
        self.scope == Some(0)
    }
}

#[cfg(test)]
mod tests {
    use crate::name::{Component, ContentName};

    use super::{AnswerOriginKind, ChildSelector, Exclude, Interest};

    #[test]
    fn default_answer_origin_kind() {
        let kind = AnswerOriginKind::default();
        assert!(kind.contains(AnswerOriginKind::CONTENT_STORE));
        assert!(kind.contains(AnswerOriginKind::GENERATED));
        assert!(!kind.allows_stale());
        assert!(!kind.is_mark_stale());

        let marking = kind | AnswerOriginKind::MARK_STALE;
        assert!(marking.is_mark_stale());
        assert!(marking.contains(AnswerOriginKind::CONTENT_STORE));
    }

    #[test]
    fn exclude_lookup() {
        let mut exclude: Exclude = [Component::from("b"), Component::from("a")]
            .into_iter()
            .collect();
        assert!(exclude.excludes(&Component::from("a")));
        assert!(!exclude.excludes(&Component::from("c")));

        exclude.insert(Component::from("c"));
        exclude.insert(Component::from("c"));
        assert!(exclude.excludes(&Component::from("c")));
    }

    #[test]
    fn fresh_nonces() {
        let name = ContentName::from_native("/test/interest").unwrap();
        let a = Interest::new(name.clone());
        let b = Interest::new(name);
        assert_ne!(a.nonce, b.nonce);

        let refreshed = a.refreshed();
        assert_ne!(a.nonce, refreshed.nonce);
        assert_eq!(a.name, refreshed.name);
        assert_eq!(a.child_selector, refreshed.child_selector);
    }

    #[test]
    fn builder_style_constraints() {
        let name = ContentName::from_native("/test/key").unwrap();
        let interest = Interest::new(name)
            .with_child_selector(ChildSelector::Rightmost)
            .with_min_suffix_components(1)
            .with_scope(0);
        assert!(interest.is_local_only());
        assert_eq!(interest.child_selector, ChildSelector::Rightmost);
        assert_eq!(interest.min_suffix_components, Some(1));
    }
}
