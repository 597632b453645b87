// SPDX-License-Identifier: MIT OR Apache-2.0

//! The interest/content matching predicate.
//!
//! Everything here is pure: re-evaluating with the same inputs always
//! yields the same answer. Interests carrying the `MARK_STALE` flag use
//! the same predicate, but their matches are interpreted by the local
//! store as invalidation instructions rather than answers.

use std::cmp::Ordering;

use crate::interest::{ChildSelector, Interest};
use crate::name::ContentName;
use crate::object::ContentObject;

/// Decide whether a candidate name (and optionally the object carrying
/// it) satisfies an interest.
///
/// A publisher-filtered interest can only be satisfied by a candidate
/// whose object is available; a bare name never matches it.
pub fn matches(interest: &Interest, name: &ContentName, object: Option<&ContentObject>) -> bool {
    if !interest.name.is_prefix_of(name) {
        return false;
    }

    let suffix = name.len() - interest.name.len();
    if let Some(min) = interest.min_suffix_components {
        if suffix < min {
            return false;
        }
    }
    if let Some(max) = interest.max_suffix_components {
        if suffix > max {
            return false;
        }
    }

    if let Some(exclude) = &interest.exclude {
        if let Some(next) = name.get(interest.name.len()) {
            if exclude.excludes(next) {
                return false;
            }
        }
    }

    if let Some(publisher) = &interest.publisher {
        match object {
            Some(object) => {
                if object.signed_info.publisher != *publisher {
                    return false;
                }
            }
            None => return false,
        }
    }

    true
}

/// [`matches`] with the candidate's object at hand.
pub fn matches_object(interest: &Interest, object: &ContentObject) -> bool {
    matches(interest, &object.name, Some(object))
}

/// Pick the preferred candidate among many.
///
/// Returns the matching candidate whose next component after the
/// interest's prefix is smallest (leftmost) or largest (rightmost) in
/// canonical order. A candidate equal to the prefix itself sorts before
/// any longer name. Ties keep the earlier candidate.
pub fn select<'a, I>(interest: &Interest, candidates: I) -> Option<&'a ContentObject>
where
    I: IntoIterator<Item = &'a ContentObject>,
{
    let mut best: Option<&ContentObject> = None;
    for candidate in candidates {
        if !matches_object(interest, candidate) {
            continue;
        }
        best = match best {
            None => Some(candidate),
            Some(incumbent) => {
                if prefers(interest, candidate, incumbent) {
                    Some(candidate)
                } else {
                    Some(incumbent)
                }
            }
        };
    }
    best
}

fn prefers(interest: &Interest, challenger: &ContentObject, incumbent: &ContentObject) -> bool {
    let depth = interest.name.len();
    // `None` (name equal to the prefix) orders before any component.
    let next_challenger = challenger.name.get(depth);
    let next_incumbent = incumbent.name.get(depth);
    match interest.child_selector {
        ChildSelector::Leftmost => next_challenger.cmp(&next_incumbent) == Ordering::Less,
        ChildSelector::Rightmost => next_challenger.cmp(&next_incumbent) == Ordering::Greater,
    }
}
