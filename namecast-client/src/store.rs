// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory local content store.
//!
//! Stands in for the forwarding daemon's cache at the client boundary.
//! Ordinary interests match only live entries: not marked stale and
//! within the object's freshness bound. Interests carrying the
//! `ANSWER_STALE` flag match stale entries too. `MARK_STALE` interests
//! are handled by [`ContentStore::mark_stale`] instead of matching.

use std::collections::HashMap;

use namecast_core::matching;
use namecast_core::{ContentName, ContentObject, Interest};
use tokio::time::Instant;

struct StoreEntry {
    object: ContentObject,
    stale: bool,
    inserted_at: Instant,
}

impl StoreEntry {
    /// Marked stale, or past the publisher's freshness bound.
    fn is_stale(&self) -> bool {
        if self.stale {
            return true;
        }
        match self.object.signed_info.freshness_seconds {
            Some(seconds) => self.inserted_at.elapsed().as_secs() >= seconds,
            None => false,
        }
    }
}

/// Keyed by name: inserting under an existing name replaces the entry
/// and resets its staleness.
#[derive(Default)]
pub struct ContentStore {
    entries: HashMap<ContentName, StoreEntry>,
}

impl ContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, object: ContentObject) {
        self.entries.insert(
            object.name.clone(),
            StoreEntry {
                object,
                stale: false,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Every stored object satisfying `interest`, honoring its staleness
    /// policy. Results are name-unique by construction.
    pub fn matches(&self, interest: &Interest) -> Vec<ContentObject> {
        self.entries
            .values()
            .filter(|entry| interest.answer_origin_kind.allows_stale() || !entry.is_stale())
            .filter(|entry| matching::matches_object(interest, &entry.object))
            .map(|entry| entry.object.clone())
            .collect()
    }

    /// Mark every entry matching `interest` stale. Only entries that
    /// were still live are returned, so a repeated invalidation over the
    /// same prefix reports nothing.
    pub fn mark_stale(&mut self, interest: &Interest) -> Vec<ContentObject> {
        let mut staled = Vec::new();
        for entry in self.entries.values_mut() {
            if !matching::matches_object(interest, &entry.object) {
                continue;
            }
            if !entry.is_stale() {
                staled.push(entry.object.clone());
            }
            entry.stale = true;
        }
        staled
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
