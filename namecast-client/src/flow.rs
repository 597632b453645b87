// SPDX-License-Identifier: MIT OR Apache-2.0

//! Producer-side flow control.
//!
//! A [`FlowControl`] registers itself as a producer filter for one
//! namespace. Objects put into it are delivered immediately when a
//! matching interest is already pending, otherwise they are buffered
//! until an interest arrives; draining moves the object into the local
//! store so it stays independently fetchable. The buffer is bounded: a
//! full buffer is a hard error, and entries older than the retention
//! window are evicted as unclaimed rather than delivered late.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use namecast_core::matching;
use namecast_core::profiles::versioning::Versioner;
use namecast_core::{ContentName, ContentObject, Interest, Signer};
use thiserror::Error;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::warn;

use crate::config::FlowConfig;
use crate::handle::{lock, Handle, HandleError};
use crate::traits::InterestFilter;

/// Errors returned by flow-control operations.
#[derive(Error, Debug)]
pub enum FlowError {
    /// The buffer is at capacity and nothing could be reclaimed.
    #[error("flow buffer is full ({0} objects)")]
    BufferFull(usize),

    /// The object's name does not fall under the controlled namespace.
    #[error("name '{0}' is outside the controlled namespace '{1}'")]
    OutsideNamespace(ContentName, ContentName),

    /// The buffer did not drain before the deadline.
    #[error("flow buffer did not drain in time")]
    DrainTimeout,

    /// The underlying handle has been closed.
    #[error(transparent)]
    Closed(#[from] HandleError),
}

struct Buffered {
    object: ContentObject,
    inserted_at: Instant,
}

#[derive(Default)]
struct FlowState {
    buffer: Vec<Buffered>,
    /// Names evicted past the retention window, awaiting
    /// [`FlowControl::take_unclaimed`].
    unclaimed: Vec<ContentName>,
}

struct FlowShared {
    config: FlowConfig,
    state: Mutex<FlowState>,
    /// Signalled when the buffer empties.
    drained: Notify,
}

impl FlowShared {
    fn evict_expired(&self, state: &mut FlowState) {
        let window = self.config.window;
        let FlowState { buffer, unclaimed } = state;
        let mut kept = Vec::with_capacity(buffer.len());
        for buffered in buffer.drain(..) {
            if buffered.inserted_at.elapsed() > window {
                warn!(name = %buffered.object.name, "evicting unclaimed object past the retention window");
                unclaimed.push(buffered.object.name);
            } else {
                kept.push(buffered);
            }
        }
        *buffer = kept;
    }
}

impl InterestFilter for FlowShared {
    fn drain(&self, interest: &Interest) -> Vec<ContentObject> {
        let emptied;
        let matched = {
            let mut state = lock(&self.state);
            self.evict_expired(&mut state);
            let mut matched = Vec::new();
            let mut kept = Vec::new();
            for buffered in state.buffer.drain(..) {
                if matching::matches_object(interest, &buffered.object) {
                    matched.push(buffered.object);
                } else {
                    kept.push(buffered);
                }
            }
            emptied = kept.is_empty() && !matched.is_empty();
            state.buffer = kept;
            matched
        };
        if emptied {
            self.drained.notify_waiters();
        }
        matched
    }
}

/// Bounded buffer mediating between one producer and the
/// pending-interest table.
pub struct FlowControl {
    handle: Handle,
    namespace: ContentName,
    shared: Arc<FlowShared>,
    filter_id: u64,
    versioner: Versioner,
}

impl FlowControl {
    /// Register a flow-control buffer for `namespace` on `handle`.
    pub fn new(
        handle: &Handle,
        namespace: ContentName,
        config: FlowConfig,
    ) -> Result<Self, FlowError> {
        let shared = Arc::new(FlowShared {
            config,
            state: Mutex::new(FlowState::default()),
            drained: Notify::new(),
        });
        let filter_id = handle.register_filter(namespace.clone(), shared.clone())?;
        Ok(Self {
            handle: handle.clone(),
            namespace,
            shared,
            filter_id,
            versioner: Versioner::new(),
        })
    }

    pub fn namespace(&self) -> &ContentName {
        &self.namespace
    }

    /// Hand one object to the flow.
    ///
    /// Delivered immediately when a matching interest is already
    /// pending, buffered otherwise. A buffered entry under the same name
    /// is replaced. Returns the object's name.
    pub fn put(&self, object: ContentObject) -> Result<ContentName, FlowError> {
        if !self.namespace.is_prefix_of(&object.name) {
            return Err(FlowError::OutsideNamespace(
                object.name.clone(),
                self.namespace.clone(),
            ));
        }
        let name = object.name.clone();
        {
            let mut state = lock(&self.shared.state);
            self.shared.evict_expired(&mut state);
            if let Some(existing) = state
                .buffer
                .iter_mut()
                .find(|buffered| buffered.object.name == name)
            {
                existing.object = object.clone();
                existing.inserted_at = Instant::now();
            } else {
                if state.buffer.len() >= self.shared.config.capacity {
                    return Err(FlowError::BufferFull(state.buffer.len()));
                }
                state.buffer.push(Buffered {
                    object: object.clone(),
                    inserted_at: Instant::now(),
                });
            }
        }

        // The handle takes its own locks; ours is released above.
        let delivered = self.handle.offer(&object)?;
        if delivered > 0 {
            let mut state = lock(&self.shared.state);
            state.buffer.retain(|buffered| buffered.object.name != name);
            if state.buffer.is_empty() {
                self.shared.drained.notify_waiters();
            }
        }
        Ok(name)
    }

    /// [`put`](Self::put) a sequence of objects, stopping at the first
    /// failure.
    pub fn put_batch(
        &self,
        objects: impl IntoIterator<Item = ContentObject>,
    ) -> Result<Vec<ContentName>, FlowError> {
        objects.into_iter().map(|object| self.put(object)).collect()
    }

    /// Mint the next version below `base`, sign the content under it and
    /// [`put`](Self::put) the result.
    pub fn new_version<S: Signer + ?Sized>(
        &self,
        base: &ContentName,
        content: impl Into<Vec<u8>>,
        signer: &S,
    ) -> Result<ContentName, FlowError> {
        let versioned = self.versioner.mint(base);
        self.put(ContentObject::build(versioned, content, signer))
    }

    /// Producer backpressure: resolves once every buffered object has
    /// been claimed by an interest. `None` waits forever.
    pub async fn wait_for_drain(&self, timeout: Option<Duration>) -> Result<(), FlowError> {
        let deadline = timeout.map(|duration| Instant::now() + duration);
        loop {
            let notified = self.shared.drained.notified();
            if lock(&self.shared.state).buffer.is_empty() {
                return Ok(());
            }
            match deadline {
                None => notified.await,
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, notified).await.is_err() {
                        return Err(FlowError::DrainTimeout);
                    }
                }
            }
        }
    }

    /// Names evicted past the retention window since the last call.
    pub fn take_unclaimed(&self) -> Vec<ContentName> {
        std::mem::take(&mut lock(&self.shared.state).unclaimed)
    }

    pub fn len(&self) -> usize {
        lock(&self.shared.state).buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for FlowControl {
    fn drop(&mut self) {
        self.handle.unregister_filter(self.filter_id);
    }
}
