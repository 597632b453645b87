// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cache invalidation over the mark-stale protocol.
//!
//! Clearing a prefix repeatedly expresses a local-only interest carrying
//! the `MARK_STALE` flag and waits one short quantum per round for the
//! acknowledgement, the matched objects echoed back to the issuing
//! listener. With an explicit timeout the polling loop re-expresses
//! until the deadline; without one, a single silent quantum already
//! means the local layer is unresponsive. Either way a missing
//! acknowledgement is an error, never a silent success.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use namecast_core::{AnswerOriginKind, ContentName, ContentObject, Interest};
use thiserror::Error;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;

use crate::handle::{Handle, HandleError};
use crate::traits::InterestListener;

/// Errors returned by cache invalidation.
#[derive(Error, Debug)]
pub enum CacheError {
    /// No invalidation acknowledgement arrived before the deadline.
    #[error("cache invalidation was not acknowledged in time")]
    Timeout,

    /// The underlying handle has been closed.
    #[error(transparent)]
    Handle(#[from] HandleError),
}

/// One-shot acknowledgement sink for a single invalidation call.
#[derive(Default)]
struct ClearListener {
    acked: AtomicBool,
    notify: Notify,
}

impl ClearListener {
    fn is_acked(&self) -> bool {
        self.acked.load(Ordering::Acquire)
    }
}

impl InterestListener for ClearListener {
    fn handle_content(&self, objects: &[ContentObject], _: &Interest) -> Option<Interest> {
        debug!(count = objects.len(), "cache invalidation acknowledged");
        self.acked.store(true, Ordering::Release);
        self.notify.notify_one();
        None
    }
}

/// Speaks the mark-stale invalidation protocol against the local store.
pub struct CacheManager {
    handle: Handle,
}

impl CacheManager {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Mark everything cached under `prefix` stale.
    ///
    /// `Ok(())` once the invalidation is acknowledged. Without an
    /// acknowledgement this fails with [`CacheError::Timeout`]: after
    /// `timeout` when one is given, after a single quantum
    /// ([`HandleConfig::short_timeout`](crate::HandleConfig)) when none
    /// is.
    pub async fn clear_cache(
        &self,
        prefix: &ContentName,
        timeout: Option<Duration>,
    ) -> Result<(), CacheError> {
        let quantum = self.handle.config().short_timeout;
        let deadline = timeout.map(|duration| Instant::now() + duration);
        let listener = Arc::new(ClearListener::default());
        let as_listener: Arc<dyn InterestListener> = listener.clone();

        loop {
            let interest = Interest::new(prefix.clone())
                .with_scope(0)
                .with_answer_origin_kind(
                    AnswerOriginKind::default() | AnswerOriginKind::MARK_STALE,
                );
            self.handle
                .express_interest(interest.clone(), as_listener.clone())?;
            // The acknowledgement for already-cached content arrives
            // synchronously during expression.
            if listener.is_acked() {
                return Ok(());
            }

            let _ = tokio::time::timeout(quantum, listener.notify.notified()).await;
            self.handle.cancel_interest(&interest, &as_listener);
            if listener.is_acked() {
                return Ok(());
            }

            match deadline {
                None => return Err(CacheError::Timeout),
                Some(deadline) if Instant::now() >= deadline => return Err(CacheError::Timeout),
                Some(_) => {}
            }
        }
    }
}
