// SPDX-License-Identifier: MIT OR Apache-2.0

//! The handle: pending-interest table, producer filters and the local
//! content store behind one context object.
//!
//! A [`Handle`] is cheap to clone; clones share one registry. Lifecycle
//! is open -> closed: [`Handle::close`] cancels every outstanding
//! registration and is idempotent.
//!
//! Delivery is match-driven with no ordering guarantee between
//! registrations. Each registration deduplicates by object digest under
//! its current interest nonce; a listener refreshing its interest (new
//! nonce) resets that tracking. No internal lock is held while a user
//! callback runs, so a callback may call back into the handle freely,
//! publishing included: deliveries triggered while a callback frame is
//! active are queued and run once it returns. A cancellation racing an
//! in-flight dispatch waits for the callback to finish, so no callback
//! for that pair runs after the cancel returns.

use std::collections::{HashSet, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use namecast_core::matching;
use namecast_core::object::ObjectDigest;
use namecast_core::profiles::versioning;
use namecast_core::{ChildSelector, ContentName, ContentObject, Exclude, Interest, PublisherId};
use thiserror::Error;
use tokio::sync::{oneshot, Notify};
use tracing::{debug, warn};

use crate::config::HandleConfig;
use crate::store::ContentStore;
use crate::traits::{Forwarder, InterestFilter, InterestListener};

/// Errors returned by handle operations.
#[derive(Error, Debug)]
pub enum HandleError {
    /// The handle has been closed; no further operations are served.
    #[error("handle is closed")]
    Closed,
}

// Every critical section under these locks is a handful of plain
// statements, so a poisoned lock still guards consistent state.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared context object for all data-plane operations.
#[derive(Clone)]
pub struct Handle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    config: HandleConfig,
    state: Mutex<HandleState>,
    /// Signalled whenever content becomes locally available (or the
    /// handle closes), waking blocked enumerations.
    content_arrived: Notify,
}

struct HandleState {
    open: bool,
    next_id: u64,
    registrations: Vec<Arc<Registration>>,
    filters: Vec<FilterEntry>,
    store: ContentStore,
    forwarder: Option<Arc<dyn Forwarder>>,
}

struct FilterEntry {
    id: u64,
    prefix: ContentName,
    filter: Arc<dyn InterestFilter>,
}

struct Registration {
    id: u64,
    /// Replaced in place when a listener returns a follow-up interest.
    interest: Mutex<Interest>,
    sink: Sink,
    /// Dispatch bookkeeping. The lock is never held across a user
    /// callback; `holder` marks the active callback frame instead.
    delivery: Mutex<DeliveryState>,
    /// Signalled when a callback frame finishes, waking a blocked
    /// cancellation.
    settled: Condvar,
}

enum Sink {
    Listener(Arc<dyn InterestListener>),
    Waiter(Mutex<Option<oneshot::Sender<ContentObject>>>),
}

#[derive(Default)]
struct DeliveryState {
    cancelled: bool,
    /// Thread currently running this registration's callback, if any.
    holder: Option<thread::ThreadId>,
    seen: HashSet<ObjectDigest>,
    /// Deliveries that arrived while a callback frame was active.
    pending: VecDeque<Batch>,
}

struct Batch {
    objects: Vec<ContentObject>,
    invalidation: bool,
}

enum Dispatch {
    /// Content went out, the registration stays.
    Delivered,
    /// Content went out and the registration lapsed.
    DeliveredLapsed,
    /// The registration lapsed without a delivery.
    Lapsed,
    Skipped,
}

fn merge_outcomes(a: Dispatch, b: Dispatch) -> Dispatch {
    use Dispatch::{Delivered, DeliveredLapsed, Lapsed, Skipped};
    let delivered =
        matches!(a, Delivered | DeliveredLapsed) || matches!(b, Delivered | DeliveredLapsed);
    let lapsed = matches!(a, DeliveredLapsed | Lapsed) || matches!(b, DeliveredLapsed | Lapsed);
    match (delivered, lapsed) {
        (true, true) => DeliveredLapsed,
        (true, false) => Delivered,
        (false, true) => Lapsed,
        (false, false) => Skipped,
    }
}

impl Handle {
    pub fn new(config: HandleConfig) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                config,
                state: Mutex::new(HandleState {
                    open: true,
                    next_id: 0,
                    registrations: Vec::new(),
                    filters: Vec::new(),
                    store: ContentStore::new(),
                    forwarder: None,
                }),
                content_arrived: Notify::new(),
            }),
        }
    }

    pub fn config(&self) -> &HandleConfig {
        &self.inner.config
    }

    /// Attach the network boundary. Interests with `scope = Some(0)`
    /// never reach it.
    pub fn set_forwarder(&self, forwarder: Arc<dyn Forwarder>) {
        lock(&self.inner.state).forwarder = Some(forwarder);
    }

    pub fn is_open(&self) -> bool {
        lock(&self.inner.state).open
    }

    /// Cancel every outstanding registration and refuse further
    /// operations. Idempotent.
    pub fn close(&self) {
        let registrations = {
            let mut state = lock(&self.inner.state);
            state.open = false;
            state.forwarder = None;
            state.filters.clear();
            std::mem::take(&mut state.registrations)
        };
        for registration in &registrations {
            {
                let mut delivery = lock(&registration.delivery);
                delivery.cancelled = true;
                delivery.pending.clear();
            }
            // Dropping the sender unblocks a pending `get`.
            if let Sink::Waiter(slot) = &registration.sink {
                lock(slot).take();
            }
        }
        self.inner.content_arrived.notify_waiters();
    }

    /// Insert `object` into the local store and deliver it to every
    /// matching registration.
    pub fn publish(&self, object: ContentObject) -> Result<(), HandleError> {
        {
            let mut state = lock(&self.inner.state);
            if !state.open {
                return Err(HandleError::Closed);
            }
            state.store.insert(object.clone());
        }
        debug!(name = %object.name, "publish content object");
        self.dispatch_all(&object);
        self.inner.content_arrived.notify_waiters();
        Ok(())
    }

    /// Offer an object held in a producer buffer to the pending-interest
    /// table. Returns how many registrations consumed it; a consumed
    /// object also lands in the store so it stays independently
    /// fetchable.
    pub(crate) fn offer(&self, object: &ContentObject) -> Result<usize, HandleError> {
        self.ensure_open()?;
        let delivered = self.dispatch_all(object);
        if delivered > 0 {
            lock(&self.inner.state).store.insert(object.clone());
        }
        self.inner.content_arrived.notify_waiters();
        Ok(delivered)
    }

    /// Register a standing interest with a listener and attempt to
    /// service it immediately from the local scope.
    pub fn express_interest(
        &self,
        interest: Interest,
        listener: Arc<dyn InterestListener>,
    ) -> Result<(), HandleError> {
        let registration = self.register(interest.clone(), Sink::Listener(listener))?;
        self.service(&registration, &interest);
        Ok(())
    }

    /// Withdraw the registrations pairing `listener` with an interest
    /// over `interest.name`. Idempotent; waits for an in-flight callback
    /// for that pair to finish, so no callback runs after this returns.
    /// A cancel from inside the registration's own callback returns
    /// immediately instead of waiting for itself.
    pub fn cancel_interest(&self, interest: &Interest, listener: &Arc<dyn InterestListener>) {
        let targets: Vec<Arc<Registration>> = {
            let state = lock(&self.inner.state);
            state
                .registrations
                .iter()
                .filter(|registration| match &registration.sink {
                    Sink::Listener(held) => Arc::ptr_eq(held, listener),
                    Sink::Waiter(_) => false,
                })
                .filter(|registration| lock(&registration.interest).name == interest.name)
                .cloned()
                .collect()
        };
        for registration in &targets {
            let mut delivery = lock(&registration.delivery);
            delivery.cancelled = true;
            delivery.pending.clear();
            while let Some(holder) = delivery.holder {
                // A cancel issued from inside this registration's own
                // callback must not wait for itself.
                if holder == thread::current().id() {
                    break;
                }
                delivery = registration
                    .settled
                    .wait(delivery)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        }
        let ids: Vec<u64> = targets.iter().map(|registration| registration.id).collect();
        self.remove_registrations(&ids);
    }

    /// Wait for one object satisfying `interest`.
    ///
    /// Serves from the local scope when possible, otherwise blocks the
    /// task until a match arrives or the deadline passes. `None` waits
    /// forever. A deadline with no match is `Ok(None)`; not finding
    /// content is a normal outcome.
    pub async fn get(
        &self,
        interest: Interest,
        timeout: Option<Duration>,
    ) -> Result<Option<ContentObject>, HandleError> {
        let (sender, receiver) = oneshot::channel();
        let registration =
            self.register(interest.clone(), Sink::Waiter(Mutex::new(Some(sender))))?;
        self.service(&registration, &interest);

        let outcome = match timeout {
            Some(duration) => tokio::time::timeout(duration, receiver).await.ok(),
            None => Some(receiver.await),
        };

        lock(&registration.delivery).cancelled = true;
        self.remove_registrations(&[registration.id]);

        match outcome {
            Some(Ok(object)) => Ok(Some(object)),
            // The sender is dropped only when the handle closes.
            Some(Err(_)) => Err(HandleError::Closed),
            None => Ok(None),
        }
    }

    /// The immediate-check path of [`get`](Self::get): local scope only,
    /// never blocks, never forwards.
    pub fn get_now(&self, interest: &Interest) -> Result<Option<ContentObject>, HandleError> {
        self.ensure_open()?;
        if interest.answer_origin_kind.is_mark_stale() {
            let staled = lock(&self.inner.state).store.mark_stale(interest);
            return Ok(staled.into_iter().next());
        }
        let available = self.collect(interest);
        Ok(matching::select(interest, &available).cloned())
    }

    /// Everything currently available under `interest`, deduplicated by
    /// name. When nothing is available yet, waits up to `timeout` for
    /// the first arrival and re-collects; the deadline passing yields an
    /// empty list.
    pub async fn enumerate(
        &self,
        interest: &Interest,
        timeout: Option<Duration>,
    ) -> Result<Vec<ContentObject>, HandleError> {
        let deadline = timeout.map(|duration| tokio::time::Instant::now() + duration);
        loop {
            self.ensure_open()?;
            let notified = self.inner.content_arrived.notified();
            // The store is keyed by name, so results are name-unique.
            let mut results = self.collect(interest);
            if !results.is_empty() {
                results.sort_by(|a, b| a.name.cmp(&b.name));
                return Ok(results);
            }
            match deadline {
                None => notified.await,
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, notified).await.is_err() {
                        return Ok(Vec::new());
                    }
                }
            }
        }
    }

    /// Latest version below `base`: a rightmost-child interest over
    /// version components, optionally restricted to one publisher.
    ///
    /// Canonical order sorts any child component longer than a version
    /// component above every version, so a non-version winner is
    /// excluded and the interest reissued until a version (or nothing)
    /// remains.
    pub async fn get_latest_version(
        &self,
        base: &ContentName,
        publisher: Option<PublisherId>,
        timeout: Option<Duration>,
    ) -> Result<Option<ContentObject>, HandleError> {
        let deadline = timeout.map(|duration| tokio::time::Instant::now() + duration);
        let mut exclude = Exclude::default();
        loop {
            let mut interest = Interest::new(base.clone())
                .with_child_selector(ChildSelector::Rightmost)
                .with_min_suffix_components(1);
            if !exclude.is_empty() {
                interest = interest.with_exclude(exclude.clone());
            }
            if let Some(publisher) = publisher {
                interest = interest.with_publisher(publisher);
            }
            let remaining = deadline
                .map(|deadline| deadline.saturating_duration_since(tokio::time::Instant::now()));
            let Some(found) = self.get(interest, remaining).await? else {
                return Ok(None);
            };
            if versioning::is_version_of(&found.name, base) {
                return Ok(Some(found));
            }
            exclude.insert(found.name.components()[base.len()].clone());
            if let Some(deadline) = deadline {
                if tokio::time::Instant::now() >= deadline {
                    return Ok(None);
                }
            }
        }
    }

    /// Register a producer buffer consulted before interests under
    /// `prefix` leave the local scope. Returns a token for
    /// [`unregister_filter`](Self::unregister_filter).
    pub fn register_filter(
        &self,
        prefix: ContentName,
        filter: Arc<dyn InterestFilter>,
    ) -> Result<u64, HandleError> {
        let mut state = lock(&self.inner.state);
        if !state.open {
            return Err(HandleError::Closed);
        }
        let id = state.next_id;
        state.next_id += 1;
        state.filters.push(FilterEntry { id, prefix, filter });
        Ok(id)
    }

    pub fn unregister_filter(&self, id: u64) {
        lock(&self.inner.state)
            .filters
            .retain(|entry| entry.id != id);
    }

    fn ensure_open(&self) -> Result<(), HandleError> {
        if lock(&self.inner.state).open {
            Ok(())
        } else {
            Err(HandleError::Closed)
        }
    }

    fn register(&self, interest: Interest, sink: Sink) -> Result<Arc<Registration>, HandleError> {
        let mut state = lock(&self.inner.state);
        if !state.open {
            return Err(HandleError::Closed);
        }
        let id = state.next_id;
        state.next_id += 1;
        let registration = Arc::new(Registration {
            id,
            interest: Mutex::new(interest),
            sink,
            delivery: Mutex::new(DeliveryState::default()),
            settled: Condvar::new(),
        });
        state.registrations.push(Arc::clone(&registration));
        Ok(registration)
    }

    /// Immediate service of a fresh registration: invalidation for
    /// mark-stale interests, local content otherwise, the forwarder as
    /// the last resort.
    fn service(&self, registration: &Arc<Registration>, interest: &Interest) {
        if interest.answer_origin_kind.is_mark_stale() {
            let staled = lock(&self.inner.state).store.mark_stale(interest);
            debug!(prefix = %interest.name, count = staled.len(), "mark stale");
            if !staled.is_empty() {
                let outcome = self.dispatch(registration, &staled, true);
                self.finish(registration, &outcome);
            }
            return;
        }

        let available = self.collect(interest);
        if let Some(best) = matching::select(interest, &available) {
            let best = best.clone();
            let outcome = self.dispatch(registration, std::slice::from_ref(&best), false);
            if self.finish(registration, &outcome) {
                return;
            }
        }
        self.forward(interest);
    }

    fn forward(&self, interest: &Interest) {
        if interest.is_local_only() {
            return;
        }
        let forwarder = lock(&self.inner.state).forwarder.clone();
        if let Some(forwarder) = forwarder {
            debug!(name = %interest.name, "forwarding interest");
            forwarder.send_interest(interest);
        }
    }

    /// Everything locally available that matches: producer buffers are
    /// drained into the store first, then the store is queried.
    fn collect(&self, interest: &Interest) -> Vec<ContentObject> {
        let filters: Vec<Arc<dyn InterestFilter>> = lock(&self.inner.state)
            .filters
            .iter()
            .filter(|entry| {
                entry.prefix.is_prefix_of(&interest.name)
                    || interest.name.is_prefix_of(&entry.prefix)
            })
            .map(|entry| Arc::clone(&entry.filter))
            .collect();

        // Filters take their own locks; never call them under ours.
        let mut drained = Vec::new();
        for filter in filters {
            drained.extend(filter.drain(interest));
        }

        let mut state = lock(&self.inner.state);
        for object in drained {
            state.store.insert(object);
        }
        state.store.matches(interest)
    }

    fn dispatch_all(&self, object: &ContentObject) -> usize {
        let snapshot: Vec<Arc<Registration>> =
            lock(&self.inner.state).registrations.clone();
        let objects = std::slice::from_ref(object);
        let mut delivered = 0;
        let mut lapsed = Vec::new();
        for registration in snapshot {
            match self.dispatch(&registration, objects, false) {
                Dispatch::Delivered => delivered += 1,
                Dispatch::DeliveredLapsed => {
                    delivered += 1;
                    lapsed.push(registration.id);
                }
                Dispatch::Lapsed => lapsed.push(registration.id),
                Dispatch::Skipped => {}
            }
        }
        self.remove_registrations(&lapsed);
        delivered
    }

    /// Deliver matching objects to one registration, then drain whatever
    /// got queued behind an active callback frame. `invalidation`
    /// selects the mark-stale acknowledgement path: content never goes
    /// to a mark-stale registration and acknowledgements never go to an
    /// ordinary one.
    fn dispatch(
        &self,
        registration: &Registration,
        objects: &[ContentObject],
        invalidation: bool,
    ) -> Dispatch {
        let mut result = self.deliver(registration, objects, invalidation);
        loop {
            let batch = {
                let mut delivery = lock(&registration.delivery);
                // With a callback frame still active, that frame drains
                // the queue once it returns.
                if delivery.holder.is_some() || delivery.cancelled {
                    break;
                }
                match delivery.pending.pop_front() {
                    Some(batch) => batch,
                    None => break,
                }
            };
            let outcome = self.deliver(registration, &batch.objects, batch.invalidation);
            result = merge_outcomes(result, outcome);
        }
        result
    }

    /// One delivery round. Never holds the delivery lock across a user
    /// callback: the interest and dedup decision are taken under the
    /// lock, `holder` marks the frame, the lock is released while the
    /// callback runs and reacquired to apply its outcome. A dispatch
    /// arriving while a frame is active (a listener publishing from its
    /// own callback included) is queued instead of blocking.
    fn deliver(
        &self,
        registration: &Registration,
        objects: &[ContentObject],
        invalidation: bool,
    ) -> Dispatch {
        let mut delivery = lock(&registration.delivery);
        if delivery.cancelled {
            return Dispatch::Skipped;
        }
        let interest = lock(&registration.interest).clone();
        if interest.answer_origin_kind.is_mark_stale() != invalidation {
            return Dispatch::Skipped;
        }

        if delivery.holder.is_some() {
            if objects
                .iter()
                .any(|object| matching::matches_object(&interest, object))
            {
                delivery.pending.push_back(Batch {
                    objects: objects.to_vec(),
                    invalidation,
                });
                return Dispatch::Delivered;
            }
            return Dispatch::Skipped;
        }

        let seen = &mut delivery.seen;
        let mut fresh: Vec<ContentObject> = objects
            .iter()
            .filter(|object| matching::matches_object(&interest, object))
            .filter(|object| seen.insert(object.digest()))
            .cloned()
            .collect();
        if fresh.is_empty() {
            return Dispatch::Skipped;
        }

        match &registration.sink {
            Sink::Waiter(slot) => {
                let Some(sender) = lock(slot).take() else {
                    return Dispatch::Skipped;
                };
                let _ = sender.send(fresh.swap_remove(0));
                delivery.cancelled = true;
                Dispatch::DeliveredLapsed
            }
            Sink::Listener(listener) => {
                delivery.holder = Some(thread::current().id());
                drop(delivery);

                let outcome =
                    catch_unwind(AssertUnwindSafe(|| listener.handle_content(&fresh, &interest)));

                let mut delivery = lock(&registration.delivery);
                delivery.holder = None;
                let result = match outcome {
                    // A cancel won the race while the callback ran; it
                    // owns the removal and the refresh is void.
                    Ok(_) if delivery.cancelled => Dispatch::Delivered,
                    Ok(Some(refreshed)) => {
                        if refreshed.nonce != interest.nonce {
                            delivery.seen.clear();
                        }
                        *lock(&registration.interest) = refreshed;
                        Dispatch::Delivered
                    }
                    Ok(None) => {
                        delivery.cancelled = true;
                        delivery.pending.clear();
                        Dispatch::DeliveredLapsed
                    }
                    Err(_) => {
                        warn!(
                            interest = %interest.name,
                            "interest listener panicked, dropping its registration"
                        );
                        delivery.cancelled = true;
                        delivery.pending.clear();
                        Dispatch::Lapsed
                    }
                };
                drop(delivery);
                registration.settled.notify_all();
                result
            }
        }
    }

    /// Apply a dispatch outcome to the table; true when content went
    /// out.
    fn finish(&self, registration: &Arc<Registration>, outcome: &Dispatch) -> bool {
        match outcome {
            Dispatch::Delivered => true,
            Dispatch::DeliveredLapsed => {
                self.remove_registrations(&[registration.id]);
                true
            }
            Dispatch::Lapsed => {
                self.remove_registrations(&[registration.id]);
                false
            }
            Dispatch::Skipped => false,
        }
    }

    fn remove_registrations(&self, ids: &[u64]) {
        if ids.is_empty() {
            return;
        }
        lock(&self.inner.state)
            .registrations
            .retain(|registration| !ids.contains(&registration.id));
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::new(HandleConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use namecast_core::profiles::versioning::Versioner;
    use namecast_core::{
        AnswerOriginKind, ContentName, ContentObject, Interest, PrivateKey, Signer as _,
    };

    use crate::traits::{Forwarder, InterestListener};

    use super::{Handle, HandleError};

    fn name(input: &str) -> ContentName {
        ContentName::from_native(input).unwrap()
    }

    fn object(key: &PrivateKey, input: &str) -> ContentObject {
        ContentObject::build(name(input), input.as_bytes().to_vec(), key)
    }

    fn mark_stale(prefix: &str) -> Interest {
        Interest::new(name(prefix))
            .with_scope(0)
            .with_answer_origin_kind(AnswerOriginKind::default() | AnswerOriginKind::MARK_STALE)
    }

    /// Counts deliveries; optionally keeps its registration alive,
    /// either under the same nonce or a refreshed one.
    struct CountingListener {
        count: AtomicUsize,
        keep_alive: bool,
        refresh: bool,
    }

    impl CountingListener {
        fn new(keep_alive: bool, refresh: bool) -> Arc<Self> {
            Arc::new(Self {
                count: AtomicUsize::new(0),
                keep_alive,
                refresh,
            })
        }

        fn count(&self) -> usize {
            self.count.load(Ordering::SeqCst)
        }
    }

    impl InterestListener for CountingListener {
        fn handle_content(
            &self,
            objects: &[ContentObject],
            interest: &Interest,
        ) -> Option<Interest> {
            self.count.fetch_add(objects.len(), Ordering::SeqCst);
            if !self.keep_alive {
                return None;
            }
            if self.refresh {
                Some(interest.refreshed())
            } else {
                Some(interest.clone())
            }
        }
    }

    struct PanickyListener;

    impl InterestListener for PanickyListener {
        fn handle_content(&self, _: &[ContentObject], _: &Interest) -> Option<Interest> {
            panic!("listener blew up");
        }
    }

    /// Publishes a derived object through its own handle the first time
    /// it receives content.
    struct RepublishingListener {
        handle: Handle,
        key: PrivateKey,
        republished: AtomicBool,
        count: AtomicUsize,
    }

    impl InterestListener for RepublishingListener {
        fn handle_content(
            &self,
            objects: &[ContentObject],
            interest: &Interest,
        ) -> Option<Interest> {
            self.count.fetch_add(objects.len(), Ordering::SeqCst);
            if !self.republished.swap(true, Ordering::SeqCst) {
                self.handle.publish(object(&self.key, "/test/derived")).unwrap();
            }
            Some(interest.refreshed())
        }
    }

    /// Cancels its own registration from inside the callback.
    struct SelfCancellingListener {
        handle: Handle,
        this: Mutex<Option<Arc<dyn InterestListener>>>,
        count: AtomicUsize,
    }

    impl InterestListener for SelfCancellingListener {
        fn handle_content(
            &self,
            objects: &[ContentObject],
            interest: &Interest,
        ) -> Option<Interest> {
            self.count.fetch_add(objects.len(), Ordering::SeqCst);
            let this = self.this.lock().unwrap().clone().unwrap();
            self.handle.cancel_interest(interest, &this);
            Some(interest.clone())
        }
    }

    #[derive(Default)]
    struct RecordingForwarder {
        sent: Mutex<Vec<ContentName>>,
    }

    impl RecordingForwarder {
        fn sent(&self) -> Vec<ContentName> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Forwarder for RecordingForwarder {
        fn send_interest(&self, interest: &Interest) {
            self.sent.lock().unwrap().push(interest.name.clone());
        }
    }

    #[tokio::test]
    async fn get_serves_from_the_local_store() {
        let handle = Handle::default();
        let key = PrivateKey::new();
        handle.publish(object(&key, "/test/key")).unwrap();

        let found = handle
            .get(Interest::new(name("/test")), Some(Duration::from_millis(50)))
            .await
            .unwrap();
        assert_eq!(found.unwrap().name, name("/test/key"));
    }

    #[tokio::test(start_paused = true)]
    async fn get_reports_not_found_at_the_deadline() {
        let handle = Handle::default();
        let started = tokio::time::Instant::now();

        let found = handle
            .get(
                Interest::new(name("/missing")),
                Some(Duration::from_millis(1000)),
            )
            .await
            .unwrap();

        assert!(found.is_none());
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(1000));
        assert!(elapsed < Duration::from_millis(1100));
    }

    #[tokio::test]
    async fn publish_unblocks_a_pending_get() {
        let handle = Handle::default();
        let key = PrivateKey::new();

        let waiter = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.get(Interest::new(name("/test")), None).await })
        };
        tokio::task::yield_now().await;

        handle.publish(object(&key, "/test/key")).unwrap();
        let found = waiter.await.unwrap().unwrap();
        assert_eq!(found.unwrap().name, name("/test/key"));
    }

    #[tokio::test]
    async fn duplicates_are_suppressed_under_one_nonce() {
        let handle = Handle::default();
        let key = PrivateKey::new();
        let listener = CountingListener::new(true, false);

        handle
            .express_interest(Interest::new(name("/test")), listener.clone())
            .unwrap();

        let same = object(&key, "/test/key");
        handle.publish(same.clone()).unwrap();
        handle.publish(same).unwrap();
        assert_eq!(listener.count(), 1);
    }

    #[tokio::test]
    async fn a_refreshed_nonce_resets_duplicate_tracking() {
        let handle = Handle::default();
        let key = PrivateKey::new();
        let listener = CountingListener::new(true, true);

        handle
            .express_interest(Interest::new(name("/test")), listener.clone())
            .unwrap();

        let same = object(&key, "/test/key");
        handle.publish(same.clone()).unwrap();
        handle.publish(same).unwrap();
        assert_eq!(listener.count(), 2);
    }

    #[tokio::test]
    async fn a_listener_returning_none_lapses() {
        let handle = Handle::default();
        let key = PrivateKey::new();
        let listener = CountingListener::new(false, false);

        handle
            .express_interest(Interest::new(name("/test")), listener.clone())
            .unwrap();

        handle.publish(object(&key, "/test/a")).unwrap();
        handle.publish(object(&key, "/test/b")).unwrap();
        assert_eq!(listener.count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn no_delivery_after_cancel_returns() {
        let handle = Handle::default();
        let listener = CountingListener::new(true, true);
        let as_listener: Arc<dyn InterestListener> = listener.clone();
        let interest = Interest::new(name("/race"));

        handle
            .express_interest(interest.clone(), as_listener.clone())
            .unwrap();

        let publisher = {
            let handle = handle.clone();
            tokio::spawn(async move {
                let key = PrivateKey::new();
                for i in 0..256 {
                    let _ = handle.publish(object(&key, &format!("/race/{i}")));
                    tokio::task::yield_now().await;
                }
            })
        };

        tokio::time::sleep(Duration::from_millis(5)).await;
        handle.cancel_interest(&interest, &as_listener);
        let at_cancel = listener.count();

        publisher.await.unwrap();
        assert_eq!(listener.count(), at_cancel);
    }

    #[tokio::test]
    async fn local_only_interests_never_reach_the_forwarder() {
        let handle = Handle::default();
        let key = PrivateKey::new();
        let forwarder = Arc::new(RecordingForwarder::default());
        handle.set_forwarder(forwarder.clone());
        handle.publish(object(&key, "/local/key")).unwrap();

        let listener = CountingListener::new(true, false);
        handle
            .express_interest(Interest::new(name("/remote")), listener.clone())
            .unwrap();
        handle
            .express_interest(
                Interest::new(name("/remote")).with_scope(0),
                listener.clone(),
            )
            .unwrap();
        // Satisfied locally, nothing to forward either.
        handle
            .express_interest(Interest::new(name("/local")), listener)
            .unwrap();

        assert_eq!(forwarder.sent(), vec![name("/remote")]);
    }

    #[tokio::test]
    async fn a_panicking_listener_is_isolated() {
        let handle = Handle::default();
        let key = PrivateKey::new();
        let panicky: Arc<dyn InterestListener> = Arc::new(PanickyListener);
        let counting = CountingListener::new(true, true);

        handle
            .express_interest(Interest::new(name("/test")), panicky)
            .unwrap();
        handle
            .express_interest(Interest::new(name("/test")), counting.clone())
            .unwrap();

        handle.publish(object(&key, "/test/a")).unwrap();
        handle.publish(object(&key, "/test/b")).unwrap();

        assert_eq!(counting.count(), 2);
        assert!(handle.is_open());
    }

    #[tokio::test]
    async fn a_closed_handle_refuses_operations() {
        let handle = Handle::default();
        let key = PrivateKey::new();
        handle.close();
        handle.close();

        assert!(matches!(
            handle.publish(object(&key, "/test/key")),
            Err(HandleError::Closed)
        ));
        let listener: Arc<dyn InterestListener> = CountingListener::new(false, false);
        assert!(matches!(
            handle.express_interest(Interest::new(name("/test")), listener),
            Err(HandleError::Closed)
        ));
        assert!(matches!(
            handle.get(Interest::new(name("/test")), None).await,
            Err(HandleError::Closed)
        ));
        assert!(matches!(
            handle.enumerate(&Interest::new(name("/test")), None).await,
            Err(HandleError::Closed)
        ));
    }

    #[tokio::test]
    async fn close_unblocks_a_pending_get() {
        let handle = Handle::default();
        let waiter = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.get(Interest::new(name("/test")), None).await })
        };
        tokio::task::yield_now().await;

        handle.close();
        assert!(matches!(waiter.await.unwrap(), Err(HandleError::Closed)));
    }

    #[tokio::test]
    async fn enumerate_collects_everything_under_a_prefix() {
        let handle = Handle::default();
        let key = PrivateKey::new();
        for input in ["/CPOF/foo", "/CPOF/bar/lid", "/CPOF/bar/jar", "/elsewhere"] {
            handle.publish(object(&key, input)).unwrap();
        }

        let all = handle
            .enumerate(&Interest::new(name("/CPOF")), None)
            .await
            .unwrap();
        let names: Vec<ContentName> = all.into_iter().map(|object| object.name).collect();
        assert_eq!(
            names,
            vec![
                name("/CPOF/bar/jar"),
                name("/CPOF/bar/lid"),
                name("/CPOF/foo"),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn enumerate_is_empty_after_the_deadline() {
        let handle = Handle::default();
        let started = tokio::time::Instant::now();

        let all = handle
            .enumerate(
                &Interest::new(name("/nothing")),
                Some(Duration::from_millis(500)),
            )
            .await
            .unwrap();

        assert!(all.is_empty());
        assert!(started.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn enumerate_waits_for_the_first_arrival() {
        let handle = Handle::default();
        {
            let handle = handle.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                let key = PrivateKey::new();
                handle.publish(object(&key, "/late/one")).unwrap();
            });
        }

        let all = handle
            .enumerate(&Interest::new(name("/late")), Some(Duration::from_secs(1)))
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, name("/late/one"));
    }

    #[tokio::test]
    async fn latest_version_picks_the_rightmost_version() {
        let handle = Handle::default();
        let key = PrivateKey::new();
        let versioner = Versioner::new();
        let base = name("/test/key");

        let v1 = versioner.mint_at(&base, 4096);
        let v2 = versioner.mint_at(&base, 8192);
        handle
            .publish(ContentObject::build(v1, b"v1".to_vec(), &key))
            .unwrap();
        handle
            .publish(ContentObject::build(v2.clone(), b"v2".to_vec(), &key))
            .unwrap();

        let latest = handle
            .get_latest_version(&base, None, Some(Duration::from_millis(50)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.name, v2);
        assert_eq!(latest.content, b"v2");
    }

    #[tokio::test]
    async fn latest_version_honors_the_publisher_filter() {
        let handle = Handle::default();
        let ours = PrivateKey::new();
        let theirs = PrivateKey::new();
        let versioner = Versioner::new();
        let base = name("/test/key");

        let v1 = versioner.mint_at(&base, 4096);
        let v2 = versioner.mint_at(&base, 8192);
        handle
            .publish(ContentObject::build(v1.clone(), b"ours".to_vec(), &ours))
            .unwrap();
        handle
            .publish(ContentObject::build(v2, b"theirs".to_vec(), &theirs))
            .unwrap();

        let latest = handle
            .get_latest_version(
                &base,
                Some(ours.publisher_id()),
                Some(Duration::from_millis(50)),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.name, v1);
    }

    #[tokio::test]
    async fn a_listener_may_publish_from_its_callback() {
        let handle = Handle::default();
        let key = PrivateKey::new();
        let listener = Arc::new(RepublishingListener {
            handle: handle.clone(),
            key: PrivateKey::new(),
            republished: AtomicBool::new(false),
            count: AtomicUsize::new(0),
        });
        handle
            .express_interest(Interest::new(name("/test")), listener.clone())
            .unwrap();

        // Must return rather than deadlock on the re-entrant publish.
        handle.publish(object(&key, "/test/key")).unwrap();

        // The original object and the derived one both got delivered.
        assert_eq!(listener.count.load(Ordering::SeqCst), 2);
        assert!(handle
            .get_now(&Interest::new(name("/test/derived")))
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn a_listener_may_cancel_itself_from_its_callback() {
        let handle = Handle::default();
        let key = PrivateKey::new();
        let listener = Arc::new(SelfCancellingListener {
            handle: handle.clone(),
            this: Mutex::new(None),
            count: AtomicUsize::new(0),
        });
        let as_listener: Arc<dyn InterestListener> = listener.clone();
        *listener.this.lock().unwrap() = Some(as_listener.clone());

        handle
            .express_interest(Interest::new(name("/test")), as_listener)
            .unwrap();

        // Must return rather than deadlock on the re-entrant cancel.
        handle.publish(object(&key, "/test/a")).unwrap();
        handle.publish(object(&key, "/test/b")).unwrap();
        assert_eq!(listener.count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn latest_version_ignores_non_version_siblings() {
        let handle = Handle::default();
        let key = PrivateKey::new();
        let versioner = Versioner::new();
        let base = name("/test/key");

        // Longer than any version component, so it wins the rightmost
        // tie-break under canonical (length-first) order.
        handle
            .publish(object(&key, "/test/key/averylongcomponent"))
            .unwrap();
        let v1 = versioner.mint_at(&base, 4096);
        handle
            .publish(ContentObject::build(v1.clone(), b"v1".to_vec(), &key))
            .unwrap();

        let latest = handle
            .get_latest_version(&base, None, Some(Duration::from_millis(50)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.name, v1);

        // A base with only non-version children comes up empty.
        handle.publish(object(&key, "/test/other/plain")).unwrap();
        let none = handle
            .get_latest_version(&name("/test/other"), None, Some(Duration::from_millis(50)))
            .await
            .unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn mark_stale_hides_entries_from_ordinary_interests() {
        let handle = Handle::default();
        let key = PrivateKey::new();
        handle.publish(object(&key, "/zone/a")).unwrap();

        let ack = handle.get_now(&mark_stale("/zone")).unwrap();
        assert!(ack.is_some());

        assert!(handle.get_now(&Interest::new(name("/zone"))).unwrap().is_none());

        let stale_ok = Interest::new(name("/zone")).with_answer_origin_kind(
            AnswerOriginKind::default() | AnswerOriginKind::STALE,
        );
        assert!(handle.get_now(&stale_ok).unwrap().is_some());

        // Nothing left to invalidate.
        assert!(handle.get_now(&mark_stale("/zone")).unwrap().is_none());
    }
}
