// SPDX-License-Identifier: MIT OR Apache-2.0

//! Callback seams between the handle, producers and the network layer.

use namecast_core::{ContentObject, Interest};

/// Receives content matching a standing interest registration.
pub trait InterestListener: Send + Sync {
    /// Handle one batch of matching objects.
    ///
    /// Returning a follow-up interest keeps the registration alive; a
    /// fresh nonce resets duplicate-delivery tracking. Returning `None`
    /// lets the registration lapse.
    ///
    /// The callback runs on the delivering task with no internal lock
    /// held, so it may call back into the handle freely: publishing,
    /// registering further interests and cancelling registrations (its
    /// own included) are all allowed. A delivery this triggers for the
    /// registration itself is queued and runs after the callback
    /// returns.
    fn handle_content(&self, objects: &[ContentObject], interest: &Interest) -> Option<Interest>;
}

/// A producer-side buffer consulted before an interest leaves the local
/// scope.
pub trait InterestFilter: Send + Sync {
    /// Remove and return every buffered object matching `interest`.
    fn drain(&self, interest: &Interest) -> Vec<ContentObject>;
}

/// Boundary to the network layer.
pub trait Forwarder: Send + Sync {
    /// Hand an interest to the network. Never called for interests with
    /// `scope = Some(0)`.
    fn send_interest(&self, interest: &Interest);
}
