//! Per-actor request bookkeeping.
//!
//! The debugger server answers requests to one actor strictly in order and
//! a reply carries no request id, only the `from` actor. The registry
//! therefore allows at most one in-flight request per actor and queues the
//! rest until the actor is free again.
//!
//! ```text
//! active:  root     → completion          (waiting for reply)
//!          addons1  → completion
//! pending: root     → [listAddons, getRoot]   (FIFO, sent one by one)
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;

use rustc_hash::FxHashMap;
use tokio::sync::oneshot;
use tracing::trace;

use crate::error::{Error, Result};
use crate::identifiers::ActorId;
use crate::protocol::Message;

// ============================================================================
// Types
// ============================================================================

/// Completion handle of one request.
pub(crate) type Completion = oneshot::Sender<Result<Message>>;

/// A request waiting for its target actor to become free.
struct PendingRequest {
    /// Request to transmit once the actor is free.
    request: Message,
    /// Where the reply goes.
    completion: Completion,
}

// ============================================================================
// RequestRegistry
// ============================================================================

/// Active and pending requests, keyed by target actor.
///
/// Every completion handed to the registry is settled exactly once: by
/// [`RequestRegistry::settle`], by [`RequestRegistry::close`], or by being
/// rejected on submission after close.
#[derive(Default)]
pub(crate) struct RequestRegistry {
    /// At most one outstanding request per actor.
    active: FxHashMap<ActorId, Completion>,
    /// FIFO queue per actor.
    pending: FxHashMap<ActorId, VecDeque<PendingRequest>>,
    /// Set once by [`RequestRegistry::close`].
    closed: bool,
}

impl RequestRegistry {
    /// Creates an empty registry.
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers a reply expected from `actor` without sending anything.
    ///
    /// Used for the greeting the root actor sends on connect.
    pub(crate) fn expect_reply(&mut self, actor: ActorId, completion: Completion) {
        if self.closed {
            let _ = completion.send(Err(Error::ConnectionClosed));
            return;
        }
        self.active.insert(actor, completion);
    }

    /// Submits a request.
    ///
    /// Returns the request if it must be transmitted now, or `None` if it was
    /// queued behind the actor's in-flight request (or rejected because the
    /// registry is closed).
    pub(crate) fn submit(
        &mut self,
        actor: ActorId,
        request: Message,
        completion: Completion,
    ) -> Option<Message> {
        if self.closed {
            let _ = completion.send(Err(Error::ConnectionClosed));
            return None;
        }

        if self.active.contains_key(&actor) {
            trace!(actor = %actor, "Actor busy, queueing request");
            self.pending
                .entry(actor)
                .or_default()
                .push_back(PendingRequest {
                    request,
                    completion,
                });
            return None;
        }

        self.active.insert(actor, completion);
        Some(request)
    }

    /// Removes and returns the active completion for `actor`.
    pub(crate) fn settle(&mut self, actor: &ActorId) -> Option<Completion> {
        self.active.remove(actor)
    }

    /// Activates the next pending request of every free actor.
    ///
    /// Requests whose caller has gone away are dropped without being sent.
    pub(crate) fn flush(&mut self) -> Vec<Message> {
        let free: Vec<ActorId> = self
            .pending
            .keys()
            .filter(|actor| !self.active.contains_key(*actor))
            .cloned()
            .collect();

        let mut ready = Vec::with_capacity(free.len());

        for actor in free {
            let Some(queue) = self.pending.get_mut(&actor) else {
                continue;
            };

            while let Some(next) = queue.pop_front() {
                if next.completion.is_closed() {
                    trace!(actor = %actor, "Dropping abandoned request");
                    continue;
                }
                self.active.insert(actor.clone(), next.completion);
                ready.push(next.request);
                break;
            }

            if queue.is_empty() {
                self.pending.remove(&actor);
            }
        }

        ready
    }

    /// Closes the registry and returns every outstanding completion.
    ///
    /// Returns nothing on the second and later calls.
    pub(crate) fn close(&mut self) -> Vec<Completion> {
        if self.closed {
            return Vec::new();
        }
        self.closed = true;

        let mut completions: Vec<Completion> = self.active.drain().map(|(_, c)| c).collect();
        for (_, queue) in self.pending.drain() {
            completions.extend(queue.into_iter().map(|p| p.completion));
        }
        completions
    }

    /// Returns `true` once [`RequestRegistry::close`] has run.
    #[inline]
    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }

    /// Returns `true` if `actor` has an in-flight request.
    #[inline]
    pub(crate) fn is_active(&self, actor: &ActorId) -> bool {
        self.active.contains_key(actor)
    }

    /// Returns the number of active plus pending requests.
    pub(crate) fn outstanding(&self) -> usize {
        self.active.len() + self.pending.values().map(VecDeque::len).sum::<usize>()
    }
}

// ============================================================================
// Tests
// ============================================================================
