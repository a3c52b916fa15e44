//! Registry of pending operations, driven by the host's tick.
//!
//! Operations are keyed by [`CallKey`]: the caller context plus the call
//! site inside it. Only one operation per key may be outstanding. The
//! registry is the one piece of process-wide mutable state; issue, tick and
//! release all serialize on its lock. Continuations run after the lock is
//! released, so a resumed caller may immediately issue another call.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;
use crate::handle::RequestId;
use crate::pending::{PendingOperation, PollStatus};

/// Unique identifier for a caller context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContextId(Uuid);

impl ContextId {
    /// Create a new random ContextId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Host-assigned identity of a call site within a caller context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallSiteId(pub u64);

impl fmt::Display for CallSiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallKey {
    pub context: ContextId,
    pub call_site: CallSiteId,
}

/// What one [`LatentScheduler::tick`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub resumed: usize,
    pub abandoned: usize,
    /// Operations still outstanding after the tick
    pub pending: usize,
}

#[derive(Default)]
struct Registry {
    contexts: HashSet<ContextId>,
    operations: HashMap<CallKey, PendingOperation>,
}

#[derive(Default)]
pub struct LatentScheduler {
    registry: Mutex<Registry>,
}

impl LatentScheduler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A panic inside a `try_register` builder leaves the registry untouched,
    /// so a poisoned lock is recovered rather than propagated.
    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new live caller context.
    ///
    /// Dropping the returned guard releases the context and abandons its
    /// outstanding operations.
    pub fn open_context(self: &Arc<Self>) -> CallerContext {
        let id = ContextId::new();
        self.lock().contexts.insert(id);
        tracing::debug!(context = %id, "Opened caller context");
        CallerContext {
            id,
            scheduler: Arc::downgrade(self),
        }
    }

    pub fn is_live(&self, context: ContextId) -> bool {
        self.lock().contexts.contains(&context)
    }

    pub fn is_outstanding(&self, key: CallKey) -> bool {
        self.lock().operations.contains_key(&key)
    }

    /// Number of outstanding operations across all contexts.
    pub fn outstanding(&self) -> usize {
        self.lock().operations.len()
    }

    /// Build and register an operation for `key` unless one is outstanding.
    ///
    /// `make` runs under the registry lock and only when the key is free, so
    /// a suppressed call never creates a request. Returns the new request id,
    /// or `None` when suppressed.
    pub fn try_register<F>(&self, key: CallKey, make: F) -> Result<Option<RequestId>, Error>
    where
        F: FnOnce() -> PendingOperation,
    {
        let mut registry = self.lock();
        if !registry.contexts.contains(&key.context) {
            return Err(Error::UnknownContext(key.context));
        }
        if registry.operations.contains_key(&key) {
            return Ok(None);
        }

        let operation = make();
        let id = operation.request_id();
        registry.operations.insert(key, operation);
        Ok(id)
    }

    /// Poll every outstanding operation once.
    ///
    /// Ready operations are taken out of the registry one at a time, so a
    /// continuation that releases its context (or another one) is seen by
    /// every operation polled after it.
    pub fn tick(&self) -> TickReport {
        let ready: Vec<CallKey> = self
            .lock()
            .operations
            .iter_mut()
            .filter_map(|(key, operation)| operation.is_ready().then_some(*key))
            .collect();

        let mut report = TickReport::default();
        for key in ready {
            let (mut operation, live) = {
                let mut registry = self.lock();
                // Gone if an earlier continuation released its context.
                let Some(operation) = registry.operations.remove(&key) else {
                    continue;
                };
                (operation, registry.contexts.contains(&key.context))
            };

            if !live {
                operation.on_owner_released();
            }
            match operation.poll() {
                PollStatus::Resumed => report.resumed += 1,
                PollStatus::Abandoned => report.abandoned += 1,
                PollStatus::Pending | PollStatus::Finished => {}
            }
        }

        report.pending = self.outstanding();
        report
    }

    /// Request cancellation of the operation outstanding for `key`.
    pub fn cancel(&self, key: CallKey) -> bool {
        self.lock()
            .operations
            .get_mut(&key)
            .and_then(PendingOperation::handle_mut)
            .map(|handle| handle.cancel())
            .unwrap_or(false)
    }

    /// Tear down a caller context.
    ///
    /// Its operations release their handles without cancelling and finish
    /// without resuming. Returns how many operations were abandoned.
    pub fn release_context(&self, context: ContextId) -> usize {
        let released: Vec<PendingOperation> = {
            let mut guard = self.lock();
            let registry = &mut *guard;
            registry.contexts.remove(&context);
            let keys: Vec<CallKey> = registry
                .operations
                .keys()
                .filter(|key| key.context == context)
                .copied()
                .collect();
            keys.iter()
                .filter_map(|key| registry.operations.remove(key))
                .collect()
        };

        let count = released.len();
        for mut operation in released {
            operation.on_owner_released();
            operation.poll();
        }
        tracing::debug!(context = %context, abandoned = count, "Released caller context");
        count
    }
}

/// Lifetime guard for a caller context.
pub struct CallerContext {
    id: ContextId,
    scheduler: Weak<LatentScheduler>,
}

impl CallerContext {
    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn key(&self, call_site: CallSiteId) -> CallKey {
        CallKey {
            context: self.id,
            call_site,
        }
    }

    /// Release now rather than at drop.
    pub fn release(self) {}
}

impl Drop for CallerContext {
    fn drop(&mut self) {
        if let Some(scheduler) = self.scheduler.upgrade() {
            scheduler.release_context(self.id);
        }
    }
}
