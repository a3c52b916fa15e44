//! The bridge between a [`RequestHandle`] and a cooperative caller.
//!
//! A [`PendingOperation`] is polled once per scheduler tick. The first poll
//! that observes its handle done copies the outcome into the caller's
//! [`OutputSlots`], runs the continuation, and releases the handle. If the
//! caller goes away first, the handle is released without cancelling the
//! request and the continuation never runs.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::handle::{RequestHandle, RequestId};
use crate::scheduler::{CallKey, CallSiteId, ContextId};
use crate::types::RequestOutcome;

/// Identifies which caller and call site a continuation resumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResumeToken {
    pub target: ContextId,
    pub call_site: CallSiteId,
}

impl From<CallKey> for ResumeToken {
    fn from(key: CallKey) -> Self {
        Self {
            target: key.context,
            call_site: key.call_site,
        }
    }
}

/// Runs the caller's code after its outputs have been filled in.
pub type Continuation = Box<dyn FnOnce(&ResumeToken) + Send>;

/// The values a latent call hands back to its caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallOutputs {
    pub success: bool,
    pub status_code: i32,
    pub body: String,
    pub keys: Vec<String>,
    pub values: Vec<String>,
}

impl From<RequestOutcome> for CallOutputs {
    fn from(outcome: RequestOutcome) -> Self {
        Self {
            success: outcome.success,
            status_code: outcome.status_code,
            body: outcome.raw_body,
            keys: outcome.keys,
            values: outcome.values,
        }
    }
}

/// Caller-visible output slots, shared between the caller and its operation.
#[derive(Debug, Clone, Default)]
pub struct OutputSlots {
    inner: Arc<Mutex<CallOutputs>>,
}

impl OutputSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current slot values.
    pub fn snapshot(&self) -> CallOutputs {
        self.lock().clone()
    }

    fn store(&self, outcome: RequestOutcome) {
        *self.lock() = outcome.into();
    }

    fn lock(&self) -> MutexGuard<'_, CallOutputs> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Result of one [`PendingOperation::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    /// Still waiting on the transport
    Pending,
    /// Outputs copied and continuation invoked, on this poll
    Resumed,
    /// Handle released before completion; finished without resuming
    Abandoned,
    /// Already finished on an earlier poll
    Finished,
}

pub struct PendingOperation {
    handle: Option<RequestHandle>,
    slots: OutputSlots,
    token: ResumeToken,
    continuation: Option<Continuation>,
    finished: bool,
}

impl PendingOperation {
    pub fn new(
        handle: RequestHandle,
        slots: OutputSlots,
        token: ResumeToken,
        continuation: Continuation,
    ) -> Self {
        Self {
            handle: Some(handle),
            slots,
            token,
            continuation: Some(continuation),
            finished: false,
        }
    }

    /// Id of the request this operation still holds.
    pub fn request_id(&self) -> Option<RequestId> {
        self.handle.as_ref().map(RequestHandle::id)
    }

    pub fn handle_mut(&mut self) -> Option<&mut RequestHandle> {
        self.handle.as_mut()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Whether the next [`poll`](Self::poll) will finish this operation.
    pub fn is_ready(&mut self) -> bool {
        if self.finished {
            return false;
        }
        match self.handle.as_mut() {
            Some(handle) => handle.poll_done(),
            None => true,
        }
    }

    pub fn poll(&mut self) -> PollStatus {
        if self.finished {
            return PollStatus::Finished;
        }

        let done = match self.handle.as_mut() {
            Some(handle) => handle.poll_done(),
            None => {
                tracing::debug!(
                    context = %self.token.target,
                    call_site = %self.token.call_site,
                    "Request handle released before completion"
                );
                self.finished = true;
                self.continuation = None;
                return PollStatus::Abandoned;
            }
        };

        if !done {
            return PollStatus::Pending;
        }

        let outcome = self
            .handle
            .take()
            .and_then(RequestHandle::into_outcome)
            .unwrap_or_default();

        tracing::debug!(call_site = %self.token.call_site, "Setting output slots");
        self.slots.store(outcome);
        self.finished = true;

        if let Some(continuation) = self.continuation.take() {
            tracing::debug!(context = %self.token.target, call_site = %self.token.call_site, "Resuming caller");
            continuation(&self.token);
        }
        PollStatus::Resumed
    }

    /// The owning caller context is gone.
    ///
    /// Drops the handle without cancelling: the request runs to completion
    /// unobserved. An in-flight POST is not aborted by unrelated teardown.
    pub fn on_owner_released(&mut self) {
        if let Some(handle) = self.handle.take() {
            tracing::debug!(request = handle.id(), "Owner released, request left to finish unobserved");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::ManualTransport;
    use crate::types::{HttpRequest, Method, TransportReport};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixture {
        transport: ManualTransport,
        slots: OutputSlots,
        resumes: Arc<AtomicUsize>,
        operation: PendingOperation,
    }

    fn fixture() -> Fixture {
        let transport = ManualTransport::new();
        let mut handle = RequestHandle::new(
            1,
            HttpRequest::new(Method::GET, "http://localhost/", "agent/1"),
        );
        handle.dispatch(&transport);

        let slots = OutputSlots::new();
        let resumes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&resumes);
        let token = ResumeToken {
            target: ContextId::new(),
            call_site: CallSiteId(3),
        };
        let operation = PendingOperation::new(
            handle,
            slots.clone(),
            token,
            Box::new(move |resumed: &ResumeToken| {
                assert_eq!(resumed.call_site, CallSiteId(3));
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        Fixture {
            transport,
            slots,
            resumes,
            operation,
        }
    }

    #[test]
    fn stays_pending_until_done() {
        let mut f = fixture();
        for _ in 0..10 {
            assert_eq!(f.operation.poll(), PollStatus::Pending);
        }
        assert_eq!(f.resumes.load(Ordering::SeqCst), 0);
        assert_eq!(f.slots.snapshot(), CallOutputs::default());
        assert_eq!(f.operation.request_id(), Some(1));
    }

    #[test]
    fn resumes_once_with_outputs() {
        let mut f = fixture();
        f.transport
            .complete(0, TransportReport::completed(201, r#"{"id":9}"#));

        assert!(f.operation.is_ready());
        assert_eq!(f.operation.poll(), PollStatus::Resumed);
        assert_eq!(f.resumes.load(Ordering::SeqCst), 1);
        assert!(f.operation.is_finished());
        assert_eq!(f.operation.request_id(), None);

        let outputs = f.slots.snapshot();
        assert!(outputs.success);
        assert_eq!(outputs.status_code, 201);
        assert_eq!(outputs.body, r#"{"id":9}"#);
        assert_eq!(outputs.keys, vec!["id"]);
        assert_eq!(outputs.values, vec!["9"]);
    }

    #[test]
    fn polling_after_completion_is_idempotent() {
        let mut f = fixture();
        f.transport.complete(0, TransportReport::completed(200, "{}"));
        assert_eq!(f.operation.poll(), PollStatus::Resumed);

        // Overwrite the slots the way a caller might; later polls must not touch them.
        f.slots.store(RequestOutcome {
            status_code: 999,
            ..Default::default()
        });

        for _ in 0..5 {
            assert_eq!(f.operation.poll(), PollStatus::Finished);
            assert!(!f.operation.is_ready());
        }
        assert_eq!(f.resumes.load(Ordering::SeqCst), 1);
        assert_eq!(f.slots.snapshot().status_code, 999);
    }

    #[test]
    fn owner_release_abandons_without_resume_or_cancel() {
        let mut f = fixture();
        f.operation.on_owner_released();

        assert!(f.operation.is_ready());
        assert_eq!(f.operation.poll(), PollStatus::Abandoned);
        assert_eq!(f.operation.poll(), PollStatus::Finished);
        assert_eq!(f.resumes.load(Ordering::SeqCst), 0);
        assert!(!f.transport.was_cancelled(0));

        // The orphaned request still completes without touching the slots.
        f.transport.complete(0, TransportReport::completed(200, r#"{"a":1}"#));
        assert_eq!(f.slots.snapshot(), CallOutputs::default());
    }

    #[test]
    fn failure_outcome_is_forwarded() {
        let mut f = fixture();
        f.transport.complete(0, TransportReport::no_response());

        assert_eq!(f.operation.poll(), PollStatus::Resumed);
        let outputs = f.slots.snapshot();
        assert!(!outputs.success);
        assert_eq!(outputs.status_code, 0);
        assert!(outputs.keys.is_empty());
        assert!(outputs.values.is_empty());
    }

    #[test]
    fn token_from_call_key() {
        let key = CallKey {
            context: ContextId::new(),
            call_site: CallSiteId(11),
        };
        let token = ResumeToken::from(key);
        assert_eq!(token.target, key.context);
        assert_eq!(token.call_site, CallSiteId(11));
    }
}
