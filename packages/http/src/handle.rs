use serde::{Deserialize, Serialize};
use tokio::sync::oneshot::{self, error::TryRecvError};

use crate::transport::{CancelHandle, CompletionCallback, HttpTransport};
use crate::types::{HttpRequest, RequestOutcome};

pub type RequestId = u64;

/// Lifecycle of one latent HTTP call
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RequestState {
    /// Built but not yet handed to a transport
    Created,
    /// Dispatched, waiting for the transport to report
    InFlight,
    /// Cancellation requested, still waiting for the transport to report
    Cancelled,
    /// Outcome received; terminal
    Completed,
}

/// One in-flight HTTP call.
///
/// The transport's completion callback computes the [`RequestOutcome`] on the
/// transport's own thread and sends it through a one-shot channel. The handle
/// is done once that outcome has been received, so every outcome field is
/// published before `done` can be observed.
#[derive(Debug)]
pub struct RequestHandle {
    id: RequestId,
    state: RequestState,
    request: Option<HttpRequest>,
    receiver: Option<oneshot::Receiver<RequestOutcome>>,
    cancel: Option<CancelHandle>,
    outcome: Option<RequestOutcome>,
}

impl RequestHandle {
    pub fn new(id: RequestId, request: HttpRequest) -> Self {
        Self {
            id,
            state: RequestState::Created,
            request: Some(request),
            receiver: None,
            cancel: None,
            outcome: None,
        }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    /// The request, until it has been dispatched.
    pub fn request(&self) -> Option<&HttpRequest> {
        self.request.as_ref()
    }

    /// Hand the request to `transport`. Only valid from `Created`; later
    /// calls do nothing.
    pub fn dispatch(&mut self, transport: &dyn HttpTransport) {
        let Some(request) = self.request.take() else {
            return;
        };

        tracing::debug!(request = self.id, method = %request.method, url = %request.url, "Dispatching");

        let (tx, rx) = oneshot::channel();
        let id = self.id;
        let on_complete: CompletionCallback = Box::new(move |report| {
            let outcome = RequestOutcome::from_report(report);
            tracing::debug!(
                request = id,
                success = outcome.success,
                status = outcome.status_code,
                "Response received"
            );
            if tx.send(outcome).is_err() {
                tracing::debug!(request = id, "Handle released before completion, outcome dropped");
            }
        });

        self.cancel = Some(transport.dispatch(request, on_complete));
        self.receiver = Some(rx);
        self.state = RequestState::InFlight;
    }

    /// Whether the outcome has already been received. Does not check the channel.
    pub fn is_done(&self) -> bool {
        self.outcome.is_some()
    }

    /// Receive the outcome if the transport has reported, then return `is_done`.
    pub fn poll_done(&mut self) -> bool {
        if self.outcome.is_some() {
            return true;
        }
        let Some(receiver) = self.receiver.as_mut() else {
            return false;
        };

        match receiver.try_recv() {
            Ok(outcome) => self.finish(outcome),
            Err(TryRecvError::Empty) => return false,
            Err(TryRecvError::Closed) => {
                tracing::warn!(request = self.id, "Transport dropped the completion callback");
                self.finish(RequestOutcome::default());
            }
        }
        true
    }

    fn finish(&mut self, outcome: RequestOutcome) {
        self.outcome = Some(outcome);
        self.receiver = None;
        self.cancel = None;
        self.state = RequestState::Completed;
    }

    pub fn outcome(&self) -> Option<&RequestOutcome> {
        self.outcome.as_ref()
    }

    pub fn into_outcome(self) -> Option<RequestOutcome> {
        self.outcome
    }

    /// Ask the transport to abort.
    ///
    /// Does nothing once done or before dispatch. The handle still completes
    /// only when the transport reports, typically as a failure. Returns
    /// whether the handle moved to `Cancelled`.
    pub fn cancel(&mut self) -> bool {
        if self.poll_done() || self.state != RequestState::InFlight {
            return false;
        }

        tracing::debug!(request = self.id, "Cancelling");
        if let Some(cancel) = self.cancel.as_mut() {
            cancel.cancel();
        }
        self.state = RequestState::Cancelled;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::ManualTransport;
    use crate::types::{Method, TransportReport};

    fn handle() -> RequestHandle {
        RequestHandle::new(
            7,
            HttpRequest::new(Method::GET, "http://localhost/items", "agent/1"),
        )
    }

    #[test]
    fn starts_created() {
        let mut handle = handle();
        assert_eq!(handle.state(), RequestState::Created);
        assert!(handle.request().is_some());
        assert!(!handle.poll_done());
        assert!(handle.outcome().is_none());
    }

    #[test]
    fn dispatch_moves_to_in_flight() {
        let transport = ManualTransport::new();
        let mut handle = handle();

        handle.dispatch(&transport);

        assert_eq!(handle.state(), RequestState::InFlight);
        assert!(handle.request().is_none());
        assert_eq!(transport.dispatch_count(), 1);
        assert_eq!(transport.request(0).url, "http://localhost/items");
        assert!(!handle.poll_done());
    }

    #[test]
    fn dispatch_twice_is_ignored() {
        let transport = ManualTransport::new();
        let mut handle = handle();
        handle.dispatch(&transport);
        handle.dispatch(&transport);
        assert_eq!(transport.dispatch_count(), 1);
    }

    #[test]
    fn completes_with_flattened_outcome() {
        let transport = ManualTransport::new();
        let mut handle = handle();
        handle.dispatch(&transport);

        transport.complete(0, TransportReport::completed(200, r#"{"items":[1]}"#));

        assert!(!handle.is_done());
        assert!(handle.poll_done());
        assert!(handle.is_done());
        assert_eq!(handle.state(), RequestState::Completed);
        let outcome = handle.outcome().unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.keys, vec!["items.length", "items.0"]);
        assert_eq!(outcome.values, vec!["1", "1"]);
        assert_eq!(outcome.keys.len(), outcome.values.len());
    }

    #[test]
    fn absent_response_completes_as_failure() {
        let transport = ManualTransport::new();
        let mut handle = handle();
        handle.dispatch(&transport);

        transport.complete(0, TransportReport::no_response());

        assert!(handle.poll_done());
        assert_eq!(handle.into_outcome(), Some(RequestOutcome::default()));
    }

    #[test]
    fn cancel_in_flight_waits_for_transport() {
        let transport = ManualTransport::new();
        let mut handle = handle();
        handle.dispatch(&transport);

        assert!(handle.cancel());
        assert_eq!(handle.state(), RequestState::Cancelled);
        assert!(transport.was_cancelled(0));
        assert!(!handle.poll_done());

        transport.complete(0, TransportReport::no_response());
        assert!(handle.poll_done());
        assert_eq!(handle.state(), RequestState::Completed);
        assert!(!handle.outcome().unwrap().success);
    }

    #[test]
    fn cancel_after_done_is_a_no_op() {
        let transport = ManualTransport::new();
        let mut handle = handle();
        handle.dispatch(&transport);
        transport.complete(0, TransportReport::completed(200, "{}"));
        assert!(handle.poll_done());

        let before = handle.outcome().cloned();
        assert!(!handle.cancel());
        assert_eq!(handle.state(), RequestState::Completed);
        assert_eq!(handle.outcome().cloned(), before);
        assert!(!transport.was_cancelled(0));
    }

    #[test]
    fn cancel_before_dispatch_is_a_no_op() {
        let mut handle = handle();
        assert!(!handle.cancel());
        assert_eq!(handle.state(), RequestState::Created);
    }

    #[test]
    fn dropped_callback_completes_as_failure() {
        let transport = ManualTransport::new();
        let mut handle = handle();
        handle.dispatch(&transport);

        transport.drop_callback(0);

        assert!(handle.poll_done());
        let outcome = handle.outcome().unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.status_code, 0);
    }

    #[test]
    fn completion_after_release_is_harmless() {
        let transport = ManualTransport::new();
        let mut handle = handle();
        handle.dispatch(&transport);
        drop(handle);

        transport.complete(0, TransportReport::completed(200, "{}"));
    }

    #[test]
    fn state_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(RequestState::InFlight).unwrap(),
            serde_json::json!("inflight")
        );
    }
}
