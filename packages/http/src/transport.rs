//! HTTP transport abstraction.
//!
//! A transport takes a request and a completion callback, runs the exchange
//! off the caller's thread, and invokes the callback exactly once with a
//! [`TransportReport`]. The trait can be mocked in tests, avoiding the need
//! for actual network calls.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::oneshot;
use url::Url;

use crate::config::TransportConfig;
use crate::error::Error;
use crate::types::{HttpRequest, TransportReport, TransportResponse};

/// Invoked by the transport, on its own execution context, when the exchange ends.
pub type CompletionCallback = Box<dyn FnOnce(TransportReport) + Send>;

/// Trait for dispatching HTTP requests asynchronously.
pub trait HttpTransport: Send + Sync {
    /// Start the request and return immediately.
    ///
    /// `on_complete` must be called once, whether the exchange succeeds,
    /// fails, or is cancelled.
    fn dispatch(&self, request: HttpRequest, on_complete: CompletionCallback) -> CancelHandle;
}

/// Best-effort cancellation of one dispatched request.
///
/// The signal can be fired at most once. Dropping the handle does not cancel.
#[derive(Debug, Default)]
pub struct CancelHandle {
    sender: Option<oneshot::Sender<()>>,
}

impl CancelHandle {
    pub fn new(sender: oneshot::Sender<()>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    /// A handle for transports that cannot cancel.
    pub fn detached() -> Self {
        Self::default()
    }

    /// Request cancellation. Returns whether a signal was sent.
    pub fn cancel(&mut self) -> bool {
        match self.sender.take() {
            Some(sender) => sender.send(()).is_ok(),
            None => false,
        }
    }

    pub fn is_spent(&self) -> bool {
        self.sender.is_none()
    }
}

/// Production transport using an async reqwest client on a tokio runtime.
///
/// No timeout is configured. A request is reported successful when a
/// response arrived and its body was read, whatever the status code.
pub struct ReqwestTransport {
    client: Client,
    handle: Handle,
    runtime: Option<Runtime>,
}

impl ReqwestTransport {
    /// Create a transport that owns a dedicated multi-threaded runtime.
    pub fn new(config: &TransportConfig) -> Result<Self, Error> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(config.worker_threads.max(1))
            .thread_name("latent-http-io")
            .enable_all()
            .build()?;
        let client = Client::builder().build()?;

        Ok(Self {
            client,
            handle: runtime.handle().clone(),
            runtime: Some(runtime),
        })
    }

    /// Create with the default configuration.
    pub fn with_default_config() -> Result<Self, Error> {
        Self::new(&TransportConfig::default())
    }

    /// Create a transport that spawns onto an existing runtime.
    pub fn with_handle(handle: Handle) -> Result<Self, Error> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            handle,
            runtime: None,
        })
    }
}

impl Drop for ReqwestTransport {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl HttpTransport for ReqwestTransport {
    fn dispatch(&self, request: HttpRequest, on_complete: CompletionCallback) -> CancelHandle {
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        let client = self.client.clone();
        let url = request.url.clone();

        self.handle.spawn(async move {
            let report = tokio::select! {
                result = execute(&client, request) => match result {
                    Ok(report) => report,
                    Err(error) => {
                        tracing::warn!(%url, %error, "Request could not be completed");
                        TransportReport::no_response()
                    }
                },
                Ok(()) = cancel_rx => {
                    tracing::debug!(%url, "Request cancelled");
                    TransportReport::no_response()
                }
            };
            on_complete(report);
        });

        CancelHandle::new(cancel_tx)
    }
}

fn build_headers(headers: &[(String, String)]) -> Result<HeaderMap, Error> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let header_name = HeaderName::try_from(name.as_str())?;
        let header_value = HeaderValue::try_from(value.as_str())?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

async fn execute(client: &Client, request: HttpRequest) -> Result<TransportReport, Error> {
    let url = Url::parse(&request.url)?;
    let headers = build_headers(&request.headers)?;

    let mut req_builder = client.request(request.method.into(), url).headers(headers);
    if let Some(body) = request.body {
        req_builder = req_builder.body(body);
    }

    let response = req_builder.send().await?;
    let status = response.status().as_u16();

    match response.text().await {
        Ok(body) => Ok(TransportReport::completed(status, body)),
        Err(error) => {
            tracing::warn!(status, %error, "Failed to read response body");
            Ok(TransportReport {
                success: false,
                response: Some(TransportResponse {
                    status,
                    body: String::new(),
                }),
            })
        }
    }
}

/// Manual transport for testing.
///
/// Records every dispatched request and holds on to its completion callback
/// so the test decides when, and how, each request completes.
#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Dispatched {
        request: HttpRequest,
        on_complete: Option<CompletionCallback>,
        cancel_rx: oneshot::Receiver<()>,
        cancelled: bool,
    }

    #[derive(Clone, Default)]
    pub struct ManualTransport {
        dispatched: Arc<Mutex<Vec<Dispatched>>>,
    }

    impl ManualTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn dispatch_count(&self) -> usize {
            self.dispatched.lock().unwrap().len()
        }

        pub fn request(&self, index: usize) -> HttpRequest {
            self.dispatched.lock().unwrap()[index].request.clone()
        }

        /// Fire the completion callback of request `index`.
        pub fn complete(&self, index: usize, report: TransportReport) {
            let callback = self.dispatched.lock().unwrap()[index]
                .on_complete
                .take()
                .expect("request already completed");
            callback(report);
        }

        /// Drop the completion callback without calling it.
        pub fn drop_callback(&self, index: usize) {
            self.dispatched.lock().unwrap()[index].on_complete = None;
        }

        /// Whether a cancel signal reached request `index`.
        pub fn was_cancelled(&self, index: usize) -> bool {
            let mut dispatched = self.dispatched.lock().unwrap();
            let entry = &mut dispatched[index];
            if !entry.cancelled {
                entry.cancelled = entry.cancel_rx.try_recv().is_ok();
            }
            entry.cancelled
        }
    }

    impl HttpTransport for ManualTransport {
        fn dispatch(&self, request: HttpRequest, on_complete: CompletionCallback) -> CancelHandle {
            let (cancel_tx, cancel_rx) = oneshot::channel();
            self.dispatched.lock().unwrap().push(Dispatched {
                request,
                on_complete: Some(on_complete),
                cancel_rx,
                cancelled: false,
            });
            CancelHandle::new(cancel_tx)
        }
    }
}
