//! Host-facing entry points: issue a latent GET or POST.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::BridgeConfig;
use crate::error::Error;
use crate::handle::{RequestHandle, RequestId};
use crate::pending::{OutputSlots, PendingOperation, ResumeToken};
use crate::scheduler::{CallKey, LatentScheduler};
use crate::transport::HttpTransport;
use crate::types::{HttpRequest, Method};

/// Result of issuing a latent call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Issue {
    /// A request was created and dispatched.
    Issued(RequestId),
    /// The call site already has an outstanding call; nothing was created.
    Suppressed,
}

/// Issues latent HTTP calls on behalf of cooperative callers.
///
/// # Example
///
/// ```ignore
/// let scheduler = LatentScheduler::new();
/// let transport = Arc::new(ReqwestTransport::with_default_config()?);
/// let http = LatentHttp::new(transport, Arc::clone(&scheduler), BridgeConfig::default());
///
/// let context = scheduler.open_context();
/// let slots = OutputSlots::new();
/// http.http_get(
///     context.key(CallSiteId(1)),
///     "https://api.example.com/items",
///     &[] as &[&str],
///     &[] as &[&str],
///     slots.clone(),
///     |_| println!("resumed"),
/// )?;
///
/// // Host loop
/// loop {
///     scheduler.tick();
///     // ...
/// }
/// ```
pub struct LatentHttp {
    transport: Arc<dyn HttpTransport>,
    scheduler: Arc<LatentScheduler>,
    config: BridgeConfig,
    next_request_id: AtomicU64,
}

impl LatentHttp {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        scheduler: Arc<LatentScheduler>,
        config: BridgeConfig,
    ) -> Self {
        Self {
            transport,
            scheduler,
            config,
            next_request_id: AtomicU64::new(0),
        }
    }

    /// Lets a host probe for the plugin.
    pub fn plugin_detection() -> bool {
        true
    }

    pub fn scheduler(&self) -> &Arc<LatentScheduler> {
        &self.scheduler
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Issue a latent GET.
    ///
    /// `header_keys` / `header_values` are parallel arrays merged over the
    /// default headers. When the call completes, `slots` receives the outcome
    /// and `continuation` runs, from within [`LatentScheduler::tick`].
    pub fn http_get<K, V, C>(
        &self,
        call: CallKey,
        url: &str,
        header_keys: &[K],
        header_values: &[V],
        slots: OutputSlots,
        continuation: C,
    ) -> Result<Issue, Error>
    where
        K: AsRef<str>,
        V: AsRef<str>,
        C: FnOnce(&ResumeToken) + Send + 'static,
    {
        let request = HttpRequest::new(Method::GET, url, &self.config.user_agent)
            .with_user_headers(header_keys, header_values);
        self.issue(call, request, slots, Box::new(continuation))
    }

    /// Issue a latent POST with a raw JSON body.
    #[allow(clippy::too_many_arguments)]
    pub fn http_post<K, V, C>(
        &self,
        call: CallKey,
        url: &str,
        json_body: &str,
        header_keys: &[K],
        header_values: &[V],
        slots: OutputSlots,
        continuation: C,
    ) -> Result<Issue, Error>
    where
        K: AsRef<str>,
        V: AsRef<str>,
        C: FnOnce(&ResumeToken) + Send + 'static,
    {
        let request = HttpRequest::new(Method::POST, url, &self.config.user_agent)
            .with_user_headers(header_keys, header_values)
            .with_body(json_body);
        self.issue(call, request, slots, Box::new(continuation))
    }

    fn issue(
        &self,
        call: CallKey,
        request: HttpRequest,
        slots: OutputSlots,
        continuation: crate::pending::Continuation,
    ) -> Result<Issue, Error> {
        let method = request.method;
        let url = request.url.clone();
        tracing::debug!(%method, %url, context = %call.context, call_site = %call.call_site, "Latent call");

        let registered = self.scheduler.try_register(call, || {
            let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
            tracing::info!("Http {} {}", method, url);

            let mut handle = RequestHandle::new(id, request);
            handle.dispatch(self.transport.as_ref());
            PendingOperation::new(handle, slots, ResumeToken::from(call), continuation)
        })?;

        match registered {
            Some(id) => Ok(Issue::Issued(id)),
            None => {
                tracing::debug!(call_site = %call.call_site, "Call already outstanding, suppressed");
                Ok(Issue::Suppressed)
            }
        }
    }
}
