//! # latent-http
//!
//! Latent HTTP calls for cooperative, single-threaded scripting hosts.
//!
//! The host has no futures or callbacks. It issues a GET or POST from a call
//! site, keeps ticking its scheduler, and is resumed once the response has
//! arrived and been flattened into `keys` / `values` string arrays.
//!
//! ## Flow
//!
//! ```text
//! host ── http_get ──▶ LatentHttp ──▶ RequestHandle ── dispatch ──▶ transport (tokio)
//!                          │                 ▲                          │
//!                          ▼                 │ oneshot(RequestOutcome)  │
//!                   LatentScheduler          └──── completion callback ◀┘
//!                          │
//! host ── tick ────────────┘  poll ▶ copy outputs ▶ resume continuation
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use latent_http::{BridgeConfig, CallSiteId, LatentHttp, LatentScheduler, OutputSlots, ReqwestTransport};
//!
//! let scheduler = LatentScheduler::new();
//! let http = LatentHttp::new(
//!     Arc::new(ReqwestTransport::with_default_config()?),
//!     Arc::clone(&scheduler),
//!     BridgeConfig::default(),
//! );
//!
//! let context = scheduler.open_context();
//! let slots = OutputSlots::new();
//! http.http_post(
//!     context.key(CallSiteId(1)),
//!     "https://api.example.com/scores",
//!     &latent_http_json::make_simple_object(&["player"], &["ada"]),
//!     &["Authorization"],
//!     &["Bearer secret"],
//!     slots.clone(),
//!     |_| {},
//! )?;
//!
//! // Each frame:
//! scheduler.tick();
//! let outputs = slots.snapshot();
//! ```
//!
//! ## Failures are data
//!
//! Nothing here aborts the caller. A failed exchange resumes with
//! `success == false`; `status_code` is 0 when no response arrived. A
//! successful exchange whose body is not a JSON object also reports
//! `success == false` but keeps the real status code and body. Tearing down a
//! caller context abandons its calls silently; the requests themselves are
//! left to finish.

pub mod bridge;
pub mod config;
pub mod error;
pub mod handle;
pub mod pending;
pub mod scheduler;
pub mod transport;
pub mod types;

pub use bridge::{Issue, LatentHttp};
pub use config::{BridgeConfig, TransportConfig, DEFAULT_USER_AGENT};
pub use error::Error;
pub use handle::{RequestHandle, RequestId, RequestState};
pub use pending::{CallOutputs, Continuation, OutputSlots, PendingOperation, PollStatus, ResumeToken};
pub use scheduler::{CallKey, CallSiteId, CallerContext, ContextId, LatentScheduler, TickReport};
pub use transport::{CancelHandle, CompletionCallback, HttpTransport, ReqwestTransport};
pub use types::{HttpRequest, Method, RequestOutcome, TransportReport, TransportResponse};
