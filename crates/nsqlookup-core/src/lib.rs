//! nsqlookup Core
//!
//! Shared foundations for the nsqlookup registry and resolver crates.
//!
//! # Overview
//!
//! - [`Context`]: cancellation and deadline carried by every operation
//! - [`TimeProvider`]: injectable time source so expiry logic is testable
//! - [`HttpClient`]: transport seam used by catalog-backed resolvers
//! - [`telemetry`]: tracing subscriber setup
//!
//! Limits and defaults live in [`constants`] with unit-suffixed names
//! (e.g. `TOMBSTONE_LIFETIME_MS_DEFAULT`).

pub mod constants;
pub mod context;
pub mod error;
pub mod http;
pub mod io;
pub mod telemetry;

pub use constants::*;
pub use context::{Context, ContextError};
pub use error::{Error, Result};
pub use http::{HttpClient, HttpError, HttpRequest, HttpResponse, HttpResult, ReqwestHttpClient};
pub use io::{ManualClock, TimeProvider, WallClockTime};
pub use telemetry::{init_telemetry, TelemetryConfig, TelemetryHandle};
