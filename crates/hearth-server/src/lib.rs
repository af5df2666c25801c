//! server lifecycle, worker pool and graceful shutdown on top of
//! `hearth-http`'s connection-and-request core (spec.md §4.7, §5).
//!
//! grounded on the teacher's `xitca-server` crate: a thread-per-worker
//! pool, each worker a current-thread runtime plus `LocalSet`, sharing one
//! bound listener.

mod builder;
mod handle;
mod lifecycle;
mod worker;

pub use builder::Builder;
pub use handle::ServerHandle;
pub use lifecycle::LifecycleState;

pub use hearth_http::{BodyError, CoreError, HTTPRequest, HTTPResponse, ServerConfig};
pub use hearth_io::net::BindAddress;
