//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection (per service listener)
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (add request ID)
//!     → routing::dispatch (health gate, prefix match, rewrite)
//!     → forward.rs (headers.rs rewrite, stream to backend and back)
//!     → Send to client
//! ```

pub mod forward;
pub mod headers;
pub mod request;
pub mod server;

pub use forward::{Forwarder, ForwarderFactory, HttpForwarder, HttpForwarderFactory, TransportError};
pub use headers::ListenerScheme;
pub use request::{RequestIdExt, RequestIdLayer, X_REQUEST_ID};
pub use server::{serve_encrypted, serve_plaintext, service_router};
