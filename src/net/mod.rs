//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! RouterConfig (host, port, security)
//!     → listener.rs (bind host:port)
//!     → tls.rs (optional rustls config: cert, key, version bounds)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - Bind and TLS failures are fatal at startup
//! - TLS is optional and handled transparently
//! - Client certificates are never requested

pub mod listener;
pub mod tls;

pub use listener::{bind, ListenerError};
