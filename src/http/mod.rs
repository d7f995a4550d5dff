//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, request ID, path cleaning, dispatch)
//!     → [routing picks the first matching route]
//!     → proxy.rs (URL target) | static_files.rs (DIR target, cache front)
//!     → response.rs (canned error responses)
//!     → Send to client
//! ```

pub mod proxy;
pub mod response;
pub mod server;
pub mod static_files;

pub use proxy::ProxyHandler;
pub use server::HttpServer;
pub use static_files::StaticHandler;
