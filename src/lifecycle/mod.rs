//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Parse flags → Load config → Bind listener → Compile routes → Serve
//!
//! Shutdown (shutdown.rs):
//!     Ctrl+C → broadcast → serve loop stops accepting → drain → exit 0
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The listener binds before routes compile; traffic waits for the serve loop

pub mod shutdown;

pub use shutdown::Shutdown;
