//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path)
//!     → matcher.rs (clean path, literal prefix test)
//!     → router.rs (first matching route in config order)
//!     → Return: matched Route or NoMatch (404)
//!
//! Route Compilation (at startup):
//!     RouteConfig[]
//!     → Keep configuration order
//!     → Build one handler per route (proxy or static)
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same route
//! - First match wins (ordered by configuration)

pub mod matcher;
pub mod router;

pub use router::{Route, RouteBuildError, RouteHandler, RouteTable};
