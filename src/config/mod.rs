//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (JSON text)
//!     → loader.rs (read)
//!     → interpolate.rs ($NAME$ → environment value, on raw text)
//!     → serde_json (deserialize into schema.rs types)
//!     → validation.rs (semantic checks)
//!     → RouterConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no reload
//! - All sections have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Interpolation happens before parsing, so substituted values are trusted

pub mod interpolate;
pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError, NO_ENV_FILE};
pub use schema::{CacheConfig, RouteConfig, RouterConfig, SecurityConfig, TargetType, TlsVersion};
