//! Siding Runtime - configuration, logging, profiles and initialization.
//!
//! This crate provides:
//! - Layered configuration (`SidingConfig`, `ConfigLoader`)
//! - Logging setup (`LoggingBuilder`)
//! - Per-user profiles with an INI settings store (`Profile`)
//! - Ordered resource directories (`PathSources`)
//! - Command line options for initialization (`InitArgs`)
//! - The initialization sequence (`SidingRuntime`)
//!
//! ```ignore
//! use std::sync::Arc;
//! use siding_runtime::SidingRuntime;
//!
//! let runtime = SidingRuntime::builder()
//!     .args(std::env::args().skip(1))
//!     .build(Arc::new(MyHost::default()))?;
//!
//! runtime.set_style("Dark")?;
//! runtime.shutdown()?;
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod paths;
pub mod profile;
pub mod runtime;

// Re-exports
pub use cli::InitArgs;
pub use config::{ConfigError, ConfigLoader, ConfigResult, SidingConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use paths::PathSources;
pub use profile::{Profile, ProfileError};
pub use runtime::{RuntimeBuilder, SidingRuntime};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros for add-on code.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
