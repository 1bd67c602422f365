//! Use case orchestration for admitguard.
//!
//! This crate is the application layer: it owns the ports to the outside world (policy source,
//! sinks, entity source), the compiled-rule cache, and the [`Validator`] that ties the pure
//! domain layer to them. Hosting code (admission webhook, audit loop) supplies the adapters.

#![forbid(unsafe_code)]

mod audit;
mod cache;
mod config;
mod context;
mod error;
mod ports;
mod validate;

pub use audit::{AuditFailure, AuditReport};
pub use cache::RuleCache;
pub use config::{CONFIG_FILE_NAME, load_config};
pub use context::Context;
pub use error::{SinkFailure, ValidateError};
pub use ports::{EntitySource, PolicySource, PolicyValidationSink};
pub use validate::{ValidationOutcome, Validator};
