//! Shared plumbing for the murmur crates.
//!
//! Kept deliberately small so every crate in the workspace can depend on it:
//! today it only hosts [`observability`], the single place where the global
//! `tracing` subscriber is configured.
//!
//! ```rust
//! use murmur_common::observability::{LogConfig, LogFormat};
//!
//! let cfg = LogConfig {
//!     format: LogFormat::Json,
//!     ..LogConfig::default()
//! };
//! assert_eq!(cfg.app_name, "murmur");
//! assert_eq!(cfg.default_filter, "info");
//! ```
pub mod observability;
