//! X/Twitter web API implementation of [`crate::SearchClient`].
//!
//! `client` holds the cookie-session client, `timeline` turns GraphQL search
//! responses into pages, `types` has the wire models for both.
pub mod client;
pub mod timeline;
pub mod types;

pub use client::{TwitterWebClient, TwitterWebConfig};
