//! Search clients used by the harvester.
//!
//! [`SearchClient`] is the seam the polling loop talks to: authenticate, persist
//! the session, fetch a first page for a query, then follow cursors. The
//! [`twitter`] module implements it against the X/Twitter web API; tests swap in
//! scripted stubs.
pub mod client;
pub mod error;
pub mod session;
pub mod twitter;
pub mod types;

pub use client::SearchClient;
pub use error::SocialError;
pub use session::SessionToken;
pub use types::{Credentials, Cursor, Page, Post};
