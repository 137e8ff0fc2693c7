use crate::error::SocialError;
use crate::types::{Credentials, Cursor, Page};
use async_trait::async_trait;
use std::path::Path;

/// Capability the harvester needs from a social search backend.
///
/// Implementations own authentication state. `search` and `next` must surface
/// throttling as [`SocialError::RateLimited`] and slow requests as
/// [`SocialError::Timeout`]; the caller decides how to wait and whether to retry.
#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Full credential login, replacing any session held in memory.
    async fn login(&mut self, credentials: &Credentials) -> Result<(), SocialError>;

    /// Restore a session previously written by [`SearchClient::save_token`].
    fn load_token(&mut self, path: &Path) -> Result<(), SocialError>;

    fn save_token(&self, path: &Path) -> Result<(), SocialError>;

    /// Check with the backend that the session held in memory is still accepted.
    ///
    /// A session the backend refuses is reported as [`SocialError::Auth`].
    async fn verify(&self) -> Result<(), SocialError>;

    /// First page of results for `query`.
    async fn search(&self, query: &str) -> Result<Page, SocialError>;

    /// Page following `cursor`.
    async fn next(&self, cursor: &Cursor) -> Result<Page, SocialError>;
}
