use crate::error::HarvestError;
use murmur_social::{Credentials, SearchClient, SocialError};
use std::path::Path;

/// How the client ended up authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    /// A cached session token was loaded and accepted; no login request was made.
    Restored,
    /// Credentials were used and the new token was cached.
    LoggedIn,
}

/// Make `client` ready to search.
///
/// A cached token is loaded and checked against the backend. A token file that
/// that cannot be read or that the backend refuses is replaced by a fresh login.
/// When the check itself cannot complete, the restored session is kept and the
/// polling loop deals with the failure.
pub async fn authenticate<C>(
    client: &mut C,
    credentials: &Credentials,
    token_path: &Path,
) -> Result<AuthOutcome, HarvestError>
where
    C: SearchClient + ?Sized,
{
    if token_path.exists() {
        match restore(client, token_path).await {
            Ok(()) => {
                tracing::info!(path = %token_path.display(), "restored session token");
                return Ok(AuthOutcome::Restored);
            }
            Err(err) => {
                tracing::warn!(path = %token_path.display(), error = %err, "cached session token unusable; logging in");
            }
        }
    }

    tracing::info!(user = %credentials.username, "logging in");
    client.login(credentials).await.map_err(HarvestError::Auth)?;
    client.save_token(token_path).map_err(HarvestError::Token)?;
    tracing::info!(path = %token_path.display(), "session token saved");
    Ok(AuthOutcome::LoggedIn)
}

async fn restore<C>(client: &mut C, token_path: &Path) -> Result<(), SocialError>
where
    C: SearchClient + ?Sized,
{
    client.load_token(token_path)?;
    match client.verify().await {
        Ok(()) => Ok(()),
        Err(err @ (SocialError::Auth(_) | SocialError::Token(_))) => Err(err),
        Err(err) => {
            tracing::warn!(error = %err, "could not check restored session; keeping it");
            Ok(())
        }
    }
}
