use murmur_http::HttpError;
use time::OffsetDateTime;

#[derive(Debug, thiserror::Error)]
pub enum SocialError {
    /// Backend asked us to back off until `reset` (when it said).
    #[error("rate limited until {reset:?}")]
    RateLimited { reset: Option<OffsetDateTime> },

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("session token unusable: {0}")]
    Token(String),

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error(transparent)]
    Http(HttpError),
}

impl From<HttpError> for SocialError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::RateLimited { reset_unix, .. } => SocialError::RateLimited {
                reset: reset_unix.and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok()),
            },
            HttpError::Timeout(message) => SocialError::Timeout(message),
            other => SocialError::Http(other),
        }
    }
}
