use crate::sink::SinkError;
use murmur_social::SocialError;

#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    #[error("login failed: {0}")]
    Auth(#[source] SocialError),

    #[error("could not persist session token: {0}")]
    Token(#[source] SocialError),

    #[error("giving up after {attempts} consecutive timeouts (last: {last})")]
    TimeoutsExhausted { attempts: u32, last: String },

    #[error("search failed: {0}")]
    Client(#[source] SocialError),

    #[error(transparent)]
    Sink(#[from] SinkError),
}
