use std::fmt;
use time::OffsetDateTime;

/// Login identifiers. `Debug` never prints the password.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    /// Secondary identifier asked for when the backend wants to confirm the account.
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// One search result as returned by a [`crate::SearchClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: String,
    pub text: String,
    /// Display name of the author, when the backend included the user.
    pub author: Option<String>,
    pub created_at: OffsetDateTime,
}

/// Opaque position in a result set. Only the client that produced it reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub query: String,
    pub token: String,
}

/// One batch of results and, when more exist, where to continue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub posts: Vec<Post>,
    pub cursor: Option<Cursor>,
}

impl Page {
    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }
}
