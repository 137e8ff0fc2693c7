use murmur_social::Post;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Author written when a post arrives without its user.
pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// One collected post, as written to both output files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub text: String,
    pub author: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<Post> for Record {
    fn from(post: Post) -> Self {
        Self {
            text: post.text,
            author: post
                .author
                .filter(|a| !a.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
            created_at: post.created_at,
        }
    }
}
