use serde::{Deserialize, Serialize};

// ==============================
// Guest token & login flow
// ==============================

#[derive(Debug, Clone, Deserialize)]
pub struct GuestActivation {
    pub guest_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlowResponse {
    pub flow_token: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Subtask {
    pub subtask_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlowStep<'a> {
    pub flow_token: &'a str,
    pub subtask_inputs: Vec<serde_json::Value>,
}

// ==============================
// SearchTimeline (GraphQL)
// ==============================

#[derive(Debug, Clone, Deserialize)]
pub struct SearchTimelineResponse {
    #[serde(default)]
    pub data: Option<SearchData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchData {
    #[serde(default)]
    pub search_by_raw_query: Option<RawQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawQuery {
    pub search_timeline: SearchTimeline,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchTimeline {
    pub timeline: Timeline,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Timeline {
    #[serde(default)]
    pub instructions: Vec<Instruction>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum Instruction {
    TimelineAddEntries {
        #[serde(default)]
        entries: Vec<Entry>,
    },
    /// Follow-up pages refresh their cursors through this instead of new entries.
    TimelineReplaceEntry { entry: Entry },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Entry {
    #[serde(rename = "entryId")]
    pub entry_id: String,
    pub content: EntryContent,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntryContent {
    /// Cursor value on `cursor-*` entries.
    #[serde(default)]
    pub value: Option<String>,
    #[serde(rename = "itemContent", default)]
    pub item_content: Option<ItemContent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItemContent {
    #[serde(default)]
    pub tweet_results: Option<TweetResults>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TweetResults {
    #[serde(default)]
    pub result: Option<TweetResult>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "__typename")]
pub enum TweetResult {
    Tweet(RawTweet),
    TweetWithVisibilityResults { tweet: RawTweet },
    #[serde(other)]
    Unavailable,
}

impl TweetResult {
    pub fn into_tweet(self) -> Option<RawTweet> {
        match self {
            TweetResult::Tweet(t) | TweetResult::TweetWithVisibilityResults { tweet: t } => Some(t),
            TweetResult::Unavailable => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawTweet {
    pub rest_id: String,
    #[serde(default)]
    pub legacy: Option<TweetLegacy>,
    #[serde(default)]
    pub core: Option<TweetCore>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TweetLegacy {
    pub full_text: String,
    /// `Wed Oct 10 20:19:24 +0000 2018`
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TweetCore {
    #[serde(default)]
    pub user_results: Option<UserResults>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserResults {
    #[serde(default)]
    pub result: Option<RawUser>,
}

/// The display name moved from `legacy` to `core` at some point; both are read.
#[derive(Debug, Clone, Deserialize)]
pub struct RawUser {
    #[serde(default)]
    pub legacy: Option<UserNames>,
    #[serde(default)]
    pub core: Option<UserNames>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserNames {
    #[serde(default)]
    pub name: Option<String>,
}

impl RawUser {
    pub fn display_name(&self) -> Option<&str> {
        self.core
            .as_ref()
            .and_then(|c| c.name.as_deref())
            .or_else(|| self.legacy.as_ref().and_then(|l| l.name.as_deref()))
            .filter(|n| !n.trim().is_empty())
    }
}
