//! Flatten a `SearchTimeline` response into a [`Page`].
use crate::error::SocialError;
use crate::twitter::types::{Entry, Instruction, RawTweet, SearchTimelineResponse};
use crate::types::{Cursor, Page, Post};
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

const TWEET_PREFIX: &str = "tweet-";
const BOTTOM_CURSOR_PREFIX: &str = "cursor-bottom-";

const LEGACY_DATE: &[BorrowedFormatItem<'static>] = format_description!(
    "[weekday repr:short] [month repr:short] [day] [hour]:[minute]:[second] [offset_hour sign:mandatory][offset_minute] [year]"
);

/// Parse `Wed Oct 10 20:19:24 +0000 2018` into UTC.
pub fn parse_legacy_date(raw: &str) -> Result<OffsetDateTime, SocialError> {
    OffsetDateTime::parse(raw, LEGACY_DATE)
        .map(|dt| dt.to_offset(UtcOffset::UTC))
        .map_err(|e| SocialError::Decode(format!("bad created_at {raw:?}: {e}")))
}

pub fn page_from_response(
    query: &str,
    resp: SearchTimelineResponse,
) -> Result<Page, SocialError> {
    let timeline = resp
        .data
        .and_then(|d| d.search_by_raw_query)
        .map(|q| q.search_timeline.timeline)
        .ok_or_else(|| SocialError::Decode("response has no search timeline".into()))?;

    let mut posts = Vec::new();
    let mut bottom: Option<String> = None;

    let mut visit = |entry: Entry| {
        if entry.entry_id.starts_with(BOTTOM_CURSOR_PREFIX) {
            if let Some(value) = entry.content.value {
                bottom = Some(value);
            }
        } else if entry.entry_id.starts_with(TWEET_PREFIX) {
            let tweet = entry
                .content
                .item_content
                .and_then(|c| c.tweet_results)
                .and_then(|r| r.result)
                .and_then(|r| r.into_tweet());
            match tweet.map(post_from_tweet) {
                Some(Ok(post)) => posts.push(post),
                Some(Err(e)) => {
                    tracing::debug!(entry = %entry.entry_id, error = %e, "skipping malformed tweet")
                }
                None => tracing::debug!(entry = %entry.entry_id, "skipping unavailable tweet"),
            }
        }
    };

    for instruction in timeline.instructions {
        match instruction {
            Instruction::TimelineAddEntries { entries } => entries.into_iter().for_each(&mut visit),
            Instruction::TimelineReplaceEntry { entry } => visit(entry),
            Instruction::Other => {}
        }
    }

    Ok(Page {
        posts,
        cursor: bottom.map(|token| Cursor {
            query: query.to_string(),
            token,
        }),
    })
}

fn post_from_tweet(tweet: RawTweet) -> Result<Post, SocialError> {
    let legacy = tweet
        .legacy
        .ok_or_else(|| SocialError::Decode(format!("tweet {} has no legacy block", tweet.rest_id)))?;
    let created_at = parse_legacy_date(&legacy.created_at)?;
    let author = tweet
        .core
        .and_then(|c| c.user_results)
        .and_then(|u| u.result)
        .and_then(|u| u.display_name().map(str::to_string));

    Ok(Post {
        id: tweet.rest_id,
        text: legacy.full_text,
        author,
        created_at,
    })
}
