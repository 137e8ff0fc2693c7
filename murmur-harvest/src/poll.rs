use crate::error::HarvestError;
use crate::record::Record;
use crate::sink::RecordSink;
use murmur_social::{Cursor, Page, SearchClient, SocialError};
use rand::Rng;
use std::time::Duration;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;

/// Randomized delay between page fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub min: Duration,
    pub max: Duration,
}

impl Pacing {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    /// Uniform draw from `[min, max]`, millisecond resolution.
    pub fn draw(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        let lo = self.min.as_millis() as u64;
        let hi = self.max.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(lo..=hi))
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), Duration::from_secs(10))
    }
}

#[derive(Debug, Clone)]
pub struct HarvestSettings {
    pub query: String,
    /// Stop once at least this many records are collected.
    pub minimum_records: u64,
    /// Consecutive empty pages tolerated before the query counts as exhausted.
    pub max_inactivity: u32,
    /// Consecutive timeouts tolerated before the run fails.
    pub max_timeouts: u32,
    pub timeout_backoff: Duration,
    /// Wait used when a rate-limit signal carries no reset time.
    pub rate_limit_fallback: Duration,
    pub pacing: Pacing,
}

impl HarvestSettings {
    pub fn new(query: impl Into<String>, minimum_records: u64) -> Self {
        Self {
            query: query.into(),
            minimum_records,
            max_inactivity: 3,
            max_timeouts: 3,
            timeout_backoff: Duration::from_secs(5),
            rate_limit_fallback: Duration::from_secs(60),
            pacing: Pacing::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    TargetReached,
    /// The backend ran out of results or kept returning empty pages.
    Exhausted,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollStats {
    pub empty_pages: u32,
    /// Highest value the inactivity counter reached.
    pub max_inactivity_seen: u32,
    pub rate_limit_waits: u32,
    /// Total timeouts over the run, not just the last streak.
    pub timeouts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestReport {
    /// Records collected by this run.
    pub records: usize,
    /// Records already in the CSV before this run; the JSON snapshot includes them.
    pub carried: usize,
    /// Non-empty pages accepted.
    pub pages: usize,
    pub stop: StopReason,
    pub stats: PollStats,
}

enum Position {
    Start,
    Next(Cursor),
}

/// Drives one search query to completion.
///
/// Records are written to the CSV as they are accepted and the JSON snapshot is
/// rewritten after every non-empty page. The snapshot starts from the rows the
/// sink found in the CSV, so both files always hold the same records. Whatever
/// way the run ends, one last snapshot is written before [`Harvester::run`]
/// returns. `minimum_records` counts only what this run collects.
pub struct Harvester<'c, C: SearchClient + ?Sized> {
    client: &'c C,
    settings: HarvestSettings,
    sink: RecordSink,
    cancel: CancellationToken,
    records: Vec<Record>,
    carried: usize,
    pages: usize,
    inactivity: u32,
    timeouts: u32,
    stats: PollStats,
}

impl<'c, C: SearchClient + ?Sized> Harvester<'c, C> {
    pub fn new(client: &'c C, settings: HarvestSettings, mut sink: RecordSink, cancel: CancellationToken) -> Self {
        let records = sink.take_existing();
        Self {
            client,
            settings,
            sink,
            cancel,
            carried: records.len(),
            records,
            pages: 0,
            inactivity: 0,
            timeouts: 0,
            stats: PollStats::default(),
        }
    }

    pub async fn run(mut self) -> Result<HarvestReport, HarvestError> {
        tracing::info!(
            query = %self.settings.query,
            target = self.settings.minimum_records,
            carried = self.carried,
            "harvest started"
        );
        let outcome = self.poll().await;
        let flushed = self.sink.write_snapshot(&self.records);

        let stop = match (outcome, flushed) {
            (Ok(stop), Ok(())) => stop,
            (Ok(_), Err(err)) => return Err(err.into()),
            (Err(err), Ok(())) => {
                tracing::error!(error = %err, records = self.collected(), "harvest failed");
                return Err(err);
            }
            (Err(err), Err(flush)) => {
                tracing::error!(error = %err, flush_error = %flush, "harvest failed and final snapshot was not written");
                return Err(err);
            }
        };

        let report = HarvestReport {
            records: self.collected(),
            carried: self.carried,
            pages: self.pages,
            stop,
            stats: self.stats,
        };
        tracing::info!(
            records = report.records,
            pages = report.pages,
            stop = ?report.stop,
            empty_pages = report.stats.empty_pages,
            rate_limit_waits = report.stats.rate_limit_waits,
            timeouts = report.stats.timeouts,
            "harvest finished"
        );
        Ok(report)
    }

    async fn poll(&mut self) -> Result<StopReason, HarvestError> {
        let mut position = Position::Start;
        loop {
            if self.cancel.is_cancelled() {
                tracing::info!(records = self.collected(), "stop requested");
                return Ok(StopReason::Cancelled);
            }

            let fetched = match &position {
                Position::Start => self.client.search(&self.settings.query).await,
                Position::Next(cursor) => self.client.next(cursor).await,
            };

            match fetched {
                Ok(page) if page.is_empty() => {
                    self.inactivity += 1;
                    self.stats.empty_pages += 1;
                    self.stats.max_inactivity_seen = self.stats.max_inactivity_seen.max(self.inactivity);
                    if self.inactivity > self.settings.max_inactivity {
                        tracing::info!(empty_in_a_row = self.inactivity, "no new results; query exhausted");
                        return Ok(StopReason::Exhausted);
                    }
                    tracing::debug!(empty_in_a_row = self.inactivity, "empty page");
                    if let Some(cursor) = page.cursor {
                        position = Position::Next(cursor);
                    }
                    self.pause(self.settings.pacing.draw()).await;
                }
                Ok(page) => {
                    let cursor = self.accept(page)?;
                    if self.collected() as u64 >= self.settings.minimum_records {
                        return Ok(StopReason::TargetReached);
                    }
                    match cursor {
                        Some(cursor) => position = Position::Next(cursor),
                        None => {
                            tracing::info!("result set has no further pages");
                            return Ok(StopReason::Exhausted);
                        }
                    }
                    self.pause(self.settings.pacing.draw()).await;
                }
                Err(SocialError::RateLimited { reset }) => {
                    let wait = match reset {
                        Some(at) => (at - OffsetDateTime::now_utc()).try_into().unwrap_or(Duration::ZERO),
                        None => self.settings.rate_limit_fallback,
                    };
                    self.stats.rate_limit_waits += 1;
                    tracing::warn!(wait_secs = wait.as_secs(), reset = ?reset, "rate limited; waiting");
                    self.pause(wait).await;
                }
                Err(SocialError::Timeout(message)) => {
                    self.timeouts += 1;
                    self.stats.timeouts += 1;
                    if self.timeouts > self.settings.max_timeouts {
                        return Err(HarvestError::TimeoutsExhausted {
                            attempts: self.timeouts,
                            last: message,
                        });
                    }
                    tracing::warn!(
                        attempt = self.timeouts,
                        max = self.settings.max_timeouts,
                        backoff_secs = self.settings.timeout_backoff.as_secs(),
                        error = %message,
                        "request timed out; backing off"
                    );
                    self.pause(self.settings.timeout_backoff).await;
                }
                Err(other) => return Err(HarvestError::Client(other)),
            }
        }
    }

    fn collected(&self) -> usize {
        self.records.len() - self.carried
    }

    /// Store every post of a non-empty page and hand back its cursor.
    fn accept(&mut self, page: Page) -> Result<Option<Cursor>, HarvestError> {
        let Page { posts, cursor } = page;
        let added = posts.len();
        for post in posts {
            let record = Record::from(post);
            self.sink.append(&record)?;
            self.records.push(record);
        }
        self.pages += 1;
        self.inactivity = 0;
        self.timeouts = 0;
        self.sink.write_snapshot(&self.records)?;
        tracing::info!(
            page = self.pages,
            added,
            total = self.collected(),
            target = self.settings.minimum_records,
            "page collected"
        );
        Ok(cursor)
    }

    /// Sleep for `wait` unless a stop is requested first.
    async fn pause(&self, wait: Duration) {
        if wait.is_zero() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = self.cancel.cancelled() => {
                tracing::debug!("wait interrupted by stop request");
            }
        }
    }
}
