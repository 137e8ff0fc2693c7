#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, OnceLock};

use async_trait::async_trait;
use murmur_common::observability::{LogConfig, LogFormat};
use murmur_social::{Credentials, Cursor, Page, Post, SearchClient, SocialError};
use time::OffsetDateTime;
use time::macros::datetime;
use tokio_util::sync::CancellationToken;

static INIT_PATH: OnceLock<PathBuf> = OnceLock::new();

pub fn init_test_tracing() {
    let _ = INIT_PATH.get_or_init(|| {
        let config = LogConfig {
            app_name: "murmur-tests",
            log_dir: Some(std::env::temp_dir().join("murmur-tests")),
            emit_stderr: true,
            format: LogFormat::Text,
            default_filter: "debug".to_string(),
        };
        murmur_common::observability::init_logging(config).unwrap_or_default()
    });
}

/// What the stub answers to one `search`/`next` call.
pub enum Step {
    Page(Page),
    RateLimited(Option<OffsetDateTime>),
    Timeout,
    Fatal,
    /// Raise the stop flag, then answer with the page.
    CancelThen(CancellationToken, Page),
}

/// Scripted [`SearchClient`]. Once the script runs out every call gets `fallback`.
pub struct StubClient {
    script: Mutex<VecDeque<Step>>,
    fallback: fn() -> Step,
    pub calls: AtomicUsize,
    pub logins: AtomicUsize,
    pub login_fails: bool,
    /// Backend refuses whatever session was loaded from disk.
    pub session_revoked: bool,
    pub loaded_token: bool,
}

impl StubClient {
    pub fn new(script: Vec<Step>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: || Step::Page(Page::default()),
            calls: AtomicUsize::new(0),
            logins: AtomicUsize::new(0),
            login_fails: false,
            session_revoked: false,
            loaded_token: false,
        }
    }

    pub fn with_fallback(mut self, fallback: fn() -> Step) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    fn answer(&self) -> Result<Page, SocialError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(self.fallback);
        match step {
            Step::Page(page) => Ok(page),
            Step::RateLimited(reset) => Err(SocialError::RateLimited { reset }),
            Step::Timeout => Err(SocialError::Timeout("stub deadline".into())),
            Step::Fatal => Err(SocialError::Decode("stub garbage".into())),
            Step::CancelThen(token, page) => {
                token.cancel();
                Ok(page)
            }
        }
    }
}

#[async_trait]
impl SearchClient for StubClient {
    async fn login(&mut self, _credentials: &Credentials) -> Result<(), SocialError> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        if self.login_fails {
            return Err(SocialError::Auth("stub refused".into()));
        }
        Ok(())
    }

    fn load_token(&mut self, path: &Path) -> Result<(), SocialError> {
        let raw = std::fs::read_to_string(path).map_err(|e| SocialError::Token(e.to_string()))?;
        if !matches!(raw.trim(), "valid" | "fresh") {
            return Err(SocialError::Token("not a token".into()));
        }
        self.loaded_token = true;
        Ok(())
    }

    fn save_token(&self, path: &Path) -> Result<(), SocialError> {
        std::fs::write(path, "fresh").map_err(|e| SocialError::Token(e.to_string()))
    }

    async fn verify(&self) -> Result<(), SocialError> {
        if self.session_revoked && self.logins() == 0 {
            return Err(SocialError::Auth("stub session expired".into()));
        }
        Ok(())
    }

    async fn search(&self, _query: &str) -> Result<Page, SocialError> {
        self.answer()
    }

    async fn next(&self, _cursor: &Cursor) -> Result<Page, SocialError> {
        self.answer()
    }
}

pub fn credentials() -> Credentials {
    Credentials {
        username: "alice".into(),
        email: "alice@example.com".into(),
        password: "pw".into(),
    }
}

/// `n` posts numbered from `first`, continued by `cursor` when given.
pub fn page(first: usize, n: usize, cursor: Option<&str>) -> Page {
    let posts = (first..first + n)
        .map(|i| Post {
            id: i.to_string(),
            text: format!("post {i}"),
            author: if i % 2 == 0 { Some(format!("user{i}")) } else { None },
            created_at: datetime!(2024-03-01 12:00:00 UTC),
        })
        .collect();
    Page {
        posts,
        cursor: cursor.map(|token| Cursor {
            query: "rust".into(),
            token: token.into(),
        }),
    }
}

pub fn empty(cursor: Option<&str>) -> Page {
    page(0, 0, cursor)
}
