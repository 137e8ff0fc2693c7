//! Cookie-session client for the X/Twitter web API.
//!
//! Login walks the onboarding task flow with a guest token, collecting the
//! `auth_token` and `ct0` cookies from `Set-Cookie`. Authenticated calls send
//! those cookies back, echo `ct0` as `x-csrf-token`, and use the public web
//! bearer token. Search goes through the GraphQL `SearchTimeline` operation and
//! paginates with the bottom cursor.
use crate::client::SearchClient;
use crate::error::SocialError;
use crate::session::SessionToken;
use crate::twitter::timeline::page_from_response;
use crate::twitter::types::{FlowResponse, FlowStep, GuestActivation, SearchTimelineResponse};
use crate::types::{Credentials, Cursor, Page};
use async_trait::async_trait;
use murmur_http::header::{HeaderMap, HeaderName, HeaderValue};
use murmur_http::{HttpClient, HttpError, HttpMethod, RequestOpts};
use serde_json::{json, Value};
use std::borrow::Cow;
use std::path::Path;
use std::time::Duration;

/// Bearer token baked into the public web client.
pub const WEB_BEARER_TOKEN: &str = "AAAAAAAAAAAAAAAAAAAAANRILgAAAAAAnNwIzUejRCOuH5E6I8xnZz4puTs%3D1Zv7ttfk8LF81IUq16cHjhLTvJu4FA33AGWWjCpTnA";

const GUEST_ACTIVATE_PATH: &str = "i/api/1.1/guest/activate.json";
const TASK_PATH: &str = "i/api/1.1/onboarding/task.json";
const SEARCH_TIMELINE_PATH: &str = "i/api/graphql/flaR-PUMshxFWZWPNpq4zA/SearchTimeline";
const VERIFY_CREDENTIALS_PATH: &str = "i/api/1.1/account/verify_credentials.json";

/// Upper bound on login subtasks answered before giving up.
const MAX_FLOW_STEPS: usize = 12;

#[derive(Debug, Clone)]
pub struct TwitterWebConfig {
    pub base_url: String,
    pub language: String,
    /// Search tab: `Latest`, `Top`, `Media`...
    pub product: String,
    pub page_size: u32,
    pub request_timeout: Duration,
}

impl Default for TwitterWebConfig {
    fn default() -> Self {
        Self {
            base_url: "https://x.com/".into(),
            language: "en-US".into(),
            product: "Latest".into(),
            page_size: 20,
            request_timeout: Duration::from_secs(30),
        }
    }
}

pub struct TwitterWebClient {
    http: HttpClient,
    cfg: TwitterWebConfig,
    session: SessionToken,
}

impl TwitterWebClient {
    pub fn new(cfg: TwitterWebConfig) -> Result<Self, SocialError> {
        let http = HttpClient::new(&cfg.base_url)?.with_timeout(cfg.request_timeout);
        Ok(Self {
            http,
            cfg,
            session: SessionToken::default(),
        })
    }

    pub fn session(&self) -> &SessionToken {
        &self.session
    }

    fn base_headers(&self) -> Result<HeaderMap, SocialError> {
        let mut h = HeaderMap::new();
        insert(&mut h, "x-twitter-active-user", "yes")?;
        insert(&mut h, "x-twitter-client-language", &self.cfg.language)?;
        Ok(h)
    }

    fn session_headers(&self) -> Result<HeaderMap, SocialError> {
        let mut h = self.base_headers()?;
        let ct0 = self
            .session
            .get("ct0")
            .ok_or_else(|| SocialError::Auth("not logged in (missing ct0 cookie)".into()))?;
        insert(&mut h, "x-csrf-token", ct0)?;
        insert(&mut h, "x-twitter-auth-type", "OAuth2Session")?;
        Ok(h)
    }

    async fn activate_guest(&self) -> Result<String, SocialError> {
        let resp = self
            .http
            .send_json::<(), GuestActivation>(
                HttpMethod::POST,
                GUEST_ACTIVATE_PATH,
                None,
                RequestOpts {
                    bearer: Some(WEB_BEARER_TOKEN),
                    headers: Some(self.base_headers()?),
                    retries: Some(0),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| SocialError::Auth(format!("guest activation failed: {e}")))?;
        Ok(resp.body.guest_token)
    }

    /// One POST to the onboarding endpoint; cookies from the reply are kept.
    async fn flow_request(
        &self,
        jar: &mut SessionToken,
        guest_token: &str,
        query: Option<Vec<(&str, Cow<'_, str>)>>,
        body: &Value,
    ) -> Result<FlowResponse, SocialError> {
        let mut headers = self.base_headers()?;
        insert(&mut headers, "x-guest-token", guest_token)?;
        if let Some(ct0) = jar.get("ct0") {
            insert(&mut headers, "x-csrf-token", ct0)?;
        }
        let cookies = jar.header_value();
        let resp = self
            .http
            .send_json::<Value, FlowResponse>(
                HttpMethod::POST,
                TASK_PATH,
                Some(body),
                RequestOpts {
                    bearer: Some(WEB_BEARER_TOKEN),
                    cookies: Some(cookies.as_str()),
                    headers: Some(headers),
                    query,
                    retries: Some(0),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| SocialError::Auth(format!("login flow request failed: {e}")))?;
        jar.merge(resp.set_cookies());
        Ok(resp.body)
    }

    async fn fetch_page(&self, query: &str, cursor: Option<&str>) -> Result<Page, SocialError> {
        let mut variables = json!({
            "rawQuery": query,
            "count": self.cfg.page_size,
            "querySource": "typed_query",
            "product": self.cfg.product,
        });
        if let Some(c) = cursor {
            variables["cursor"] = Value::String(c.to_string());
        }
        let params: Vec<(&str, Cow<'_, str>)> = vec![
            ("variables", variables.to_string().into()),
            ("features", search_features().to_string().into()),
        ];

        let cookies = self.session.header_value();
        let resp: SearchTimelineResponse = self
            .http
            .get_json(
                SEARCH_TIMELINE_PATH,
                RequestOpts {
                    bearer: Some(WEB_BEARER_TOKEN),
                    cookies: Some(cookies.as_str()),
                    headers: Some(self.session_headers()?),
                    query: Some(params),
                    ..Default::default()
                },
            )
            .await
            .map_err(session_error)?;

        let page = page_from_response(query, resp)?;
        tracing::debug!(
            posts = page.len(),
            has_cursor = page.cursor.is_some(),
            "twitter.search.page"
        );
        Ok(page)
    }
}

#[async_trait]
impl SearchClient for TwitterWebClient {
    async fn login(&mut self, credentials: &Credentials) -> Result<(), SocialError> {
        let guest_token = self.activate_guest().await?;
        let mut jar = SessionToken::default();

        let start = json!({
            "input_flow_data": {
                "flow_context": {
                    "debug_overrides": {},
                    "start_location": {"location": "splash_screen"}
                }
            },
            "subtask_versions": {}
        });
        let mut flow = self
            .flow_request(
                &mut jar,
                &guest_token,
                Some(vec![("flow_name", Cow::Borrowed("login"))]),
                &start,
            )
            .await?;

        for _ in 0..MAX_FLOW_STEPS {
            let Some(next) = flow.subtasks.first().map(|s| s.subtask_id.clone()) else {
                break;
            };
            if next == "LoginSuccessSubtask" {
                break;
            }
            tracing::debug!(subtask = %next, "twitter.login.subtask");
            let input = subtask_input(&next, credentials)?;
            let step = serde_json::to_value(FlowStep {
                flow_token: &flow.flow_token,
                subtask_inputs: vec![input],
            })
            .map_err(|e| SocialError::Auth(e.to_string()))?;
            flow = self.flow_request(&mut jar, &guest_token, None, &step).await?;
        }

        if !jar.is_authenticated() {
            return Err(SocialError::Auth(format!(
                "login flow ended (status={:?}) without session cookies",
                flow.status
            )));
        }
        self.session = jar;
        tracing::info!(user = %credentials.username, "twitter.login.ok");
        Ok(())
    }

    fn load_token(&mut self, path: &Path) -> Result<(), SocialError> {
        self.session = SessionToken::load(path)?;
        Ok(())
    }

    fn save_token(&self, path: &Path) -> Result<(), SocialError> {
        self.session.save(path)
    }

    async fn verify(&self) -> Result<(), SocialError> {
        let cookies = self.session.header_value();
        self.http
            .get_json::<Value>(
                VERIFY_CREDENTIALS_PATH,
                RequestOpts {
                    bearer: Some(WEB_BEARER_TOKEN),
                    cookies: Some(cookies.as_str()),
                    headers: Some(self.session_headers()?),
                    query: Some(vec![("skip_status", Cow::Borrowed("true"))]),
                    retries: Some(0),
                    ..Default::default()
                },
            )
            .await
            .map_err(session_error)?;
        tracing::debug!("twitter.session.verified");
        Ok(())
    }

    async fn search(&self, query: &str) -> Result<Page, SocialError> {
        self.fetch_page(query, None).await
    }

    async fn next(&self, cursor: &Cursor) -> Result<Page, SocialError> {
        self.fetch_page(&cursor.query, Some(&cursor.token)).await
    }
}

/// Answer for one onboarding subtask; unknown ones (2FA, captcha, lockouts) abort.
fn subtask_input(subtask_id: &str, creds: &Credentials) -> Result<Value, SocialError> {
    let input = match subtask_id {
        "LoginJsInstrumentationSubtask" => json!({
            "subtask_id": subtask_id,
            "js_instrumentation": {"response": "{}", "link": "next_link"}
        }),
        "LoginEnterUserIdentifierSSO" => json!({
            "subtask_id": subtask_id,
            "settings_list": {
                "setting_responses": [{
                    "key": "user_identifier",
                    "response_data": {"text_data": {"result": creds.username}}
                }],
                "link": "next_link"
            }
        }),
        "LoginEnterAlternateIdentifierSubtask" => json!({
            "subtask_id": subtask_id,
            "enter_text": {"text": creds.email, "link": "next_link"}
        }),
        "LoginEnterPassword" => json!({
            "subtask_id": subtask_id,
            "enter_password": {"password": creds.password, "link": "next_link"}
        }),
        "AccountDuplicationCheck" => json!({
            "subtask_id": subtask_id,
            "check_logged_in_account": {"link": "AccountDuplicationCheck_false"}
        }),
        other => {
            return Err(SocialError::Auth(format!(
                "login requires unsupported step `{other}`"
            )));
        }
    };
    Ok(input)
}

/// 401/403 on an authenticated call means the session cookies were revoked or expired.
fn session_error(err: HttpError) -> SocialError {
    match err {
        HttpError::Api { status, message, .. } if status.as_u16() == 401 || status.as_u16() == 403 => {
            SocialError::Auth(format!("session rejected ({status}): {message}"))
        }
        other => other.into(),
    }
}

fn search_features() -> Value {
    json!({
        "rweb_tipjar_consumption_enabled": true,
        "responsive_web_graphql_exclude_directive_enabled": true,
        "verified_phone_label_enabled": false,
        "creator_subscriptions_tweet_preview_api_enabled": true,
        "responsive_web_graphql_timeline_navigation_enabled": true,
        "responsive_web_graphql_skip_user_profile_image_extensions_enabled": false,
        "communities_web_enable_tweet_community_results_fetch": true,
        "c9s_tweet_anatomy_moderator_badge_enabled": true,
        "articles_preview_enabled": true,
        "responsive_web_edit_tweet_api_enabled": true,
        "graphql_is_translatable_rweb_tweet_is_translatable_enabled": true,
        "view_counts_everywhere_api_enabled": true,
        "longform_notetweets_consumption_enabled": true,
        "responsive_web_twitter_article_tweet_consumption_enabled": true,
        "tweet_awards_web_tipping_enabled": false,
        "creator_subscriptions_quote_tweet_preview_enabled": false,
        "freedom_of_speech_not_reach_fetch_enabled": true,
        "standardized_nudges_misinfo": true,
        "tweet_with_visibility_results_prefer_gql_limited_actions_policy_enabled": true,
        "rweb_video_timestamps_enabled": true,
        "longform_notetweets_rich_text_read_enabled": true,
        "longform_notetweets_inline_media_enabled": true,
        "responsive_web_enhance_cards_enabled": false
    })
}

fn insert(h: &mut HeaderMap, name: &'static str, value: &str) -> Result<(), SocialError> {
    let value = HeaderValue::from_str(value)
        .map_err(|e| SocialError::Auth(format!("invalid header value for {name}: {e}")))?;
    h.insert(HeaderName::from_static(name), value);
    Ok(())
}
