use murmur_http::{HttpClient, HttpError, HttpMethod, RequestOpts};
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> HttpClient {
    HttpClient::new(&format!("{}/", server.uri()))
        .expect("mock base url")
        .with_timeout(Duration::from_secs(2))
}

#[tokio::test]
async fn rate_limit_surfaces_reset_without_retrying() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("x-rate-limit-reset", "1700000000")
                .set_body_json(json!({"errors": [{"message": "Rate limit exceeded", "code": 88}]})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server)
        .get_json::<Value>("search", RequestOpts::default())
        .await
        .unwrap_err();

    match err {
        HttpError::RateLimited { reset_unix, message } => {
            assert_eq!(reset_unix, Some(1_700_000_000));
            assert_eq!(message, "Rate limit exceeded");
        }
        other => panic!("expected RateLimited, got {other:?}"),
    }
}

#[tokio::test]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let got: Value = client_for(&server)
        .get_json("flaky", RequestOpts::default())
        .await
        .unwrap();
    assert_eq!(got["ok"], true);
}

#[tokio::test]
async fn slow_responses_become_timeouts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let err = client_for(&server)
        .get_json::<Value>(
            "slow",
            RequestOpts {
                timeout: Some(Duration::from_millis(50)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, HttpError::Timeout(_)), "got {err:?}");
}

#[tokio::test]
async fn cookies_and_bearer_are_sent_and_set_cookie_is_exposed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .and(header("authorization", "Bearer tok"))
        .and(header("cookie", "ct0=abc"))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("set-cookie", "auth_token=fresh; Path=/; HttpOnly")
                .set_body_json(json!({"flow_token": "f1"})),
        )
        .mount(&server)
        .await;

    let resp = client_for(&server)
        .send_json::<_, Value>(
            HttpMethod::POST,
            "login",
            Some(&json!({"input": 1})),
            RequestOpts {
                bearer: Some("tok"),
                cookies: Some("ct0=abc"),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(resp.body["flow_token"], "f1");
    assert_eq!(
        resp.set_cookies(),
        vec![("auth_token".to_string(), "fresh".to_string())]
    );
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/forbidden"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({"message": "nope"})))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server)
        .get_json::<Value>("forbidden", RequestOpts::default())
        .await
        .unwrap_err();
    match err {
        HttpError::Api { status, message, .. } => {
            assert_eq!(status.as_u16(), 403);
            assert_eq!(message, "nope");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}
