use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::{TimeZone, Utc};
use tower::ServiceExt;

use standup::consts::SETTING_FINISHED;
use standup::engine::Engine;
use standup::server::{AppState, router};
use standup::setting::sqlite::SqliteSettingStore;
use standup::setting::{Setting, SettingStore};
use standup::slack::mock::{Delivery, MockSlack};
use standup::slack::signature::{self, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use standup::store::StandupStore;
use standup::store::sqlite::SqliteStandupStore;

const SECRET: &str = "8f742231b10e8888abcd99yyyzzz85a5";
const DAY: &str = "2024-01-10";

struct App {
    router: Router,
    slack: Arc<MockSlack>,
    settings: Arc<SqliteSettingStore>,
    standups: Arc<SqliteStandupStore>,
}

fn app(signing_secret: Option<&str>) -> App {
    let slack = Arc::new(MockSlack::new("UTC"));
    let settings = Arc::new(SqliteSettingStore::open(":memory:").unwrap());
    let standups = Arc::new(SqliteStandupStore::in_memory().unwrap());
    let now = Utc.with_ymd_and_hms(2024, 1, 10, 3, 0, 0).unwrap();
    let engine = Engine::new(
        settings.clone(),
        standups.clone(),
        slack.clone(),
        slack.clone(),
    )
    .with_clock(move || now);

    let state = AppState {
        engine: Arc::new(engine),
        settings: settings.clone(),
        messenger: slack.clone(),
        directory: slack.clone(),
        signing_secret: signing_secret.map(str::to_string),
    };
    App {
        router: router(state),
        slack,
        settings,
        standups,
    }
}

async fn with_setting(app: &App) {
    let setting = Setting::new("C1", ["Yesterday?", "Today?"], ["U1"], "C1").unwrap();
    app.settings.put(&setting).await.unwrap();
}

fn json_request(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn form_request(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn signed(mut request: Request<Body>, body: &str, timestamp: i64) -> Request<Body> {
    let ts = timestamp.to_string();
    let sig = signature::sign(SECRET, &ts, body.as_bytes()).unwrap();
    let headers = request.headers_mut();
    headers.insert(TIMESTAMP_HEADER, ts.parse().unwrap());
    headers.insert(SIGNATURE_HEADER, sig.parse().unwrap());
    request
}

fn encode(value: &str) -> String {
    value
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (b as char).to_string()
            }
            _ => format!("%{b:02X}"),
        })
        .collect()
}

fn message_event(user: &str, text: &str, ts: &str) -> String {
    serde_json::json!({
        "type": "event_callback",
        "event_id": "Ev01",
        "event": {
            "type": "message",
            "channel_type": "im",
            "user": user,
            "text": text,
            "ts": ts,
        }
    })
    .to_string()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn health_is_ok() {
    let app = app(None);
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn url_verification_echoes_challenge() {
    let app = app(None);
    let body = r#"{"type":"url_verification","token":"x","challenge":"3eZbrw1aBm2rZgRNFdxV2595E9CY3gmdALWMmHkvFXO7tYXAYM8P"}"#;
    let response = app
        .router
        .oneshot(json_request("/slack/events", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE].to_str().unwrap(),
        "text/plain"
    );
    assert_eq!(
        body_string(response).await,
        "3eZbrw1aBm2rZgRNFdxV2595E9CY3gmdALWMmHkvFXO7tYXAYM8P"
    );
}

#[tokio::test]
async fn unsigned_request_is_rejected() {
    let app = app(Some(SECRET));
    let body = r#"{"type":"url_verification","challenge":"abc"}"#;
    let response = app
        .router
        .oneshot(json_request("/slack/events", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn stale_signature_is_rejected() {
    let app = app(Some(SECRET));
    let body = r#"{"type":"url_verification","challenge":"abc"}"#;
    let old = Utc::now().timestamp() - 3600;
    let request = signed(json_request("/slack/events", body), body, old);
    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn signed_request_is_accepted() {
    let app = app(Some(SECRET));
    let body = r#"{"type":"url_verification","challenge":"abc"}"#;
    let request = signed(json_request("/slack/events", body), body, Utc::now().timestamp());
    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "abc");
}

#[tokio::test]
async fn message_event_records_answer_and_asks_next() {
    let app = app(None);
    with_setting(&app).await;
    let response = app
        .router
        .clone()
        .oneshot(json_request("/start", r#"{"target_channel_id":"C1"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = message_event("U1", "fixed the build", "2000.000001");
    let response = app
        .router
        .clone()
        .oneshot(json_request("/slack/events", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let stored = app.standups.get("U1", DAY).await.unwrap().unwrap();
    assert_eq!(stored.answers.len(), 1);
    assert_eq!(stored.answers[0].text, "fixed the build");
    assert_eq!(app.slack.directs_to("U1"), vec!["Yesterday?", "Today?"]);
}

#[tokio::test]
async fn own_bot_message_is_ignored() {
    let app = app(None);
    with_setting(&app).await;
    app.router
        .clone()
        .oneshot(json_request("/start", r#"{"target_channel_id":"C1"}"#))
        .await
        .unwrap();

    let body = message_event("UBOT", "Yesterday?", "2000.000001");
    let response = app
        .router
        .oneshot(json_request("/slack/events", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let stored = app.standups.get("U1", DAY).await.unwrap().unwrap();
    assert!(stored.answers.is_empty());
    assert_eq!(app.slack.deliveries().len(), 1);
}

#[tokio::test]
async fn message_from_stranger_is_acknowledged() {
    let app = app(None);
    let body = message_event("U9", "hello", "2000.000001");
    let response = app
        .router
        .oneshot(json_request("/slack/events", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(app.slack.deliveries().is_empty());
}

#[tokio::test]
async fn malformed_event_is_bad_request() {
    let app = app(None);
    let response = app
        .router
        .oneshot(json_request("/slack/events", "{not json"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn setting_command_opens_dialog() {
    let app = app(None);
    with_setting(&app).await;
    let response = app
        .router
        .oneshot(form_request(
            "/slack/commands",
            "command=%2Fstandup&text=setting&channel_id=C1&trigger_id=T123",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let deliveries = app.slack.deliveries();
    assert_eq!(deliveries.len(), 1);
    match &deliveries[0] {
        Delivery::Dialog { trigger_id, dialog } => {
            assert_eq!(trigger_id, "T123");
            assert_eq!(dialog.callback_id, "setting");
        }
        other => panic!("expected a dialog, got {other:?}"),
    }
}

#[tokio::test]
async fn unknown_command_returns_usage() {
    let app = app(None);
    let response = app
        .router
        .oneshot(form_request(
            "/slack/commands",
            "text=help&channel_id=C1&trigger_id=T1",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("setting"));
    assert!(app.slack.deliveries().is_empty());
}

#[tokio::test]
async fn dialog_submission_saves_setting() {
    let app = app(None);
    let payload = serde_json::json!({
        "type": "dialog_submission",
        "callback_id": "setting",
        "channel": { "id": "C1" },
        "submission": {
            "user_ids": "U1\nU2\n",
            "questions": "Yesterday?\nToday?\n\nBlockers?",
            "target_channel_id": "C7"
        }
    })
    .to_string();
    let body = format!("payload={}", encode(&payload));

    let response = app
        .router
        .oneshot(form_request("/slack/interactive", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let saved = app.settings.get("C7").await.unwrap().unwrap();
    assert_eq!(saved.member_ids, vec!["U1", "U2"]);
    assert_eq!(saved.questions, vec!["Yesterday?", "Today?", "Blockers?"]);
    assert_eq!(saved.summary_channel_id, "C7");

    assert!(app.slack.deliveries().contains(&Delivery::Text {
        channel_id: "C1".to_string(),
        text: SETTING_FINISHED.to_string(),
        ts: "1704844800.000001".to_string(),
    }));
}

#[tokio::test]
async fn invalid_submission_reports_errors() {
    let app = app(None);
    let payload = serde_json::json!({
        "callback_id": "setting",
        "channel": { "id": "C1" },
        "submission": {
            "user_ids": "U1",
            "questions": "  \n",
            "target_channel_id": "C1"
        }
    })
    .to_string();
    let body = format!("payload={}", encode(&payload));

    let response = app
        .router
        .oneshot(form_request("/slack/interactive", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(json["errors"][0]["name"], "questions");
    assert!(app.settings.get("C1").await.unwrap().is_none());
    assert!(app.slack.deliveries().is_empty());
}

#[tokio::test]
async fn submission_errors_name_the_offending_field() {
    let app = app(None);
    let cases = [
        ("U1", "Yesterday?", "", "target_channel_id"),
        (" \n ", "Yesterday?", "C1", "user_ids"),
        ("U1", "", "C1", "questions"),
    ];
    for (members, questions, channel, field) in cases {
        let payload = serde_json::json!({
            "callback_id": "setting",
            "channel": { "id": "C1" },
            "submission": {
                "user_ids": members,
                "questions": questions,
                "target_channel_id": channel
            }
        })
        .to_string();
        let body = format!("payload={}", encode(&payload));

        let response = app
            .router
            .clone()
            .oneshot(form_request("/slack/interactive", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value =
            serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["errors"][0]["name"], field, "members={members:?}");
    }
    assert!(app.slack.deliveries().is_empty());
}

#[tokio::test]
async fn start_reports_members() {
    let app = app(None);
    with_setting(&app).await;
    let response = app
        .router
        .oneshot(json_request("/start", r#"{"target_channel_id":"C1"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let report: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(report["initialized"], serde_json::json!(["U1"]));
    assert!(app.standups.get("U1", DAY).await.unwrap().is_some());
}

#[tokio::test]
async fn start_without_target_is_noop() {
    let app = app(None);
    let response = app
        .router
        .oneshot(json_request("/start", "{}"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(app.slack.deliveries().is_empty());
}

#[tokio::test]
async fn start_failure_asks_for_retry() {
    let app = app(None);
    with_setting(&app).await;
    app.slack.set_failing(true);
    let response = app
        .router
        .oneshot(json_request("/start", r#"{"target_channel_id":"C1"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
