use std::sync::Arc;

use agora_api::{ApiDependencies, ApiServer, DatabaseHealth, ProblemDetails};
use agora_config::ForumConfig;
use agora_core::{ErrorPolicy, IdentityKey};
use agora_telemetry::Metrics;
use agora_test_support::fakes::{
    RecordingEventLog, ScriptedLookup, ScriptedPageLoadStore, StaticIdentityResolver,
    StaticProvisioner, member, sample_row,
};
use agora_test_support::themes::{SAMPLE_THEME_FILE, ThemeFixture};
use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, Response, StatusCode, header};
use serde_json::Value;
use tower::ServiceExt;

struct Database {
    up: bool,
}

#[async_trait]
impl DatabaseHealth for Database {
    async fn ping(&self) -> anyhow::Result<()> {
        if self.up {
            Ok(())
        } else {
            Err(anyhow::anyhow!("connection refused"))
        }
    }
}

struct Host {
    router: Router,
    store: Arc<ScriptedPageLoadStore>,
    provisioner: Arc<StaticProvisioner>,
    identities: Arc<StaticIdentityResolver>,
    telemetry: Metrics,
    _themes: ThemeFixture,
}

fn host(policy: ErrorPolicy, store: ScriptedPageLoadStore) -> Host {
    host_with(policy, store, StaticIdentityResolver::default(), true)
}

fn host_with(
    policy: ErrorPolicy,
    store: ScriptedPageLoadStore,
    identities: StaticIdentityResolver,
    database_up: bool,
) -> Host {
    let themes = ThemeFixture::new().expect("theme fixture");
    let mut config = ForumConfig::default();
    config.error_policy = policy;
    config.theme_directory = themes.path().to_path_buf();
    config.default_theme = SAMPLE_THEME_FILE.to_string();

    let store = Arc::new(store);
    let provisioner = Arc::new(StaticProvisioner::new(true));
    let identities = Arc::new(identities);
    let telemetry = Metrics::new().expect("metrics");
    let server = ApiServer::new(ApiDependencies {
        config,
        page_loads: store.clone(),
        provisioner: provisioner.clone(),
        identities: identities.clone(),
        event_log: Arc::new(RecordingEventLog::default()),
        database: Arc::new(Database { up: database_up }),
        telemetry: telemetry.clone(),
    })
    .expect("server");
    Host {
        router: server.router(),
        store,
        provisioner,
        identities,
        telemetry,
        _themes: themes,
    }
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

async fn json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .map(ToString::to_string)
        .collect()
}

#[tokio::test]
async fn guest_page_view_exposes_row_and_theme_dir() {
    let host = host(
        ErrorPolicy::Production,
        ScriptedPageLoadStore::always(sample_row(1, true)),
    );
    let response = host
        .router
        .clone()
        .oneshot(get("/topics?f=2&t=9"))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let cookies = set_cookies(&response);
    assert!(cookies.iter().any(|c| c.starts_with("agora_session=")));
    assert!(response.headers().contains_key("x-request-id"));

    let body = json(response).await;
    assert_eq!(body["page"], "topics");
    assert_eq!(body["data"]["UserID"], 1);
    assert_eq!(body["data"]["IsGuest"], true);
    assert_eq!(body["theme_dir"], "/themes/cleanslate/");

    let requests = host.store.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].identity, IdentityKey::Anonymous);
    assert_eq!(requests[0].client_address, "unknown");
    assert_eq!(requests[0].location.forum_id, Some(2));
    assert_eq!(requests[0].location.topic_id, Some(9));
    assert_eq!(requests[0].query_string, "f=2&t=9");
}

#[tokio::test]
async fn existing_session_cookie_is_reused() {
    let host = host(
        ErrorPolicy::Production,
        ScriptedPageLoadStore::always(sample_row(1, true)),
    );
    let request = Request::builder()
        .uri("/forum")
        .header(header::COOKIE, "agora_session=session-42")
        .header("x-real-ip", "198.51.100.7")
        .header("dnt", "1")
        .body(Body::empty())
        .expect("request");
    let response = host.router.clone().oneshot(request).await.expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookies(&response).is_empty());
    let requests = host.store.requests();
    assert_eq!(requests[0].session_id, "session-42");
    assert_eq!(requests[0].client_address, "198.51.100.7");
    assert!(requests[0].classification.dont_track);
}

#[tokio::test]
async fn member_is_provisioned_on_first_visit() {
    let store = ScriptedPageLoadStore::new(
        vec![ScriptedLookup::Miss],
        ScriptedLookup::Row(sample_row(5, false)),
    );
    let identities = StaticIdentityResolver::default().with_ticket("ticket-1", member("k-5"));
    let host = host_with(ErrorPolicy::Production, store, identities, true);

    let request = Request::builder()
        .uri("/posts?t=3")
        .header(header::COOKIE, "agora_auth=ticket-1")
        .body(Body::empty())
        .expect("request");
    let response = host.router.clone().oneshot(request).await.expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(host.provisioner.calls(), 1);
    assert_eq!(host.store.calls(), 2);
    assert_eq!(
        host.store.requests()[0].identity.as_provider_key(),
        Some("k-5")
    );
    let snapshot = host.telemetry.snapshot();
    assert_eq!(snapshot.page_load_lookups_total, 2);
    assert_eq!(snapshot.user_provisioning_total, 1);
}

#[tokio::test]
async fn production_failure_redirects_and_clears_auth() {
    let identities = StaticIdentityResolver::default().with_ticket("ticket-9", member("k-9"));
    let host = host_with(
        ErrorPolicy::Production,
        ScriptedPageLoadStore::missing(),
        identities,
        true,
    );
    let request = Request::builder()
        .uri("/topics")
        .header(header::COOKIE, "agora_auth=ticket-9")
        .body(Body::empty())
        .expect("request");
    let response = host.router.clone().oneshot(request).await.expect("response");

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok()),
        Some("/info?i=7")
    );
    let cookies = set_cookies(&response);
    assert!(
        cookies
            .iter()
            .any(|c| c.starts_with("agora_auth=;") && c.contains("Max-Age=0"))
    );
    assert_eq!(host.telemetry.snapshot().bootstrap_redirects_total, 1);

    assert_eq!(host.identities.revoked(), vec!["ticket-9".to_string()]);
    let replay = Request::builder()
        .uri("/topics")
        .header(header::COOKIE, "agora_auth=ticket-9")
        .body(Body::empty())
        .expect("request");
    host.router.clone().oneshot(replay).await.expect("response");
    let requests = host.store.requests();
    let replayed = requests.last().expect("replayed lookup");
    assert_eq!(replayed.identity, IdentityKey::Anonymous);
}

#[tokio::test]
async fn production_failure_on_info_page_is_a_generic_problem() {
    let host = host(ErrorPolicy::Production, ScriptedPageLoadStore::missing());
    let response = host
        .router
        .clone()
        .oneshot(get("/info?i=7"))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(
        set_cookies(&response)
            .iter()
            .any(|c| c.starts_with("agora_auth=;"))
    );
    let problem: ProblemDetails = serde_json::from_value(json(response).await).expect("problem");
    assert_eq!(problem.status, 500);
    let detail = problem.detail.unwrap_or_default();
    assert!(!detail.contains("guest"), "{detail}");
}

#[tokio::test]
async fn diagnostic_failure_returns_the_error_chain() {
    let host = host(ErrorPolicy::Diagnostic, ScriptedPageLoadStore::failing());
    let request = Request::builder()
        .uri("/topics")
        .header(header::COOKIE, "agora_auth=stale")
        .body(Body::empty())
        .expect("request");
    let response = host.router.clone().oneshot(request).await.expect("response");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(
        !set_cookies(&response)
            .iter()
            .any(|c| c.starts_with("agora_auth=")),
        "diagnostic policy never signs out"
    );
    assert!(host.identities.revoked().is_empty());
    let problem: ProblemDetails = serde_json::from_value(json(response).await).expect("problem");
    let detail = problem.detail.unwrap_or_default();
    assert!(detail.contains("page load lookup failed"), "{detail}");
    assert!(detail.contains("scripted page load failure"), "{detail}");

    let metrics = host.telemetry.render().expect("render");
    assert!(metrics.contains(r#"bootstrap_failures_total{kind="lookup"} 1"#));
}

#[tokio::test]
async fn info_page_is_localized() {
    let host = host(
        ErrorPolicy::Production,
        ScriptedPageLoadStore::always(sample_row(1, true)),
    );
    let request = Request::builder()
        .uri("/info?i=7")
        .header(header::ACCEPT_LANGUAGE, "de-DE,de;q=0.9")
        .body(Body::empty())
        .expect("request");
    let response = host.router.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = json(response).await;
    assert_eq!(body["code"], 7);
    assert_eq!(body["key"], "info.failure");
    assert_eq!(body["language"], "DE");
    assert!(
        body["message"]
            .as_str()
            .is_some_and(|m| m.contains("Fehler"))
    );

    let response = host
        .router
        .clone()
        .oneshot(get("/info?i=99"))
        .await
        .expect("response");
    assert_eq!(json(response).await["key"], "info.invalid");
}

#[tokio::test]
async fn theme_items_follow_accept_language() {
    let host = host(
        ErrorPolicy::Production,
        ScriptedPageLoadStore::always(sample_row(1, true)),
    );
    let request = Request::builder()
        .uri("/theme/buttons/reply")
        .header(header::ACCEPT_LANGUAGE, "de")
        .body(Body::empty())
        .expect("request");
    let body = json(host.router.clone().oneshot(request).await.expect("response")).await;
    assert_eq!(body["value"], "Antworten");
    assert_eq!(body["found"], true);
    assert_eq!(body["theme"], SAMPLE_THEME_FILE);

    let body = json(
        host.router
            .clone()
            .oneshot(get("/theme/icons/new_posts"))
            .await
            .expect("response"),
    )
    .await;
    assert_eq!(body["language"], "EN");
    assert_eq!(body["value"], "/themes/cleanslate/images/topic_new.png");
}

#[tokio::test]
async fn missing_theme_item_uses_placeholder_and_counts() {
    let host = host(
        ErrorPolicy::Production,
        ScriptedPageLoadStore::always(sample_row(1, true)),
    );
    let body = json(
        host.router
            .clone()
            .oneshot(get("/theme/buttons/gone"))
            .await
            .expect("response"),
    )
    .await;
    assert_eq!(body["found"], false);
    assert_eq!(body["value"], "[BUTTONS.GONE]");
    assert_eq!(host.telemetry.snapshot().theme_items_missing_total, 1);
}

#[tokio::test]
async fn invalid_theme_cookie_keeps_board_default() {
    let host = host(
        ErrorPolicy::Production,
        ScriptedPageLoadStore::always(sample_row(1, true)),
    );
    let request = Request::builder()
        .uri("/theme/buttons/reply")
        .header(header::COOKIE, "agora_theme=../../etc/passwd")
        .body(Body::empty())
        .expect("request");
    let body = json(host.router.clone().oneshot(request).await.expect("response")).await;
    assert_eq!(body["theme"], SAMPLE_THEME_FILE);
    assert_eq!(body["value"], "Reply");
}

#[tokio::test]
async fn health_routes_skip_bootstrap() {
    let host = host(ErrorPolicy::Production, ScriptedPageLoadStore::missing());

    let response = host
        .router
        .clone()
        .oneshot(get("/health"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json(response).await["policy"], "production");

    let response = host
        .router
        .clone()
        .oneshot(get("/health/full"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["theme_cache"]["bypassed"], false);

    let response = host
        .router
        .clone()
        .oneshot(get("/metrics"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let text = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let text = String::from_utf8(text.to_vec()).expect("utf-8");
    assert!(text.contains("http_requests_total"));
    assert!(text.contains(r#"route="/health""#));
    assert_eq!(host.store.calls(), 0);
}

#[tokio::test]
async fn unreachable_database_degrades_health() {
    let host = host_with(
        ErrorPolicy::Production,
        ScriptedPageLoadStore::missing(),
        StaticIdentityResolver::default(),
        false,
    );
    let response = host
        .router
        .clone()
        .oneshot(get("/health"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let problem: ProblemDetails = serde_json::from_value(json(response).await).expect("problem");
    assert_eq!(problem.status, 503);
}

#[tokio::test]
async fn requests_are_counted_by_page_class() {
    let host = host(
        ErrorPolicy::Production,
        ScriptedPageLoadStore::always(sample_row(1, true)),
    );
    for uri in ["/topics?f=2", "/topics/7", "/health"] {
        let response = host
            .router
            .clone()
            .oneshot(get(uri))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
    }

    let rendered = host.telemetry.render().expect("render");
    let series: Vec<&str> = rendered
        .lines()
        .filter(|line| line.starts_with("http_requests_total{"))
        .collect();
    let topics = series
        .iter()
        .find(|line| line.contains(r#"page="topics""#))
        .expect("topics series");
    assert!(topics.contains(r#"code="200""#));
    assert!(topics.ends_with(" 2"), "{topics}");
    assert!(series.iter().any(|line| line.contains(r#"page="health""#)));
    assert!(!rendered.contains("/topics"));
}
