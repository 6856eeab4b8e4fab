//! Authentication flow tests against a local mock site
//!
//! The profile page answers with logged-in markers only when the expected
//! cookie is present, so each test exercises the full cookie round trip.

use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, header_regex, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::{ClientConfig, HttpTransport, SessionStore, SiteClient};
use crate::auth::{ApiCredentials, Credentials};
use crate::errors::AuthError;

const LOGGED_IN: &str = r#"<html><head><script>
    ga('set', 'dimension5', 'registered');
    ga('set', 'dimension6', 'premium');
</script></head></html>"#;

const FREE_ACCOUNT: &str =
    r#"<html><head><script>ga('set', 'dimension5', 'registered');</script></head></html>"#;

const ANONYMOUS: &str = r#"<html><head><script>ga('set', 'dimension5', 'not-registered');</script></head>
<body><ul class="message"><li class="error">Incorrect login information.</li></ul></body></html>"#;

const LOGIN_PAGE: &str = r#"<html><form method="post">
    <input type="text" name="login_form[name]">
    <input type="password" name="login_form[password]">
    <input type="hidden" name="login_form[_token]" value="tok-42">
</form></html>"#;

async fn mount_profile(server: &MockServer, cookie_pattern: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path("/acct/"))
        .and(query_param("action", "status"))
        .and(header_regex("cookie", cookie_pattern))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .with_priority(1)
        .mount(server)
        .await;
}

async fn mount_anonymous_profile(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/acct/"))
        .and(query_param("action", "status"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ANONYMOUS))
        .mount(server)
        .await;
}

async fn client_for(
    server: &MockServer,
    dir: &TempDir,
    credentials: Option<Credentials>,
) -> SiteClient {
    let config = ClientConfig {
        rate_limit_rps: 100,
        ..ClientConfig::with_base_url(server.uri())
    };
    SiteClient::new(config, SessionStore::in_dir(dir.path()), credentials)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_form_login_sets_session_and_persists() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_profile(&server, "session=ok", LOGGED_IN).await;
    mount_anonymous_profile(&server).await;
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_string_contains("tok-42"))
        .and(body_string_contains("someone"))
        .respond_with(
            ResponseTemplate::new(200).insert_header("set-cookie", "session=ok; Path=/"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let credentials = Credentials::Form {
        user: "someone".to_string(),
        pass: "secret".to_string(),
    };
    let client = client_for(&server, &dir, Some(credentials)).await;
    let auth = client.auth();
    let mut manager = auth.lock().await;

    let session = manager.ensure_authenticated().await.unwrap();
    assert!(session.is_authenticated());
    assert!(session.is_premium());

    // already authenticated: no further login
    manager.ensure_authenticated().await.unwrap();

    let stored = SessionStore::in_dir(dir.path()).load().await.unwrap();
    assert!(stored.cookies.iter().any(|c| c.raw.starts_with("session=ok")));
}

#[tokio::test]
async fn test_stored_session_reused_without_credentials() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_profile(&server, "session=ok", FREE_ACCOUNT).await;
    mount_anonymous_profile(&server).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let config = ClientConfig::with_base_url(server.uri());
    let base = config.endpoints().unwrap().base_url;
    let store = SessionStore::in_dir(dir.path());
    store
        .save(&super::StoredSession {
            device_id: None,
            cookies: vec![super::StoredCookie {
                url: base.to_string(),
                raw: "session=ok; Path=/".to_string(),
            }],
        })
        .await
        .unwrap();

    let client = client_for(&server, &dir, None).await;
    let auth = client.auth();
    let mut manager = auth.lock().await;
    let session = manager.ensure_authenticated().await.unwrap();

    assert!(session.is_authenticated());
    assert!(!session.is_premium());
}

#[tokio::test]
async fn test_missing_credentials_when_login_needed() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_anonymous_profile(&server).await;

    let client = client_for(&server, &dir, None).await;
    let auth = client.auth();
    let result = auth.lock().await.ensure_authenticated().await.map(|_| ());

    assert!(matches!(result, Err(AuthError::MissingCredentials)));
}

#[tokio::test]
async fn test_cookie_replay_injects_user_cookies() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_profile(&server, "c_userkey=key-1", LOGGED_IN).await;
    mount_anonymous_profile(&server).await;

    let credentials = Credentials::CookieReplay {
        user_id: "1001".to_string(),
        user_key: "key-1".to_string(),
    };
    let client = client_for(&server, &dir, Some(credentials)).await;
    let auth = client.auth();
    let mut manager = auth.lock().await;

    assert!(manager.ensure_authenticated().await.unwrap().is_premium());
    let header = client.jar().header_for(&client.endpoints().base_url).unwrap();
    assert!(header.contains("c_userid=1001"));
}

#[tokio::test]
async fn test_api_login_injects_session_cookie() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_profile(&server, "sess_id=sid-9", LOGGED_IN).await;
    mount_anonymous_profile(&server).await;
    Mock::given(method("GET"))
        .and(path("/start_session.0.json"))
        .and(query_param("device_id", "fixed-device"))
        .and(query_param("device_type", "com.crunchyroll.iphone"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"error":false,"data":{"session_id":"sid-9"}}"#),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/login.0.json"))
        .and(body_string_contains("session_id=sid-9"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"error":false,"data":{"auth":"token"}}"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let credentials = Credentials::Api(ApiCredentials {
        user: "someone".to_string(),
        pass: "secret".to_string(),
        session_url: format!("{}/start_session.0.json", server.uri()),
        login_url: format!("{}/login.0.json", server.uri()),
        session_key: "key".to_string(),
        api_version: "2313.8".to_string(),
        locale: "enUS".to_string(),
        device_id: Some("fixed-device".to_string()),
    });
    let client = client_for(&server, &dir, Some(credentials)).await;
    let auth = client.auth();
    let mut manager = auth.lock().await;

    assert!(manager.ensure_authenticated().await.unwrap().is_authenticated());

    let stored = SessionStore::in_dir(dir.path()).load().await.unwrap();
    assert_eq!(stored.device_id.as_deref(), Some("fixed-device"));
    assert!(stored.cookies.iter().any(|c| c.raw.starts_with("c_locale=enUS")));
}

#[tokio::test]
async fn test_rejected_login_reports_page_error() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_anonymous_profile(&server).await;
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ANONYMOUS))
        .mount(&server)
        .await;

    let credentials = Credentials::Form {
        user: "someone".to_string(),
        pass: "wrong".to_string(),
    };
    let client = client_for(&server, &dir, Some(credentials)).await;
    let auth = client.auth();
    let mut manager = auth.lock().await;

    match manager.ensure_authenticated().await.map(|_| ()) {
        Err(AuthError::VerificationFailed { message }) => {
            assert!(message.contains("Incorrect login information."));
        }
        other => panic!("expected verification failure, got {:?}", other),
    }
    assert!(!manager.session().is_authenticated());
    assert!(!SessionStore::in_dir(dir.path()).exists());
}

#[tokio::test]
async fn test_logout_clears_store_and_session() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_profile(&server, "c_userkey=key-1", LOGGED_IN).await;
    mount_anonymous_profile(&server).await;

    let credentials = Credentials::CookieReplay {
        user_id: "1001".to_string(),
        user_key: "key-1".to_string(),
    };
    let client = client_for(&server, &dir, Some(credentials)).await;
    let auth = client.auth();
    let mut manager = auth.lock().await;
    manager.ensure_authenticated().await.unwrap();
    assert!(SessionStore::in_dir(dir.path()).exists());

    assert!(manager.logout().await.unwrap());
    assert!(!manager.session().is_authenticated());
    assert!(client.jar().is_empty());
    assert!(!SessionStore::in_dir(dir.path()).exists());
}

#[tokio::test]
async fn test_persist_saves_cookies_rotated_after_login() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_profile(&server, "c_userkey=key-1", LOGGED_IN).await;
    mount_anonymous_profile(&server).await;
    Mock::given(method("GET"))
        .and(path("/sample-show"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "sess_id=rotated-7; Path=/")
                .set_body_string("<html></html>"),
        )
        .mount(&server)
        .await;

    let credentials = Credentials::CookieReplay {
        user_id: "1001".to_string(),
        user_key: "key-1".to_string(),
    };
    let client = client_for(&server, &dir, Some(credentials)).await;
    let auth = client.auth();
    let mut manager = auth.lock().await;

    // nothing to save before the session is known to be good
    assert!(!manager.persist().await.unwrap());
    manager.ensure_authenticated().await.unwrap();

    let page = client.endpoints().base_url.join("/sample-show").unwrap();
    client.transport().get(&page).await.unwrap();

    let before = SessionStore::in_dir(dir.path()).load().await.unwrap();
    assert!(!before.cookies.iter().any(|c| c.raw.contains("rotated-7")));

    assert!(manager.persist().await.unwrap());
    let after = SessionStore::in_dir(dir.path()).load().await.unwrap();
    assert!(after.cookies.iter().any(|c| c.raw.contains("rotated-7")));
    assert!(after.cookies.iter().any(|c| c.raw.starts_with("c_userkey=key-1")));
}
