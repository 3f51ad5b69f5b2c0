//! End-to-end authorization flow tests against a mocked provider.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ledgerlink_auth::{AccessTokenPair, RequestToken};
use ledgerlink_config::{AppConfig, AppType, ProviderCredentials, ProviderEndpoints};
use ledgerlink_server::{AppState, app};

fn test_config(provider_base: &str) -> Arc<AppConfig> {
    Arc::new(AppConfig {
        app_type: AppType::Public,
        public: Some(ProviderCredentials {
            consumer_key: "ck".to_string(),
            consumer_secret: "cs".to_string(),
            authorize_callback_url: "http://localhost:3100/access".to_string(),
            user_agent: "LedgerLink-tests".to_string(),
            private_key_path: None,
            private_key: String::new(),
        }),
        partner: None,
        endpoints: ProviderEndpoints {
            request_token_url: format!("{provider_base}/oauth/RequestToken"),
            authorize_url: format!("{provider_base}/oauth/Authorize"),
            access_token_url: format!("{provider_base}/oauth/AccessToken"),
            api_base_url: format!("{provider_base}/api/2.0"),
        },
        ..AppConfig::default()
    })
}

fn state_for(server: &MockServer) -> AppState {
    AppState::new(test_config(&server.uri())).expect("state should build")
}

fn get(path_and_query: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(path_and_query);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).expect("request")
}

fn session_id_from(response: &axum::response::Response) -> Uuid {
    let raw = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("session cookie should be set")
        .to_str()
        .expect("cookie is ascii");
    let value = raw
        .split(';')
        .next()
        .and_then(|pair| pair.strip_prefix("ledgerlink_session="))
        .expect("cookie name");
    Uuid::parse_str(value).expect("cookie carries a uuid")
}

fn location(response: &axum::response::Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .expect("redirect location")
        .to_str()
        .expect("location is ascii")
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    String::from_utf8(bytes.to_vec()).expect("utf8 body")
}

fn cookie_for(id: Uuid) -> String {
    format!("ledgerlink_session={id}")
}

async fn mock_request_token(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path("/oauth/RequestToken"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            "oauth_token={token}&oauth_token_secret=SEC&oauth_callback_confirmed=true"
        )))
        .mount(server)
        .await;
}

#[tokio::test]
async fn protected_page_without_token_starts_authorization() {
    let server = MockServer::start().await;
    mock_request_token(&server, "ABC").await;

    let state = state_for(&server);
    let response = app(state.clone())
        .oneshot(get("/organisations", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let target = location(&response);
    assert!(target.starts_with(&format!("{}/oauth/Authorize", server.uri())));
    assert!(target.contains("oauth_token=ABC"));

    let id = session_id_from(&response);
    let session = state.sessions.get(id).await.unwrap().unwrap();
    assert!(!session.is_authenticated());
    assert!(session.match_pending("ABC").is_ok());
    assert_eq!(session.return_to.as_deref(), Some("/organisations"));
}

#[tokio::test]
async fn matching_callback_exchanges_and_returns_to_intended_page() {
    let server = MockServer::start().await;
    mock_request_token(&server, "ABC").await;
    Mock::given(method("POST"))
        .and(path("/oauth/AccessToken"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("oauth_token=ACCESS&oauth_token_secret=ASEC"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let state = state_for(&server);
    let first = app(state.clone())
        .oneshot(get("/organisations", None))
        .await
        .unwrap();
    let id = session_id_from(&first);

    let callback = app(state.clone())
        .oneshot(get(
            "/access?oauth_token=ABC&oauth_verifier=XYZ",
            Some(&cookie_for(id)),
        ))
        .await
        .unwrap();

    assert_eq!(callback.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&callback), "/organisations");

    let session = state.sessions.get(id).await.unwrap().unwrap();
    assert_eq!(session.access_token().unwrap().token, "ACCESS");
    // The redirect hint was consumed.
    assert_eq!(session.return_to, None);
}

#[tokio::test]
async fn mismatched_callback_token_never_reaches_the_provider() {
    let server = MockServer::start().await;
    mock_request_token(&server, "ABC").await;
    Mock::given(method("POST"))
        .and(path("/oauth/AccessToken"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let state = state_for(&server);
    let first = app(state.clone())
        .oneshot(get("/organisations", None))
        .await
        .unwrap();
    let id = session_id_from(&first);

    let callback = app(state.clone())
        .oneshot(get(
            "/access?oauth_token=DEF&oauth_verifier=XYZ",
            Some(&cookie_for(id)),
        ))
        .await
        .unwrap();

    assert_eq!(callback.status(), StatusCode::SEE_OTHER);
    assert!(location(&callback).starts_with("/error?"));

    // The original pending authorization is untouched.
    let session = state.sessions.get(id).await.unwrap().unwrap();
    assert!(session.match_pending("ABC").is_ok());
    assert!(!session.is_authenticated());
}

#[tokio::test]
async fn missing_verifier_renders_home_without_mutating_the_session() {
    let server = MockServer::start().await;
    mock_request_token(&server, "ABC").await;

    let state = state_for(&server);
    let first = app(state.clone())
        .oneshot(get("/organisations", None))
        .await
        .unwrap();
    let id = session_id_from(&first);

    let callback = app(state.clone())
        .oneshot(get("/access?oauth_token=ABC", Some(&cookie_for(id))))
        .await
        .unwrap();

    assert_eq!(callback.status(), StatusCode::OK);
    let html = body_string(callback).await;
    assert!(html.contains("no verifier"));

    let session = state.sessions.get(id).await.unwrap().unwrap();
    assert!(session.match_pending("ABC").is_ok());
}

#[tokio::test]
async fn rejected_access_token_triggers_reauthorization_to_same_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/2.0/Contacts"))
        .respond_with(ResponseTemplate::new(401).set_body_string(
            "oauth_problem=token_rejected&oauth_problem_advice=Token+no+longer+valid",
        ))
        .mount(&server)
        .await;
    mock_request_token(&server, "FRESH").await;

    let state = state_for(&server);
    let session = state.sessions.create().await.unwrap();
    state
        .sessions
        .begin_authorization(
            session.id,
            RequestToken {
                token: "OLD".to_string(),
                secret: "s".to_string(),
            },
            "/",
        )
        .await
        .unwrap();
    state
        .sessions
        .complete_authorization(
            session.id,
            "OLD",
            AccessTokenPair {
                token: "STALE".to_string(),
                secret: "ss".to_string(),
            },
        )
        .await
        .unwrap();

    let response = app(state.clone())
        .oneshot(get("/contacts", Some(&cookie_for(session.id))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let target = location(&response);
    assert!(target.contains("oauth_token=FRESH"));

    // Access token gone, a new authorization is pending for the same page.
    let session = state.sessions.get(session.id).await.unwrap().unwrap();
    assert!(!session.is_authenticated());
    assert!(session.match_pending("FRESH").is_ok());
    assert_eq!(session.return_to.as_deref(), Some("/contacts"));
}

#[tokio::test]
async fn authenticated_session_renders_the_collection() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/2.0/Organisations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "Organisations": [{"Name": "Demo Company", "CountryCode": "NZ"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let state = state_for(&server);
    let session = state.sessions.create().await.unwrap();
    state
        .sessions
        .begin_authorization(
            session.id,
            RequestToken {
                token: "ABC".to_string(),
                secret: "s".to_string(),
            },
            "/organisations",
        )
        .await
        .unwrap();
    state
        .sessions
        .complete_authorization(
            session.id,
            "ABC",
            AccessTokenPair {
                token: "ACCESS".to_string(),
                secret: "ASEC".to_string(),
            },
        )
        .await
        .unwrap();

    let response = app(state.clone())
        .oneshot(get("/organisations", Some(&cookie_for(session.id))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_string(response).await;
    assert!(html.contains("Demo Company"));
    assert!(html.contains("NZ"));
}

#[tokio::test]
async fn report_selector_out_of_range_renders_home_with_message() {
    let server = MockServer::start().await;
    let state = state_for(&server);

    let response = app(state)
        .oneshot(get("/reports?r=42", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_string(response).await;
    assert!(html.contains("Report not found"));
}

#[tokio::test]
async fn bank_statement_report_resolves_the_first_bank_account() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/2.0/Accounts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "Accounts": [
                {"AccountID": "acc-1", "Type": "REVENUE"},
                {"AccountID": "acc-2", "Type": "BANK"}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/2.0/Reports/BankStatement"))
        .and(query_param("bankAccountID", "acc-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "Reports": [{
                "ReportName": "Bank Statement",
                "Rows": [{"Cells": [{"Value": "Opening Balance"}, {"Value": "42.00"}]}]
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let state = state_for(&server);
    let session = state.sessions.create().await.unwrap();
    state
        .sessions
        .begin_authorization(
            session.id,
            RequestToken {
                token: "ABC".to_string(),
                secret: "s".to_string(),
            },
            "/",
        )
        .await
        .unwrap();
    state
        .sessions
        .complete_authorization(
            session.id,
            "ABC",
            AccessTokenPair {
                token: "ACCESS".to_string(),
                secret: "ASEC".to_string(),
            },
        )
        .await
        .unwrap();

    let response = app(state)
        .oneshot(get("/reports?r=4", Some(&cookie_for(session.id))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_string(response).await;
    assert!(html.contains("Bank Statement"));
    assert!(html.contains("42.00"));
}
