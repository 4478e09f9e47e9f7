#![allow(dead_code)]

use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::StatusCode;
use actix_web::{test, web};
use serde_json::{json, Value};
use socialbee::config::Config;
use socialbee::AppState;
use tempfile::TempDir;

pub async fn setup() -> (TempDir, web::Data<AppState>) {
    setup_with(|_| {}).await
}

pub async fn setup_with(tweak: impl FnOnce(&mut Config)) -> (TempDir, web::Data<AppState>) {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = Config {
        data_dir: dir.path().to_path_buf(),
        ..Config::default()
    };
    tweak(&mut config);
    let state = AppState::new(config).await.expect("app state");
    (dir, web::Data::new(state))
}

macro_rules! app {
    ($state:expr) => {
        actix_web::test::init_service(
            actix_web::App::new().configure(socialbee::handlers::configure($state.clone())),
        )
        .await
    };
}

pub async fn send<S, R, B>(app: &S, req: R) -> (StatusCode, Value)
where
    S: Service<R, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let resp = test::call_service(app, req).await;
    let status = resp.status();
    let body = test::read_body(resp).await;
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).expect("JSON response body")
    };
    (status, value)
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token))
}

/// Registers `name` (`<name>@example.com`, password `pw-<name>`) and logs
/// in. Returns `(user_id, token)`.
pub async fn register_and_login<S, B>(app: &S, name: &str) -> (String, String)
where
    S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let email = format!("{}@example.com", name);
    let password = format!("pw-{}", name);

    let req = test::TestRequest::post()
        .uri("/register")
        .set_json(json!({ "name": name, "email": email, "password": password }))
        .to_request();
    let (status, body) = send(app, req).await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
    let user_id = body["user"]["id"].as_str().expect("user id").to_string();

    let req = test::TestRequest::post()
        .uri("/login")
        .set_json(json!({ "email": email, "password": password }))
        .to_request();
    let (status, body) = send(app, req).await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    let token = body["token"].as_str().expect("token").to_string();

    (user_id, token)
}

pub async fn post_message<S, B>(app: &S, token: &str, text: &str) -> String
where
    S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let req = test::TestRequest::post()
        .uri("/api/messages")
        .insert_header(bearer(token))
        .set_json(json!({ "message": text }))
        .to_request();
    let (status, body) = send(app, req).await;
    assert_eq!(status, StatusCode::CREATED, "post failed: {}", body);
    body["post"]["id"].as_str().expect("post id").to_string()
}
