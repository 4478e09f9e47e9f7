use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use anyhow::Context;
use argon2::password_hash::SaltString;
use rand::rngs::OsRng;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::core::errors::ApiError;

pub fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn hash_password_blocking(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))
}

fn verify_password_blocking(password: &str, hash: &str) -> bool {
    use argon2::PasswordHash;

    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Hashes on the blocking pool so argon2 never stalls a server worker.
pub async fn hash_password(password: &str) -> anyhow::Result<String> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || hash_password_blocking(&password))
        .await
        .context("Password hashing task failed")?
}

pub async fn verify_password(password: &str, hash: &str) -> anyhow::Result<bool> {
    let password = password.to_owned();
    let hash = hash.to_owned();
    tokio::task::spawn_blocking(move || verify_password_blocking(&password, &hash))
        .await
        .context("Password verification task failed")
}

pub fn validate_uuid(id: &str) -> bool {
    Uuid::parse_str(id).is_ok()
}

/// Extracts the raw token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Parses a JSON request body. An empty body is treated as `{}`.
pub fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::from_slice(b"{}")?);
    }
    Ok(serde_json::from_slice(body)?)
}

/// Returns the trimmed value of a required text field or a 400.
pub fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str, ApiError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiError::bad_request(format!("Missing required field: {}", field))),
    }
}

pub fn json_response(status: StatusCode, value: serde_json::Value) -> HttpResponse {
    HttpResponse::build(status).json(value)
}

pub fn ok_json(value: serde_json::Value) -> HttpResponse {
    json_response(StatusCode::OK, value)
}

pub fn created_json(value: serde_json::Value) -> HttpResponse {
    json_response(StatusCode::CREATED, value)
}
