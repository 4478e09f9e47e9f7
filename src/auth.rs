use actix_web::HttpRequest;
use serde::Deserialize;
use serde_json::json;

use crate::config::*;
use crate::core::db::Collection;
use crate::core::errors::ApiError;
use crate::core::helpers::{
    bearer_token, created_json, hash_password, new_id, now_iso, ok_json, parse_body,
    verify_password,
};
use crate::models::models::{TokenData, User};
use crate::users::{build_user_json, sanitize_text};
use crate::AppState;

#[derive(Deserialize)]
struct RegisterBody {
    name: Option<String>,
    email: Option<String>,
    password: Option<String>,
    bio: Option<String>,
}

#[derive(Deserialize)]
struct LoginBody {
    email: Option<String>,
    password: Option<String>,
}

pub fn validate_email(email: &str) -> Result<(), ApiError> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !email.contains(char::is_whitespace),
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(ApiError::bad_request("Invalid email address"))
    }
}

pub fn validate_name(name: &str) -> Result<String, ApiError> {
    let name = sanitize_text(name);
    if name.is_empty() || name.chars().count() > MAX_NAME_LENGTH {
        return Err(ApiError::bad_request(format!("Name must be 1-{} characters", MAX_NAME_LENGTH)));
    }
    Ok(name)
}

pub fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

pub async fn register_user(state: &AppState, body: &[u8]) -> Result<actix_web::HttpResponse, ApiError> {
    let input: RegisterBody = parse_body(body)?;
    let name = input.name.as_deref().map(str::trim).unwrap_or_default();
    let email = input.email.as_deref().map(str::trim).unwrap_or_default();
    let password = input.password.as_deref().unwrap_or_default();
    if name.is_empty() || email.is_empty() || password.is_empty() {
        return Err(ApiError::bad_request("Missing required fields"));
    }

    let name = validate_name(name)?;
    validate_email(email)?;
    validate_password(password)?;
    let bio = match input.bio.as_deref().map(sanitize_text) {
        Some(bio) if bio.chars().count() > MAX_BIO_LENGTH => {
            return Err(ApiError::bad_request(format!("Bio too long (max {} chars)", MAX_BIO_LENGTH)))
        }
        Some(bio) if !bio.is_empty() => Some(bio),
        _ => None,
    };

    let user = User {
        id: new_id(),
        name,
        email: email.to_string(),
        password: hash_password(password).await?,
        bio,
        profile_picture: None,
        created_at: now_iso(),
    };

    let user = state
        .store
        .update(Collection::Users, |users: &mut Vec<User>| -> Result<_, ApiError> {
            if users.iter().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
                return Err(ApiError::conflict("Email already registered"));
            }
            users.push(user.clone());
            Ok(user)
        })
        .await?;

    tracing::info!(user_id = %user.id, "user registered");
    Ok(created_json(json!({
        "message": "User registered",
        "user": build_user_json(&user),
    })))
}

pub async fn login_user(state: &AppState, body: &[u8]) -> Result<actix_web::HttpResponse, ApiError> {
    let creds: LoginBody = parse_body(body)?;
    let email = creds.email.as_deref().unwrap_or_default().trim();
    let password = creds.password.as_deref().unwrap_or_default();

    let users: Vec<User> = state.store.read(Collection::Users).await?;
    let mut user = None;
    for candidate in users.into_iter().filter(|u| u.email.eq_ignore_ascii_case(email)) {
        if verify_password(password, &candidate.password).await? {
            user = Some(candidate);
            break;
        }
    }

    let Some(user) = user else {
        tracing::warn!("login rejected");
        return Err(ApiError::Unauthorized);
    };

    let token = new_id();
    let data = TokenData {
        token: token.clone(),
        user_id: user.id.clone(),
        created_at: now_iso(),
    };
    let expiration_hours = state.config.token_expiration_hours;
    state
        .store
        .update(Collection::Tokens, |tokens: &mut Vec<TokenData>| -> Result<_, ApiError> {
            tokens.retain(|t| !is_expired(t, expiration_hours));
            tokens.push(data);
            Ok(())
        })
        .await?;

    tracing::info!(user_id = %user.id, "login successful");
    Ok(ok_json(json!({
        "message": "Login successful",
        "user": build_user_json(&user),
        "token": token,
    })))
}

pub async fn logout_user(state: &AppState, req: &HttpRequest) -> Result<actix_web::HttpResponse, ApiError> {
    let token = bearer_token(req).ok_or(ApiError::Unauthorized)?.to_string();

    let removed = state
        .store
        .update(Collection::Tokens, |tokens: &mut Vec<TokenData>| -> Result<_, ApiError> {
            let before = tokens.len();
            tokens.retain(|t| t.token != token);
            Ok(before != tokens.len())
        })
        .await?;
    if !removed {
        return Err(ApiError::Unauthorized);
    }

    Ok(ok_json(json!({ "message": "Logged out successfully" })))
}

/// Issues a fresh token for `user_id` after dropping every token it held.
pub async fn rotate_tokens(state: &AppState, user_id: &str) -> Result<String, ApiError> {
    let token = new_id();
    let data = TokenData {
        token: token.clone(),
        user_id: user_id.to_string(),
        created_at: now_iso(),
    };
    state
        .store
        .update(Collection::Tokens, |tokens: &mut Vec<TokenData>| -> Result<_, ApiError> {
            tokens.retain(|t| t.user_id != user_id);
            tokens.push(data);
            Ok(())
        })
        .await?;
    Ok(token)
}

pub async fn revoke_user_tokens(state: &AppState, user_id: &str) -> Result<(), ApiError> {
    state
        .store
        .update(Collection::Tokens, |tokens: &mut Vec<TokenData>| -> Result<_, ApiError> {
            tokens.retain(|t| t.user_id != user_id);
            Ok(())
        })
        .await
}

fn is_expired(data: &TokenData, expiration_hours: i64) -> bool {
    match chrono::DateTime::parse_from_rfc3339(&data.created_at) {
        Ok(created) => {
            let age_hours = (chrono::Utc::now() - created.with_timezone(&chrono::Utc)).num_hours();
            age_hours >= expiration_hours
        }
        Err(_) => true,
    }
}

/// Resolves the bearer token to a live user id.
pub async fn validate_token(state: &AppState, req: &HttpRequest) -> Result<Option<String>, ApiError> {
    let Some(token) = bearer_token(req) else {
        return Ok(None);
    };

    let tokens: Vec<TokenData> = state.store.read(Collection::Tokens).await?;
    let Some(data) = tokens.into_iter().find(|t| t.token == token) else {
        return Ok(None);
    };
    if is_expired(&data, state.config.token_expiration_hours) {
        return Ok(None);
    }

    // Tokens outlive deleted accounts until pruned.
    let users: Vec<User> = state.store.read(Collection::Users).await?;
    if !users.iter().any(|u| u.id == data.user_id) {
        return Ok(None);
    }
    Ok(Some(data.user_id))
}

pub async fn require_user(state: &AppState, req: &HttpRequest) -> Result<String, ApiError> {
    validate_token(state, req).await?.ok_or(ApiError::Unauthorized)
}
