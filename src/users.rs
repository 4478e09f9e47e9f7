use actix_web::{HttpRequest, HttpResponse};
use ammonia::Builder;
use serde::Deserialize;
use serde_json::json;

use crate::auth::{require_user, revoke_user_tokens, rotate_tokens, validate_email, validate_name, validate_password};
use crate::config::*;
use crate::core::db::Collection;
use crate::core::errors::ApiError;
use crate::core::helpers::{hash_password, ok_json, parse_body, required, validate_uuid, verify_password};
use crate::models::models::User;
use crate::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileUpdate {
    name: Option<String>,
    email: Option<String>,
    bio: Option<String>,
    profile_picture: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasswordChange {
    current_password: Option<String>,
    new_password: Option<String>,
}

pub fn sanitize_text(text: &str) -> String {
    // Plain text only: ammonia with every tag disabled strips all HTML
    Builder::default()
        .tags(std::collections::HashSet::new())
        .clean(text)
        .to_string()
        .trim()
        .to_string()
}

pub fn build_user_json(user: &User) -> serde_json::Value {
    json!({
        "id": user.id,
        "name": user.name,
        "email": user.email,
        "bio": user.bio.as_deref().unwrap_or_default(),
        "profilePicture": user.profile_picture,
        "createdAt": user.created_at,
    })
}

async fn find_user(state: &AppState, user_id: &str) -> Result<User, ApiError> {
    let users: Vec<User> = state.store.read(Collection::Users).await?;
    users
        .into_iter()
        .find(|u| u.id == user_id)
        .ok_or_else(|| ApiError::not_found("User not found"))
}

pub async fn get_profile(state: &AppState, req: &HttpRequest) -> Result<HttpResponse, ApiError> {
    let user_id = require_user(state, req).await?;
    let user = find_user(state, &user_id).await?;
    Ok(ok_json(json!({ "user": build_user_json(&user) })))
}

pub async fn get_user_details(state: &AppState, user_id: &str) -> Result<HttpResponse, ApiError> {
    if !validate_uuid(user_id) {
        return Err(ApiError::bad_request("Invalid user id"));
    }
    let user = find_user(state, user_id).await?;
    Ok(ok_json(json!({ "user": build_user_json(&user) })))
}

pub async fn list_users(state: &AppState) -> Result<HttpResponse, ApiError> {
    let users: Vec<User> = state.store.read(Collection::Users).await?;
    let users: Vec<serde_json::Value> = users.iter().map(build_user_json).collect();
    Ok(ok_json(json!(users)))
}

pub async fn update_profile(state: &AppState, req: &HttpRequest, body: &[u8]) -> Result<HttpResponse, ApiError> {
    let user_id = require_user(state, req).await?;
    let input: ProfileUpdate = parse_body(body)?;

    let name = input.name.as_deref().map(validate_name).transpose()?;
    let email = match input.email.as_deref().map(str::trim) {
        Some(email) => {
            validate_email(email)?;
            Some(email.to_string())
        }
        None => None,
    };
    let bio = match input.bio.as_deref().map(sanitize_text) {
        Some(bio) if bio.chars().count() > MAX_BIO_LENGTH => {
            return Err(ApiError::bad_request(format!("Bio too long (max {} chars)", MAX_BIO_LENGTH)))
        }
        bio => bio,
    };
    let profile_picture = input.profile_picture.map(|p| p.trim().to_string());

    let user = state
        .store
        .update(Collection::Users, |users: &mut Vec<User>| -> Result<_, ApiError> {
            if let Some(email) = &email {
                if users.iter().any(|u| u.id != user_id && u.email.eq_ignore_ascii_case(email)) {
                    return Err(ApiError::conflict("Email already registered"));
                }
            }
            let user = users
                .iter_mut()
                .find(|u| u.id == user_id)
                .ok_or_else(|| ApiError::not_found("User not found"))?;

            if let Some(name) = name {
                user.name = name;
            }
            if let Some(email) = email {
                user.email = email;
            }
            if let Some(bio) = bio {
                user.bio = if bio.is_empty() { None } else { Some(bio) };
            }
            if let Some(picture) = profile_picture {
                user.profile_picture = if picture.is_empty() { None } else { Some(picture) };
            }
            Ok(user.clone())
        })
        .await?;

    tracing::info!(user_id = %user.id, "profile updated");
    Ok(ok_json(json!({
        "message": "Profile updated",
        "user": build_user_json(&user),
    })))
}

pub async fn change_password(state: &AppState, req: &HttpRequest, body: &[u8]) -> Result<HttpResponse, ApiError> {
    let user_id = require_user(state, req).await?;
    let input: PasswordChange = parse_body(body)?;

    let new_password = required(&input.new_password, "newPassword")?;
    validate_password(new_password)?;
    let current_password = required(&input.current_password, "currentPassword")?;

    // Argon2 runs outside the users lock; the swap below only lands if the
    // hash that was checked is still the stored one.
    let users: Vec<User> = state.store.read(Collection::Users).await?;
    let checked_hash = users
        .into_iter()
        .find(|u| u.id == user_id)
        .map(|u| u.password)
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    if !verify_password(current_password, &checked_hash).await? {
        return Err(ApiError::Unauthorized);
    }
    let new_hash = hash_password(new_password).await?;

    state
        .store
        .update(Collection::Users, |users: &mut Vec<User>| -> Result<_, ApiError> {
            let user = users
                .iter_mut()
                .find(|u| u.id == user_id)
                .ok_or_else(|| ApiError::not_found("User not found"))?;
            if user.password != checked_hash {
                return Err(ApiError::conflict("Password changed concurrently"));
            }
            user.password = new_hash;
            Ok(())
        })
        .await?;

    // Every older session dies with the old password.
    let token = rotate_tokens(state, &user_id).await?;

    tracing::info!(user_id = %user_id, "password changed");
    Ok(ok_json(json!({
        "message": "Password updated",
        "token": token,
    })))
}

pub async fn delete_profile(state: &AppState, req: &HttpRequest) -> Result<HttpResponse, ApiError> {
    let user_id = require_user(state, req).await?;

    state
        .store
        .update(Collection::Users, |users: &mut Vec<User>| -> Result<_, ApiError> {
            let before = users.len();
            users.retain(|u| u.id != user_id);
            if users.len() == before {
                return Err(ApiError::not_found("User not found"));
            }
            Ok(())
        })
        .await?;
    revoke_user_tokens(state, &user_id).await?;

    tracing::info!(user_id = %user_id, "user deleted");
    Ok(ok_json(json!({ "message": "User deleted" })))
}
