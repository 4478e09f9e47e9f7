use std::collections::HashMap;

use actix_web::{HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::auth::require_user;
use crate::core::db::Collection;
use crate::core::errors::ApiError;
use crate::core::helpers::{created_json, new_id, now_iso, ok_json, parse_body, required};
use crate::core::query_params::get_string;
use crate::models::models::{FriendRequest, FriendRequestStatus, User};
use crate::users::build_user_json;
use crate::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewFriendRequest {
    friend_id: Option<String>,
}

#[derive(Deserialize)]
struct StatusUpdate {
    status: Option<String>,
}

fn find_request<'a>(requests: &'a mut [FriendRequest], id: &str) -> Result<&'a mut FriendRequest, ApiError> {
    requests
        .iter_mut()
        .find(|r| r.id == id)
        .ok_or_else(|| ApiError::not_found("Friend request not found"))
}

/// Ids of everyone with an accepted request to or from `user_id`.
pub fn friend_ids(requests: &[FriendRequest], user_id: &str) -> Vec<String> {
    let mut ids: Vec<String> = requests
        .iter()
        .filter(|r| r.status == FriendRequestStatus::Accepted && r.involves(user_id))
        .map(|r| if r.user_id == user_id { r.friend_id.clone() } else { r.user_id.clone() })
        .collect();
    ids.sort();
    ids.dedup();
    ids
}

pub async fn send_request(state: &AppState, req: &HttpRequest, body: &[u8]) -> Result<HttpResponse, ApiError> {
    let user_id = require_user(state, req).await?;
    let input: NewFriendRequest = parse_body(body)?;
    let friend_id = required(&input.friend_id, "friendId")?.to_string();

    if friend_id == user_id {
        return Err(ApiError::bad_request("Cannot send a friend request to yourself"));
    }
    let users: Vec<User> = state.store.read(Collection::Users).await?;
    if !users.iter().any(|u| u.id == friend_id) {
        return Err(ApiError::not_found("User not found"));
    }

    let request = FriendRequest {
        id: new_id(),
        user_id,
        friend_id,
        status: FriendRequestStatus::Pending,
        created_at: now_iso(),
        updated_at: None,
    };

    let request = state
        .store
        .update(Collection::FriendRequests, |requests: &mut Vec<FriendRequest>| -> Result<_, ApiError> {
            // Rejected requests may be retried; open or accepted ones block.
            let open = requests.iter().any(|r| {
                r.connects(&request.user_id, &request.friend_id) && r.status != FriendRequestStatus::Rejected
            });
            if open {
                return Err(ApiError::conflict("Friend request already exists"));
            }
            requests.push(request.clone());
            Ok(request)
        })
        .await?;

    tracing::info!(request_id = %request.id, from = %request.user_id, to = %request.friend_id, "friend request sent");
    Ok(created_json(json!({ "message": "Friend request sent", "request": request })))
}

pub async fn list_requests(
    state: &AppState,
    req: &HttpRequest,
    params: &HashMap<String, String>,
) -> Result<HttpResponse, ApiError> {
    let user_id = require_user(state, req).await?;
    let status = match get_string(params, "status", None) {
        Some(s) => Some(FriendRequestStatus::parse(&s).ok_or_else(|| ApiError::bad_request("Invalid status"))?),
        None => None,
    };

    let requests: Vec<FriendRequest> = state.store.read(Collection::FriendRequests).await?;
    let mine: Vec<FriendRequest> = requests
        .into_iter()
        .filter(|r| r.involves(&user_id))
        .filter(|r| status.map_or(true, |s| r.status == s))
        .collect();

    Ok(ok_json(json!(mine)))
}

pub async fn update_request(
    state: &AppState,
    req: &HttpRequest,
    id: &str,
    body: &[u8],
) -> Result<HttpResponse, ApiError> {
    let user_id = require_user(state, req).await?;
    let input: StatusUpdate = parse_body(body)?;
    let status = FriendRequestStatus::parse(required(&input.status, "status")?)
        .ok_or_else(|| ApiError::bad_request("Status must be pending, accepted or rejected"))?;
    if status == FriendRequestStatus::Pending {
        return Err(ApiError::bad_request("A request can only be accepted or rejected"));
    }

    let request = state
        .store
        .update(Collection::FriendRequests, |requests: &mut Vec<FriendRequest>| -> Result<_, ApiError> {
            let request = find_request(requests, id)?;
            if !request.involves(&user_id) {
                return Err(ApiError::not_found("Friend request not found"));
            }
            // Only the recipient answers a request.
            if request.friend_id != user_id {
                return Err(ApiError::Forbidden);
            }
            if request.status != status {
                request.status = status;
                request.updated_at = Some(now_iso());
            }
            Ok(request.clone())
        })
        .await?;

    tracing::info!(request_id = %request.id, status = ?request.status, "friend request updated");
    Ok(ok_json(json!({ "message": "Friend request updated", "request": request })))
}

pub async fn delete_request(state: &AppState, req: &HttpRequest, id: &str) -> Result<HttpResponse, ApiError> {
    let user_id = require_user(state, req).await?;

    state
        .store
        .update(Collection::FriendRequests, |requests: &mut Vec<FriendRequest>| -> Result<_, ApiError> {
            let request = find_request(requests, id)?;
            if !request.involves(&user_id) {
                return Err(ApiError::not_found("Friend request not found"));
            }
            requests.retain(|r| r.id != id);
            Ok(())
        })
        .await?;

    Ok(ok_json(json!({ "message": "Friend request deleted" })))
}

pub async fn list_friends(state: &AppState, req: &HttpRequest) -> Result<HttpResponse, ApiError> {
    let user_id = require_user(state, req).await?;

    let requests: Vec<FriendRequest> = state.store.read(Collection::FriendRequests).await?;
    let ids = friend_ids(&requests, &user_id);
    let users: Vec<User> = state.store.read(Collection::Users).await?;
    // Friends whose accounts were deleted simply drop out.
    let friends: Vec<serde_json::Value> = users
        .iter()
        .filter(|u| ids.contains(&u.id))
        .map(build_user_json)
        .collect();

    Ok(ok_json(json!(friends)))
}
