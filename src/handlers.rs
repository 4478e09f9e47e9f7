use std::collections::HashMap;

use actix_web::{web, HttpRequest, HttpResponse, ResponseError};

use crate::core::errors::ApiError;
use crate::core::query_params::parse_query_params;
use crate::messages::Reaction;
use crate::{auth, feed_proxy, friends, messages, users, AppState};

/// Registers the shared state and the catch-all dispatcher.
pub fn configure(state: web::Data<AppState>) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg: &mut web::ServiceConfig| {
        cfg.app_data(state).default_service(web::route().to(handle_all));
    }
}

pub async fn handle_all(req: HttpRequest, body: web::Bytes, state: web::Data<AppState>) -> HttpResponse {
    let path = req.path().to_string();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let params = parse_query_params(req.query_string());

    match route(&state, &req, &body, &segments, &params).await {
        Ok(resp) => resp,
        Err(err) => {
            match &err {
                ApiError::Internal(cause) => {
                    tracing::error!(method = %req.method(), path = %path, error = ?cause, "request failed")
                }
                other => tracing::debug!(method = %req.method(), path = %path, error = %other, "request rejected"),
            }
            err.error_response()
        }
    }
}

async fn route(
    state: &AppState,
    req: &HttpRequest,
    body: &[u8],
    segments: &[&str],
    params: &HashMap<String, String>,
) -> Result<HttpResponse, ApiError> {
    match (req.method().as_str(), segments) {
        // Accounts
        ("POST", ["register"]) => auth::register_user(state, body).await,
        ("POST", ["login"]) => auth::login_user(state, body).await,
        ("POST", ["logout"]) => auth::logout_user(state, req).await,

        // Profile and users
        ("GET", ["api", "profile"]) => users::get_profile(state, req).await,
        ("DELETE", ["api", "profile"]) => users::delete_profile(state, req).await,
        ("POST", ["api", "profile", "update"]) => users::update_profile(state, req, body).await,
        ("POST", ["api", "profile", "password"]) => users::change_password(state, req, body).await,
        ("GET", ["api", "users"]) => users::list_users(state).await,
        ("GET", ["api", "users", id]) => users::get_user_details(state, id).await,

        // Messages
        ("POST", ["api", "messages"]) => messages::create_message(state, req, body).await,
        ("GET", ["api", "messages"]) => messages::list_messages(state, params).await,
        ("PUT", ["api", "messages"]) => messages::update_message(state, req, body).await,
        ("DELETE", ["api", "messages"]) => {
            messages::delete_message(state, req, params.get("id").map(String::as_str)).await
        }
        ("GET", ["api", "messages", id]) => messages::get_message(state, id).await,
        ("DELETE", ["api", "messages", id]) => messages::delete_message(state, req, Some(*id)).await,
        ("POST", ["api", "messages", id, "like"]) => {
            messages::set_reaction(state, req, id, Reaction::Like, true).await
        }
        ("POST", ["api", "messages", id, "unlike"]) => {
            messages::set_reaction(state, req, id, Reaction::Like, false).await
        }
        ("POST", ["api", "messages", id, "bookmark"]) => {
            messages::set_reaction(state, req, id, Reaction::Bookmark, true).await
        }
        ("POST", ["api", "messages", id, "unbookmark"]) => {
            messages::set_reaction(state, req, id, Reaction::Bookmark, false).await
        }
        ("POST", ["api", "messages", id, "share"]) => messages::share_message(state, req, id).await,
        ("POST", ["api", "messages", id, "comment"]) => messages::add_comment(state, req, id, body).await,
        ("PUT", ["api", "messages", id, "comment", comment_id]) => {
            messages::update_comment(state, req, id, comment_id, body).await
        }
        ("DELETE", ["api", "messages", id, "comment", comment_id]) => {
            messages::delete_comment(state, req, id, comment_id).await
        }
        ("GET", ["api", "bookmarks"]) => messages::list_bookmarks(state, req).await,
        ("GET", ["my-posts"]) => messages::my_posts(state, req).await,

        // Friends
        ("POST", ["api", "friend-requests"]) => friends::send_request(state, req, body).await,
        ("GET", ["api", "friend-requests"]) => friends::list_requests(state, req, params).await,
        ("PUT", ["api", "friend-requests", id]) => friends::update_request(state, req, id, body).await,
        ("DELETE", ["api", "friend-requests", id]) => friends::delete_request(state, req, id).await,
        ("GET", ["api", "friends"]) => friends::list_friends(state, req).await,

        // External feed
        ("GET", ["reddit-posts"]) => feed_proxy::reddit_posts(state, params).await,

        _ => Err(ApiError::not_found("No route found")),
    }
}
