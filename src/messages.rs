use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use actix_web::{HttpRequest, HttpResponse};
use ammonia::Builder;
use html_escape::{decode_html_entities, encode_double_quoted_attribute};
use regex::Regex;
use serde::Deserialize;
use serde_json::json;

use crate::auth::require_user;
use crate::config::*;
use crate::core::db::Collection;
use crate::core::errors::ApiError;
use crate::core::helpers::{created_json, new_id, now_iso, ok_json, parse_body, required};
use crate::core::query_params::{get_page, get_string};
use crate::models::models::{Comment, Message, Share};
use crate::AppState;

#[derive(Deserialize)]
struct NewMessage {
    message: Option<String>,
}

#[derive(Deserialize)]
struct MessageEdit {
    id: Option<String>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct CommentBody {
    content: Option<String>,
}

/// The per-user sets embedded in a message.
#[derive(Debug, Clone, Copy)]
pub enum Reaction {
    Like,
    Bookmark,
}

impl Reaction {
    fn members(self, message: &mut Message) -> &mut Vec<String> {
        match self {
            Reaction::Like => &mut message.likes,
            Reaction::Bookmark => &mut message.bookmarks,
        }
    }

    fn field(self) -> &'static str {
        match self {
            Reaction::Like => "likes",
            Reaction::Bookmark => "bookmarks",
        }
    }

    fn label(self, add: bool) -> &'static str {
        match (self, add) {
            (Reaction::Like, true) => "Liked",
            (Reaction::Like, false) => "Unliked",
            (Reaction::Bookmark, true) => "Bookmarked",
            (Reaction::Bookmark, false) => "Unbookmarked",
        }
    }
}

fn url_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r#"https?://[^\s<>"']+"#).expect("Regex should compile")
    })
}

/// Reduces content to escaped plain text and turns bare URLs into links.
pub fn filter_message_content(content: &str) -> String {
    let clean = Builder::default()
        .tags(HashSet::new())
        .clean(content)
        .to_string();

    url_regex().replace_all(&clean, |caps: &regex::Captures| {
        let url = &caps[0];
        // The text is already entity-escaped; unescape before re-encoding the attribute.
        let raw = decode_html_entities(url);
        let escaped_url = encode_double_quoted_attribute(&raw);
        format!(r#"<a href="{}" target="_blank" rel="noopener noreferrer">{}</a>"#, escaped_url, url)
    }).to_string()
}

fn validate_text(text: &str, max: usize, what: &str) -> Result<String, ApiError> {
    let text = text.trim();
    if text.is_empty() || text.chars().count() > max {
        return Err(ApiError::bad_request(format!("{} must be 1-{} characters", what, max)));
    }
    Ok(filter_message_content(text))
}

fn find_message<'a>(messages: &'a mut [Message], id: &str) -> Result<&'a mut Message, ApiError> {
    messages
        .iter_mut()
        .find(|m| m.id == id)
        .ok_or_else(|| ApiError::not_found("Message not found"))
}

fn newest_first(mut messages: Vec<Message>) -> Vec<Message> {
    messages.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    messages
}

pub async fn create_message(state: &AppState, req: &HttpRequest, body: &[u8]) -> Result<HttpResponse, ApiError> {
    let user_id = require_user(state, req).await?;
    let input: NewMessage = parse_body(body)?;
    let text = validate_text(required(&input.message, "message")?, MAX_MESSAGE_LENGTH, "Message")?;

    let message = Message {
        id: new_id(),
        user_id,
        message: text,
        timestamp: now_iso(),
        updated_at: None,
        likes: Vec::new(),
        shares: Vec::new(),
        comments: Vec::new(),
        bookmarks: Vec::new(),
    };

    let message = state
        .store
        .update(Collection::Messages, |messages: &mut Vec<Message>| -> Result<_, ApiError> {
            messages.push(message.clone());
            Ok(message)
        })
        .await?;

    tracing::info!(message_id = %message.id, user_id = %message.user_id, "message posted");
    Ok(created_json(json!({ "message": "Message posted", "post": message })))
}

pub async fn list_messages(state: &AppState, params: &HashMap<String, String>) -> Result<HttpResponse, ApiError> {
    let messages: Vec<Message> = state.store.read(Collection::Messages).await?;
    let mut messages = newest_first(messages);

    if let Some(author) = get_string(params, "userId", None) {
        messages.retain(|m| m.user_id == author);
    }
    if let Some(page) = get_page(params, "page") {
        messages = match (page - 1).checked_mul(MESSAGES_PER_PAGE) {
            Some(offset) => messages.into_iter().skip(offset).take(MESSAGES_PER_PAGE).collect(),
            None => Vec::new(),
        };
    }

    Ok(ok_json(json!(messages)))
}

pub async fn get_message(state: &AppState, id: &str) -> Result<HttpResponse, ApiError> {
    let mut messages: Vec<Message> = state.store.read(Collection::Messages).await?;
    let message = find_message(&mut messages, id)?;
    Ok(ok_json(json!(message)))
}

pub async fn my_posts(state: &AppState, req: &HttpRequest) -> Result<HttpResponse, ApiError> {
    let user_id = require_user(state, req).await?;
    let messages: Vec<Message> = state.store.read(Collection::Messages).await?;
    let mine: Vec<Message> = newest_first(messages)
        .into_iter()
        .filter(|m| m.user_id == user_id)
        .collect();
    Ok(ok_json(json!(mine)))
}

pub async fn list_bookmarks(state: &AppState, req: &HttpRequest) -> Result<HttpResponse, ApiError> {
    let user_id = require_user(state, req).await?;
    let messages: Vec<Message> = state.store.read(Collection::Messages).await?;
    let saved: Vec<Message> = newest_first(messages)
        .into_iter()
        .filter(|m| m.bookmarks.contains(&user_id))
        .collect();
    Ok(ok_json(json!(saved)))
}

pub async fn update_message(state: &AppState, req: &HttpRequest, body: &[u8]) -> Result<HttpResponse, ApiError> {
    let user_id = require_user(state, req).await?;
    let input: MessageEdit = parse_body(body)?;
    let id = required(&input.id, "id")?;
    let text = validate_text(required(&input.message, "message")?, MAX_MESSAGE_LENGTH, "Message")?;

    let message = state
        .store
        .update(Collection::Messages, |messages: &mut Vec<Message>| -> Result<_, ApiError> {
            let message = find_message(messages, id)?;
            if message.user_id != user_id {
                return Err(ApiError::Forbidden);
            }
            if message.message != text {
                message.message = text;
                message.updated_at = Some(now_iso());
            }
            Ok(message.clone())
        })
        .await?;

    Ok(ok_json(json!({ "message": "Message updated", "post": message })))
}

pub async fn delete_message(state: &AppState, req: &HttpRequest, id: Option<&str>) -> Result<HttpResponse, ApiError> {
    let user_id = require_user(state, req).await?;
    let id = id.map(str::trim).filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing required field: id"))?;

    state
        .store
        .update(Collection::Messages, |messages: &mut Vec<Message>| -> Result<_, ApiError> {
            let message = find_message(messages, id)?;
            if message.user_id != user_id {
                return Err(ApiError::Forbidden);
            }
            messages.retain(|m| m.id != id);
            Ok(())
        })
        .await?;

    tracing::info!(message_id = %id, "message deleted");
    Ok(ok_json(json!({ "message": "Message deleted" })))
}

/// Adds or removes the acting user from a like/bookmark set. Adding twice
/// is a no-op.
pub async fn set_reaction(
    state: &AppState,
    req: &HttpRequest,
    id: &str,
    reaction: Reaction,
    add: bool,
) -> Result<HttpResponse, ApiError> {
    let user_id = require_user(state, req).await?;

    let members = state
        .store
        .update(Collection::Messages, |messages: &mut Vec<Message>| -> Result<_, ApiError> {
            let message = find_message(messages, id)?;
            let members = reaction.members(message);
            if add {
                if !members.contains(&user_id) {
                    members.push(user_id.clone());
                }
            } else {
                members.retain(|u| u != &user_id);
            }
            Ok(members.clone())
        })
        .await?;

    let mut body = serde_json::Map::new();
    body.insert("message".into(), json!(reaction.label(add)));
    body.insert(reaction.field().into(), json!(members));
    Ok(ok_json(serde_json::Value::Object(body)))
}

pub async fn share_message(state: &AppState, req: &HttpRequest, id: &str) -> Result<HttpResponse, ApiError> {
    let user_id = require_user(state, req).await?;

    let shares = state
        .store
        .update(Collection::Messages, |messages: &mut Vec<Message>| -> Result<_, ApiError> {
            let message = find_message(messages, id)?;
            message.shares.push(Share { user_id, timestamp: now_iso() });
            Ok(message.shares.clone())
        })
        .await?;

    Ok(ok_json(json!({ "message": "Shared", "shares": shares })))
}

pub async fn add_comment(state: &AppState, req: &HttpRequest, id: &str, body: &[u8]) -> Result<HttpResponse, ApiError> {
    let user_id = require_user(state, req).await?;
    let input: CommentBody = parse_body(body)?;
    let content = validate_text(required(&input.content, "content")?, MAX_COMMENT_LENGTH, "Comment")?;

    let comment = Comment {
        id: new_id(),
        user_id,
        content,
        timestamp: now_iso(),
        updated_at: None,
    };

    let comment = state
        .store
        .update(Collection::Messages, |messages: &mut Vec<Message>| -> Result<_, ApiError> {
            let message = find_message(messages, id)?;
            message.comments.push(comment.clone());
            Ok(comment)
        })
        .await?;

    Ok(created_json(json!({ "message": "Commented", "comment": comment })))
}

pub async fn update_comment(
    state: &AppState,
    req: &HttpRequest,
    id: &str,
    comment_id: &str,
    body: &[u8],
) -> Result<HttpResponse, ApiError> {
    let user_id = require_user(state, req).await?;
    let input: CommentBody = parse_body(body)?;
    let content = validate_text(required(&input.content, "content")?, MAX_COMMENT_LENGTH, "Comment")?;

    let comment = state
        .store
        .update(Collection::Messages, |messages: &mut Vec<Message>| -> Result<_, ApiError> {
            let message = find_message(messages, id)?;
            let comment = message
                .comments
                .iter_mut()
                .find(|c| c.id == comment_id)
                .ok_or_else(|| ApiError::not_found("Comment not found"))?;
            if comment.user_id != user_id {
                return Err(ApiError::Forbidden);
            }
            comment.content = content;
            comment.updated_at = Some(now_iso());
            Ok(comment.clone())
        })
        .await?;

    Ok(ok_json(json!({ "message": "Comment updated", "comment": comment })))
}

pub async fn delete_comment(
    state: &AppState,
    req: &HttpRequest,
    id: &str,
    comment_id: &str,
) -> Result<HttpResponse, ApiError> {
    let user_id = require_user(state, req).await?;

    state
        .store
        .update(Collection::Messages, |messages: &mut Vec<Message>| -> Result<_, ApiError> {
            let message = find_message(messages, id)?;
            let comment = message
                .comments
                .iter()
                .find(|c| c.id == comment_id)
                .ok_or_else(|| ApiError::not_found("Comment not found"))?;
            if comment.user_id != user_id {
                return Err(ApiError::Forbidden);
            }
            message.comments.retain(|c| c.id != comment_id);
            Ok(())
        })
        .await?;

    Ok(ok_json(json!({ "message": "Comment deleted" })))
}
