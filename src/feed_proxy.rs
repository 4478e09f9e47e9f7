use std::collections::HashMap;
use std::sync::OnceLock;

use actix_web::HttpResponse;
use regex::Regex;

use crate::config::*;
use crate::core::errors::ApiError;
use crate::core::helpers::ok_json;
use crate::core::query_params::get_string;
use crate::AppState;

fn subreddit_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_]+$").expect("Regex should compile"))
}

pub fn valid_subreddit(name: &str) -> bool {
    subreddit_regex().is_match(name)
}

pub fn build_client(config: &crate::config::Config) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(FEED_USER_AGENT)
        .timeout(config.feed_timeout)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build feed client: {}", e))
}

/// Relays `/r/{subreddit}/new.json` from the upstream feed.
pub async fn reddit_posts(state: &AppState, params: &HashMap<String, String>) -> Result<HttpResponse, ApiError> {
    let subreddit = get_string(params, "subreddit", Some(DEFAULT_SUBREDDIT)).unwrap_or_default();
    if !valid_subreddit(&subreddit) {
        return Err(ApiError::bad_request("Invalid subreddit name"));
    }
    let after = get_string(params, "after", None).unwrap_or_default();

    let url = format!("{}/r/{}/new.json", state.config.feed_base_url, subreddit);
    let response = state
        .http
        .get(&url)
        .query(&[("after", after.as_str())])
        .send()
        .await
        .map_err(|e| {
            tracing::error!(error = %e, url = %url, "feed request failed");
            ApiError::BadGateway("Error fetching Reddit posts".to_string())
        })?;

    let status = response.status();
    if !status.is_success() {
        tracing::warn!(status = %status, subreddit = %subreddit, "feed returned an error status");
        return Err(ApiError::BadGateway(format!("Reddit API returned status: {}", status.as_u16())));
    }

    let body: serde_json::Value = response.json().await.map_err(|e| {
        tracing::error!(error = %e, "feed returned invalid JSON");
        ApiError::BadGateway("Reddit API returned invalid JSON".to_string())
    })?;

    Ok(ok_json(body))
}
