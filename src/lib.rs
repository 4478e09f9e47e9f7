pub mod auth;
pub mod config;
pub mod feed_proxy;
pub mod friends;
pub mod handlers;
pub mod messages;
pub mod users;

pub mod models {
    pub mod models;
}

pub mod core {
    pub mod db;
    pub mod errors;
    pub mod helpers;
    pub mod query_params;
}

use crate::config::Config;
use crate::core::db::JsonStore;

/// Everything a request handler needs, shared across workers.
pub struct AppState {
    pub config: Config,
    pub store: JsonStore,
    pub http: reqwest::Client,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = JsonStore::open(&config.data_dir).await?;
        if config.seed_demo_data {
            crate::core::db::seed_demo_data(&store).await?;
        }
        let http = feed_proxy::build_client(&config)?;
        Ok(Self { config, store, http })
    }
}
