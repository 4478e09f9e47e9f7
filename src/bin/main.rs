use actix_web::{middleware::Logger, web, App, HttpServer};
use socialbee::config::Config;
use socialbee::handlers::configure;
use socialbee::AppState;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing(format: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "socialbee=info,actix_web=info".into());

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();
    init_tracing(&config.log_format);

    let addr = config.bind_addr();
    tracing::info!(data_dir = %config.data_dir.display(), "loading data");
    let state = web::Data::new(AppState::new(config).await?);

    tracing::info!("Server listening on http://{}:{}", addr.0, addr.1);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .configure(configure(state.clone()))
    })
    .bind(addr)?
    .run()
    .await?;

    Ok(())
}
