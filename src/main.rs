use compliance_notifier::{
    activity::HttpActivityGateway, auth::FileTokenStore, build_session, create_router, Config,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,compliance_notifier=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Gateway client with the persisted session token
    let tokens = Arc::new(FileTokenStore::new(
        config.token_store_path.clone(),
        config.token_store_key.clone(),
    ));
    let gateway = Arc::new(HttpActivityGateway::new(config.api_base_url.clone(), tokens)?);

    let addr = format!("{}:{}", config.host, config.port);
    let state = build_session(config, gateway, tokio::runtime::Handle::current());

    // Start polling right away when the session already knows its user
    if let Some(user_id) = state.config.poll_user_id.clone() {
        state.poller.start(state.config.poll_settings(user_id))?;
    }

    let app = create_router(state.clone());

    tracing::info!("Notification bridge listening on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Could not listen for shutdown signal: {:?}", e);
            }
        })
        .await?;

    state.shutdown();
    tracing::info!("Session closed");

    Ok(())
}
