use refuel_backend::{AppState, config::AppConfig, create_router};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "refuel_backend=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env().expect("valid configuration");
    let state = AppState::from_config(&config).expect("build HTTP providers");
    tracing::info!(
        "POI provider {}, directions {}, detour concurrency {}",
        config.overpass_url,
        if state.augmenter.has_directions() {
            config.mapbox_profile.as_str()
        } else {
            "disabled"
        },
        state.augmenter.concurrency()
    );
    let app = create_router(state);

    let addr = config.bind_addr;
    tracing::info!("starting refuel server on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("bind listen address");
    axum::serve(listener, app).await.expect("server error");
}
