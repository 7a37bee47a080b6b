use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use axum::{
    routing::{get, post, put},
    Router,
};
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use brandslip_backend::{api, apikey, assets, openapi, store, AppState};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let host = std::env::var("BACKEND_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("BACKEND_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8080);

    let data_dir = PathBuf::from(std::env::var("DATA_DIR").unwrap_or_else(|_| "app/data".into()));

    let api_keys_path = std::env::var("APIKEYS").ok();
    let api_keys = Arc::new(apikey::ApiKeys::load(api_keys_path.as_deref()));

    let store = Arc::new(
        store::MetadataStore::open(data_dir.join("meta")).expect("failed to open metadata store"),
    );
    let asset_store = Arc::new(assets::AssetStore::new(
        data_dir.join("uploads"),
        reqwest::Client::new(),
    ));

    let state = AppState {
        api_keys,
        store,
        assets: asset_store,
    };

    let openapi = openapi::ApiDoc::openapi();

    let app = Router::new()
        // Swagger UI + OpenAPI schema
        .merge(SwaggerUi::new("/docs").url("/openapi.json", openapi))
        // Rendering
        .route("/render", post(api::render_creative))
        .route("/download/{asset_id}", get(api::download_asset))
        .route("/share/{asset_id}", post(api::create_share_link))
        .route("/s/{token}", get(api::track_share_click))
        // Slip administration
        .route("/dealer-slips/{slip_id}/review", put(api::review_dealer_slip))
        .route("/dealers/{dealer_id}/default-slip", put(api::set_default_slip))
        // Files and housekeeping
        .route("/files/{folder}/{filename}", get(api::serve_file))
        .route("/seed", post(api::seed_data))
        .route("/health", get(api::health))
        .with_state(Arc::new(state));

    let addr: SocketAddr = format!("{host}:{port}").parse().expect("bind addr");
    info!("Starting brandslip-backend on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
