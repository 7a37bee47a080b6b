pub mod api;
pub mod apikey;
pub mod assets;
pub mod compose;
pub mod fonts;
pub mod model;
pub mod openapi;
pub mod perf;
pub mod qr;
pub mod render;
pub mod seed;
pub mod store;
pub mod util;

use std::sync::Arc;

/// Shared handler state: key registry, metadata store, asset store.
/// The asset store owns the HTTP client used for remote fetches.
#[derive(Clone)]
pub struct AppState {
    pub api_keys: Arc<apikey::ApiKeys>,
    pub store: Arc<store::MetadataStore>,
    pub assets: Arc<assets::AssetStore>,
}
