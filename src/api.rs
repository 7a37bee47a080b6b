//! HTTP handlers.
//!
//! Authenticated routes take an `X-API-Key` header resolved against the key
//! registry; the resolved key name is recorded as the actor on analytics
//! events. Errors surface as `{"detail": ...}` bodies with the status the
//! failure class maps to.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::assets::{self, AssetStore};
use crate::model::{Event, EventKind, RenderRequest, ShareLink, SlipSelection};
use crate::render::{self, RenderError};
use crate::seed;
use crate::util;
use crate::AppState;

type ApiError = (StatusCode, Json<serde_json::Value>);
type ApiResult<T> = Result<T, ApiError>;

fn err(status: StatusCode, detail: impl Into<String>) -> ApiError {
    (status, Json(serde_json::json!({ "detail": detail.into() })))
}

fn internal(e: impl std::fmt::Display) -> ApiError {
    err(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

impl From<RenderError> for ApiError {
    fn from(e: RenderError) -> Self {
        let status = match &e {
            RenderError::Validation(_) => StatusCode::BAD_REQUEST,
            RenderError::NotFound(_) => StatusCode::NOT_FOUND,
            RenderError::UpstreamFetch(_) => StatusCode::BAD_GATEWAY,
            RenderError::Persistence(_) | RenderError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        err(status, e.to_string())
    }
}

fn extract_api_key(headers: &HeaderMap) -> Option<String> {
    headers
        .get("X-API-Key")
        .or_else(|| headers.get("x-api-key"))
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// Resolve the caller's API key to its display name.
fn verify_api_key(st: &AppState, headers: &HeaderMap) -> ApiResult<String> {
    let key = extract_api_key(headers).ok_or_else(|| {
        err(
            StatusCode::UNAUTHORIZED,
            "API key required. Please provide X-API-Key header",
        )
    })?;
    st.api_keys
        .name(&key)
        .ok_or_else(|| err(StatusCode::UNAUTHORIZED, "Invalid API key"))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

#[utoipa::path(get, path = "/health", tag = "brandslip", responses((status=200, body=HealthResponse)))]
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok".into() })
}

#[utoipa::path(
    post,
    path = "/render",
    tag = "brandslip",
    request_body = RenderRequest,
    params(("X-API-Key" = String, Header, description = "API key")),
    responses(
        (status=200, body=crate::model::RenderedAsset),
        (status=400, description="Invalid request"),
        (status=401, description="Unauthorized"),
        (status=404, description="Referenced entity not found"),
        (status=502, description="Source asset fetch failed")
    )
)]
pub async fn render_creative(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<RenderRequest>,
) -> ApiResult<impl IntoResponse> {
    let actor = verify_api_key(&st, &headers)?;
    let asset = render::render(&st.store, &st.assets, &req, Some(&actor)).await?;
    Ok(Json(asset))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RemoteDownload {
    pub download_url: String,
}

#[utoipa::path(
    get,
    path = "/download/{asset_id}",
    tag = "brandslip",
    params(
        ("asset_id" = String, Path, description = "Rendered asset id"),
        ("X-API-Key" = String, Header, description = "API key")
    ),
    responses(
        (status=200, description="PNG bytes, or a download_url for remote assets"),
        (status=401, description="Unauthorized"),
        (status=404, description="Asset not found")
    )
)]
pub async fn download_asset(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(asset_id): Path<String>,
) -> ApiResult<Response> {
    let actor = verify_api_key(&st, &headers)?;
    let asset = st
        .store
        .rendered_by_id(&asset_id)
        .ok_or_else(|| err(StatusCode::NOT_FOUND, "Asset not found"))?;

    // Resolve the bytes before recording anything: a failed read must not
    // leave a download event behind.
    let body = if AssetStore::is_local(&asset.output_url) {
        let bytes = st.assets.get(&asset.output_url).await.map_err(internal)?;
        let disposition = format!("attachment; filename=\"creative_{asset_id}.png\"");
        (
            [
                (header::CONTENT_TYPE, "image/png".to_string()),
                (header::CONTENT_DISPOSITION, disposition),
            ],
            bytes,
        )
            .into_response()
    } else {
        Json(RemoteDownload { download_url: asset.output_url.clone() }).into_response()
    };

    st.store
        .append_event(Event::new(
            EventKind::Download,
            &asset.brand_id,
            Some(&asset.dealer_id),
            Some(&actor),
            serde_json::json!({ "asset_id": asset.id }),
        ))
        .map_err(internal)?;

    Ok(body)
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ShareResponse {
    pub share_token: String,
    pub share_url: String,
}

#[utoipa::path(
    post,
    path = "/share/{asset_id}",
    tag = "brandslip",
    params(
        ("asset_id" = String, Path, description = "Rendered asset id"),
        ("X-API-Key" = String, Header, description = "API key")
    ),
    responses(
        (status=200, body=ShareResponse),
        (status=401, description="Unauthorized"),
        (status=404, description="Asset not found")
    )
)]
pub async fn create_share_link(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(asset_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let _ = verify_api_key(&st, &headers)?;
    let asset = st
        .store
        .rendered_by_id(&asset_id)
        .ok_or_else(|| err(StatusCode::NOT_FOUND, "Asset not found"))?;

    let token = util::url_safe_token();
    st.store
        .insert_share_link(ShareLink {
            id: util::new_id(),
            token: token.clone(),
            asset_id: asset.id,
            brand_id: asset.brand_id,
            dealer_id: asset.dealer_id,
            clicks: 0,
            created_at: util::now_iso(),
        })
        .map_err(internal)?;

    Ok(Json(ShareResponse {
        share_url: format!("/s/{token}"),
        share_token: token,
    }))
}

#[utoipa::path(
    get,
    path = "/s/{token}",
    tag = "brandslip",
    params(("token" = String, Path, description = "Share token")),
    responses(
        (status=200, body=RemoteDownload),
        (status=404, description="Share link or asset not found")
    )
)]
pub async fn track_share_click(
    State(st): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let link = st
        .store
        .record_share_click(&token)
        .map_err(internal)?
        .ok_or_else(|| err(StatusCode::NOT_FOUND, "Share link not found"))?;

    st.store
        .append_event(Event::new(
            EventKind::ShareClicked,
            &link.brand_id,
            Some(&link.dealer_id),
            None,
            serde_json::json!({ "share_token": token }),
        ))
        .map_err(internal)?;

    let asset = st
        .store
        .rendered_by_id(&link.asset_id)
        .ok_or_else(|| err(StatusCode::NOT_FOUND, "Asset not found"))?;
    Ok(Json(RemoteDownload { download_url: asset.output_url }))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReviewQuery {
    pub approve: bool,
}

#[utoipa::path(
    put,
    path = "/dealer-slips/{slip_id}/review",
    tag = "brandslip",
    params(
        ("slip_id" = String, Path, description = "Dealer slip id"),
        ("approve" = bool, Query, description = "Approve or reject"),
        ("X-API-Key" = String, Header, description = "API key")
    ),
    responses(
        (status=200, body=crate::model::DealerSlip),
        (status=401, description="Unauthorized"),
        (status=404, description="Dealer slip not found")
    )
)]
pub async fn review_dealer_slip(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(slip_id): Path<String>,
    Query(q): Query<ReviewQuery>,
) -> ApiResult<impl IntoResponse> {
    let actor = verify_api_key(&st, &headers)?;
    let slip = st
        .store
        .review_dealer_slip(&slip_id, q.approve, &actor)
        .map_err(internal)?
        .ok_or_else(|| err(StatusCode::NOT_FOUND, "Dealer slip not found"))?;
    Ok(Json(slip))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DefaultSlipRequest {
    pub brand_id: String,
    #[serde(flatten)]
    pub selection: SlipSelection,
}

#[utoipa::path(
    put,
    path = "/dealers/{dealer_id}/default-slip",
    tag = "brandslip",
    request_body = DefaultSlipRequest,
    params(
        ("dealer_id" = String, Path, description = "Dealer id"),
        ("X-API-Key" = String, Header, description = "API key")
    ),
    responses(
        (status=200, body=crate::model::Dealer),
        (status=401, description="Unauthorized"),
        (status=404, description="Dealer not found")
    )
)]
pub async fn set_default_slip(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(dealer_id): Path<String>,
    Json(req): Json<DefaultSlipRequest>,
) -> ApiResult<impl IntoResponse> {
    let _ = verify_api_key(&st, &headers)?;
    let dealer = st
        .store
        .set_default_slip(&dealer_id, &req.brand_id, req.selection)
        .map_err(internal)?
        .ok_or_else(|| err(StatusCode::NOT_FOUND, "Dealer not found"))?;
    Ok(Json(dealer))
}

#[utoipa::path(
    get,
    path = "/files/{folder}/{filename}",
    tag = "brandslip",
    params(
        ("folder" = String, Path, description = "Upload folder"),
        ("filename" = String, Path, description = "File name")
    ),
    responses(
        (status=200, description="File bytes"),
        (status=404, description="File not found")
    )
)]
pub async fn serve_file(
    State(st): State<Arc<AppState>>,
    Path((folder, filename)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let reference = format!("/files/{folder}/{filename}");
    let bytes = st
        .assets
        .get(&reference)
        .await
        .map_err(|_| err(StatusCode::NOT_FOUND, "File not found"))?;
    Ok((
        [(header::CONTENT_TYPE, assets::media_type_for(&filename))],
        bytes,
    ))
}

#[utoipa::path(
    post,
    path = "/seed",
    tag = "brandslip",
    responses((status=200, description="Seed summary, or a notice when already seeded"))
)]
pub async fn seed_data(State(st): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    match seed::seed(&st.store, &st.assets).await.map_err(internal)? {
        Some(summary) => Ok(Json(serde_json::json!({
            "message": "Seed data created",
            "brand_id": summary.brand_id,
            "dealer_ids": summary.dealer_ids,
            "variant_ids": summary.variant_ids,
            "template_ids": summary.template_ids,
        }))),
        None => Ok(Json(serde_json::json!({ "message": "Already seeded" }))),
    }
}
