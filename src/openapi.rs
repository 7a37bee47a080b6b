use utoipa::OpenApi;

use crate::{api, model, seed};

#[derive(OpenApi)]
#[openapi(
    paths(
        api::health,
        api::render_creative,
        api::download_asset,
        api::create_share_link,
        api::track_share_click,
        api::review_dealer_slip,
        api::set_default_slip,
        api::serve_file,
        api::seed_data,
    ),
    components(
        schemas(
            api::HealthResponse,
            api::RemoteDownload,
            api::ShareResponse,
            api::ReviewQuery,
            api::DefaultSlipRequest,
            model::RenderRequest,
            model::RenderedAsset,
            model::DealerSlip,
            model::Dealer,
            model::SlipSelection,
            model::SlipMode,
            model::QrType,
            seed::SeedSummary,
        )
    ),
    tags(
        (name = "brandslip", description = "BrandSlip render backend API")
    )
)]
pub struct ApiDoc;
