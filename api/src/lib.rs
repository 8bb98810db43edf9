use axum::routing::get;
use axum::{Extension, Router};
use group::GroupLifecycle;
use recharge::RechargeVerifier;
use std::future::ready;
use std::sync::Arc;
use store::Store;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_axum::{router::OpenApiRouter, routes};

pub mod config;
pub mod error;
pub mod group;
pub mod modem;
pub mod notification;
pub mod recharge;
pub mod slack;
pub mod store;
pub mod swap;

#[derive(Clone)]
pub struct State {
    pub groups: Arc<GroupLifecycle>,
    pub store: Arc<dyn Store>,
    pub recharge: Arc<RechargeVerifier>,
}

#[derive(OpenApi)]
#[openapi(info(title = "SimPulse API"))]
struct ApiDoc;

async fn health() -> &'static str {
    "OK"
}

/// Every route of the API plus `/health` and `/docs/openapi.json`.
pub fn app(state: State) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .routes(routes!(group::route::get_groups))
        .routes(routes!(group::route::get_group_stats))
        .routes(routes!(group::route::cleanup_groups))
        .routes(routes!(
            group::route::get_auto_create,
            group::route::set_auto_create
        ))
        .routes(routes!(group::route::get_groups_by_phone))
        .routes(routes!(
            group::route::get_group_by_id,
            group::route::retire_group
        ))
        .routes(routes!(group::route::rename_group))
        .routes(routes!(group::route::reassign_group))
        .routes(routes!(modem::route::assign_group))
        .routes(routes!(modem::route::sim_extracted))
        .routes(routes!(recharge::route::verify_recharge))
        .split_for_parts();

    let json_specification = api
        .to_pretty_json()
        .unwrap_or_else(|err| format!("{{\"error\":\"{err}\"}}"));

    router
        .route("/health", get(health))
        .layer(Extension(state))
        .route(
            "/docs/openapi.json",
            get(move || ready(json_specification.clone())),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
