use super::Verification;
use crate::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;

const TAG: &str = "recharges";

#[derive(Debug, Deserialize, ToSchema)]
pub struct RechargeClaim {
    /// Raw SMS text received from the operator.
    pub sms: String,
    pub amount: Decimal,
    pub date: String,
    pub time: String,
}

#[utoipa::path(
    post,
    path = "/recharges/verify",
    request_body = RechargeClaim,
    responses(
        (status = StatusCode::OK, description = "Verification outcome", body = Verification),
    ),
    tag = TAG
)]
pub async fn verify_recharge(
    Extension(state): Extension<State>,
    Json(claim): Json<RechargeClaim>,
) -> Json<Verification> {
    Json(
        state
            .recharge
            .verify(&claim.sms, claim.amount, &claim.date, &claim.time),
    )
}
