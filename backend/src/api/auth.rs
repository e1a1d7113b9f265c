use axum::Json;

use crate::{auth::AuthUser, error::Result, models::actor::Actor};

/// Echoes the resolved caller context, including the zone used for display.
pub async fn me(AuthUser(actor): AuthUser) -> Result<Json<Actor>> {
    Ok(Json(actor))
}
