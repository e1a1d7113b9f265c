use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthUser,
    error::Result,
    models::{
        attachment::{AttachFilesRequest, Attachment},
        booking::{
            BookingDetail, BookingListItem, BookingsResponse, CreateBookingsRequest,
            UpdateBookingRequest,
        },
        common::RangeQuery,
    },
    store::BookingStore,
    AppState,
};

pub async fn create<S: BookingStore>(
    State(state): State<AppState<S>>,
    AuthUser(actor): AuthUser,
    Json(req): Json<CreateBookingsRequest>,
) -> Result<Json<BookingsResponse>> {
    req.validate()?;
    let resp = state.scheduling.create_bookings(&actor, req).await?;
    Ok(Json(resp))
}

pub async fn list<S: BookingStore>(
    State(state): State<AppState<S>>,
    AuthUser(actor): AuthUser,
    Query(q): Query<RangeQuery>,
) -> Result<Json<Vec<BookingListItem>>> {
    let items = state
        .scheduling
        .list_bookings_in_range(&actor, &q.from, &q.to)
        .await?;
    Ok(Json(items))
}

pub async fn get_one<S: BookingStore>(
    State(state): State<AppState<S>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingDetail>> {
    Ok(Json(state.scheduling.get_booking(&actor, id).await?))
}

pub async fn update<S: BookingStore>(
    State(state): State<AppState<S>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateBookingRequest>,
) -> Result<Json<BookingsResponse>> {
    req.validate()?;
    let resp = state.scheduling.update_booking(&actor, id, req).await?;
    Ok(Json(resp))
}

pub async fn delete<S: BookingStore>(
    State(state): State<AppState<S>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    state.scheduling.delete_booking(&actor, id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

pub async fn attach<S: BookingStore>(
    State(state): State<AppState<S>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<AttachFilesRequest>,
) -> Result<Json<Vec<Attachment>>> {
    req.validate()?;
    let attachments = state.scheduling.attach_files(&actor, id, req.files).await?;
    Ok(Json(attachments))
}

pub async fn remove_attachment<S: BookingStore>(
    State(state): State<AppState<S>>,
    AuthUser(actor): AuthUser,
    Path((id, attachment_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<serde_json::Value>> {
    state
        .scheduling
        .remove_attachment(&actor, id, attachment_id)
        .await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}
