pub mod auth;
pub mod bookings;

use axum::{Router, routing::{get, post, delete}};

use crate::store::BookingStore;
use crate::AppState;

pub fn router<S: BookingStore>(state: AppState<S>) -> Router {
    Router::new()
        // Caller context
        .route("/api/auth/me", get(auth::me))
        // Bookings
        .route("/api/bookings", get(bookings::list::<S>).post(bookings::create::<S>))
        .route(
            "/api/bookings/:id",
            get(bookings::get_one::<S>)
                .put(bookings::update::<S>)
                .delete(bookings::delete::<S>),
        )
        // Attachments
        .route("/api/bookings/:id/attachments", post(bookings::attach::<S>))
        .route(
            "/api/bookings/:id/attachments/:attachment_id",
            delete(bookings::remove_attachment::<S>),
        )
        .with_state(state)
}
