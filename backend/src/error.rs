use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use time::format_description::well_known::Rfc3339;

use crate::scheduling::SchedulingError;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error(transparent)]
    Scheduling(#[from] SchedulingError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::Validation(e) => {
                let messages: Vec<String> = e
                    .field_errors()
                    .into_iter()
                    .map(|(field, errors)| {
                        let msgs: Vec<&str> = errors
                            .iter()
                            .filter_map(|err| err.message.as_ref().map(|m| m.as_ref()))
                            .collect();
                        if msgs.is_empty() {
                            let codes: Vec<&str> =
                                errors.iter().map(|err| err.code.as_ref()).collect();
                            format!("{}: {}", field, codes.join(", "))
                        } else {
                            format!("{}: {}", field, msgs.join(", "))
                        }
                    })
                    .collect();
                (StatusCode::BAD_REQUEST, messages.join("; "))
            }
            AppError::Scheduling(e) => match e {
                SchedulingError::InvalidTimeInput(_)
                | SchedulingError::MissingParticipant
                | SchedulingError::TooManyDates(_)
                | SchedulingError::Invalid(_) => (StatusCode::BAD_REQUEST, e.to_string()),
                SchedulingError::Forbidden => (StatusCode::FORBIDDEN, e.to_string()),
                SchedulingError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
                SchedulingError::CapacityExceeded {
                    resource_id,
                    start,
                    end,
                    limit,
                } => {
                    // Window and limit go out structured for display.
                    return (
                        StatusCode::CONFLICT,
                        Json(json!({
                            "error": e.to_string(),
                            "resource_id": resource_id,
                            "limit": limit,
                            "start": start.format(&Rfc3339).unwrap_or_default(),
                            "end": end.format(&Rfc3339).unwrap_or_default(),
                        })),
                    )
                        .into_response();
                }
                SchedulingError::Unavailable(inner) => {
                    tracing::error!("Scheduling unavailable: {:?}", inner);
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "Scheduling is temporarily unavailable".into(),
                    )
                }
            },
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".into(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
