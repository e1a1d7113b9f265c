use time::OffsetDateTime;
use uuid::Uuid;

#[derive(thiserror::Error, Debug)]
pub enum SchedulingError {
    #[error("Invalid time input: {0}")]
    InvalidTimeInput(String),

    #[error("Resource {resource_id} already has {limit} concurrent sessions between {start} and {end}")]
    CapacityExceeded {
        resource_id: Uuid,
        start: OffsetDateTime,
        end: OffsetDateTime,
        limit: i32,
    },

    #[error("Counseling bookings require at least one participant")]
    MissingParticipant,

    #[error("At most 2 dates per request, got {0}")]
    TooManyDates(usize),

    #[error("Insufficient permissions")]
    Forbidden,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    Invalid(String),

    #[error("Scheduling unavailable: {0}")]
    Unavailable(#[source] anyhow::Error),
}

impl From<sqlx::Error> for SchedulingError {
    fn from(e: sqlx::Error) -> Self {
        tracing::error!("Booking store error: {:?}", e);
        SchedulingError::Unavailable(e.into())
    }
}

pub type Result<T> = std::result::Result<T, SchedulingError>;
