//! Booking scheduler: time normalization, capacity checks, transactional
//! writes, and the request-level service that ties them together.

pub mod conflict;
pub mod error;
pub mod service;
pub mod timeline;
pub mod tx;
pub mod writer;

pub use conflict::{check_capacity, lock_timelines, Interval};
pub use error::{Result, SchedulingError};
pub use service::SchedulingService;
pub use tx::with_transaction;
pub use writer::{BookingWriter, WrittenBooking};
