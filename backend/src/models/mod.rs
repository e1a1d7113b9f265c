pub mod actor;
pub mod attachment;
pub mod booking;
pub mod common;
