//! Route handlers.

pub mod broadcast;
pub mod dashboard;
pub mod status;
