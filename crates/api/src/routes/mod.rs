//! API route handlers

pub mod monitoring;
pub mod users;
