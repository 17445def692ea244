//! Formula 1 season calendar.
//!
//! Pure race-selection, time-normalization and status rules live in
//! [`services`]; the background poller and the HTTP entity view both build on
//! them.

pub mod config;
pub mod errors;
pub mod routes;
pub mod services;
