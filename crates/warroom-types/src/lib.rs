//! Shared domain types for the war room dashboard.

pub mod config;
pub mod dashboard;
pub mod events;
pub mod kpi;
pub mod snapshot;
pub mod status;

mod errors;

pub use errors::{GatewayError, GatewayErrorKind, Result, WarRoomError};
