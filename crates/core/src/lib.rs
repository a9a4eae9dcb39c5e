//! Adreward Core - Shared data models, types, errors, and the points API seam

pub mod api;
pub mod errors;
pub mod models;
pub mod types;

pub use api::PointsApi;
pub use errors::{Error, Result};
pub use models::*;
pub use types::*;
