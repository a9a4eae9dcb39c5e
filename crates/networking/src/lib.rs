//! Adreward Networking - HTTP client for the points backend

pub mod http;

pub use http::PointsClient;
