//! HTTP transport for the points backend

pub mod client;

pub use client::PointsClient;
