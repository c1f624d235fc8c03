//! Anomaly detector HTTP service
//!
//! Loads an anomaly-detection model once at startup and serves
//! predictions over HTTP.

pub mod api;
pub mod config;
