// Core modules
pub mod api;
pub mod config;
pub mod execution;
pub mod gateway;
pub mod indicators;
pub mod models;
pub mod strategy;

// Re-export commonly used types
pub use api::{ApiError, BitvavoClient, BitvavoConfig, ExchangeApi};
pub use gateway::{ExchangeGateway, GatewayError, GatewaySettings};
pub use models::*;
pub use strategy::Strategy;
