//! HTTP surface: axum router, envelope types, and outcome mapping.

pub mod response;
pub mod server;
pub mod types;

pub use server::{AppState, router, start_server};
