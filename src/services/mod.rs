//! Business logic services layer

pub mod auth_service;
pub mod table_service;

pub use auth_service::AuthService;
pub use table_service::{GatewayError, GatewayOutput, TableService};
