//! HTTP control surface
//!
//! Thin JSON endpoints over the engine: start campaigns, manage the
//! recipient store, read and replace configuration and poll progress.

pub mod routes;
pub mod server;

pub use routes::{create_router, ApiResponse, ErrorResponse};
pub use server::{http_mailers, AppState, MailServer, MailerFactory, ServerError};
