//! Request middleware: sessions and authentication extractors.

pub mod auth;
pub mod session;

pub use auth::{RequireAuth, RequireStaff};
pub use session::create_session_layer;
