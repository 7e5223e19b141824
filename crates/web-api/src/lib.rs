pub mod auth;
pub mod context;
pub mod error;
pub mod handlers;
pub mod server;
pub mod websocket;

pub use context::ApiContext;
pub use error::ApiError;
pub use server::ApiServer;
