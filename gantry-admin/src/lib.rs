pub mod error;
pub mod handlers;
pub mod persist;
pub mod server;

pub use server::{AppState, build_router, serve};
