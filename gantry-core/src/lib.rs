pub mod config;
pub mod error;
pub mod middleware;
pub mod normalize;
pub mod relations;
pub mod resource;
pub mod service;
pub mod settings;

pub use config::GantryConfig;
pub use error::{GantryError, Result};
pub use middleware::Middleware;
pub use resource::{Resource, ResourceStatus};
pub use service::Service;
