pub mod attributes;
pub mod capabilities;
pub mod cloud;
pub mod links;
pub mod provider;
pub mod service;
pub mod stack;
pub mod state;
pub mod vault;

pub use crate::domain::model::{BackendConfig, Resource};
pub use crate::domain::ports::InfrastructureBackend;
pub use crate::utils::error::Result;
