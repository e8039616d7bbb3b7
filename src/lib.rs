pub mod app;
pub mod config;
pub mod constants;
pub mod core;
pub mod domain;
pub mod providers;
pub mod utils;

pub use crate::app::{Provisioned, Provisioner, StageDeployment};
pub use crate::config::Configuration;
pub use crate::core::cloud::{Cloud, Prerequisites, ProvisioningReport};
pub use crate::core::service::{Scope, Service};
pub use crate::core::stack::Stack;
pub use crate::domain::model::Project;
pub use crate::utils::error::{Result, StackmateError};
pub use crate::utils::validation::ValidatorRegistry;
