use crate::constants::Provider;
use crate::domain::ports::InfrastructureBackend;
use crate::utils::error::Result;
use std::fmt;

/// The shared prerequisite that configures a cloud provider in a stack.
pub trait ProviderService: fmt::Debug {
    fn provider(&self) -> Provider;
    fn region(&self) -> &str;

    /// Named credentials profile the provider authenticates with, if any.
    fn profile(&self) -> Option<&str> {
        None
    }

    /// Reference services use to pin their resources to this provider.
    fn alias(&self) -> String {
        format!("{}.{}", self.provider(), self.region())
    }

    /// Declares the provider itself. Runs for every lifecycle phase.
    fn bootstrap(&self, stack: &mut dyn InfrastructureBackend) -> Result<()>;

    /// Declares resources every service of the provider relies upon. Runs on deploy.
    fn prerequisites(&self, stack: &mut dyn InfrastructureBackend) -> Result<()>;
}
