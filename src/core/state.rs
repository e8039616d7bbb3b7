//! State services hold the store the infrastructure backend persists its state in.
//!
//! `prepare` creates the store, `deploy` and `destroy` only point the stack at it:
//! tearing resources down still needs the existing state to find them.

use crate::constants::ServiceType;
use crate::core::attributes::{Attributes, Schema};
use crate::core::service::{Service, ServiceCore};
use crate::domain::ports::InfrastructureBackend;
use crate::utils::error::Result;
use std::fmt;

pub const DEFAULT_STATE_NAME: &str = "stage-state";

/// A concrete kind of state store.
pub trait StateBackend: fmt::Debug + Sized + 'static {
    /// Full schema (base attributes included) for services using this store.
    fn schema() -> &'static Schema;

    fn from_attributes(core: &ServiceCore, attributes: &Attributes) -> Result<Self>;

    /// Creates the durable store itself.
    fn resources(&self, core: &ServiceCore, stack: &mut dyn InfrastructureBackend) -> Result<()>;

    /// Configures the stack to read and write the existing store.
    fn backend(&self, core: &ServiceCore, stack: &mut dyn InfrastructureBackend) -> Result<()>;
}

#[derive(Debug)]
pub struct StateService<B: StateBackend> {
    core: ServiceCore,
    store: B,
    created: bool,
}

impl<B: StateBackend> StateService<B> {
    pub fn new(core: ServiceCore, attributes: &Attributes) -> Result<Self> {
        let store = B::from_attributes(&core, attributes)?;
        Ok(Self {
            core,
            store,
            created: false,
        })
    }

    /// Registry builder for this state kind.
    pub fn build(core: ServiceCore, attributes: &Attributes) -> Result<Box<dyn Service>> {
        Ok(Box::new(Self::new(core, attributes)?))
    }

    pub fn store(&self) -> &B {
        &self.store
    }

    /// Creates the store once; later calls are no-ops.
    pub fn resources(&mut self, stack: &mut dyn InfrastructureBackend) -> Result<()> {
        if self.created {
            tracing::debug!("State store '{}' already exists", self.core.name);
            return Ok(());
        }

        self.store.resources(&self.core, stack)?;
        self.created = true;
        Ok(())
    }

    pub fn backend(&mut self, stack: &mut dyn InfrastructureBackend) -> Result<()> {
        self.store.backend(&self.core, stack)
    }
}

impl<B: StateBackend> Service for StateService<B> {
    fn core(&self) -> &ServiceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ServiceCore {
        &mut self.core
    }

    fn service_type(&self) -> ServiceType {
        ServiceType::State
    }

    fn on_prepare(&mut self, stack: &mut dyn InfrastructureBackend) -> Result<()> {
        self.resources(stack)
    }

    fn on_deploy(&mut self, stack: &mut dyn InfrastructureBackend) -> Result<()> {
        self.backend(stack)
    }

    fn on_destroy(&mut self, stack: &mut dyn InfrastructureBackend) -> Result<()> {
        self.backend(stack)
    }
}
