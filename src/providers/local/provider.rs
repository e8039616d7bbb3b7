use crate::constants::Provider;
use crate::core::provider::ProviderService;
use crate::domain::ports::InfrastructureBackend;
use crate::utils::error::Result;
use std::rc::Rc;

/// Nothing to configure: local services write straight to disk.
#[derive(Debug, Clone)]
pub struct LocalProvider {
    region: String,
}

impl LocalProvider {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
        }
    }

    pub fn shared(region: &str, _profile: Option<&str>) -> Rc<dyn ProviderService> {
        Rc::new(Self::new(region))
    }
}

impl ProviderService for LocalProvider {
    fn provider(&self) -> Provider {
        Provider::Local
    }

    fn region(&self) -> &str {
        &self.region
    }

    fn bootstrap(&self, _stack: &mut dyn InfrastructureBackend) -> Result<()> {
        Ok(())
    }

    fn prerequisites(&self, _stack: &mut dyn InfrastructureBackend) -> Result<()> {
        Ok(())
    }
}
