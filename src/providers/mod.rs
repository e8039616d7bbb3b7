//! Per-provider catalogs of the service kinds a registry can build.

pub mod aws;
pub mod local;

use crate::constants::{Provider, ServiceType};
use crate::core::provider::ProviderService;
use crate::core::service::ServiceKind;
use std::fmt;
use std::rc::Rc;

pub type ProviderServiceFactory = fn(&str, Option<&str>) -> Rc<dyn ProviderService>;

pub struct ProviderCatalog {
    pub provider: Provider,
    pub kinds: &'static [ServiceKind],
    /// Builds the provider service for a region and an optional profile.
    pub provider_service: ProviderServiceFactory,
}

impl ProviderCatalog {
    pub fn kind(&self, service_type: ServiceType) -> Option<&'static ServiceKind> {
        self.kinds.iter().find(|k| k.service_type == service_type)
    }

    pub fn supports(&self, service_type: ServiceType) -> bool {
        self.kind(service_type).is_some()
    }

    pub fn service_types(&self) -> impl Iterator<Item = ServiceType> {
        self.kinds.iter().map(|k| k.service_type)
    }
}

impl fmt::Debug for ProviderCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderCatalog")
            .field("provider", &self.provider)
            .field("kinds", &self.kinds)
            .finish()
    }
}

pub fn catalog(provider: Provider) -> &'static ProviderCatalog {
    match provider {
        Provider::Aws => &aws::CATALOG,
        Provider::Local => &local::CATALOG,
    }
}
