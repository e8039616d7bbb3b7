//! The local machine: only a file-backed state store.

pub mod provider;
pub mod state;

pub use provider::LocalProvider;
pub use state::LocalFileState;

use crate::constants::{Provider, ServiceType};
use crate::core::service::ServiceKind;
use crate::core::state::{StateBackend, StateService};
use crate::providers::ProviderCatalog;

pub static CATALOG: ProviderCatalog = ProviderCatalog {
    provider: Provider::Local,
    kinds: &[ServiceKind {
        service_type: ServiceType::State,
        schema: <LocalFileState as StateBackend>::schema,
        build: StateService::<LocalFileState>::build,
    }],
    provider_service: LocalProvider::shared,
};
