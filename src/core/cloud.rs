//! The service registry for one (provider, region, stage) triple.
//!
//! A [`Cloud`] is single-threaded: it hands `Rc` prerequisites to its services,
//! and `register` / `dispatch` must not be invoked concurrently.

use crate::constants::{Provider, ServiceType, StorageKind};
use crate::core::links;
use crate::core::provider::ProviderService;
use crate::core::service::{Scope, Service};
use crate::core::vault::{StageVault, VaultService};
use crate::domain::model::VaultConfiguration;
use crate::domain::ports::InfrastructureBackend;
use crate::providers::{catalog, ProviderCatalog};
use crate::utils::error::{Result, StackmateError};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Shared objects injected into every service at registration.
#[derive(Clone)]
pub struct Prerequisites {
    pub provider: Rc<dyn ProviderService>,
    pub vault: Rc<RefCell<dyn VaultService>>,
}

impl Prerequisites {
    pub fn new(provider: Rc<dyn ProviderService>, vault: Rc<RefCell<dyn VaultService>>) -> Self {
        Self { provider, vault }
    }

    /// The provider's own provider service and a file vault.
    pub fn defaults(provider: Provider, region: &str, project: &str, stage: &str) -> Result<Self> {
        let vault = StageVault::from_config(
            &VaultConfiguration {
                storage: StorageKind::File,
                key: None,
                region: None,
            },
            project,
            stage,
        )?;

        Ok(Self::new(
            (catalog(provider).provider_service)(region, None),
            Rc::new(RefCell::new(vault)),
        ))
    }
}

impl fmt::Debug for Prerequisites {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Prerequisites")
            .field("provider", &self.provider)
            .finish_non_exhaustive()
    }
}

/// Services a lifecycle dispatch reached, in the order it reached them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningReport {
    pub stage: String,
    pub scope: Scope,
    pub services: Vec<String>,
}

pub struct Cloud {
    provider: Provider,
    region: String,
    stage: String,
    catalog: &'static ProviderCatalog,
    prerequisites: Prerequisites,
    services: IndexMap<String, Box<dyn Service>>,
    linked: bool,
}

impl Cloud {
    /// Fails with `InvalidRegion` before anything can be registered.
    pub fn new(
        provider: Provider,
        region: impl Into<String>,
        stage: impl Into<String>,
        prerequisites: Prerequisites,
    ) -> Result<Self> {
        let region = region.into();
        if !provider.is_valid_region(&region) {
            return Err(StackmateError::InvalidRegion {
                region,
                provider: provider.to_string(),
            });
        }

        Ok(Self {
            provider,
            region,
            stage: stage.into(),
            catalog: catalog(provider),
            prerequisites,
            services: IndexMap::new(),
            linked: false,
        })
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    pub fn prerequisites(&self) -> &Prerequisites {
        &self.prerequisites
    }

    pub fn is_linked(&self) -> bool {
        self.linked
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&dyn Service> {
        self.services.get(name).map(|s| s.as_ref())
    }

    pub fn services(&self) -> impl Iterator<Item = &dyn Service> + '_ {
        self.services.values().map(|s| s.as_ref())
    }

    pub fn service_names(&self) -> Vec<&str> {
        self.services.keys().map(String::as_str).collect()
    }

    pub(crate) fn services_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn Service>> + '_ {
        self.services.values_mut()
    }

    /// Validates and stores a service. On any error the registry is left untouched.
    ///
    /// Missing `provider`, `region` and `stage_name` attributes default to the
    /// registry's own; a service may not claim a different provider or region.
    /// Names are unique per registry: registering a taken name fails.
    pub fn register(
        &mut self,
        service_type: ServiceType,
        mut attributes: Map<String, Value>,
    ) -> Result<&dyn Service> {
        let kind = self
            .catalog
            .kind(service_type)
            .ok_or_else(|| StackmateError::UnsupportedServiceType {
                service_type: service_type.to_string(),
                provider: self.provider.to_string(),
            })?;

        let requested = attributes
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        if self.linked {
            return Err(StackmateError::RegistrySealed {
                name: requested,
                stage: self.stage.clone(),
            });
        }

        attributes
            .entry("provider")
            .or_insert_with(|| Value::from(self.provider.as_str()));
        attributes
            .entry("region")
            .or_insert_with(|| Value::from(self.region.as_str()));
        attributes
            .entry("stage_name")
            .or_insert_with(|| Value::from(self.stage.as_str()));

        let mut service = kind.construct(&attributes)?;

        if service.provider() != self.provider || service.region() != self.region {
            return Err(StackmateError::config(format!(
                "Service '{}' targets {}/{} but the registry serves {}/{}",
                service.name(),
                service.provider(),
                service.region(),
                self.provider,
                self.region,
            )));
        }

        if self.services.contains_key(service.name()) {
            return Err(StackmateError::DuplicateService {
                name: service.name().to_string(),
                stage: self.stage.clone(),
            });
        }

        let core = service.core_mut();
        core.vault = Some(Rc::clone(&self.prerequisites.vault));
        core.provider_service = Some(Rc::clone(&self.prerequisites.provider));

        tracing::debug!(
            "Registered {} service '{}' in {}/{} ({})",
            service_type,
            service.name(),
            self.provider,
            self.region,
            self.stage
        );

        let name = service.name().to_string();
        let (index, _) = self.services.insert_full(name, service);
        Ok(self.services[index].as_ref())
    }

    /// Resolves links among this registry's services, once. Seals the registry.
    pub fn resolve_links(&mut self) -> Result<()> {
        if self.linked {
            return Ok(());
        }

        let mut services: Vec<&mut Box<dyn Service>> = self.services.values_mut().collect();
        links::resolve(&self.stage, &mut services)?;
        self.linked = true;
        Ok(())
    }

    /// Marks links as resolved by a stage-wide pass spanning several registries.
    pub(crate) fn seal(&mut self) {
        self.linked = true;
    }

    pub fn prepare(&mut self, stack: &mut dyn InfrastructureBackend) -> Result<ProvisioningReport> {
        self.dispatch(Scope::Prepare, stack)
    }

    pub fn deploy(&mut self, stack: &mut dyn InfrastructureBackend) -> Result<ProvisioningReport> {
        self.dispatch(Scope::Deploy, stack)
    }

    pub fn destroy(&mut self, stack: &mut dyn InfrastructureBackend) -> Result<ProvisioningReport> {
        self.dispatch(Scope::Destroy, stack)
    }

    /// Runs the prerequisites, then every service's hook for `scope` in registration order.
    pub fn dispatch(
        &mut self,
        scope: Scope,
        stack: &mut dyn InfrastructureBackend,
    ) -> Result<ProvisioningReport> {
        self.resolve_links()?;

        tracing::info!(
            "Running {} for {} service(s) in {}/{} ({})",
            scope,
            self.services.len(),
            self.provider,
            self.region,
            self.stage
        );

        let provider = Rc::clone(&self.prerequisites.provider);
        provider.bootstrap(stack)?;

        if scope == Scope::Deploy {
            provider.prerequisites(stack)?;
            self.prerequisites.vault.borrow_mut().on_deploy(stack)?;
        }

        let mut dispatched = Vec::with_capacity(self.services.len());
        for (name, service) in self.services.iter_mut() {
            tracing::debug!("{} → {}", scope, name);
            service.dispatch(scope, stack)?;
            dispatched.push(name.clone());
        }

        Ok(ProvisioningReport {
            stage: self.stage.clone(),
            scope,
            services: dispatched,
        })
    }
}

impl fmt::Debug for Cloud {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cloud")
            .field("provider", &self.provider)
            .field("region", &self.region)
            .field("stage", &self.stage)
            .field("services", &self.service_names())
            .field("linked", &self.linked)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::stack::Stack;
    use serde_json::json;

    fn cloud() -> Cloud {
        let prerequisites =
            Prerequisites::defaults(Provider::Aws, "eu-central-1", "acme", "production").unwrap();
        Cloud::new(Provider::Aws, "eu-central-1", "production", prerequisites).unwrap()
    }

    fn attributes(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn instance(name: &str) -> Map<String, Value> {
        attributes(json!({ "name": name, "size": "t2.micro", "storage": 30 }))
    }

    fn mysql(name: &str, links: &[&str]) -> Map<String, Value> {
        attributes(json!({
            "name": name,
            "size": "db.t3.micro",
            "storage": 20,
            "links": links,
        }))
    }

    #[test]
    fn test_invalid_region_is_fatal() {
        let prerequisites =
            Prerequisites::defaults(Provider::Aws, "mars-north-1", "acme", "production").unwrap();
        let err = Cloud::new(Provider::Aws, "mars-north-1", "production", prerequisites).unwrap_err();
        assert!(matches!(err, StackmateError::InvalidRegion { .. }));

        let prerequisites = Prerequisites::defaults(Provider::Aws, "", "acme", "production").unwrap();
        assert!(Cloud::new(Provider::Aws, "", "production", prerequisites).is_err());
    }

    #[test]
    fn test_register_injects_prerequisites() {
        let mut cloud = cloud();
        let service = cloud.register(ServiceType::Instance, instance("app")).unwrap();

        assert_eq!(service.name(), "app");
        assert!(service.core().vault.is_some());
        assert!(service.core().provider_service.is_some());
        assert_eq!(cloud.len(), 1);
    }

    #[test]
    fn test_unsupported_type_leaves_registry_unchanged() {
        let mut cloud = cloud();
        cloud.register(ServiceType::Instance, instance("app")).unwrap();

        let err = cloud
            .register(ServiceType::Mailer, attributes(json!({ "name": "mail" })))
            .unwrap_err();
        assert!(matches!(err, StackmateError::UnsupportedServiceType { .. }));
        assert_eq!(cloud.len(), 1);
    }

    #[test]
    fn test_invalid_service_is_not_registered() {
        let mut cloud = cloud();
        let err = cloud
            .register(ServiceType::Mysql, attributes(json!({ "name": "db" })))
            .unwrap_err();

        let StackmateError::FieldValidation { service, fields } = err else {
            panic!("expected field validation error");
        };
        assert_eq!(service, "db");
        let names: Vec<&str> = fields.iter().map(|f| f.field.as_str()).collect();
        assert!(names.contains(&"size"));
        assert!(names.contains(&"storage"));
        assert!(cloud.is_empty());
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let mut cloud = cloud();
        cloud.register(ServiceType::Instance, instance("app")).unwrap();
        let err = cloud.register(ServiceType::Instance, instance("app")).unwrap_err();

        assert!(matches!(err, StackmateError::DuplicateService { .. }));
        assert_eq!(cloud.len(), 1);
    }

    #[test]
    fn test_foreign_region_is_rejected() {
        let mut cloud = cloud();
        let mut app = instance("app");
        app.insert("region".into(), json!("us-east-1"));
        assert!(cloud.register(ServiceType::Instance, app).is_err());
        assert!(cloud.is_empty());
    }

    #[test]
    fn test_prepare_follows_registration_order() {
        let mut cloud = cloud();
        cloud.register(ServiceType::Mysql, mysql("db", &["app"])).unwrap();
        cloud.register(ServiceType::Instance, instance("app")).unwrap();
        cloud.register(ServiceType::Redis, attributes(json!({ "name": "cache", "size": "cache.t3.micro" }))).unwrap();

        let mut stack = Stack::new("production");
        let report = cloud.prepare(&mut stack).unwrap();
        assert_eq!(report.scope, Scope::Prepare);
        assert_eq!(report.services, vec!["db", "app", "cache"]);
    }

    #[test]
    fn test_links_resolve_before_hooks_and_seal() {
        let mut cloud = cloud();
        cloud.register(ServiceType::Mysql, mysql("db", &["app"])).unwrap();
        cloud.register(ServiceType::Instance, instance("app")).unwrap();

        let mut stack = Stack::new("production");
        cloud.deploy(&mut stack).unwrap();

        assert!(cloud.is_linked());
        assert!(cloud.get("db").unwrap().is_depending_upon("app"));

        let err = cloud.register(ServiceType::Instance, instance("worker")).unwrap_err();
        assert!(matches!(err, StackmateError::RegistrySealed { .. }));
    }

    #[test]
    fn test_dangling_link_blocks_dispatch() {
        let mut cloud = cloud();
        cloud.register(ServiceType::Mysql, mysql("db", &["cache"])).unwrap();

        let mut stack = Stack::new("production");
        let err = cloud.prepare(&mut stack).unwrap_err();
        assert!(matches!(err, StackmateError::Stage { .. }));
        assert!(stack.resources.is_empty());
    }

    #[test]
    fn test_deploy_registers_vault() {
        let mut cloud = cloud();
        cloud.register(ServiceType::Instance, instance("app")).unwrap();
        assert!(!cloud.prerequisites().vault.borrow().is_registered());

        let mut stack = Stack::new("production");
        cloud.deploy(&mut stack).unwrap();
        assert!(cloud.prerequisites().vault.borrow().is_registered());
    }
}
