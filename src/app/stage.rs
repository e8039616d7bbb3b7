//! One stage of a project, turned into registries ready for the lifecycle.

use crate::constants::Provider;
use crate::core::cloud::{Cloud, Prerequisites, ProvisioningReport};
use crate::core::links;
use crate::core::service::{Scope, Service};
use crate::core::stack::Stack;
use crate::core::vault::{StageVault, VaultService};
use crate::domain::model::Project;
use crate::domain::ports::InfrastructureBackend;
use crate::providers::catalog;
use crate::utils::error::{Result, StackmateError};
use indexmap::map::Entry;
use indexmap::IndexMap;
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;

/// A stage's shared vault and one registry per (provider, region) its services target.
pub struct StageDeployment {
    project_name: String,
    stage: String,
    vault: Rc<RefCell<dyn VaultService>>,
    clouds: IndexMap<(Provider, String), Cloud>,
}

impl StageDeployment {
    /// Registers every declared service, then resolves links across the whole stage.
    ///
    /// Attribute errors and dangling links are collected over every service into
    /// one `Stage` error; unsupported types and invalid regions abort immediately.
    pub fn build(project: &Project, stage_name: &str) -> Result<Self> {
        let stage = project.stage(stage_name).ok_or_else(|| {
            StackmateError::config(format!("Stage '{}' is not declared in the project", stage_name))
        })?;

        let vault: Rc<RefCell<dyn VaultService>> = Rc::new(RefCell::new(StageVault::from_config(
            &project.vault,
            project.project_name(),
            stage_name,
        )?));

        let mut clouds: IndexMap<(Provider, String), Cloud> = IndexMap::new();
        let mut errors = Vec::new();

        for (name, declaration) in &stage.services {
            let attributes = declaration.normalize(name, stage_name, project);
            let provider = declaration.provider_or(project);
            let region = declaration.region_or(project);

            let profile = attributes.get("profile").and_then(Value::as_str);

            let cloud = match clouds.entry((provider, region.clone())) {
                Entry::Occupied(entry) => {
                    let cloud = entry.into_mut();
                    let current = cloud.prerequisites().provider.profile();
                    if profile.is_some() && profile != current {
                        return Err(StackmateError::config(format!(
                            "Service '{}' uses profile '{}' but {}/{} is already set up with {}",
                            name,
                            profile.unwrap_or_default(),
                            provider,
                            cloud.region(),
                            current.map_or("the default profile".to_string(), |p| format!("profile '{}'", p)),
                        )));
                    }
                    cloud
                }
                Entry::Vacant(entry) => {
                    let prerequisites = Prerequisites::new(
                        (catalog(provider).provider_service)(&region, profile),
                        Rc::clone(&vault),
                    );
                    entry.insert(Cloud::new(provider, region, stage_name, prerequisites)?)
                }
            };

            match cloud.register(declaration.service_type, attributes) {
                Ok(_) => {}
                Err(e @ StackmateError::FieldValidation { .. }) => errors.push(e),
                Err(e) => return Err(e),
            }
        }

        errors.extend(links::dangling_links(
            stage_name,
            stage
                .services
                .iter()
                .map(|(name, declaration)| (name.as_str(), declaration.links.as_slice())),
        ));

        if !errors.is_empty() {
            return Err(StackmateError::Stage {
                stage: stage_name.to_string(),
                errors,
            });
        }

        let mut deployment = Self {
            project_name: project.project_name().to_string(),
            stage: stage_name.to_string(),
            vault,
            clouds,
        };
        deployment.resolve_links()?;

        tracing::info!(
            "Stage '{}' has {} service(s) across {} registr{}",
            deployment.stage,
            deployment.len(),
            deployment.clouds.len(),
            if deployment.clouds.len() == 1 { "y" } else { "ies" }
        );
        Ok(deployment)
    }

    /// Links may cross registries, so resolution runs over the whole stage at once.
    fn resolve_links(&mut self) -> Result<()> {
        let mut services: Vec<&mut Box<dyn Service>> = self
            .clouds
            .values_mut()
            .flat_map(|cloud| cloud.services_mut())
            .collect();
        links::resolve(&self.stage, &mut services)?;

        for cloud in self.clouds.values_mut() {
            cloud.seal();
        }
        Ok(())
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    pub fn vault(&self) -> Rc<RefCell<dyn VaultService>> {
        Rc::clone(&self.vault)
    }

    pub fn len(&self) -> usize {
        self.clouds.values().map(Cloud::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn cloud(&self, provider: Provider, region: &str) -> Option<&Cloud> {
        self.clouds.get(&(provider, region.to_string()))
    }

    pub fn clouds(&self) -> impl Iterator<Item = &Cloud> + '_ {
        self.clouds.values()
    }

    pub fn service(&self, name: &str) -> Option<&dyn Service> {
        self.clouds.values().find_map(|cloud| cloud.get(name))
    }

    /// A fresh stack named after the project and the stage.
    pub fn stack(&self) -> Stack {
        Stack::new(format!("{}-{}", self.project_name, self.stage).to_lowercase())
    }

    /// Runs `scope` on every registry, in the order their first service was declared.
    pub fn dispatch(
        &mut self,
        scope: Scope,
        stack: &mut dyn InfrastructureBackend,
    ) -> Result<Vec<ProvisioningReport>> {
        self.clouds
            .values_mut()
            .map(|cloud| cloud.dispatch(scope, stack))
            .collect()
    }

    pub fn prepare(&mut self, stack: &mut dyn InfrastructureBackend) -> Result<Vec<ProvisioningReport>> {
        self.dispatch(Scope::Prepare, stack)
    }

    pub fn deploy(&mut self, stack: &mut dyn InfrastructureBackend) -> Result<Vec<ProvisioningReport>> {
        self.dispatch(Scope::Deploy, stack)
    }

    pub fn destroy(&mut self, stack: &mut dyn InfrastructureBackend) -> Result<Vec<ProvisioningReport>> {
        self.dispatch(Scope::Destroy, stack)
    }
}
