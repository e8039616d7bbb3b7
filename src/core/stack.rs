use crate::domain::model::{BackendConfig, Resource};
use crate::domain::ports::InfrastructureBackend;
use crate::utils::error::{Result, StackmateError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// In-memory infrastructure backend that records emitted definitions in order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stack {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<BackendConfig>,
    #[serde(default)]
    pub resources: IndexMap<String, Resource>,
}

impl Stack {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn resource(&self, id: &str) -> Option<&Resource> {
        self.resources.get(id)
    }

    pub fn resources_of_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a Resource> + 'a {
        self.resources.values().filter(move |r| r.kind == kind)
    }

    pub fn to_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

impl InfrastructureBackend for Stack {
    fn stack_name(&self) -> &str {
        &self.name
    }

    fn has_resource(&self, id: &str) -> bool {
        self.resources.contains_key(id)
    }

    fn add_resource(&mut self, resource: Resource) -> Result<()> {
        if self.resources.contains_key(&resource.id) {
            return Err(StackmateError::DuplicateResource {
                id: resource.id,
                stack: self.name.clone(),
            });
        }

        tracing::debug!("Adding {} '{}' to stack {}", resource.kind, resource.id, self.name);
        self.resources.insert(resource.id.clone(), resource);
        Ok(())
    }

    fn set_backend(&mut self, backend: BackendConfig) -> Result<()> {
        tracing::debug!("Using {} state backend for stack {}", backend.kind, self.name);
        self.backend = Some(backend);
        Ok(())
    }
}
