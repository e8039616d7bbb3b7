use crate::constants::{Provider, ServiceType, StorageKind};
use crate::utils::error::Result;
use crate::utils::validation::ValidatorRegistry;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

pub const DEFAULT_PROJECT_NAME: &str = "stackmate";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub provider: Provider,
    pub region: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub defaults: IndexMap<Provider, Map<String, Value>>,
    pub vault: VaultConfiguration,
    pub stages: IndexMap<String, Stage>,
}

impl Project {
    /// Validates a raw configuration document and converts it into a typed project.
    pub fn from_value(value: Value, validators: &ValidatorRegistry) -> Result<Self> {
        validators.validate(&value)?;
        Ok(serde_json::from_value(value)?)
    }

    pub fn project_name(&self) -> &str {
        self.name.as_deref().unwrap_or(DEFAULT_PROJECT_NAME)
    }

    pub fn stage(&self, name: &str) -> Option<&Stage> {
        self.stages.get(name)
    }
}

/// Services of one deployable environment, in declaration order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stage {
    pub services: IndexMap<String, ServiceDeclaration>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDeclaration {
    #[serde(rename = "type")]
    pub service_type: ServiceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<Provider>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<String>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl ServiceDeclaration {
    pub fn provider_or(&self, project: &Project) -> Provider {
        self.provider.unwrap_or(project.provider)
    }

    /// Declared region, the project region for the project's provider, or the
    /// provider's own default region.
    pub fn region_or(&self, project: &Project) -> String {
        let provider = self.provider_or(project);
        match &self.region {
            Some(region) => region.clone(),
            None if provider == project.provider => project.region.clone(),
            None => provider
                .default_region()
                .map(str::to_string)
                .unwrap_or_else(|| project.region.clone()),
        }
    }

    /// Raw attributes handed to the attribute pipeline: provider defaults,
    /// then the declaration's own attributes, then the normalized identity fields.
    pub fn normalize(&self, name: &str, stage: &str, project: &Project) -> Map<String, Value> {
        let provider = self.provider_or(project);
        let mut attributes = project
            .defaults
            .get(&provider)
            .cloned()
            .unwrap_or_default();

        attributes.extend(self.attributes.clone());
        attributes.insert("name".into(), Value::from(name));
        attributes.insert("type".into(), Value::from(self.service_type.as_str()));
        attributes.insert("provider".into(), Value::from(provider.as_str()));
        attributes.insert("region".into(), Value::from(self.region_or(project)));
        attributes.insert("project_name".into(), Value::from(project.project_name()));
        attributes.insert("stage_name".into(), Value::from(stage));
        attributes.insert(
            "links".into(),
            Value::Array(self.links.iter().cloned().map(Value::from).collect()),
        );
        if let Some(profile) = &self.profile {
            attributes.insert("profile".into(), Value::from(profile.as_str()));
        }

        attributes
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultConfiguration {
    pub storage: StorageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialOptions {
    /// Issue root-level credentials.
    pub root: bool,
    /// Allow special characters in the password.
    pub special: bool,
    /// Characters never to use in the password.
    pub exclude: Vec<char>,
}

/// A resource definition emitted into the infrastructure backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub kind: String,
    pub id: String,
    pub attributes: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

impl Resource {
    pub fn new(kind: impl Into<String>, id: impl Into<String>, attributes: Value) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
            attributes,
            depends_on: Vec::new(),
        }
    }

    pub fn depends_on<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on.extend(dependencies.into_iter().map(Into::into));
        self
    }
}

/// Where the infrastructure state is read from and written to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    pub kind: String,
    pub attributes: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn project() -> Project {
        serde_json::from_value(json!({
            "name": "acme",
            "provider": "aws",
            "region": "eu-central-1",
            "defaults": { "aws": { "size": "db.t2.micro" } },
            "vault": { "storage": "file" },
            "stages": {
                "production": {
                    "app": { "type": "instance" },
                    "db": { "type": "mysql", "links": ["app"], "size": "db.t3.micro" },
                    "state": { "type": "state", "provider": "local" }
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_stage_keeps_declaration_order() {
        let project = project();
        let names: Vec<&str> = project.stages["production"]
            .services
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(names, vec!["app", "db", "state"]);
    }

    #[test]
    fn test_normalize_fills_identity_and_defaults() {
        let project = project();
        let db = &project.stages["production"].services["db"];
        let attributes = db.normalize("db", "production", &project);

        assert_eq!(attributes["name"], json!("db"));
        assert_eq!(attributes["provider"], json!("aws"));
        assert_eq!(attributes["region"], json!("eu-central-1"));
        assert_eq!(attributes["project_name"], json!("acme"));
        assert_eq!(attributes["links"], json!(["app"]));
        // declared values win over provider defaults
        assert_eq!(attributes["size"], json!("db.t3.micro"));
    }

    #[test]
    fn test_foreign_provider_uses_its_default_region() {
        let project = project();
        let state = &project.stages["production"].services["state"];
        assert_eq!(state.region_or(&project), "local");
    }

    #[test]
    fn test_credentials_debug_is_redacted() {
        let credentials = Credentials {
            username: "root".to_string(),
            password: "hunter2".to_string(),
        };
        assert!(!format!("{:?}", credentials).contains("hunter2"));
    }
}
