//! Project-wide checks that run on the raw configuration, before any service exists.
//!
//! Validators are plain functions kept in a [`ValidatorRegistry`] the caller owns;
//! every validator runs and every error is reported.

use crate::constants::{Provider, ServiceType, StorageKind};
use crate::core::links::dangling_links;
use crate::utils::error::{Result, StackmateError};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::fmt;

/// Inspects the whole configuration document and returns every problem found.
pub type Validator = fn(&Value) -> Vec<StackmateError>;

#[derive(Clone)]
pub struct ValidatorRegistry {
    validators: IndexMap<&'static str, Validator>,
}

impl ValidatorRegistry {
    /// A registry without any validator.
    pub fn new() -> Self {
        Self {
            validators: IndexMap::new(),
        }
    }

    /// The project, vault, defaults, stages and links validators, in that order.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry
            .register("project", validate_project)
            .register("vault", validate_vault)
            .register("defaults", validate_project_defaults)
            .register("stages", validate_stages)
            .register("links", validate_links);
        registry
    }

    /// Adds a validator, replacing any registered under the same name.
    pub fn register(&mut self, name: &'static str, validator: Validator) -> &mut Self {
        self.validators.insert(name, validator);
        self
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.validators.shift_remove(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.validators.keys().copied()
    }

    pub fn run(&self, config: &Value) -> Vec<StackmateError> {
        if !config.is_object() {
            return vec![StackmateError::ConfigurationShape {
                errors: vec!["The configuration has to be an object".to_string()],
            }];
        }

        self.validators
            .iter()
            .flat_map(|(name, validator)| {
                let errors = validator(config);
                if !errors.is_empty() {
                    tracing::debug!("Validator '{}' reported {} error(s)", name, errors.len());
                }
                errors
            })
            .collect()
    }

    /// Fails with an `Invalid` aggregate holding every error found.
    pub fn validate(&self, config: &Value) -> Result<()> {
        let errors = self.run(config);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(StackmateError::Invalid { errors })
        }
    }
}

impl Default for ValidatorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for ValidatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.validators.keys()).finish()
    }
}

fn shape(errors: Vec<String>) -> Vec<StackmateError> {
    if errors.is_empty() {
        Vec::new()
    } else {
        vec![StackmateError::ConfigurationShape { errors }]
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect()
}

/// Top-level `name`, `provider` and `region`.
pub fn validate_project(config: &Value) -> Vec<StackmateError> {
    let mut messages = Vec::new();

    if let Some(name) = config.get("name") {
        if !name.as_str().is_some_and(|n| !n.trim().is_empty()) {
            messages.push("The project 'name' has to be a non-empty string".to_string());
        }
    }

    let provider = config
        .get("provider")
        .and_then(Value::as_str)
        .and_then(|p| p.parse::<Provider>().ok());

    let Some(provider) = provider else {
        messages.push("The project needs a valid 'provider'".to_string());
        return shape(messages);
    };

    let mut errors = shape(messages);
    let region = config.get("region").and_then(Value::as_str).unwrap_or_default();
    if !provider.is_valid_region(region) {
        errors.push(StackmateError::InvalidRegion {
            region: region.to_string(),
            provider: provider.to_string(),
        });
    }

    errors
}

pub fn validate_vault(config: &Value) -> Vec<StackmateError> {
    let error = |message: &str| {
        vec![StackmateError::VaultConfiguration {
            message: message.to_string(),
        }]
    };

    let vault = match config.get("vault") {
        Some(Value::Object(vault)) if !vault.is_empty() => vault,
        _ => return error("The project does not contain a 'vault' section"),
    };

    let storage = vault
        .get("storage")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<StorageKind>().ok());

    match storage {
        None => error("You have to specify a valid storage for your credentials vault"),
        Some(StorageKind::AwsParams) => {
            let filled = |key: &str| vault.get(key).and_then(Value::as_str).is_some_and(|v| !v.is_empty());
            if filled("key") && filled("region") {
                Vec::new()
            } else {
                error("The vault needs to have 'region' and a 'key' ARN to encrypt values")
            }
        }
        Some(StorageKind::File) => Vec::new(),
    }
}

/// `defaults` may be absent or empty; otherwise every key must be a provider.
pub fn validate_project_defaults(config: &Value) -> Vec<StackmateError> {
    let Some(defaults) = config.get("defaults").filter(|d| !is_empty(d)) else {
        return Vec::new();
    };

    let valid = defaults.as_object().is_some_and(|providers| {
        providers
            .iter()
            .all(|(key, value)| key.parse::<Provider>().is_ok() && value.is_object())
    });

    if valid {
        Vec::new()
    } else {
        shape(vec![
            "The 'defaults' entry should contain valid cloud providers in the mapping".to_string(),
        ])
    }
}

/// Structure of every stage and service entry, reported as one aggregate.
pub fn validate_stages(config: &Value) -> Vec<StackmateError> {
    let stages = match config.get("stages") {
        Some(Value::Object(stages)) if !stages.is_empty() => stages,
        _ => {
            return shape(vec![
                "You have to provide a set of stages for the project, in the form of an object"
                    .to_string(),
            ])
        }
    };

    let mut messages = Vec::new();
    for (stage_name, stage) in stages {
        let services = match stage {
            Value::Object(services) if !services.is_empty() => services,
            _ => {
                messages.push(format!("Stage '{}' does not contain any services", stage_name));
                continue;
            }
        };

        if services.values().any(|s| !s.is_object()) {
            messages.push(format!(
                "Stage '{}' contains invalid service configurations. Every service should be declared as an object",
                stage_name
            ));
            continue;
        }

        for (service_name, service) in services {
            messages.extend(service_shape(stage_name, service_name, service));
        }
    }

    shape(messages)
}

fn service_shape(stage: &str, name: &str, service: &Value) -> Vec<String> {
    let mut messages = Vec::new();

    let declarable = service
        .get("type")
        .and_then(Value::as_str)
        .and_then(|t| t.parse::<ServiceType>().ok())
        .is_some_and(|t| t.is_declarable());
    if !declarable {
        messages.push(format!(
            "Stage '{}' contains invalid configuration for service '{}'",
            stage, name
        ));
    }

    if let Some(provider) = service.get("provider") {
        if !provider.as_str().is_some_and(|p| p.parse::<Provider>().is_ok()) {
            messages.push(format!(
                "Service '{}' in stage '{}' has an unknown provider",
                name, stage
            ));
        }
    }

    if let Some(links) = service.get("links") {
        if string_list(links).is_none() {
            messages.push(format!(
                "Service '{}' in stage '{}' contains invalid entries under 'links'",
                name, stage
            ));
        }
    }

    messages
}

/// Every link must name a service declared in the same stage.
pub fn validate_links(config: &Value) -> Vec<StackmateError> {
    let Some(stages) = config.get("stages").and_then(Value::as_object) else {
        return Vec::new();
    };

    stages
        .iter()
        .filter_map(|(name, stage)| stage.as_object().map(|services| (name, services)))
        .flat_map(|(stage_name, services)| stage_links(stage_name, services))
        .collect()
}

fn stage_links(stage: &str, services: &Map<String, Value>) -> Vec<StackmateError> {
    let declarations: Vec<(&str, Vec<String>)> = services
        .iter()
        .map(|(name, service)| {
            let links = service.get("links").and_then(string_list).unwrap_or_default();
            (name.as_str(), links)
        })
        .collect();

    dangling_links(
        stage,
        declarations
            .iter()
            .map(|(name, links)| (*name, links.as_slice())),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> Value {
        json!({
            "name": "acme",
            "provider": "aws",
            "region": "eu-central-1",
            "vault": { "storage": "file" },
            "stages": {
                "production": {
                    "app": { "type": "instance" },
                    "db": { "type": "mysql", "links": ["app"] }
                }
            }
        })
    }

    #[test]
    fn test_valid_configuration_passes() {
        let registry = ValidatorRegistry::with_defaults();
        assert!(registry.run(&config()).is_empty());
        assert!(registry.validate(&config()).is_ok());
    }

    #[test]
    fn test_dangling_link_is_reported_once() {
        let mut config = config();
        config["stages"]["production"]["db"]["links"] = json!(["cache"]);

        let errors = ValidatorRegistry::with_defaults().run(&config);
        assert_eq!(errors.len(), 1);
        match &errors[0] {
            StackmateError::DanglingLink { stage, service, missing } => {
                assert_eq!(stage, "production");
                assert_eq!(service, "db");
                assert_eq!(missing, &vec!["cache".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_shape_errors_are_aggregated() {
        let mut config = config();
        config["stages"] = json!({
            "empty": {},
            "broken": { "app": "instance" },
            "production": {
                "app": { "type": "spaceship" },
                "db": { "links": "app" }
            }
        });

        let errors = validate_stages(&config);
        assert_eq!(errors.len(), 1);
        let StackmateError::ConfigurationShape { errors: messages } = &errors[0] else {
            panic!("expected a shape error");
        };
        assert_eq!(messages.len(), 5);
        assert!(messages[0].contains("'empty' does not contain any services"));
        assert!(messages[1].contains("'broken' contains invalid service configurations"));
    }

    #[test]
    fn test_internal_types_cannot_be_declared() {
        let mut config = config();
        config["stages"]["production"]["vault"] = json!({ "type": "vault" });
        assert_eq!(validate_stages(&config).len(), 1);
    }

    #[test]
    fn test_missing_stages() {
        let mut config = config();
        config["stages"] = json!({});
        assert_eq!(validate_stages(&config).len(), 1);
    }

    #[test]
    fn test_vault_validation() {
        let mut config = config();
        assert!(validate_vault(&config).is_empty());

        config["vault"] = json!({ "storage": "aws/ssm/parameter-store", "region": "eu-central-1" });
        let errors = validate_vault(&config);
        assert!(matches!(errors[0], StackmateError::VaultConfiguration { .. }));

        config["vault"]["key"] = json!("arn:aws:kms:eu-central-1:000000000000:key/abc");
        assert!(validate_vault(&config).is_empty());

        config["vault"] = json!({ "storage": "floppy" });
        assert_eq!(validate_vault(&config).len(), 1);

        config.as_object_mut().unwrap().remove("vault");
        assert_eq!(validate_vault(&config).len(), 1);
    }

    #[test]
    fn test_project_defaults_need_provider_keys() {
        let mut config = config();
        config["defaults"] = json!({});
        assert!(validate_project_defaults(&config).is_empty());

        config["defaults"] = json!({ "aws": { "size": "t3.micro" } });
        assert!(validate_project_defaults(&config).is_empty());

        config["defaults"] = json!({ "aws": {}, "gcp": {} });
        assert_eq!(validate_project_defaults(&config).len(), 1);
    }

    #[test]
    fn test_project_region_must_exist() {
        let mut config = config();
        config["region"] = json!("mars-north-1");
        let errors = validate_project(&config);
        assert!(matches!(errors[0], StackmateError::InvalidRegion { .. }));
    }

    #[test]
    fn test_registry_is_locally_owned() {
        let mut registry = ValidatorRegistry::new();
        assert!(registry.run(&config()).is_empty());

        registry.register("links", validate_links);
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["links"]);
        assert!(registry.remove("links"));

        let defaults = ValidatorRegistry::default();
        assert_eq!(defaults.names().count(), 5);
    }

    #[test]
    fn test_non_object_configuration() {
        let errors = ValidatorRegistry::with_defaults().run(&json!(["stages"]));
        assert_eq!(errors.len(), 1);
    }
}
