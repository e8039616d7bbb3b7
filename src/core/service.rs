//! The [`Service`] trait and the pieces every service kind shares.

use crate::constants::{Provider, ServiceType};
use crate::core::attributes::{parsers, Attributes, Rule, Schema};
use crate::core::provider::ProviderService;
use crate::core::vault::VaultService;
use crate::domain::model::DEFAULT_PROJECT_NAME;
use crate::domain::ports::InfrastructureBackend;
use crate::utils::error::{Result, StackmateError};
use crate::utils::helpers::identifier;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::OnceLock;

/// Lifecycle phase a registry dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Prepare,
    Deploy,
    Destroy,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Scope::Prepare => "prepare",
            Scope::Deploy => "deploy",
            Scope::Destroy => "destroy",
        })
    }
}

/// Read-only view of a sibling handed to association predicates and handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSummary {
    pub name: String,
    pub service_type: ServiceType,
    pub provider: Provider,
    pub region: String,
    pub identifier: String,
    pub links: Vec<String>,
}

pub type AssociationHandler = fn(&mut ServiceCore, &ServiceSummary);

/// A `(lookup, handler)` pair: the handler runs for every sibling the lookup matches.
pub struct Association {
    pub lookup: Box<dyn Fn(&ServiceSummary) -> bool>,
    pub handler: AssociationHandler,
}

impl Association {
    pub fn new(
        lookup: impl Fn(&ServiceSummary) -> bool + 'static,
        handler: AssociationHandler,
    ) -> Self {
        Self {
            lookup: Box::new(lookup),
            handler,
        }
    }

    /// Records every service named in `links` as a dependency.
    pub fn linked(links: &[String]) -> Self {
        let links = links.to_vec();
        Self::new(
            move |target| links.contains(&target.name),
            |core, target| core.associate(target),
        )
    }
}

impl fmt::Debug for Association {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Association").finish_non_exhaustive()
    }
}

/// Identity, placement and shared references common to every service.
#[derive(Clone)]
pub struct ServiceCore {
    pub name: String,
    pub provider: Provider,
    pub region: String,
    pub profile: Option<String>,
    pub links: Vec<String>,
    pub project_name: String,
    pub stage_name: String,
    /// Services this one depends upon, filled by link resolution.
    pub associated: Vec<ServiceSummary>,
    /// Services allowed to connect to this one, filled by link resolution.
    pub clients: Vec<ServiceSummary>,
    pub vault: Option<Rc<RefCell<dyn VaultService>>>,
    pub provider_service: Option<Rc<dyn ProviderService>>,
}

impl ServiceCore {
    pub fn from_attributes(attributes: &Attributes) -> Result<Self> {
        let provider = attributes
            .require_string("provider")?
            .parse::<Provider>()
            .map_err(StackmateError::config)?;

        Ok(Self {
            name: attributes.require_string("name")?,
            provider,
            region: attributes.require_string("region")?,
            profile: attributes.str("profile").map(str::to_string),
            links: attributes.strings("links"),
            project_name: attributes
                .str("project_name")
                .unwrap_or(DEFAULT_PROJECT_NAME)
                .to_string(),
            stage_name: attributes.require_string("stage_name")?,
            associated: Vec::new(),
            clients: Vec::new(),
            vault: None,
            provider_service: None,
        })
    }

    pub fn identifier(&self) -> String {
        identifier(&[&self.name, &self.stage_name])
    }

    pub fn associate(&mut self, target: &ServiceSummary) {
        if !self.associated.iter().any(|s| s.name == target.name) {
            self.associated.push(target.clone());
        }
    }

    pub fn allow_client(&mut self, target: &ServiceSummary) {
        if !self.clients.iter().any(|s| s.name == target.name) {
            self.clients.push(target.clone());
        }
    }

    /// Identifiers of associated services, for `depends_on` lists.
    pub fn dependencies(&self) -> Vec<String> {
        self.associated.iter().map(|s| s.identifier.clone()).collect()
    }

    pub fn vault(&self) -> Result<Rc<RefCell<dyn VaultService>>> {
        self.vault
            .clone()
            .ok_or_else(|| StackmateError::config(format!("Service '{}' has no vault", self.name)))
    }
}

impl fmt::Debug for ServiceCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceCore")
            .field("name", &self.name)
            .field("provider", &self.provider)
            .field("region", &self.region)
            .field("links", &self.links)
            .field("stage_name", &self.stage_name)
            .field("associated", &self.associated)
            .finish_non_exhaustive()
    }
}

/// A typed, validated unit of infrastructure with lifecycle hooks.
pub trait Service: fmt::Debug {
    fn core(&self) -> &ServiceCore;
    fn core_mut(&mut self) -> &mut ServiceCore;
    fn service_type(&self) -> ServiceType;

    fn name(&self) -> &str {
        &self.core().name
    }

    fn provider(&self) -> Provider {
        self.core().provider
    }

    fn region(&self) -> &str {
        &self.core().region
    }

    fn links(&self) -> &[String] {
        &self.core().links
    }

    fn identifier(&self) -> String {
        self.core().identifier()
    }

    fn summary(&self) -> ServiceSummary {
        ServiceSummary {
            name: self.name().to_string(),
            service_type: self.service_type(),
            provider: self.provider(),
            region: self.region().to_string(),
            identifier: self.identifier(),
            links: self.links().to_vec(),
        }
    }

    fn is_depending_upon(&self, name: &str) -> bool {
        self.core().associated.iter().any(|s| s.name == name)
    }

    fn associations(&self) -> Vec<Association> {
        vec![Association::linked(self.links())]
    }

    fn on_prepare(&mut self, _stack: &mut dyn InfrastructureBackend) -> Result<()> {
        Ok(())
    }

    fn on_deploy(&mut self, _stack: &mut dyn InfrastructureBackend) -> Result<()> {
        Ok(())
    }

    fn on_destroy(&mut self, _stack: &mut dyn InfrastructureBackend) -> Result<()> {
        Ok(())
    }

    fn dispatch(&mut self, scope: Scope, stack: &mut dyn InfrastructureBackend) -> Result<()> {
        match scope {
            Scope::Prepare => self.on_prepare(stack),
            Scope::Deploy => self.on_deploy(stack),
            Scope::Destroy => self.on_destroy(stack),
        }
    }
}

/// Attributes every service accepts.
pub fn base_schema() -> &'static Schema {
    static SCHEMA: OnceLock<Schema> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        let providers: Vec<&str> = Provider::ALL.iter().map(Provider::as_str).collect();

        Schema::new()
            .field("name", parsers::parse_string)
            .rule("name", Rule::presence("The service needs a name"))
            .rule(
                "name",
                Rule::format(
                    "[a-z0-9][a-z0-9_-]*",
                    "You can only use letters, numbers, - and _ for the service name",
                ),
            )
            .field("type", parsers::parse_string)
            .field("provider", parsers::parse_string)
            .rule("provider", Rule::presence("You have to specify a provider"))
            .rule(
                "provider",
                Rule::inclusion(&providers, "The provider is not supported"),
            )
            .field("region", parsers::parse_string)
            .rule("region", Rule::presence("You have to specify a region"))
            .field("profile", parsers::parse_string)
            .field("links", parsers::parse_string_list)
            .field("project_name", parsers::parse_string)
            .default_value("project_name", DEFAULT_PROJECT_NAME)
            .field("stage_name", parsers::parse_string)
            .rule("stage_name", Rule::presence("The service needs a stage"))
    })
}

pub type Builder = fn(ServiceCore, &Attributes) -> Result<Box<dyn Service>>;

/// How a registry turns `(type, attributes)` into a concrete service.
#[derive(Clone, Copy)]
pub struct ServiceKind {
    pub service_type: ServiceType,
    pub schema: fn() -> &'static Schema,
    pub build: Builder,
}

impl ServiceKind {
    /// Runs the attribute pipeline and builds the service; nothing is built on failure.
    pub fn construct(&self, raw: &Map<String, Value>) -> Result<Box<dyn Service>> {
        let name = raw.get("name").and_then(Value::as_str).unwrap_or_default();
        let attributes = (self.schema)().apply(name, raw)?;
        let core = ServiceCore::from_attributes(&attributes)?;
        (self.build)(core, &attributes)
    }
}

impl fmt::Debug for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceKind")
            .field("service_type", &self.service_type)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn summary(name: &str, service_type: ServiceType) -> ServiceSummary {
        ServiceSummary {
            name: name.to_string(),
            service_type,
            provider: Provider::Aws,
            region: "eu-central-1".to_string(),
            identifier: format!("{}-production", name),
            links: Vec::new(),
        }
    }

    fn core(links: &[&str]) -> ServiceCore {
        let raw = json!({
            "name": "db",
            "provider": "aws",
            "region": "eu-central-1",
            "stage_name": "production",
            "links": links,
        });
        let attributes = base_schema()
            .apply("db", raw.as_object().unwrap())
            .unwrap();
        ServiceCore::from_attributes(&attributes).unwrap()
    }

    #[test]
    fn test_core_from_attributes() {
        let core = core(&["app"]);
        assert_eq!(core.name, "db");
        assert_eq!(core.provider, Provider::Aws);
        assert_eq!(core.project_name, DEFAULT_PROJECT_NAME);
        assert_eq!(core.identifier(), "db-production");
    }

    #[test]
    fn test_linked_association_matches_declared_names() {
        let mut core = core(&["app"]);
        let association = Association::linked(&core.links);

        let app = summary("app", ServiceType::Instance);
        let cache = summary("cache", ServiceType::Redis);
        assert!((association.lookup)(&app));
        assert!(!(association.lookup)(&cache));

        (association.handler)(&mut core, &app);
        (association.handler)(&mut core, &app);
        assert_eq!(core.associated.len(), 1);
        assert_eq!(core.dependencies(), vec!["app-production".to_string()]);
    }

    #[test]
    fn test_base_schema_rejects_bad_names() {
        let raw = json!({ "name": "my db", "provider": "gcp", "region": "", "stage_name": "production" });
        let err = base_schema()
            .apply("my db", raw.as_object().unwrap())
            .unwrap_err();
        let StackmateError::FieldValidation { fields, .. } = err else {
            panic!("expected field validation error");
        };
        let names: Vec<&str> = fields.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(names, vec!["name", "provider", "region"]);
    }
}
