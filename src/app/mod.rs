pub mod stage;

pub use stage::StageDeployment;

use crate::config::Configuration;
use crate::core::cloud::ProvisioningReport;
use crate::core::service::Scope;
use crate::core::stack::Stack;
use crate::utils::error::Result;
use crate::utils::validation::ValidatorRegistry;

/// The stack a lifecycle run produced, with one report per registry.
#[derive(Debug)]
pub struct Provisioned {
    pub stack: Stack,
    pub reports: Vec<ProvisioningReport>,
}

impl Provisioned {
    pub fn service_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.reports
            .iter()
            .flat_map(|report| report.services.iter().map(String::as_str))
    }
}

/// Loads a project configuration and runs one lifecycle scope for a stage.
pub struct Provisioner {
    configuration: Configuration,
    validators: ValidatorRegistry,
}

impl Provisioner {
    /// Default validators, except links: the stage build reports those next to attribute errors.
    pub fn new(configuration: Configuration) -> Self {
        let mut validators = ValidatorRegistry::with_defaults();
        validators.remove("links");
        Self::with_validators(configuration, validators)
    }

    pub fn with_validators(configuration: Configuration, validators: ValidatorRegistry) -> Self {
        Self {
            configuration,
            validators,
        }
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub async fn run(&mut self, stage: &str, scope: Scope) -> Result<Provisioned> {
        let project = self.configuration.project(&self.validators).await?;
        tracing::info!("Starting {} of stage '{}' for {}", scope, stage, project.project_name());

        let mut deployment = StageDeployment::build(&project, stage)?;
        let mut stack = deployment.stack();
        let reports = deployment.dispatch(scope, &mut stack)?;

        tracing::info!(
            "Finished {} of stage '{}': {} resource(s) in stack {}",
            scope,
            stage,
            stack.resources.len(),
            stack.name
        );
        Ok(Provisioned { stack, reports })
    }

    pub async fn prepare(&mut self, stage: &str) -> Result<Provisioned> {
        self.run(stage, Scope::Prepare).await
    }

    pub async fn deploy(&mut self, stage: &str) -> Result<Provisioned> {
        self.run(stage, Scope::Deploy).await
    }

    pub async fn destroy(&mut self, stage: &str) -> Result<Provisioned> {
        self.run(stage, Scope::Destroy).await
    }
}
