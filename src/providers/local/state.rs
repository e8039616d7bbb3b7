use crate::constants::app_home_directory;
use crate::core::attributes::{parsers, Attributes, Rule, Schema};
use crate::core::service::{base_schema, ServiceCore};
use crate::core::state::StateBackend;
use crate::domain::model::BackendConfig;
use crate::domain::ports::InfrastructureBackend;
use crate::utils::error::{Result, StackmateError};
use serde_json::json;
use std::path::PathBuf;
use std::sync::OnceLock;

/// State kept in a file on the local machine.
#[derive(Debug, Clone)]
pub struct LocalFileState {
    directory: Option<PathBuf>,
}

impl LocalFileState {
    /// `<stage>-initial.tfstate`
    pub fn path(core: &ServiceCore) -> String {
        format!("{}-initial.tfstate", core.stage_name.to_lowercase())
    }

    /// The configured directory, or `<APP_HOME>/<project>`.
    pub fn workspace_dir(&self, core: &ServiceCore) -> PathBuf {
        match &self.directory {
            Some(directory) => directory.clone(),
            None => app_home_directory().join(core.project_name.to_lowercase()),
        }
    }
}

impl StateBackend for LocalFileState {
    fn schema() -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            base_schema().clone().merge(
                Schema::new()
                    .field("directory", parsers::parse_path)
                    .rule(
                        "directory",
                        Rule::PathExistence {
                            require_directory: true,
                        },
                    ),
            )
        })
    }

    fn from_attributes(_core: &ServiceCore, attributes: &Attributes) -> Result<Self> {
        Ok(Self {
            directory: attributes.str("directory").map(PathBuf::from),
        })
    }

    fn resources(&self, _core: &ServiceCore, _stack: &mut dyn InfrastructureBackend) -> Result<()> {
        Err(StackmateError::BackendCapability {
            message: "You can't create a new resource for the local file state".to_string(),
        })
    }

    fn backend(&self, core: &ServiceCore, stack: &mut dyn InfrastructureBackend) -> Result<()> {
        stack.set_backend(BackendConfig {
            kind: "local".to_string(),
            attributes: json!({
                "path": Self::path(core),
                "workspace_dir": self.workspace_dir(core).to_string_lossy(),
            }),
        })
    }
}
