//! The credentials vault every stage shares.
//!
//! Consumers only ever talk to the vault through [`VaultService::credentials`];
//! the single state change the vault itself knows about is being registered
//! into a stack on deploy.

use crate::constants::{app_home_directory, ServiceType, StorageKind};
use crate::core::attributes::{parsers, Rule, Schema};
use crate::core::service::{base_schema, Service, ServiceCore};
use crate::domain::model::{CredentialOptions, Credentials, Resource, VaultConfiguration};
use crate::domain::ports::InfrastructureBackend;
use crate::utils::error::{Result, StackmateError};
use rand::Rng;
use serde_json::{json, Map, Value};
use std::sync::OnceLock;

pub const DEFAULT_VAULT_NAME: &str = "stage-vault";
pub const PASSWORD_LENGTH: usize = 16;

const ALPHANUMERIC: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const SPECIAL: &str = "!#$%&*()-_=+[]{}<>:?";

pub trait VaultService: Service {
    /// Issues a username / password pair for `service`.
    fn credentials(
        &self,
        stack: &mut dyn InfrastructureBackend,
        service: &str,
        options: &CredentialOptions,
    ) -> Result<Credentials>;

    fn is_registered(&self) -> bool;
}

#[derive(Debug)]
pub struct StageVault {
    core: ServiceCore,
    storage: StorageKind,
    key: Option<String>,
    registered: bool,
}

impl StageVault {
    pub fn schema() -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            let storages: Vec<&str> = StorageKind::ALL.iter().map(StorageKind::as_str).collect();

            base_schema().clone().merge(
                Schema::new()
                    .field("storage", parsers::parse_string)
                    .rule(
                        "storage",
                        Rule::presence("You have to specify a valid storage for your credentials vault"),
                    )
                    .rule(
                        "storage",
                        Rule::inclusion(storages, "The vault storage is not supported"),
                    )
                    .field("key", parsers::parse_string),
            )
        })
    }

    /// Builds the vault for one stage out of the project's vault block.
    pub fn from_config(
        config: &VaultConfiguration,
        project_name: &str,
        stage_name: &str,
    ) -> Result<Self> {
        if config.storage == StorageKind::AwsParams && (config.key.is_none() || config.region.is_none()) {
            return Err(StackmateError::VaultConfiguration {
                message: "The vault needs to have 'region' and a 'key' ARN to encrypt values".to_string(),
            });
        }

        let provider = match config.storage {
            StorageKind::AwsParams => "aws",
            StorageKind::File => "local",
        };
        let region = match config.storage {
            StorageKind::AwsParams => config.region.clone().unwrap_or_default(),
            StorageKind::File => "local".to_string(),
        };

        let mut raw = Map::new();
        raw.insert("name".into(), Value::from(DEFAULT_VAULT_NAME));
        raw.insert("provider".into(), Value::from(provider));
        raw.insert("region".into(), Value::from(region));
        raw.insert("project_name".into(), Value::from(project_name));
        raw.insert("stage_name".into(), Value::from(stage_name));
        raw.insert("storage".into(), Value::from(config.storage.as_str()));
        if let Some(key) = &config.key {
            raw.insert("key".into(), Value::from(key.as_str()));
        }

        let attributes = Self::schema().apply(DEFAULT_VAULT_NAME, &raw)?;

        Ok(Self {
            core: ServiceCore::from_attributes(&attributes)?,
            storage: config.storage,
            key: attributes.str("key").map(str::to_string),
            registered: false,
        })
    }

    pub fn storage(&self) -> StorageKind {
        self.storage
    }

    fn username(service: &str, root: bool) -> String {
        let mut base: String = service
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
            .collect();
        if !base.starts_with(|c: char| c.is_ascii_alphabetic()) {
            base.insert(0, 'u');
        }

        let suffix = if root { "_root" } else { "" };
        base.truncate(16 - suffix.len());
        format!("{}{}", base, suffix)
    }

    fn password(options: &CredentialOptions) -> Result<String> {
        let mut charset: Vec<char> = ALPHANUMERIC.chars().collect();
        if options.special {
            charset.extend(SPECIAL.chars());
        }
        charset.retain(|c| !options.exclude.contains(c));

        if charset.is_empty() {
            return Err(StackmateError::VaultConfiguration {
                message: "Every password character is excluded".to_string(),
            });
        }

        let mut rng = rand::thread_rng();
        Ok((0..PASSWORD_LENGTH)
            .map(|_| charset[rng.gen_range(0..charset.len())])
            .collect())
    }

    fn secret(&self, service: &str, options: &CredentialOptions, credentials: &Credentials) -> Resource {
        let scope = if options.root { "root-credentials" } else { "credentials" };
        let id = format!("{}-{}-{}", service, self.core.stage_name, scope).to_lowercase();
        let content = json!({
            "username": credentials.username,
            "password": credentials.password,
        });

        match self.storage {
            StorageKind::AwsParams => Resource::new(
                "aws_ssm_parameter",
                id,
                json!({
                    "name": format!("/{}/{}/{}/{}", self.core.project_name, self.core.stage_name, service, scope),
                    "type": "SecureString",
                    "key_id": self.key,
                    "value": content.to_string(),
                }),
            ),
            StorageKind::File => {
                let path = app_home_directory()
                    .join(self.core.project_name.to_lowercase())
                    .join(self.core.stage_name.to_lowercase())
                    .join(format!("{}-{}.json", service, scope));
                Resource::new(
                    "local_sensitive_file",
                    id,
                    json!({
                        "filename": path.to_string_lossy(),
                        "content": content.to_string(),
                        "file_permission": "0600",
                    }),
                )
            }
        }
    }
}

impl Service for StageVault {
    fn core(&self) -> &ServiceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ServiceCore {
        &mut self.core
    }

    fn service_type(&self) -> ServiceType {
        ServiceType::Vault
    }

    fn on_deploy(&mut self, stack: &mut dyn InfrastructureBackend) -> Result<()> {
        if !self.registered {
            tracing::debug!("Vault registered into stack {}", stack.stack_name());
            self.registered = true;
        }
        Ok(())
    }
}

impl VaultService for StageVault {
    fn credentials(
        &self,
        stack: &mut dyn InfrastructureBackend,
        service: &str,
        options: &CredentialOptions,
    ) -> Result<Credentials> {
        let credentials = Credentials {
            username: Self::username(service, options.root),
            password: Self::password(options)?,
        };

        stack.add_resource(self.secret(service, options, &credentials))?;
        tracing::debug!("Issued credentials for '{}' (root: {})", service, options.root);

        Ok(credentials)
    }

    fn is_registered(&self) -> bool {
        self.registered
    }
}
