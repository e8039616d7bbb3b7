use crate::constants::StorageKind;
use crate::domain::ports::ConfigurationStore;
use crate::utils::error::{Result, StackmateError};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// A configuration file on the local disk.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    path: PathBuf,
}

impl LocalFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ConfigurationStore for LocalFileStore {
    async fn read(&self) -> Result<Vec<u8>> {
        tracing::debug!("Reading configuration from {}", self.path.display());
        Ok(tokio::fs::read(&self.path).await?)
    }

    async fn write(&self, data: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&self.path, data).await?;
        tracing::debug!("Wrote {} bytes to {}", data.len(), self.path.display());
        Ok(())
    }
}

fn option<'a>(options: &'a Map<String, Value>, key: &str, storage: StorageKind) -> Result<&'a str> {
    options
        .get(key)
        .and_then(Value::as_str)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| StackmateError::config(format!("The {} storage needs a '{}' option", storage, key)))
}

/// Builds the store a storage kind and its options describe.
pub async fn adapter_for(
    storage: StorageKind,
    options: &Map<String, Value>,
) -> Result<Box<dyn ConfigurationStore>> {
    match storage {
        StorageKind::File => Ok(Box::new(LocalFileStore::new(option(options, "path", storage)?))),
        StorageKind::AwsParams => parameter_store(options).await,
    }
}

#[cfg(feature = "aws")]
async fn parameter_store(options: &Map<String, Value>) -> Result<Box<dyn ConfigurationStore>> {
    let storage = StorageKind::AwsParams;
    let store = ParameterStore::connect(
        option(options, "path", storage)?,
        option(options, "region", storage)?,
        option(options, "key", storage)?,
    )
    .await;
    Ok(Box::new(store))
}

#[cfg(not(feature = "aws"))]
async fn parameter_store(_options: &Map<String, Value>) -> Result<Box<dyn ConfigurationStore>> {
    Err(StackmateError::config(
        "The parameter store needs stackmate built with the 'aws' feature",
    ))
}

#[cfg(feature = "aws")]
pub use ssm::ParameterStore;

#[cfg(feature = "aws")]
mod ssm {
    use crate::constants::{ENV_AWS_ACCESS_KEY_ID, ENV_AWS_SECRET_ACCESS_KEY, ENV_AWS_SESSION_TOKEN};
    use crate::domain::ports::ConfigurationStore;
    use crate::utils::error::{Result, StackmateError};
    use async_trait::async_trait;
    use aws_config::{BehaviorVersion, Region};
    use aws_sdk_ssm::config::Credentials;
    use aws_sdk_ssm::types::ParameterType;
    use aws_sdk_ssm::Client as SsmClient;
    use std::env;

    /// A configuration kept as a KMS-encrypted SSM parameter.
    #[derive(Debug, Clone)]
    pub struct ParameterStore {
        client: SsmClient,
        name: String,
        key: String,
    }

    impl ParameterStore {
        pub fn new(client: SsmClient, name: impl Into<String>, key: impl Into<String>) -> Self {
            Self {
                client,
                name: name.into(),
                key: key.into(),
            }
        }

        /// Uses the `STACKMATE_*` credentials when set, the default AWS chain otherwise.
        pub async fn connect(name: &str, region: &str, key: &str) -> Self {
            let mut loader =
                aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.to_string()));

            if let (Ok(id), Ok(secret)) = (
                env::var(ENV_AWS_ACCESS_KEY_ID),
                env::var(ENV_AWS_SECRET_ACCESS_KEY),
            ) {
                let token = env::var(ENV_AWS_SESSION_TOKEN).ok();
                loader = loader.credentials_provider(Credentials::new(id, secret, token, None, "stackmate"));
            }

            let config = loader.load().await;
            Self::new(SsmClient::new(&config), name, key)
        }
    }

    #[async_trait]
    impl ConfigurationStore for ParameterStore {
        async fn read(&self) -> Result<Vec<u8>> {
            let output = self
                .client
                .get_parameter()
                .name(&self.name)
                .with_decryption(true)
                .send()
                .await
                .map_err(|e| StackmateError::config(format!("Failed to read parameter {}: {}", self.name, e)))?;

            output
                .parameter()
                .and_then(|p| p.value())
                .map(|v| v.as_bytes().to_vec())
                .ok_or_else(|| StackmateError::config(format!("Parameter {} has no value", self.name)))
        }

        async fn write(&self, data: &[u8]) -> Result<()> {
            self.client
                .put_parameter()
                .name(&self.name)
                .value(String::from_utf8_lossy(data))
                .r#type(ParameterType::SecureString)
                .key_id(&self.key)
                .overwrite(true)
                .send()
                .await
                .map_err(|e| StackmateError::config(format!("Failed to write parameter {}: {}", self.name, e)))?;

            tracing::debug!("Wrote parameter {}", self.name);
            Ok(())
        }
    }
}
