use crate::domain::model::{BackendConfig, Resource};
use crate::utils::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Where the raw project configuration lives.
#[async_trait]
pub trait ConfigurationStore: Send + Sync {
    async fn read(&self) -> Result<Vec<u8>>;
    async fn write(&self, data: &[u8]) -> Result<()>;
}

/// Converts between raw bytes and a configuration document.
pub trait Formatter: Send + Sync {
    fn parse(&self, data: &[u8]) -> Result<Value>;
    fn export(&self, value: &Value) -> Result<Vec<u8>>;
}

/// Receives the resource definitions services emit from their lifecycle hooks.
pub trait InfrastructureBackend {
    fn stack_name(&self) -> &str;
    fn has_resource(&self, id: &str) -> bool;
    fn add_resource(&mut self, resource: Resource) -> Result<()>;
    fn set_backend(&mut self, backend: BackendConfig) -> Result<()>;
}
