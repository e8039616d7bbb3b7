//! Loading and persisting the project configuration.
//!
//! A [`Configuration`] pairs a storage (where the bytes live) with a format
//! (how they are encoded). Both adapters are built on first use and reused.

pub mod formatter;
pub mod storage;

pub use formatter::{formatter_for, JsonFormatter, TomlFormatter, YamlFormatter};
#[cfg(feature = "aws")]
pub use storage::ParameterStore;
pub use storage::LocalFileStore;

use crate::constants::{Format, StorageKind};
use crate::domain::model::Project;
use crate::domain::ports::{ConfigurationStore, Formatter};
use crate::utils::error::{Result, StackmateError};
use crate::utils::validation::ValidatorRegistry;
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

/// Replaces `${VAR}` references with the environment's values; unknown variables stay as they are.
pub fn substitute_env_vars(content: &str) -> String {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let Some(re) = PATTERN.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").ok()) else {
        return content.to_string();
    };

    re.replace_all(content, |caps: &Captures| {
        let name = &caps[1];
        std::env::var(name).unwrap_or_else(|_| format!("${{{}}}", name))
    })
    .into_owned()
}

pub struct Configuration {
    storage: StorageKind,
    options: Map<String, Value>,
    format: Format,
    contents: Option<Value>,
    adapter: Option<Box<dyn ConfigurationStore>>,
    formatter: Option<Box<dyn Formatter>>,
}

impl Configuration {
    pub fn new(storage: StorageKind, options: Map<String, Value>, format: Format) -> Self {
        Self {
            storage,
            options,
            format,
            contents: None,
            adapter: None,
            formatter: None,
        }
    }

    /// A local file, its format guessed from the extension.
    pub fn file(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let mut options = Map::new();
        options.insert("path".into(), Value::from(path.to_string_lossy().into_owned()));
        Self::new(StorageKind::File, options, Format::from_path(path))
    }

    pub fn storage(&self) -> StorageKind {
        self.storage
    }

    pub fn format(&self) -> Format {
        self.format
    }

    /// The last document loaded or written.
    pub fn contents(&self) -> Option<&Value> {
        self.contents.as_ref()
    }

    pub async fn storage_adapter(&mut self) -> Result<&dyn ConfigurationStore> {
        if self.adapter.is_none() {
            self.adapter = Some(storage::adapter_for(self.storage, &self.options).await?);
        }

        self.adapter
            .as_deref()
            .ok_or_else(|| StackmateError::config("No storage adapter available"))
    }

    pub fn formatter(&mut self) -> &dyn Formatter {
        let format = self.format;
        &**self.formatter.get_or_insert_with(|| formatter_for(format))
    }

    /// Reads, substitutes environment variables and parses the document.
    pub async fn load(&mut self) -> Result<&Value> {
        let raw = self.storage_adapter().await?.read().await?;
        let text = String::from_utf8(raw)
            .map_err(|e| StackmateError::config(format!("Configuration is not valid UTF-8: {}", e)))?;

        let value = self.formatter().parse(substitute_env_vars(&text).as_bytes())?;
        tracing::info!("Loaded {:?} configuration from {} storage", self.format, self.storage);

        Ok(self.contents.insert(value))
    }

    /// Loads the document and turns it into a validated project.
    pub async fn project(&mut self, validators: &ValidatorRegistry) -> Result<Project> {
        let value = self.load().await?.clone();
        Project::from_value(value, validators)
    }

    pub async fn write(&mut self, value: &Value) -> Result<()> {
        let data = self.formatter().export(value)?;
        self.storage_adapter().await?.write(&data).await?;
        tracing::info!("Wrote {:?} configuration to {} storage", self.format, self.storage);

        self.contents = Some(value.clone());
        Ok(())
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("storage", &self.storage)
            .field("options", &self.options)
            .field("format", &self.format)
            .field("loaded", &self.contents.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_substitute_env_vars() {
        std::env::set_var("STACKMATE_TEST_REGION", "eu-west-1");
        let out = substitute_env_vars("region: ${STACKMATE_TEST_REGION}\nkey: ${STACKMATE_TEST_UNSET}");
        assert_eq!(out, "region: eu-west-1\nkey: ${STACKMATE_TEST_UNSET}");
    }

    #[test]
    fn test_format_follows_extension() {
        assert_eq!(Configuration::file("stackmate.json").format(), Format::Json);
        assert_eq!(Configuration::file("stackmate.toml").format(), Format::Toml);
        assert_eq!(Configuration::file(".stackmate/config.yml").format(), Format::Yml);
    }

    #[tokio::test]
    async fn test_adapters_are_memoized() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut config = Configuration::file(dir.path().join("config.json"));

        let first = config.storage_adapter().await? as *const dyn ConfigurationStore as *const ();
        let second = config.storage_adapter().await? as *const dyn ConfigurationStore as *const ();
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn test_formatter_follows_format() {
        let mut config = Configuration::file("stackmate.toml");
        assert_eq!(config.formatter().export(&json!({ "a": 1 })).unwrap(), b"a = 1\n");
        assert_eq!(config.formatter().parse(b"a = 1").unwrap(), json!({ "a": 1 }));
    }

    #[tokio::test]
    async fn test_write_then_load() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.json");
        let document = json!({ "provider": "aws", "region": "eu-central-1" });

        Configuration::file(&path).write(&document).await?;

        let mut config = Configuration::file(&path);
        assert!(config.contents().is_none());
        assert_eq!(config.load().await?, &document);
        assert_eq!(config.contents(), Some(&document));
        Ok(())
    }

    #[tokio::test]
    async fn test_parameter_store_without_options_fails() {
        let mut config = Configuration::new(StorageKind::AwsParams, Map::new(), Format::Yml);
        assert!(config.load().await.is_err());
    }
}
