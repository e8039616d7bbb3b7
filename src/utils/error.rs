use crate::core::attributes::FieldError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StackmateError {
    #[error("Invalid configuration: {}", join_messages(.errors, "; "))]
    ConfigurationShape { errors: Vec<String> },

    #[error("Service '{service}' has invalid attributes: {}", join_fields(.fields))]
    FieldValidation {
        service: String,
        fields: Vec<FieldError>,
    },

    #[error("Stage '{stage}' has invalid links from '{service}' to '{}'", join_messages(.missing, "', '"))]
    DanglingLink {
        stage: String,
        service: String,
        missing: Vec<String>,
    },

    #[error("Service {service_type} for {provider} is not supported, yet")]
    UnsupportedServiceType {
        service_type: String,
        provider: String,
    },

    #[error("Invalid region '{region}' for provider {provider}")]
    InvalidRegion { region: String, provider: String },

    #[error("Vault configuration error: {message}")]
    VaultConfiguration { message: String },

    #[error("Backend capability error: {message}")]
    BackendCapability { message: String },

    #[error("Service '{name}' is already registered in stage '{stage}'")]
    DuplicateService { name: String, stage: String },

    #[error("Cannot register '{name}': links for stage '{stage}' are already resolved")]
    RegistrySealed { name: String, stage: String },

    #[error("Resource '{id}' is already defined in stack '{stack}'")]
    DuplicateResource { id: String, stack: String },

    #[error("Stage '{stage}' is invalid: {}", join_errors(.errors))]
    Stage {
        stage: String,
        errors: Vec<StackmateError>,
    },

    #[error("{}", join_errors(.errors))]
    Invalid { errors: Vec<StackmateError> },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("TOML parsing error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("Pattern error: {0}")]
    RegexError(#[from] regex::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Registration,
    Provisioning,
    Io,
}

impl StackmateError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigurationShape { .. }
            | Self::FieldValidation { .. }
            | Self::DanglingLink { .. }
            | Self::VaultConfiguration { .. }
            | Self::Stage { .. }
            | Self::Invalid { .. }
            | Self::ConfigError { .. } => ErrorCategory::Configuration,
            Self::UnsupportedServiceType { .. }
            | Self::InvalidRegion { .. }
            | Self::DuplicateService { .. }
            | Self::RegistrySealed { .. } => ErrorCategory::Registration,
            Self::BackendCapability { .. } | Self::DuplicateResource { .. } => {
                ErrorCategory::Provisioning
            }
            Self::IoError(_)
            | Self::JsonError(_)
            | Self::YamlError(_)
            | Self::TomlParseError(_)
            | Self::TomlSerializeError(_)
            | Self::RegexError(_) => ErrorCategory::Io,
        }
    }

    /// Flattens `Invalid` and `Stage` aggregates into their leaf errors.
    pub fn flatten(&self) -> Vec<&StackmateError> {
        match self {
            Self::Invalid { errors } | Self::Stage { errors, .. } => {
                errors.iter().flat_map(|e| e.flatten()).collect()
            }
            other => vec![other],
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }
}

fn join_messages(messages: &[String], separator: &str) -> String {
    messages.join(separator)
}

fn join_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_errors(errors: &[StackmateError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, StackmateError>;
