use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_STAGE: &str = "production";
pub const DEFAULT_PROJECT_FILE: &str = ".stackmate/config.yml";
pub const OUTPUT_DIRECTORY_VAR: &str = "STACKMATE_OUTPUT";

pub const ENV_AWS_ACCESS_KEY_ID: &str = "STACKMATE_AWS_ACCESS_KEY_ID";
pub const ENV_AWS_SECRET_ACCESS_KEY: &str = "STACKMATE_SECRET_ACCESS_KEY";
pub const ENV_AWS_SESSION_TOKEN: &str = "STACKMATE_AWS_SESSION_TOKEN";

/// Home directory for local artifacts, `$STACKMATE_OUTPUT` or `~/.stackmate`.
pub fn app_home_directory() -> PathBuf {
    if let Ok(dir) = std::env::var(OUTPUT_DIRECTORY_VAR) {
        return PathBuf::from(dir);
    }

    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".stackmate")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Aws,
    Local,
}

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::Aws, Provider::Local];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Aws => "aws",
            Provider::Local => "local",
        }
    }

    /// Region assigned to services of this provider when nothing else applies.
    pub fn default_region(&self) -> Option<&'static str> {
        match self {
            Provider::Aws => None,
            Provider::Local => Some("local"),
        }
    }

    /// The provider's region table: region code → human-readable name.
    pub fn regions(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Provider::Aws => AWS_REGIONS,
            Provider::Local => LOCAL_REGIONS,
        }
    }

    pub fn is_valid_region(&self, region: &str) -> bool {
        !region.trim().is_empty() && self.regions().iter().any(|(code, _)| *code == region)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Provider::ALL
            .iter()
            .find(|p| p.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown provider '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    Instance,
    Cdn,
    Mysql,
    Postgresql,
    Redis,
    Memcached,
    Mailer,
    Volume,
    Ssl,
    Dns,
    #[serde(rename = "loadbalancer")]
    LoadBalancer,
    #[serde(rename = "elasticstorage")]
    ElasticStorage,
    Networking,
    State,
    Vault,
    Provider,
}

impl ServiceType {
    pub const ALL: [ServiceType; 16] = [
        ServiceType::Instance,
        ServiceType::Cdn,
        ServiceType::Mysql,
        ServiceType::Postgresql,
        ServiceType::Redis,
        ServiceType::Memcached,
        ServiceType::Mailer,
        ServiceType::Volume,
        ServiceType::Ssl,
        ServiceType::Dns,
        ServiceType::LoadBalancer,
        ServiceType::ElasticStorage,
        ServiceType::Networking,
        ServiceType::State,
        ServiceType::Vault,
        ServiceType::Provider,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Instance => "instance",
            ServiceType::Cdn => "cdn",
            ServiceType::Mysql => "mysql",
            ServiceType::Postgresql => "postgresql",
            ServiceType::Redis => "redis",
            ServiceType::Memcached => "memcached",
            ServiceType::Mailer => "mailer",
            ServiceType::Volume => "volume",
            ServiceType::Ssl => "ssl",
            ServiceType::Dns => "dns",
            ServiceType::LoadBalancer => "loadbalancer",
            ServiceType::ElasticStorage => "elasticstorage",
            ServiceType::Networking => "networking",
            ServiceType::State => "state",
            ServiceType::Vault => "vault",
            ServiceType::Provider => "provider",
        }
    }

    /// Whether the type may appear under a stage in the project configuration.
    pub fn is_declarable(&self) -> bool {
        !matches!(self, ServiceType::Vault | ServiceType::Provider)
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ServiceType::ALL
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown service type '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageKind {
    #[serde(rename = "file")]
    File,
    #[serde(rename = "aws/ssm/parameter-store")]
    AwsParams,
}

impl StorageKind {
    pub const ALL: [StorageKind; 2] = [StorageKind::File, StorageKind::AwsParams];

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::File => "file",
            StorageKind::AwsParams => "aws/ssm/parameter-store",
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StorageKind::ALL
            .iter()
            .find(|k| k.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown storage '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Yml,
    Json,
    Toml,
}

impl Format {
    /// Guesses the format from a file extension, defaulting to YAML.
    pub fn from_path(path: &std::path::Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Format::Json,
            Some("toml") => Format::Toml,
            _ => Format::Yml,
        }
    }
}

pub const AWS_REGIONS: &[(&str, &str)] = &[
    ("us-east-1", "US East (N. Virginia)"),
    ("us-east-2", "US East (Ohio)"),
    ("us-west-1", "US West (N. California)"),
    ("us-west-2", "US West (Oregon)"),
    ("af-south-1", "Africa (Cape Town)"),
    ("ap-east-1", "Asia Pacific (Hong Kong)"),
    ("ap-south-1", "Asia Pacific (Mumbai)"),
    ("ap-northeast-1", "Asia Pacific (Tokyo)"),
    ("ap-northeast-2", "Asia Pacific (Seoul)"),
    ("ap-northeast-3", "Asia Pacific (Osaka)"),
    ("ap-southeast-1", "Asia Pacific (Singapore)"),
    ("ap-southeast-2", "Asia Pacific (Sydney)"),
    ("ca-central-1", "Canada (Central)"),
    ("eu-central-1", "Europe (Frankfurt)"),
    ("eu-west-1", "Europe (Ireland)"),
    ("eu-west-2", "Europe (London)"),
    ("eu-west-3", "Europe (Paris)"),
    ("eu-south-1", "Europe (Milan)"),
    ("eu-north-1", "Europe (Stockholm)"),
    ("me-south-1", "Middle East (Bahrain)"),
    ("sa-east-1", "South America (São Paulo)"),
];

pub const LOCAL_REGIONS: &[(&str, &str)] = &[("local", "Local machine")];
