//! Amazon Web Services: EC2 instances, RDS databases, ElastiCache clusters and S3 state.

pub mod cache;
pub mod database;
pub mod instance;
pub mod provider;
pub mod state;

pub use cache::Cache;
pub use database::Database;
pub use instance::Instance;
pub use provider::AwsProvider;
pub use state::S3State;

use crate::constants::{Provider, ServiceType};
use crate::core::service::ServiceKind;
use crate::core::state::{StateBackend, StateService};
use crate::providers::ProviderCatalog;

pub const INSTANCE_SIZES: &[&str] = &[
    "t2.nano", "t2.micro", "t2.small", "t2.medium", "t2.large", "t2.xlarge", "t3.nano",
    "t3.micro", "t3.small", "t3.medium", "t3.large", "t3.xlarge", "m5.large", "m5.xlarge",
    "m5.2xlarge", "c5.large", "c5.xlarge", "c5.2xlarge", "r5.large", "r5.xlarge",
];

pub const DATABASE_SIZES: &[&str] = &[
    "db.t2.micro", "db.t2.small", "db.t2.medium", "db.t3.micro", "db.t3.small", "db.t3.medium",
    "db.t3.large", "db.m5.large", "db.m5.xlarge", "db.m5.2xlarge", "db.r5.large", "db.r5.xlarge",
];

pub const CACHE_SIZES: &[&str] = &[
    "cache.t2.micro", "cache.t2.small", "cache.t2.medium", "cache.t3.micro", "cache.t3.small",
    "cache.t3.medium", "cache.m5.large", "cache.m5.xlarge", "cache.r5.large", "cache.r5.xlarge",
];

pub static CATALOG: ProviderCatalog = ProviderCatalog {
    provider: Provider::Aws,
    kinds: &[
        ServiceKind {
            service_type: ServiceType::Instance,
            schema: Instance::schema,
            build: Instance::build,
        },
        ServiceKind {
            service_type: ServiceType::Mysql,
            schema: Database::mysql_schema,
            build: Database::mysql,
        },
        ServiceKind {
            service_type: ServiceType::Postgresql,
            schema: Database::postgresql_schema,
            build: Database::postgresql,
        },
        ServiceKind {
            service_type: ServiceType::Redis,
            schema: Cache::redis_schema,
            build: Cache::redis,
        },
        ServiceKind {
            service_type: ServiceType::Memcached,
            schema: Cache::memcached_schema,
            build: Cache::memcached,
        },
        ServiceKind {
            service_type: ServiceType::State,
            schema: <S3State as StateBackend>::schema,
            build: StateService::<S3State>::build,
        },
    ],
    provider_service: AwsProvider::shared,
};
