use super::CACHE_SIZES;
use crate::constants::ServiceType;
use crate::core::attributes::{parsers, Attributes, Rule, Schema};
use crate::core::capabilities::{unsigned, Capability, MultiNode, Sizeable, Versioned};
use crate::core::service::{base_schema, Service, ServiceCore};
use crate::domain::model::Resource;
use crate::domain::ports::InfrastructureBackend;
use crate::utils::error::Result;
use serde_json::json;
use std::sync::OnceLock;

fn schema_for(engine: &'static str, port: u16, version: &'static str) -> Schema {
    Capability::compose(
        base_schema(),
        &[
            Capability::Sizeable { sizes: CACHE_SIZES },
            Capability::Versioned,
            Capability::MultiNode,
        ],
        Schema::new()
            .field("engine", parsers::parse_string)
            .rule(
                "engine",
                Rule::inclusion([engine], format!("The cache engine has to be {}", engine)),
            )
            .default_value("engine", engine)
            .field("port", parsers::parse_integer)
            .rule("port", Rule::greater_than(0, "The port has to be a positive number"))
            .rule("port", Rule::at_most(i64::from(u16::MAX), "The port has to be lower than 65536"))
            .default_value("port", port),
    )
    .default_value("version", version)
}

/// An ElastiCache cluster running Redis or Memcached.
#[derive(Debug)]
pub struct Cache {
    core: ServiceCore,
    service_type: ServiceType,
    size: String,
    version: String,
    nodes: u32,
    engine: String,
    port: u16,
}

impl Cache {
    pub fn redis_schema() -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| schema_for("redis", 6379, "6.2"))
    }

    pub fn memcached_schema() -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| schema_for("memcached", 11211, "1.6.17"))
    }

    pub fn redis(core: ServiceCore, attributes: &Attributes) -> Result<Box<dyn Service>> {
        Ok(Box::new(Self::new(ServiceType::Redis, core, attributes)?))
    }

    pub fn memcached(core: ServiceCore, attributes: &Attributes) -> Result<Box<dyn Service>> {
        Ok(Box::new(Self::new(ServiceType::Memcached, core, attributes)?))
    }

    pub fn new(service_type: ServiceType, core: ServiceCore, attributes: &Attributes) -> Result<Self> {
        Ok(Self {
            service_type,
            size: attributes.require_string("size")?,
            version: attributes.require_string("version")?,
            nodes: unsigned(&core, "nodes", attributes.require_integer("nodes")?)?,
            engine: attributes.require_string("engine")?,
            port: unsigned(&core, "port", attributes.require_integer("port")?)?,
            core,
        })
    }
}

impl Sizeable for Cache {
    fn size(&self) -> &str {
        &self.size
    }
}

impl Versioned for Cache {
    fn version(&self) -> &str {
        &self.version
    }
}

impl MultiNode for Cache {
    fn nodes(&self) -> u32 {
        self.nodes
    }
}

impl Service for Cache {
    fn core(&self) -> &ServiceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ServiceCore {
        &mut self.core
    }

    fn service_type(&self) -> ServiceType {
        self.service_type
    }

    fn on_deploy(&mut self, stack: &mut dyn InfrastructureBackend) -> Result<()> {
        let provider = self.core.provider_service.as_ref().map(|p| p.alias());

        stack.add_resource(
            Resource::new(
                "aws_elasticache_cluster",
                self.identifier(),
                json!({
                    "provider": provider,
                    "cluster_id": self.identifier(),
                    "engine": self.engine,
                    "engine_version": self.version(),
                    "node_type": self.size(),
                    "num_cache_nodes": self.nodes(),
                    "port": self.port,
                }),
            )
            .depends_on(self.core.dependencies()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::stack::Stack;
    use crate::utils::error::StackmateError;

    fn construct(service_type: ServiceType, extra: serde_json::Value) -> Result<Box<dyn Service>> {
        let kind = crate::providers::aws::CATALOG.kind(service_type).unwrap();

        let mut raw = json!({
            "name": "cache",
            "provider": "aws",
            "region": "eu-central-1",
            "stage_name": "production",
            "size": "cache.t3.micro",
        })
        .as_object()
        .cloned()
        .unwrap();
        raw.extend(extra.as_object().cloned().unwrap_or_default());
        kind.construct(&raw)
    }

    #[test]
    fn test_memcached_defaults() {
        let mut cache = construct(ServiceType::Memcached, json!({ "nodes": 2 })).unwrap();
        assert_eq!(cache.service_type(), ServiceType::Memcached);

        let mut stack = Stack::new("production");
        cache.on_deploy(&mut stack).unwrap();

        let cluster = stack.resource("cache-production").unwrap();
        assert_eq!(cluster.attributes["engine"], "memcached");
        assert_eq!(cluster.attributes["port"], 11211);
        assert_eq!(cluster.attributes["num_cache_nodes"], 2);
    }

    #[test]
    fn test_engine_is_fixed_per_kind() {
        let err = construct(ServiceType::Redis, json!({ "engine": "memcached" })).unwrap_err();
        assert!(matches!(err, StackmateError::FieldValidation { .. }));
    }

    #[test]
    fn test_storage_is_not_an_attribute() {
        assert!(!Cache::redis_schema().contains("storage"));
        assert!(construct(ServiceType::Redis, json!({ "storage": 10 })).is_ok());
    }
}
