use super::INSTANCE_SIZES;
use crate::constants::ServiceType;
use crate::core::attributes::{parsers, Attributes, Schema};
use crate::core::capabilities::{unsigned, Capability, MultiNode, Sizeable, Storable};
use crate::core::service::{base_schema, Service, ServiceCore};
use crate::domain::model::Resource;
use crate::domain::ports::InfrastructureBackend;
use crate::utils::error::Result;
use serde_json::json;
use std::sync::OnceLock;

pub const DEFAULT_IMAGE: &str = "ubuntu-22.04";

#[derive(Debug)]
pub struct Instance {
    core: ServiceCore,
    size: String,
    storage: u64,
    nodes: u32,
    image: String,
}

impl Instance {
    pub fn schema() -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Capability::compose(
                base_schema(),
                &[
                    Capability::Sizeable {
                        sizes: INSTANCE_SIZES,
                    },
                    Capability::Storable,
                    Capability::MultiNode,
                ],
                Schema::new()
                    .field("image", parsers::parse_string)
                    .default_value("image", DEFAULT_IMAGE),
            )
        })
    }

    pub fn new(core: ServiceCore, attributes: &Attributes) -> Result<Self> {
        Ok(Self {
            size: attributes.require_string("size")?,
            storage: unsigned(&core, "storage", attributes.require_integer("storage")?)?,
            nodes: unsigned(&core, "nodes", attributes.require_integer("nodes")?)?,
            image: attributes.require_string("image")?,
            core,
        })
    }

    pub fn build(core: ServiceCore, attributes: &Attributes) -> Result<Box<dyn Service>> {
        Ok(Box::new(Self::new(core, attributes)?))
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    fn resource(&self) -> Resource {
        let provider = self
            .core
            .provider_service
            .as_ref()
            .map(|p| p.alias());

        Resource::new(
            "aws_instance",
            self.identifier(),
            json!({
                "provider": provider,
                "ami": self.image,
                "instance_type": self.size(),
                "count": self.nodes(),
                "root_block_device": { "volume_size": self.storage() },
                "tags": { "Name": self.name(), "Stage": self.core.stage_name },
            }),
        )
        .depends_on(self.core.dependencies())
    }
}

impl Sizeable for Instance {
    fn size(&self) -> &str {
        &self.size
    }
}

impl Storable for Instance {
    fn storage(&self) -> u64 {
        self.storage
    }
}

impl MultiNode for Instance {
    fn nodes(&self) -> u32 {
        self.nodes
    }
}

impl Service for Instance {
    fn core(&self) -> &ServiceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ServiceCore {
        &mut self.core
    }

    fn service_type(&self) -> ServiceType {
        ServiceType::Instance
    }

    fn on_deploy(&mut self, stack: &mut dyn InfrastructureBackend) -> Result<()> {
        stack.add_resource(self.resource())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::service::ServiceKind;
    use crate::core::stack::Stack;
    use crate::utils::error::StackmateError;
    use serde_json::Value;

    fn kind() -> ServiceKind {
        ServiceKind {
            service_type: ServiceType::Instance,
            schema: Instance::schema,
            build: Instance::build,
        }
    }

    fn raw(value: Value) -> serde_json::Map<String, Value> {
        let mut raw = value.as_object().cloned().unwrap();
        raw.insert("provider".into(), json!("aws"));
        raw.insert("region".into(), json!("eu-central-1"));
        raw.insert("stage_name".into(), json!("production"));
        raw
    }

    #[test]
    fn test_defaults_are_applied() {
        let mut service = kind()
            .construct(&raw(json!({ "name": "app", "size": "t3.micro", "storage": 10 })))
            .unwrap();

        let mut stack = Stack::new("production");
        service.on_deploy(&mut stack).unwrap();

        let instance = stack.resource("app-production").unwrap();
        assert_eq!(instance.attributes["count"], 1);
        assert_eq!(instance.attributes["ami"], DEFAULT_IMAGE);
        assert_eq!(instance.attributes["root_block_device"]["volume_size"], 10);
    }

    #[test]
    fn test_every_invalid_field_is_reported() {
        let err = kind()
            .construct(&raw(json!({ "name": "app", "size": "huge", "storage": 0, "nodes": "many" })))
            .unwrap_err();

        let StackmateError::FieldValidation { fields, .. } = err else {
            panic!("expected field validation error");
        };
        let names: Vec<&str> = fields.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(names, vec!["nodes", "size", "storage"]);
    }

    #[test]
    fn test_string_numbers_are_coerced() {
        let service = kind()
            .construct(&raw(json!({ "name": "app", "size": "t3.micro", "storage": "30", "nodes": "3" })))
            .unwrap();
        assert_eq!(service.name(), "app");
    }
}
