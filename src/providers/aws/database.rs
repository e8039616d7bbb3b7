//! RDS-backed MySQL and PostgreSQL services.

use super::DATABASE_SIZES;
use crate::constants::ServiceType;
use crate::core::attributes::{parsers, Attributes, Rule, Schema};
use crate::core::capabilities::{unsigned, Capability, MultiNode, Rootable, Sizeable, Storable, Versioned};
use crate::core::service::{base_schema, Association, Service, ServiceCore};
use crate::domain::model::{CredentialOptions, Credentials, Resource};
use crate::domain::ports::InfrastructureBackend;
use crate::utils::error::Result;
use serde_json::json;
use std::sync::OnceLock;

/// Characters RDS refuses in a master password.
const PASSWORD_EXCLUDED: [char; 4] = ['/', '@', '"', ' '];

struct Engine {
    service_type: ServiceType,
    engines: &'static [&'static str],
    port: u16,
    version: &'static str,
}

const MYSQL: Engine = Engine {
    service_type: ServiceType::Mysql,
    engines: &["mysql", "mariadb"],
    port: 3306,
    version: "8.0",
};

const POSTGRESQL: Engine = Engine {
    service_type: ServiceType::Postgresql,
    engines: &["postgres"],
    port: 5432,
    version: "14.7",
};

fn schema_for(engine: &Engine) -> Schema {
    Capability::compose(
        base_schema(),
        &[
            Capability::Sizeable {
                sizes: DATABASE_SIZES,
            },
            Capability::Storable,
            Capability::Versioned,
            Capability::MultiNode,
            Capability::Rootable,
        ],
        Schema::new()
            .field("engine", parsers::parse_string)
            .rule("engine", Rule::presence("You have to specify an engine to use"))
            .rule(
                "engine",
                Rule::inclusion(
                    engine.engines,
                    format!(
                        "The database engine is not valid. Available choices are: {}",
                        engine.engines.join(", ")
                    ),
                ),
            )
            .default_value("engine", engine.engines[0])
            .field("port", parsers::parse_integer)
            .rule(
                "port",
                Rule::presence("You have to specify a port number for the database to connect"),
            )
            .rule("port", Rule::greater_than(0, "The port has to be a positive number"))
            .rule("port", Rule::at_most(i64::from(u16::MAX), "The port has to be lower than 65536"))
            .default_value("port", engine.port)
            .field("database", parsers::parse_string)
            .rule(
                "database",
                Rule::format(
                    "([a-z0-9_]+)?",
                    "You can only use letters, numbers and _ for the database name",
                ),
            ),
    )
    .default_value("version", engine.version)
}

#[derive(Debug)]
pub struct Database {
    core: ServiceCore,
    service_type: ServiceType,
    size: String,
    storage: u64,
    version: String,
    nodes: u32,
    engine: String,
    port: u16,
    database: Option<String>,
    root_credentials: Option<Credentials>,
}

impl Database {
    pub fn mysql_schema() -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| schema_for(&MYSQL))
    }

    pub fn postgresql_schema() -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| schema_for(&POSTGRESQL))
    }

    pub fn mysql(core: ServiceCore, attributes: &Attributes) -> Result<Box<dyn Service>> {
        Ok(Box::new(Self::new(MYSQL.service_type, core, attributes)?))
    }

    pub fn postgresql(core: ServiceCore, attributes: &Attributes) -> Result<Box<dyn Service>> {
        Ok(Box::new(Self::new(POSTGRESQL.service_type, core, attributes)?))
    }

    pub fn new(service_type: ServiceType, core: ServiceCore, attributes: &Attributes) -> Result<Self> {
        Ok(Self {
            service_type,
            size: attributes.require_string("size")?,
            storage: unsigned(&core, "storage", attributes.require_integer("storage")?)?,
            version: attributes.require_string("version")?,
            nodes: unsigned(&core, "nodes", attributes.require_integer("nodes")?)?,
            engine: attributes.require_string("engine")?,
            port: unsigned(&core, "port", attributes.require_integer("port")?)?,
            database: attributes
                .str("database")
                .filter(|d| !d.is_empty())
                .map(str::to_string),
            root_credentials: attributes.credentials("root_credentials"),
            core,
        })
    }

    pub fn engine(&self) -> &str {
        &self.engine
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Configured root credentials, or a fresh pair issued by the stage vault.
    fn master_credentials(&self, stack: &mut dyn InfrastructureBackend) -> Result<Credentials> {
        if let Some(credentials) = self.root_credentials() {
            return Ok(credentials.clone());
        }

        let options = CredentialOptions {
            root: true,
            special: true,
            exclude: PASSWORD_EXCLUDED.to_vec(),
        };
        let vault = self.core.vault()?;
        let credentials = vault.borrow().credentials(stack, self.name(), &options)?;
        Ok(credentials)
    }
}

impl Sizeable for Database {
    fn size(&self) -> &str {
        &self.size
    }
}

impl Storable for Database {
    fn storage(&self) -> u64 {
        self.storage
    }
}

impl Versioned for Database {
    fn version(&self) -> &str {
        &self.version
    }
}

impl MultiNode for Database {
    fn nodes(&self) -> u32 {
        self.nodes
    }
}

impl Rootable for Database {
    fn root_credentials(&self) -> Option<&Credentials> {
        self.root_credentials.as_ref()
    }
}

impl Service for Database {
    fn core(&self) -> &ServiceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ServiceCore {
        &mut self.core
    }

    fn service_type(&self) -> ServiceType {
        self.service_type
    }

    /// Linked services become dependencies; instances linking here become clients.
    fn associations(&self) -> Vec<Association> {
        let name = self.name().to_string();
        vec![
            Association::linked(self.links()),
            Association::new(
                move |target| {
                    target.service_type == ServiceType::Instance && target.links.contains(&name)
                },
                |core, target| core.allow_client(target),
            ),
        ]
    }

    fn on_deploy(&mut self, stack: &mut dyn InfrastructureBackend) -> Result<()> {
        let root = self.master_credentials(stack)?;
        let provider = self.core.provider_service.as_ref().map(|p| p.alias());
        let clients: Vec<&str> = self
            .core
            .clients
            .iter()
            .map(|c| c.identifier.as_str())
            .collect();

        stack.add_resource(
            Resource::new(
                "aws_db_instance",
                self.identifier(),
                json!({
                    "provider": provider,
                    "identifier": self.identifier(),
                    "engine": self.engine,
                    "engine_version": self.version(),
                    "instance_class": self.size(),
                    "allocated_storage": self.storage(),
                    "port": self.port,
                    "db_name": self.database,
                    "username": root.username,
                    "password": root.password,
                    "multi_az": self.nodes() > 1,
                    "allowed_clients": clients,
                    "skip_final_snapshot": false,
                }),
            )
            .depends_on(self.core.dependencies()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cloud::{Cloud, Prerequisites};
    use crate::core::stack::Stack;
    use crate::constants::Provider;
    use crate::utils::error::StackmateError;
    use serde_json::{Map, Value};

    fn cloud() -> Cloud {
        let prerequisites =
            Prerequisites::defaults(Provider::Aws, "eu-central-1", "acme", "production").unwrap();
        Cloud::new(Provider::Aws, "eu-central-1", "production", prerequisites).unwrap()
    }

    fn attributes(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_engine_defaults() {
        let mut cloud = cloud();
        cloud
            .register(
                ServiceType::Postgresql,
                attributes(json!({ "name": "db", "size": "db.t3.micro", "storage": 20 })),
            )
            .unwrap();

        let mut stack = Stack::new("production");
        cloud.deploy(&mut stack).unwrap();

        let db = stack.resource("db-production").unwrap();
        assert_eq!(db.attributes["engine"], "postgres");
        assert_eq!(db.attributes["port"], 5432);
        assert_eq!(db.attributes["engine_version"], "14.7");
        assert_eq!(db.attributes["multi_az"], false);
    }

    #[test]
    fn test_unknown_engine_is_rejected() {
        let mut cloud = cloud();
        let err = cloud
            .register(
                ServiceType::Mysql,
                attributes(json!({
                    "name": "db",
                    "size": "db.t3.micro",
                    "storage": 20,
                    "engine": "oracle",
                    "database": "not valid!",
                })),
            )
            .unwrap_err();

        let StackmateError::FieldValidation { fields, .. } = err else {
            panic!("expected field validation error");
        };
        let names: Vec<&str> = fields.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(names, vec!["engine", "database"]);
    }

    #[test]
    fn test_vault_issues_root_credentials() {
        let mut cloud = cloud();
        cloud
            .register(
                ServiceType::Mysql,
                attributes(json!({ "name": "db", "size": "db.t3.micro", "storage": 20 })),
            )
            .unwrap();

        let mut stack = Stack::new("production");
        cloud.deploy(&mut stack).unwrap();

        assert!(stack.resource("db-production-root-credentials").is_some());
        let db = stack.resource("db-production").unwrap();
        assert_eq!(db.attributes["username"], "db_root");
        let password = db.attributes["password"].as_str().unwrap();
        assert!(password.chars().all(|c| !PASSWORD_EXCLUDED.contains(&c)));
    }

    #[test]
    fn test_configured_root_credentials_win() {
        let mut cloud = cloud();
        cloud
            .register(
                ServiceType::Mysql,
                attributes(json!({
                    "name": "db",
                    "size": "db.t3.micro",
                    "storage": 20,
                    "root_credentials": { "username": "admin", "password": "s3cret-pass" },
                })),
            )
            .unwrap();

        let mut stack = Stack::new("production");
        cloud.deploy(&mut stack).unwrap();

        assert!(stack.resource("db-production-root-credentials").is_none());
        assert_eq!(stack.resource("db-production").unwrap().attributes["username"], "admin");
    }

    #[test]
    fn test_linking_instances_become_clients() {
        let mut cloud = cloud();
        cloud
            .register(
                ServiceType::Mysql,
                attributes(json!({ "name": "db", "size": "db.t3.micro", "storage": 20 })),
            )
            .unwrap();
        cloud
            .register(
                ServiceType::Instance,
                attributes(json!({ "name": "app", "size": "t3.micro", "storage": 10, "links": ["db"] })),
            )
            .unwrap();

        let mut stack = Stack::new("production");
        cloud.deploy(&mut stack).unwrap();

        let db = stack.resource("db-production").unwrap();
        assert_eq!(db.attributes["allowed_clients"], json!(["app-production"]));
        let app = stack.resource("app-production").unwrap();
        assert_eq!(app.depends_on, vec!["db-production".to_string()]);
    }
}
