//! Capability bundles a service kind composes instead of inheriting.
//!
//! Each [`Capability`] owns its attribute contribution. A kind's schema is
//! `base → capabilities (in order) → overrides`, later entries replacing
//! earlier ones field by field.

use crate::core::attributes::{parsers, FieldError, Rule, Schema};
use crate::core::service::ServiceCore;
use crate::domain::model::Credentials;
use crate::utils::error::{Result, StackmateError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Sizeable { sizes: &'static [&'static str] },
    Storable,
    Versioned,
    MultiNode,
    Rootable,
}

impl Capability {
    pub fn schema(&self) -> Schema {
        match self {
            Capability::Sizeable { sizes } => Schema::new()
                .field("size", parsers::parse_string)
                .rule("size", Rule::presence("You have to specify a size for the service"))
                .rule(
                    "size",
                    Rule::inclusion(
                        sizes.iter(),
                        "The instance size you provided is not a valid instance size",
                    ),
                ),
            Capability::Storable => Schema::new()
                .field("storage", parsers::parse_integer)
                .rule("storage", Rule::presence("You have to specify the storage for your instance(s)"))
                .rule("storage", Rule::greater_than(0, "The storage has to be a positive number")),
            Capability::Versioned => Schema::new()
                .field("version", parsers::parse_string)
                .rule("version", Rule::presence("You have to specify the version to run")),
            Capability::MultiNode => Schema::new()
                .field("nodes", parsers::parse_integer)
                .rule("nodes", Rule::greater_than(0, "You have to provide the number of nodes"))
                .rule("nodes", Rule::at_most(i64::from(u32::MAX), "The number of nodes is too large"))
                .default_value("nodes", 1),
            Capability::Rootable => Schema::new()
                .field("root_credentials", parsers::parse_credentials)
                .rule(
                    "root_credentials",
                    Rule::Credentials {
                        require_username: true,
                        require_password: true,
                    },
                ),
        }
    }

    /// Unions the base schema, every capability, then the kind's own overrides.
    pub fn compose(base: &Schema, capabilities: &[Capability], overrides: Schema) -> Schema {
        capabilities
            .iter()
            .fold(base.clone(), |schema, capability| schema.merge(capability.schema()))
            .merge(overrides)
    }
}

/// Narrows an already validated integer attribute, e.g. `storage` or `nodes`.
pub fn unsigned<T: TryFrom<i64>>(core: &ServiceCore, field: &str, value: i64) -> Result<T> {
    T::try_from(value).map_err(|_| StackmateError::FieldValidation {
        service: core.name.clone(),
        fields: vec![FieldError::new(field, format!("{} is out of range", value))],
    })
}

pub trait Sizeable {
    fn size(&self) -> &str;
}

pub trait Storable {
    fn storage(&self) -> u64;
}

pub trait Versioned {
    fn version(&self) -> &str;
}

pub trait MultiNode {
    fn nodes(&self) -> u32;
}

pub trait Rootable {
    /// Credentials given in the configuration, if any; the vault issues them otherwise.
    fn root_credentials(&self) -> Option<&Credentials>;
}
