use crate::core::attributes::{parsers, Attributes, Rule, Schema};
use crate::core::service::{base_schema, ServiceCore};
use crate::core::state::StateBackend;
use crate::domain::model::{BackendConfig, Resource};
use crate::domain::ports::InfrastructureBackend;
use crate::utils::error::Result;
use serde_json::json;
use std::sync::OnceLock;

/// State kept in an S3 bucket, locked through a DynamoDB table.
#[derive(Debug, Clone)]
pub struct S3State {
    bucket: String,
}

impl S3State {
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn lock_table(core: &ServiceCore) -> String {
        format!("{}-lock", core.identifier())
    }

    fn key(core: &ServiceCore) -> String {
        format!("{}/{}.tfstate", core.project_name.to_lowercase(), core.stage_name.to_lowercase())
    }
}

impl StateBackend for S3State {
    fn schema() -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            base_schema().clone().merge(
                Schema::new()
                    .field("bucket", parsers::parse_string)
                    .rule("bucket", Rule::presence("You have to specify a bucket to store the state in"))
                    .rule(
                        "bucket",
                        Rule::format(
                            "[a-z0-9][a-z0-9.-]{2,62}",
                            "The bucket name can only contain lowercase letters, numbers, . and -",
                        ),
                    ),
            )
        })
    }

    fn from_attributes(_core: &ServiceCore, attributes: &Attributes) -> Result<Self> {
        Ok(Self {
            bucket: attributes.require_string("bucket")?,
        })
    }

    fn resources(&self, core: &ServiceCore, stack: &mut dyn InfrastructureBackend) -> Result<()> {
        let provider = core.provider_service.as_ref().map(|p| p.alias());
        let bucket = core.identifier();

        stack.add_resource(Resource::new(
            "aws_s3_bucket",
            bucket.clone(),
            json!({
                "provider": provider,
                "bucket": self.bucket,
                "acl": "private",
                "versioning": { "enabled": true },
            }),
        ))?;

        stack.add_resource(
            Resource::new(
                "aws_dynamodb_table",
                Self::lock_table(core),
                json!({
                    "provider": provider,
                    "name": Self::lock_table(core),
                    "hash_key": "LockID",
                    "billing_mode": "PAY_PER_REQUEST",
                    "attribute": [{ "name": "LockID", "type": "S" }],
                }),
            )
            .depends_on([bucket]),
        )
    }

    fn backend(&self, core: &ServiceCore, stack: &mut dyn InfrastructureBackend) -> Result<()> {
        stack.set_backend(BackendConfig {
            kind: "s3".to_string(),
            attributes: json!({
                "bucket": self.bucket,
                "key": Self::key(core),
                "region": core.region,
                "dynamodb_table": Self::lock_table(core),
                "encrypt": true,
            }),
        })
    }
}
