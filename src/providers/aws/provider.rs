use crate::constants::Provider;
use crate::core::provider::ProviderService;
use crate::domain::model::Resource;
use crate::domain::ports::InfrastructureBackend;
use crate::utils::error::Result;
use crate::utils::helpers::{cidr_blocks, identifier};
use serde_json::json;
use std::rc::Rc;

pub const DEFAULT_IP: &str = "10.0.0.0";
pub const DEFAULT_BITMASK: u8 = 16;
pub const DEFAULT_SUBNETS: u8 = 2;
pub const DEFAULT_SUBNET_BITMASK: u8 = 24;

/// The `aws` provider of one region, plus the network every service in it shares.
#[derive(Debug, Clone)]
pub struct AwsProvider {
    region: String,
    profile: Option<String>,
    ip: String,
}

impl AwsProvider {
    pub fn new(region: impl Into<String>, profile: Option<String>) -> Self {
        Self {
            region: region.into(),
            profile,
            ip: DEFAULT_IP.to_string(),
        }
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = ip.into();
        self
    }

    pub fn shared(region: &str, profile: Option<&str>) -> Rc<dyn ProviderService> {
        Rc::new(Self::new(region, profile.map(str::to_string)))
    }

    pub fn vpc_id(&self) -> String {
        identifier(&["vpc", &self.region])
    }

    fn provider_id(&self) -> String {
        identifier(&["provider", "aws", &self.region])
    }
}

impl ProviderService for AwsProvider {
    fn provider(&self) -> Provider {
        Provider::Aws
    }

    fn region(&self) -> &str {
        &self.region
    }

    fn profile(&self) -> Option<&str> {
        self.profile.as_deref()
    }

    fn bootstrap(&self, stack: &mut dyn InfrastructureBackend) -> Result<()> {
        let id = self.provider_id();
        if stack.has_resource(&id) {
            return Ok(());
        }

        stack.add_resource(Resource::new(
            "provider",
            id,
            json!({
                "source": "aws",
                "alias": self.alias(),
                "region": self.region,
                "profile": self.profile,
            }),
        ))
    }

    fn prerequisites(&self, stack: &mut dyn InfrastructureBackend) -> Result<()> {
        let vpc = self.vpc_id();
        if stack.has_resource(&vpc) {
            return Ok(());
        }

        let blocks = cidr_blocks(&self.ip, DEFAULT_BITMASK, DEFAULT_SUBNETS, DEFAULT_SUBNET_BITMASK)?;
        let (network, subnets) = blocks.split_at(1);

        stack.add_resource(Resource::new(
            "aws_vpc",
            vpc.clone(),
            json!({
                "provider": self.alias(),
                "cidr_block": network[0],
                "enable_dns_hostnames": true,
                "enable_dns_support": true,
            }),
        ))?;

        for (index, block) in subnets.iter().enumerate() {
            let id = identifier(&["subnet", &self.region, &(index + 1).to_string()]);
            stack.add_resource(
                Resource::new(
                    "aws_subnet",
                    id,
                    json!({
                        "provider": self.alias(),
                        "vpc_id": vpc,
                        "cidr_block": block,
                    }),
                )
                .depends_on([vpc.as_str()]),
            )?;
        }

        tracing::debug!("Network for {} uses {}", self.region, network[0]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::stack::Stack;

    #[test]
    fn test_bootstrap_is_idempotent() {
        let provider = AwsProvider::new("eu-central-1", Some("ops".to_string()));
        let mut stack = Stack::new("production");

        provider.bootstrap(&mut stack).unwrap();
        provider.bootstrap(&mut stack).unwrap();

        let blocks: Vec<_> = stack.resources_of_kind("provider").collect();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].attributes["region"], "eu-central-1");
        assert_eq!(blocks[0].attributes["profile"], "ops");
    }

    #[test]
    fn test_prerequisites_declare_network() {
        let provider = AwsProvider::new("eu-central-1", None).with_ip("172.16.4.1");
        let mut stack = Stack::new("production");
        provider.prerequisites(&mut stack).unwrap();

        let vpc = stack.resource("vpc-eu-central-1").unwrap();
        assert_eq!(vpc.attributes["cidr_block"], "172.16.0.0/16");

        let subnets: Vec<_> = stack.resources_of_kind("aws_subnet").collect();
        assert_eq!(subnets.len(), 2);
        assert_eq!(subnets[1].attributes["cidr_block"], "172.16.2.0/24");
        assert_eq!(subnets[0].depends_on, vec!["vpc-eu-central-1".to_string()]);
    }
}
