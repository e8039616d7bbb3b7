use crate::utils::error::{Result, StackmateError};
use std::net::Ipv4Addr;

/// Lowercased, dash-joined identifier safe to use as a resource id.
pub fn identifier(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .map(|p| {
            p.to_lowercase()
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// CIDR blocks for a network: the root block first, then one block per subnet.
///
/// `cidr_blocks("10.0.0.0", 16, 2, 24)` gives `10.0.0.0/16`, `10.0.1.0/24`, `10.0.2.0/24`.
pub fn cidr_blocks(ip: &str, bitmask: u8, subnets: u8, subnet_bitmask: u8) -> Result<Vec<String>> {
    let address: Ipv4Addr = ip.parse().map_err(|_| StackmateError::ConfigError {
        message: format!("'{}' is not a valid IPv4 address", ip),
    })?;

    if bitmask > 32 || subnet_bitmask > 32 || subnet_bitmask < bitmask {
        return Err(StackmateError::ConfigError {
            message: format!("Invalid bitmasks /{} and /{}", bitmask, subnet_bitmask),
        });
    }

    let mask = if bitmask == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(bitmask))
    };
    let root = Ipv4Addr::from(u32::from(address) & mask);
    let [first, second, _, _] = root.octets();

    let mut blocks = vec![format!("{}/{}", root, bitmask)];
    blocks.extend((1..=subnets).map(|n| format!("{}.{}.{}.0/{}", first, second, n, subnet_bitmask)));

    Ok(blocks)
}
