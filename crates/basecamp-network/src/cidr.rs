//! Subnet allocation
//!
//! Zone `i` of a `/16` gets two `/24` blocks: public on third octet `2i`,
//! private on `2i + 1`. The third octet runs out after 127 zones.

use basecamp_core::{CoreError, Result};
use ipnet::Ipv4Net;
use std::net::Ipv4Addr;

/// Largest zone count a /16 can hold
pub const MAX_ZONES: usize = 127;

const BASE_PREFIX: u8 = 16;
const SUBNET_PREFIX: u8 = 24;

/// Public and private blocks, index-aligned with the zone list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetAllocation {
    pub base: Ipv4Net,
    pub public: Vec<Ipv4Net>,
    pub private: Vec<Ipv4Net>,
}

impl SubnetAllocation {
    pub fn zone_count(&self) -> usize {
        self.public.len()
    }

    /// `(public, private)` blocks of zone `index`
    pub fn zone(&self, index: usize) -> Option<(Ipv4Net, Ipv4Net)> {
        Some((*self.public.get(index)?, *self.private.get(index)?))
    }
}

/// Parse a base block; it must be a /16 network address
pub fn parse_base(cidr: &str) -> Result<Ipv4Net> {
    let net: Ipv4Net = cidr.trim().parse().map_err(|e| {
        CoreError::allocation(format!("'{}' is not an IPv4 CIDR block: {}", cidr, e))
    })?;

    if net.prefix_len() != BASE_PREFIX {
        return Err(CoreError::allocation(format!(
            "base block '{}' must be a /{}, got /{}",
            cidr,
            BASE_PREFIX,
            net.prefix_len()
        )));
    }
    if net.addr() != net.network() {
        return Err(CoreError::allocation(format!(
            "base block '{}' has host bits set (did you mean {}?)",
            cidr,
            net.trunc()
        )));
    }

    Ok(net)
}

/// Allocate a public and a private /24 for each of `zone_count` zones
pub fn allocate(base: &str, zone_count: usize) -> Result<SubnetAllocation> {
    let net = parse_base(base)?;

    if zone_count == 0 {
        return Err(CoreError::allocation("at least one availability zone is required"));
    }
    if zone_count > MAX_ZONES {
        return Err(CoreError::allocation(format!(
            "{} zones need {} /24 blocks but a /16 has room for {} zones",
            zone_count,
            zone_count * 2,
            MAX_ZONES
        )));
    }

    let [a, b, _, _] = net.network().octets();
    let block = |third: usize| -> Result<Ipv4Net> {
        let third = u8::try_from(third)
            .map_err(|_| CoreError::allocation(format!("third octet {} out of range", third)))?;
        Ipv4Net::new(Ipv4Addr::new(a, b, third, 0), SUBNET_PREFIX)
            .map_err(|e| CoreError::allocation(e.to_string()))
    };

    let mut public = Vec::with_capacity(zone_count);
    let mut private = Vec::with_capacity(zone_count);
    for i in 0..zone_count {
        public.push(block(2 * i)?);
        private.push(block(2 * i + 1)?);
    }

    Ok(SubnetAllocation {
        base: net,
        public,
        private,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use basecamp_core::ErrorKind;
    use std::collections::HashSet;

    fn strings(blocks: &[Ipv4Net]) -> Vec<String> {
        blocks.iter().map(|b| b.to_string()).collect()
    }

    #[test]
    fn test_three_zones() {
        let alloc = allocate("10.0.0.0/16", 3).unwrap();
        assert_eq!(
            strings(&alloc.public),
            vec!["10.0.0.0/24", "10.0.2.0/24", "10.0.4.0/24"]
        );
        assert_eq!(
            strings(&alloc.private),
            vec!["10.0.1.0/24", "10.0.3.0/24", "10.0.5.0/24"]
        );
    }

    #[test]
    fn test_follows_base_block() {
        let alloc = allocate("10.2.0.0/16", 2).unwrap();
        assert_eq!(
            alloc.zone(1).map(|(p, q)| (p.to_string(), q.to_string())),
            Some(("10.2.2.0/24".to_string(), "10.2.3.0/24".to_string()))
        );
        assert_eq!(alloc.zone(2), None);
    }

    #[test]
    fn test_every_zone_count_is_disjoint_and_contained() {
        for n in 1..=MAX_ZONES {
            let alloc = allocate("172.16.0.0/16", n).unwrap();
            let blocks: Vec<Ipv4Net> = alloc.public.iter().chain(&alloc.private).copied().collect();
            assert_eq!(blocks.len(), 2 * n);

            // distinct /24s never overlap
            let distinct: HashSet<Ipv4Net> = blocks.iter().copied().collect();
            assert_eq!(distinct.len(), 2 * n, "zone count {}", n);
            for block in &blocks {
                assert_eq!(block.prefix_len(), 24);
                assert!(alloc.base.contains(block));
            }
        }
    }

    #[test]
    fn test_zone_prefix_is_stable() {
        let small = allocate("10.0.0.0/16", 2).unwrap();
        let large = allocate("10.0.0.0/16", 100).unwrap();
        assert_eq!(small.public[..], large.public[..2]);
        assert_eq!(small.private[..], large.private[..2]);
    }

    #[test]
    fn test_capacity_exhausted() {
        let err = allocate("10.0.0.0/16", MAX_ZONES + 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Allocation);
    }

    #[test]
    fn test_zero_zones() {
        let err = allocate("10.0.0.0/16", 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Allocation);
    }

    #[test]
    fn test_invalid_base() {
        assert!(parse_base("10.0.0.0/8").is_err());
        assert!(parse_base("not-a-cidr").is_err());
        assert!(parse_base("fd00::/16").is_err());

        let err = parse_base("10.0.5.0/16").unwrap_err();
        assert!(err.to_string().contains("10.0.0.0/16"));
    }
}
