//! VPC networking for basecamp
//!
//! - [`cidr`]: deterministic /24 subnet allocation inside a /16
//! - [`topology`]: the VPC, gateways, subnets, NAT and route tables as a
//!   dependency graph

pub mod cidr;
pub mod topology;

pub use cidr::{MAX_ZONES, SubnetAllocation, allocate, parse_base};
pub use topology::{NetworkTopology, RouteTableHandle, SubnetHandle, Visibility};
