//! Network topology builder
//!
//! Declares one VPC with an internet gateway, a public and a private subnet
//! per availability zone, NAT gateways, one shared public route table and one
//! private route table per zone. Everything is declared into a scratch graph
//! first, so a failure part way through leaves the caller's graph untouched.

use basecamp_core::{
    Component, Declaration, NatMode, NetworkConfig, ResourceGraph, ResourceId, ResourceKind,
    Result, StackNames, escape_literal, id_ref,
};
use ipnet::Ipv4Net;
use serde::Serialize;
use serde_json::{Value, json};

use crate::cidr::allocate;

pub const COMPONENT_TYPE: &str = "basecamp:networking:NetworkTopology";

const DEFAULT_ROUTE: &str = "0.0.0.0/0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubnetHandle {
    pub id: ResourceId,
    pub cidr_block: Ipv4Net,
    pub availability_zone: String,
    pub visibility: Visibility,
}

/// A route table with its default route and subnet associations
#[derive(Debug, Clone, PartialEq)]
pub struct RouteTableHandle {
    pub id: ResourceId,
    pub scope: Visibility,
    pub default_route: ResourceId,
    /// Internet gateway for the public table, a NAT gateway for private ones
    pub target: ResourceId,
    pub associations: Vec<ResourceId>,
}

/// Handles to everything the builder declared
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkTopology {
    pub component: Component,
    pub vpc_cidr: Ipv4Net,
    pub availability_zones: Vec<String>,
    pub nat_mode: NatMode,
    pub vpc: ResourceId,
    pub internet_gateway: ResourceId,
    pub public_subnets: Vec<SubnetHandle>,
    pub private_subnets: Vec<SubnetHandle>,
    pub elastic_ips: Vec<ResourceId>,
    pub nat_gateways: Vec<ResourceId>,
    pub public_route_table: RouteTableHandle,
    pub private_route_tables: Vec<RouteTableHandle>,
}

impl NetworkTopology {
    /// Declare the topology for `stack` into `graph`
    pub fn build(graph: &mut ResourceGraph, stack: &str, network: &NetworkConfig) -> Result<Self> {
        let zones = &network.availability_zones;
        let allocation = allocate(&network.cidr_block, zones.len())?;
        let names = StackNames::new(stack, "networking");
        let component = Component::new(COMPONENT_TYPE, names.prefix());

        tracing::debug!(
            "building network {} over {} zones ({:?} NAT)",
            names.prefix(),
            zones.len(),
            network.nat_mode
        );

        let mut scratch = ResourceGraph::new();
        let mut declare = |kind: ResourceKind, name: String, spec: Value, deps: &[&ResourceId]| {
            scratch.declare(
                Declaration::new(kind, name, spec)
                    .depends_on_all(deps.iter().copied())
                    .owned_by(&component),
            )
        };

        let vpc_name = names.name("vpc");
        let vpc = declare(
            ResourceKind::Vpc,
            vpc_name.clone(),
            json!({
                "cidrBlock": allocation.base.to_string(),
                "enableDnsHostnames": true,
                "enableDnsSupport": true,
                "tags": { "Name": vpc_name, "Type": "networking" },
            }),
            &[],
        )?;

        let igw_name = names.name("igw");
        let internet_gateway = declare(
            ResourceKind::InternetGateway,
            igw_name.clone(),
            json!({ "vpcId": id_ref(&vpc), "tags": { "Name": igw_name } }),
            &[],
        )?;

        let mut subnets =
            |visibility: Visibility, blocks: &[Ipv4Net]| -> Result<Vec<SubnetHandle>> {
                zones
                    .iter()
                    .zip(blocks)
                    .enumerate()
                    .map(|(i, (zone, block))| {
                        let name = names.indexed(visibility.as_str(), i);
                        let mut spec = json!({
                            "vpcId": id_ref(&vpc),
                            "cidrBlock": block.to_string(),
                            "availabilityZone": escape_literal(zone),
                            "tags": { "Name": name, "Type": visibility.as_str() },
                        });
                        if visibility == Visibility::Public {
                            spec["mapPublicIpOnLaunch"] = Value::Bool(true);
                        }
                        Ok(SubnetHandle {
                            id: declare(ResourceKind::Subnet, name, spec, &[])?,
                            cidr_block: *block,
                            availability_zone: zone.clone(),
                            visibility,
                        })
                    })
                    .collect()
            };
        let public_subnets = subnets(Visibility::Public, &allocation.public)?;
        let private_subnets = subnets(Visibility::Private, &allocation.private)?;

        let nat_count = match network.nat_mode {
            NatMode::PerAz => public_subnets.len(),
            NatMode::Single => {
                tracing::warn!(
                    "{}: single NAT gateway in {}; private egress in every zone depends on it",
                    names.prefix(),
                    public_subnets[0].availability_zone
                );
                1
            }
        };

        let mut elastic_ips = Vec::with_capacity(nat_count);
        let mut nat_gateways = Vec::with_capacity(nat_count);
        for (i, subnet) in public_subnets.iter().take(nat_count).enumerate() {
            let eip_name = names.indexed("nat-eip", i);
            let eip = declare(
                ResourceKind::ElasticIp,
                eip_name.clone(),
                json!({ "domain": "vpc", "tags": { "Name": eip_name } }),
                &[],
            )?;
            let nat_name = names.indexed("nat", i);
            let nat = declare(
                ResourceKind::NatGateway,
                nat_name.clone(),
                json!({
                    "allocationId": id_ref(&eip),
                    "subnetId": id_ref(&subnet.id),
                    "tags": { "Name": nat_name },
                }),
                &[],
            )?;
            elastic_ips.push(eip);
            nat_gateways.push(nat);
        }

        let public_rt_name = names.name("public-rt");
        let public_rt = declare(
            ResourceKind::RouteTable,
            public_rt_name.clone(),
            json!({
                "vpcId": id_ref(&vpc),
                "tags": { "Name": public_rt_name, "Type": "public" },
            }),
            &[&internet_gateway],
        )?;
        let public_route = declare(
            ResourceKind::Route,
            names.name("public-route"),
            json!({
                "routeTableId": id_ref(&public_rt),
                "destinationCidrBlock": DEFAULT_ROUTE,
                "gatewayId": id_ref(&internet_gateway),
            }),
            &[],
        )?;
        let public_associations = public_subnets
            .iter()
            .enumerate()
            .map(|(i, subnet)| {
                declare(
                    ResourceKind::RouteTableAssociation,
                    names.indexed("public-rta", i),
                    json!({ "subnetId": id_ref(&subnet.id), "routeTableId": id_ref(&public_rt) }),
                    &[],
                )
            })
            .collect::<Result<Vec<_>>>()?;

        let mut private_route_tables = Vec::with_capacity(private_subnets.len());
        for (i, subnet) in private_subnets.iter().enumerate() {
            let nat = &nat_gateways[i.min(nat_count - 1)];
            let rt_name = names.indexed("private-rt", i);
            let rt = declare(
                ResourceKind::RouteTable,
                rt_name.clone(),
                json!({
                    "vpcId": id_ref(&vpc),
                    "tags": { "Name": rt_name, "Type": "private" },
                }),
                &[nat],
            )?;
            let route = declare(
                ResourceKind::Route,
                names.indexed("private-route", i),
                json!({
                    "routeTableId": id_ref(&rt),
                    "destinationCidrBlock": DEFAULT_ROUTE,
                    "natGatewayId": id_ref(nat),
                }),
                &[],
            )?;
            let association = declare(
                ResourceKind::RouteTableAssociation,
                names.indexed("private-rta", i),
                json!({ "subnetId": id_ref(&subnet.id), "routeTableId": id_ref(&rt) }),
                &[],
            )?;
            private_route_tables.push(RouteTableHandle {
                id: rt,
                scope: Visibility::Private,
                default_route: route,
                target: nat.clone(),
                associations: vec![association],
            });
        }

        let declared = scratch.len();
        graph.absorb(scratch)?;

        tracing::info!(
            "network {}: {} resources, {} zones, {} NAT gateways",
            component.name,
            declared,
            zones.len(),
            nat_gateways.len()
        );

        Ok(Self {
            component,
            vpc_cidr: allocation.base,
            availability_zones: zones.clone(),
            nat_mode: network.nat_mode,
            vpc,
            public_route_table: RouteTableHandle {
                id: public_rt,
                scope: Visibility::Public,
                default_route: public_route,
                target: internet_gateway.clone(),
                associations: public_associations,
            },
            internet_gateway,
            public_subnets,
            private_subnets,
            elastic_ips,
            nat_gateways,
            private_route_tables,
        })
    }

    pub fn vpc_id_ref(&self) -> Value {
        id_ref(&self.vpc)
    }

    pub fn public_subnet_id_refs(&self) -> Vec<Value> {
        self.public_subnets.iter().map(|s| id_ref(&s.id)).collect()
    }

    pub fn private_subnet_id_refs(&self) -> Vec<Value> {
        self.private_subnets.iter().map(|s| id_ref(&s.id)).collect()
    }

    pub fn public_subnet_ids(&self) -> Vec<&ResourceId> {
        self.public_subnets.iter().map(|s| &s.id).collect()
    }

    /// Component outputs: `vpcId`, `publicSubnetIds`, `privateSubnetIds`
    pub fn outputs(&self) -> Value {
        json!({
            "vpcId": self.vpc_id_ref(),
            "publicSubnetIds": self.public_subnet_id_refs(),
            "privateSubnetIds": self.private_subnet_id_refs(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basecamp_core::{DependencyEdge, ErrorKind};

    fn three_zones() -> NetworkConfig {
        NetworkConfig::new("10.0.0.0/16", ["us-east-1a", "us-east-1b", "us-east-1c"])
    }

    fn id(kind: ResourceKind, name: &str) -> ResourceId {
        ResourceId::new(kind, name)
    }

    fn producers(graph: &ResourceGraph, kind: ResourceKind, name: &str) -> Vec<String> {
        let mut deps: Vec<String> = graph
            .get(&id(kind, name))
            .unwrap()
            .depends_on
            .iter()
            .map(|d| d.to_string())
            .collect();
        deps.sort();
        deps
    }

    #[test]
    fn test_three_zone_topology() {
        let mut graph = ResourceGraph::new();
        let topology = NetworkTopology::build(&mut graph, "prod", &three_zones()).unwrap();

        let blocks = |subnets: &[SubnetHandle]| -> Vec<String> {
            subnets.iter().map(|s| s.cidr_block.to_string()).collect()
        };
        assert_eq!(
            blocks(&topology.public_subnets),
            vec!["10.0.0.0/24", "10.0.2.0/24", "10.0.4.0/24"]
        );
        assert_eq!(
            blocks(&topology.private_subnets),
            vec!["10.0.1.0/24", "10.0.3.0/24", "10.0.5.0/24"]
        );

        assert_eq!(graph.count(ResourceKind::NatGateway), 3);
        assert_eq!(graph.count(ResourceKind::ElasticIp), 3);
        assert_eq!(graph.count(ResourceKind::RouteTable), 4);
        assert_eq!(topology.private_route_tables.len(), 3);
        assert_eq!(topology.public_route_table.associations.len(), 3);
        assert_eq!(graph.count(ResourceKind::Route), 4);
        assert_eq!(graph.count(ResourceKind::RouteTableAssociation), 6);
        assert_eq!(graph.len(), 1 + 1 + 6 + 3 + 3 + 1 + 1 + 3 + 3 * 3);
        assert_eq!(graph.children_of("prod-networking").len(), graph.len());
    }

    #[test]
    fn test_edge_order() {
        let mut graph = ResourceGraph::new();
        NetworkTopology::build(&mut graph, "dev", &three_zones()).unwrap();

        assert_eq!(
            producers(&graph, ResourceKind::InternetGateway, "dev-networking-igw"),
            vec!["Vpc/dev-networking-vpc"]
        );
        assert_eq!(
            producers(&graph, ResourceKind::Subnet, "dev-networking-private-2"),
            vec!["Vpc/dev-networking-vpc"]
        );
        assert_eq!(
            producers(&graph, ResourceKind::NatGateway, "dev-networking-nat-1"),
            vec!["ElasticIp/dev-networking-nat-eip-1", "Subnet/dev-networking-public-1"]
        );
        assert_eq!(
            producers(&graph, ResourceKind::RouteTable, "dev-networking-public-rt"),
            vec!["InternetGateway/dev-networking-igw", "Vpc/dev-networking-vpc"]
        );
        assert_eq!(
            producers(&graph, ResourceKind::Route, "dev-networking-public-route"),
            vec!["InternetGateway/dev-networking-igw", "RouteTable/dev-networking-public-rt"]
        );
        assert_eq!(
            producers(&graph, ResourceKind::RouteTableAssociation, "dev-networking-public-rta-2"),
            vec!["RouteTable/dev-networking-public-rt", "Subnet/dev-networking-public-2"]
        );
        assert_eq!(
            producers(&graph, ResourceKind::RouteTable, "dev-networking-private-rt-2"),
            vec!["NatGateway/dev-networking-nat-2", "Vpc/dev-networking-vpc"]
        );
        assert_eq!(
            producers(&graph, ResourceKind::Route, "dev-networking-private-route-0"),
            vec!["NatGateway/dev-networking-nat-0", "RouteTable/dev-networking-private-rt-0"]
        );
        assert_eq!(
            producers(&graph, ResourceKind::RouteTableAssociation, "dev-networking-private-rta-0"),
            vec!["RouteTable/dev-networking-private-rt-0", "Subnet/dev-networking-private-0"]
        );
    }

    #[test]
    fn test_resource_specs() {
        let mut graph = ResourceGraph::new();
        NetworkTopology::build(&mut graph, "dev", &three_zones()).unwrap();

        let vpc = graph.get(&id(ResourceKind::Vpc, "dev-networking-vpc")).unwrap();
        assert_eq!(vpc.spec["cidrBlock"], "10.0.0.0/16");
        assert_eq!(vpc.spec["enableDnsHostnames"], true);
        assert_eq!(vpc.spec["tags"]["Type"], "networking");

        let public = graph.get(&id(ResourceKind::Subnet, "dev-networking-public-1")).unwrap();
        assert_eq!(public.spec["availabilityZone"], "us-east-1b");
        assert_eq!(public.spec["mapPublicIpOnLaunch"], true);
        assert_eq!(public.spec["vpcId"], "${Vpc/dev-networking-vpc.id}");

        let private = graph.get(&id(ResourceKind::Subnet, "dev-networking-private-1")).unwrap();
        assert!(private.spec.get("mapPublicIpOnLaunch").is_none());
        assert_eq!(private.spec["tags"]["Type"], "private");

        let eip = graph.get(&id(ResourceKind::ElasticIp, "dev-networking-nat-eip-0")).unwrap();
        assert_eq!(eip.spec["domain"], "vpc");

        let route = graph.get(&id(ResourceKind::Route, "dev-networking-private-route-1")).unwrap();
        assert_eq!(route.spec["destinationCidrBlock"], "0.0.0.0/0");
        assert_eq!(route.spec["natGatewayId"], "${NatGateway/dev-networking-nat-1.id}");
    }

    #[test]
    fn test_private_tables_route_through_own_zone() {
        let mut graph = ResourceGraph::new();
        let topology = NetworkTopology::build(&mut graph, "dev", &three_zones()).unwrap();

        for (i, rt) in topology.private_route_tables.iter().enumerate() {
            assert_eq!(rt.target, topology.nat_gateways[i]);
            assert_eq!(rt.associations.len(), 1);
        }
        assert_eq!(topology.public_route_table.target, topology.internet_gateway);
    }

    #[test]
    fn test_single_nat_mode() {
        let mut graph = ResourceGraph::new();
        let topology = NetworkTopology::build(
            &mut graph,
            "dev",
            &three_zones().with_nat_mode(NatMode::Single),
        )
        .unwrap();

        assert_eq!(topology.nat_gateways.len(), 1);
        assert_eq!(graph.count(ResourceKind::ElasticIp), 1);
        assert_eq!(topology.private_route_tables.len(), 3);
        for rt in &topology.private_route_tables {
            assert_eq!(rt.target, topology.nat_gateways[0]);
        }
    }

    #[test]
    fn test_build_is_idempotent() {
        let mut first = ResourceGraph::new();
        let mut second = ResourceGraph::new();
        let a = NetworkTopology::build(&mut first, "staging", &three_zones()).unwrap();
        let b = NetworkTopology::build(&mut second, "staging", &three_zones()).unwrap();

        assert_eq!(a, b);
        assert_eq!(first, second);
        let edges: Vec<DependencyEdge> = first.edges();
        assert_eq!(edges, second.edges());
    }

    #[test]
    fn test_install_order_puts_producers_first() {
        let mut graph = ResourceGraph::new();
        NetworkTopology::build(&mut graph, "dev", &three_zones()).unwrap();

        let order: Vec<ResourceId> = graph
            .install_order()
            .unwrap()
            .into_iter()
            .map(|n| n.id.clone())
            .collect();
        assert_eq!(order[0], id(ResourceKind::Vpc, "dev-networking-vpc"));
        for edge in graph.edges() {
            let producer = order.iter().position(|i| *i == edge.producer).unwrap();
            let consumer = order.iter().position(|i| *i == edge.consumer).unwrap();
            assert!(producer < consumer, "{} before {}", edge.consumer, edge.producer);
        }
    }

    #[test]
    fn test_failure_leaves_graph_untouched() {
        let mut graph = ResourceGraph::new();
        let bad = NetworkConfig::new("10.0.0.0/8", ["us-east-1a"]);
        let err = NetworkTopology::build(&mut graph, "dev", &bad).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Allocation);
        assert!(graph.is_empty());

        NetworkTopology::build(&mut graph, "dev", &three_zones()).unwrap();
        let before = graph.len();
        let err = NetworkTopology::build(&mut graph, "dev", &three_zones()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Graph);
        assert_eq!(graph.len(), before);
    }

    #[test]
    fn test_outputs() {
        let mut graph = ResourceGraph::new();
        let topology = NetworkTopology::build(
            &mut graph,
            "dev",
            &NetworkConfig::new("10.0.0.0/16", ["ap-southeast-1a", "ap-southeast-1b"]),
        )
        .unwrap();

        let outputs = topology.outputs();
        assert_eq!(outputs["vpcId"], "${Vpc/dev-networking-vpc.id}");
        assert_eq!(
            outputs["publicSubnetIds"],
            json!([
                "${Subnet/dev-networking-public-0.id}",
                "${Subnet/dev-networking-public-1.id}"
            ])
        );
        assert_eq!(outputs["privateSubnetIds"].as_array().map(Vec::len), Some(2));
    }
}
