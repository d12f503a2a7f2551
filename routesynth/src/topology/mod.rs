// RouteSynth: Synthesizing Routing Policies from Path Requirements
// Copyright (C) 2021  Tibor Schneider
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! # Topology
//!
//! The immutable graph of routers and links on which requirements are expressed. Every link
//! carries the interface data of both of its endpoints, which is later used to name BGP neighbors
//! and OSPF networks.

mod addr;
mod description;

pub use addr::{AddrParseError, IpAddr};
pub use description::{EdgeDescription, EndpointDescription, NodeDescription, TopologyDescription};

use crate::types::{AsId, RouterId};

use log::*;
use petgraph::prelude::*;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use thiserror::Error;

/// Error raised while building the topology
#[derive(Debug, Error)]
pub enum TopologyError {
    /// A link references a node that was never added
    #[error("Unknown node: {0}")]
    UnknownNode(String),
    /// Two nodes share the same name
    #[error("Node {0} is defined twice")]
    DuplicateNode(String),
    /// The same pair of nodes is connected twice, with different interface data
    #[error("Duplicate edge between {0} and {1} with conflicting interfaces")]
    DuplicateEdge(String, String),
    /// A link connects a node to itself
    #[error("Self loop at node {0}")]
    SelfLoop(String),
    /// The topology description is no valid JSON
    #[error("Cannot parse topology description: {0}")]
    Json(#[from] serde_json::Error),
}

/// Network device with its name, AS number and loopback addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Router {
    /// Unique name
    pub name: String,
    /// AS number. Only routers with an AS number speak BGP.
    pub as_id: Option<AsId>,
    /// Loopback addresses, in the order they were declared
    pub loopbacks: Vec<IpAddr>,
}

/// One side of a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    /// The router owning the interface
    pub router: RouterId,
    /// Interface name, like `eth0`
    pub name: String,
    /// Address of the interface, with the mask of the link network
    pub addr: IpAddr,
}

/// Undirected link between two routers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    endpoints: [Interface; 2],
}

impl Link {
    /// Both endpoints of the link.
    pub fn endpoints(&self) -> &[Interface; 2] {
        &self.endpoints
    }

    /// The interface owned by `router`, or `None` if the router is not part of this link.
    pub fn endpoint(&self, router: RouterId) -> Option<&Interface> {
        self.endpoints.iter().find(|i| i.router == router)
    }

    /// The interface on the other side of `router`.
    pub fn opposite(&self, router: RouterId) -> Option<&Interface> {
        match self.endpoints.iter().position(|i| i.router == router) {
            Some(0) => Some(&self.endpoints[1]),
            Some(_) => Some(&self.endpoints[0]),
            None => None,
        }
    }

    fn same_as(&self, other: &Link) -> bool {
        self.endpoints == other.endpoints
            || (self.endpoints[0] == other.endpoints[1] && self.endpoints[1] == other.endpoints[0])
    }
}

/// Endpoint of a link, given by the name of its router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Name of the router
    pub node: String,
    /// Name of the interface
    pub interface: String,
    /// Address of the interface
    pub addr: IpAddr,
}

impl Endpoint {
    /// Create a new endpoint description
    pub fn new(node: impl Into<String>, interface: impl Into<String>, addr: IpAddr) -> Self {
        Self { node: node.into(), interface: interface.into(), addr }
    }
}

/// # Topology
///
/// Undirected graph of [`Router`]s and [`Link`]s. Node names are unique, and there is at most one
/// link between each pair of routers.
///
/// ```
/// use routesynth::topology::Topology;
/// use routesynth::types::AsId;
///
/// let mut topo = Topology::new();
/// topo.add_router("Celje", Some(AsId(30)), vec![]).unwrap();
/// topo.add_router("Velenj", Some(AsId(260)), vec![]).unwrap();
/// topo.connect("Celje", "Velenj").unwrap();
///
/// let celje = topo.get_router_id("Celje").unwrap();
/// let velenj = topo.get_router_id("Velenj").unwrap();
/// assert!(topo.edge_between(celje, velenj).is_some());
/// assert_eq!(topo.neighbors_of(celje), vec![velenj]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Topology {
    graph: Graph<Router, Link, Undirected, u32>,
    names: HashMap<String, RouterId>,
}

impl Topology {
    /// Create an empty topology
    pub fn new() -> Self {
        Self { graph: Graph::new_undirected(), names: HashMap::new() }
    }

    /// Add a new router. Fails if a router with the same name already exists.
    pub fn add_router(
        &mut self,
        name: impl Into<String>,
        as_id: Option<AsId>,
        loopbacks: Vec<IpAddr>,
    ) -> Result<RouterId, TopologyError> {
        let name = name.into();
        if self.names.contains_key(&name) {
            return Err(TopologyError::DuplicateNode(name));
        }
        let id = self.graph.add_node(Router { name: name.clone(), as_id, loopbacks });
        trace!("Add router {} as {:?}", name, id);
        self.names.insert(name, id);
        Ok(id)
    }

    /// Add a link between two endpoints. Adding the exact same link twice (in any orientation) is
    /// accepted, the second one is ignored.
    pub fn add_link(&mut self, node1: Endpoint, node2: Endpoint) -> Result<(), TopologyError> {
        let a = self.lookup(&node1.node)?;
        let b = self.lookup(&node2.node)?;
        if a == b {
            return Err(TopologyError::SelfLoop(node1.node));
        }
        let link = Link {
            endpoints: [
                Interface { router: a, name: node1.interface, addr: node1.addr },
                Interface { router: b, name: node2.interface, addr: node2.addr },
            ],
        };
        if let Some(existing) = self.edge_between(a, b) {
            return if existing.same_as(&link) {
                debug!("Ignore duplicate link {} -- {}", node1.node, node2.node);
                Ok(())
            } else {
                Err(TopologyError::DuplicateEdge(node1.node, node2.node))
            };
        }
        self.graph.add_edge(a, b, link);
        Ok(())
    }

    /// Connect two routers, generating the interface names (`eth0`, `eth1`, ...) and a `/24` link
    /// network `10.{x}.{y}.0`, where `x.y` is the index of the new link. `a` gets the host address
    /// `.1`, and `b` the host address `.2`.
    pub fn connect(&mut self, a: &str, b: &str) -> Result<(), TopologyError> {
        let a_id = self.lookup(a)?;
        let b_id = self.lookup(b)?;
        let link_id = self.graph.edge_count() as u32;
        let net = 10 << 24 | (link_id & 0xffff) << 8;
        let iface_a = format!("eth{}", self.graph.edges(a_id).count());
        let iface_b = format!("eth{}", self.graph.edges(b_id).count());
        self.add_link(
            Endpoint::new(a, iface_a, IpAddr::new(Ipv4Addr::from(net | 1), 24)),
            Endpoint::new(b, iface_b, IpAddr::new(Ipv4Addr::from(net | 2), 24)),
        )
    }

    fn lookup(&self, name: &str) -> Result<RouterId, TopologyError> {
        self.get_router_id(name).ok_or_else(|| TopologyError::UnknownNode(name.to_string()))
    }

    /// Returns the id of the router with the given name.
    pub fn get_router_id(&self, name: &str) -> Option<RouterId> {
        self.names.get(name).copied()
    }

    /// Returns the router with the given id.
    pub fn get_router(&self, router: RouterId) -> Option<&Router> {
        self.graph.node_weight(router)
    }

    /// Returns the name of the router, or `?` if it does not exist.
    pub fn name(&self, router: RouterId) -> &str {
        self.graph.node_weight(router).map(|r| r.name.as_str()).unwrap_or("?")
    }

    /// Returns the AS number of the router, if it has one.
    pub fn as_id(&self, router: RouterId) -> Option<AsId> {
        self.graph.node_weight(router).and_then(|r| r.as_id)
    }

    /// Returns the link between `a` and `b`, if they are adjacent.
    pub fn edge_between(&self, a: RouterId, b: RouterId) -> Option<&Link> {
        self.graph.find_edge(a, b).and_then(|e| self.graph.edge_weight(e))
    }

    /// Returns all neighbors of a router, sorted by their name.
    pub fn neighbors_of(&self, router: RouterId) -> Vec<RouterId> {
        let mut neighbors: Vec<RouterId> = self.graph.neighbors(router).collect();
        neighbors.sort_by(|a, b| self.name(*a).cmp(self.name(*b)));
        neighbors.dedup();
        neighbors
    }

    /// Returns the interface of `router` that connects it to `neighbor`.
    pub fn interface_for(&self, router: RouterId, neighbor: RouterId) -> Option<&Interface> {
        self.edge_between(router, neighbor).and_then(|l| l.endpoint(router))
    }

    /// Returns all routers, sorted by their name.
    pub fn routers(&self) -> Vec<RouterId> {
        let mut routers: Vec<RouterId> = self.graph.node_indices().collect();
        routers.sort_by(|a, b| self.name(*a).cmp(self.name(*b)));
        routers
    }

    /// Returns all links, ordered as they were added.
    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.graph.edge_indices().filter_map(move |e| self.graph.edge_weight(e))
    }

    /// Number of routers
    pub fn num_routers(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of links
    pub fn num_links(&self) -> usize {
        self.graph.edge_count()
    }

    /// Build the topology from its structural description.
    pub fn from_description(desc: &TopologyDescription) -> Result<Self, TopologyError> {
        let mut topo = Self::new();
        for node in desc.nodes.iter() {
            topo.add_router(node.name(), node.as_number().map(AsId), node.loopbacks().to_vec())?;
        }
        for edge in desc.edges.iter() {
            topo.add_link(edge.node1.clone().into(), edge.node2.clone().into())?;
        }
        info!("Loaded topology with {} routers and {} links", topo.num_routers(), topo.num_links());
        Ok(topo)
    }

    /// Parse the JSON topology description and build the topology.
    pub fn from_json(json: &str) -> Result<Self, TopologyError> {
        let desc: TopologyDescription = serde_json::from_str(json)?;
        Self::from_description(&desc)
    }
}
