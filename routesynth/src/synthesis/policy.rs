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

//! The policy model: all primitives installed on all routers.

use super::group::PolicyBundle;
use super::route_map::{PrefixList, RouteMap, RouteMapDirection, RouteMapMatch, RouteMapSet};
use super::{ConflictReason, SynthesisError, BGP_DEFAULT_LOCAL_PREF};
use crate::requirements::RequirementRef;
use crate::topology::{IpAddr, Topology};
use crate::types::{Community, Protocol, RouterId};

use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Scope of a policy primitive: the router it is installed on, the neighbor it concerns, and the
/// direction. Primitives of the router itself (like maximum-paths) use the router as neighbor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PolicyKey {
    /// Router the primitive is installed on
    pub router: RouterId,
    /// Neighbor the primitive concerns
    pub neighbor: RouterId,
    /// Direction
    pub direction: RouteMapDirection,
}

impl PolicyKey {
    /// Create a new key
    pub fn new(router: RouterId, neighbor: RouterId, direction: RouteMapDirection) -> Self {
        Self { router, neighbor, direction }
    }
}

/// Static route toward a prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StaticRoute {
    /// Destination network
    pub prefix: IpAddr,
    /// Neighbor used as next hop
    pub next_hop: RouterId,
    /// Administrative distance
    pub distance: u32,
}

/// Single element of router configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyPrimitive {
    /// A clause of a route-map, including its set actions
    RouteMapClause(RouteMap),
    /// Attach a community to the route (set action of a clause)
    CommunitySet {
        /// The community
        community: Community,
        /// Keep existing communities
        additive: bool,
    },
    /// Overwrite the local preference (set action of a clause)
    LocalPreference(u32),
    /// Outgoing OSPF cost of the interface toward the neighbor
    OspfCost(u32),
    /// Number of equally good paths installed
    MaxPaths {
        /// Protocol the setting belongs to
        protocol: Protocol,
        /// Number of paths
        paths: u32,
    },
    /// Static route via the neighbor
    StaticRoute(StaticRoute),
    /// Network announced by the BGP process of the router
    BgpNetwork(IpAddr),
}

impl From<&RouteMapSet> for PolicyPrimitive {
    fn from(set: &RouteMapSet) -> Self {
        match set {
            RouteMapSet::Community { community, additive } => {
                Self::CommunitySet { community: *community, additive: *additive }
            }
            RouteMapSet::LocalPref(lp) => Self::LocalPreference(*lp),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Slot {
    Clause(RouterId, RouteMapDirection, Vec<RouteMapMatch>),
    Cost(RouterId),
    Static(RouterId, IpAddr),
}

/// Policy of a single router
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodePolicy {
    route_maps: BTreeMap<(RouterId, RouteMapDirection), Vec<RouteMap>>,
    ospf_costs: BTreeMap<RouterId, u32>,
    static_routes: Vec<StaticRoute>,
    max_paths: BTreeMap<Protocol, u32>,
    bgp_networks: BTreeSet<IpAddr>,
    origins: HashMap<Slot, RequirementRef>,
}

impl NodePolicy {
    /// The clauses of the route-map toward the neighbor, ordered by their sequence number. Empty
    /// if no clause is installed.
    pub fn route_map(&self, neighbor: RouterId, direction: RouteMapDirection) -> &[RouteMap] {
        self.route_maps.get(&(neighbor, direction)).map(|m| m.as_slice()).unwrap_or(&[])
    }

    /// All route-maps, ordered by neighbor and direction
    pub fn route_maps(&self) -> impl Iterator<Item = (RouterId, RouteMapDirection, &[RouteMap])> {
        self.route_maps.iter().map(|((n, d), m)| (*n, *d, m.as_slice()))
    }

    /// The OSPF cost of the interface toward the neighbor, if it was set.
    pub fn ospf_cost(&self, neighbor: RouterId) -> Option<u32> {
        self.ospf_costs.get(&neighbor).copied()
    }

    /// All static routes, ordered by prefix, distance and next hop
    pub fn static_routes(&self) -> &[StaticRoute] {
        &self.static_routes
    }

    /// The maximum-paths setting of the protocol, if it was raised.
    pub fn max_paths(&self, protocol: Protocol) -> Option<u32> {
        self.max_paths.get(&protocol).copied()
    }

    /// Networks announced by the BGP process
    pub fn bgp_networks(&self) -> &BTreeSet<IpAddr> {
        &self.bgp_networks
    }

    /// All prefix lists this router matches on, ordered by name
    pub fn matched_prefix_lists(&self) -> Vec<PrefixList> {
        let mut lists: Vec<PrefixList> = self
            .route_maps
            .values()
            .flatten()
            .filter_map(|m| m.prefix_list().cloned())
            .collect();
        lists.sort();
        lists.dedup();
        lists
    }

    /// All communities this router matches on
    pub fn matched_communities(&self) -> Vec<Community> {
        let mut communities: Vec<Community> = self
            .route_maps
            .values()
            .flatten()
            .filter_map(|m| m.match_community())
            .collect();
        communities.sort();
        communities.dedup();
        communities
    }

    /// Checks if the primitive can be added. Returns the existing value it conflicts with.
    fn check(
        &self,
        key: &PolicyKey,
        primitive: &PolicyPrimitive,
    ) -> Result<(), (ConflictReason, Option<RequirementRef>)> {
        match primitive {
            PolicyPrimitive::RouteMapClause(map) => {
                let existing = self
                    .route_map(key.neighbor, key.direction)
                    .iter()
                    .find(|m| m.conds() == map.conds());
                let reason = match existing {
                    Some(m) if m.state() != map.state() => ConflictReason::PermitAndDeny,
                    Some(m) if !m.same_clause(map) => ConflictReason::ValueMismatch {
                        existing: m.local_pref().unwrap_or(BGP_DEFAULT_LOCAL_PREF),
                        requested: map.local_pref().unwrap_or(BGP_DEFAULT_LOCAL_PREF),
                    },
                    _ => return Ok(()),
                };
                let slot = Slot::Clause(key.neighbor, key.direction, map.conds().clone());
                Err((reason, self.origins.get(&slot).cloned()))
            }
            PolicyPrimitive::OspfCost(cost) => match self.ospf_cost(key.neighbor) {
                Some(existing) if existing != *cost => Err((
                    ConflictReason::ValueMismatch { existing, requested: *cost },
                    self.origins.get(&Slot::Cost(key.neighbor)).cloned(),
                )),
                _ => Ok(()),
            },
            PolicyPrimitive::StaticRoute(route) => {
                let existing = self
                    .static_routes
                    .iter()
                    .find(|r| r.prefix == route.prefix && r.next_hop == route.next_hop);
                match existing {
                    Some(r) if r.distance != route.distance => Err((
                        ConflictReason::ValueMismatch {
                            existing: r.distance,
                            requested: route.distance,
                        },
                        self.origins.get(&Slot::Static(route.next_hop, route.prefix)).cloned(),
                    )),
                    _ => Ok(()),
                }
            }
            _ => Ok(()),
        }
    }

    /// Add the primitive. Must only be called after `check` succeeded.
    fn commit(&mut self, key: &PolicyKey, primitive: &PolicyPrimitive, origin: &RequirementRef) {
        match primitive {
            PolicyPrimitive::RouteMapClause(map) => {
                let maps = self.route_maps.entry((key.neighbor, key.direction)).or_default();
                if !maps.iter().any(|m| m.same_clause(map)) {
                    maps.push(map.clone());
                    self.origins
                        .entry(Slot::Clause(key.neighbor, key.direction, map.conds().clone()))
                        .or_insert_with(|| origin.clone());
                }
            }
            PolicyPrimitive::CommunitySet { .. } | PolicyPrimitive::LocalPreference(_) => {}
            PolicyPrimitive::OspfCost(cost) => {
                self.ospf_costs.insert(key.neighbor, *cost);
                self.origins.entry(Slot::Cost(key.neighbor)).or_insert_with(|| origin.clone());
            }
            PolicyPrimitive::MaxPaths { protocol, paths } => {
                let current = self.max_paths.entry(*protocol).or_insert(*paths);
                *current = (*current).max(*paths);
            }
            PolicyPrimitive::StaticRoute(route) => {
                if !self.static_routes.contains(route) {
                    self.static_routes.push(*route);
                    self.origins
                        .entry(Slot::Static(route.next_hop, route.prefix))
                        .or_insert_with(|| origin.clone());
                }
            }
            PolicyPrimitive::BgpNetwork(network) => {
                self.bgp_networks.insert(*network);
            }
        }
    }

    /// Orders the clauses of each route-map by the prefix list they match on, such that the
    /// clauses of one destination form a contiguous block, with the permit clause before the deny
    /// clause. Clauses without any match come last. Sequence numbers are 10, 20, ...
    fn finalize(&mut self) {
        for maps in self.route_maps.values_mut() {
            maps.sort_by(|x, y| {
                (x.is_unconditional(), x.prefix_list(), x.state(), x.match_community()).cmp(&(
                    y.is_unconditional(),
                    y.prefix_list(),
                    y.state(),
                    y.match_community(),
                ))
            });
            for (i, map) in maps.iter_mut().enumerate() {
                map.order = (i + 1) * 10;
            }
        }
        self.static_routes.sort_by_key(|r| (r.prefix, r.distance, r.next_hop));
    }
}

/// # Policy Model
///
/// Mapping from every router to its [`NodePolicy`]. Routers without any primitive are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyModel {
    nodes: BTreeMap<RouterId, NodePolicy>,
}

impl PolicyModel {
    /// Returns the policy of the router
    pub fn get(&self, router: RouterId) -> Option<&NodePolicy> {
        self.nodes.get(&router)
    }

    /// Iterate over all routers with their policy
    pub fn iter(&self) -> impl Iterator<Item = (RouterId, &NodePolicy)> {
        self.nodes.iter().map(|(r, p)| (*r, p))
    }

    /// Number of routers with a policy
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if no router has any policy
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Merge all primitives of a bundle into the model. If any of them conflicts with an existing
    /// primitive, nothing is merged and the conflict is returned.
    pub fn merge_bundle(
        &mut self,
        topology: &Topology,
        bundle: &PolicyBundle,
    ) -> Result<(), SynthesisError> {
        let node = self.nodes.entry(bundle.router).or_default();
        for (key, primitive, origin) in bundle.entries.iter() {
            if let Err((reason, other)) = node.check(key, primitive) {
                return Err(SynthesisError::Conflict {
                    node: topology.name(key.router).to_string(),
                    neighbor: topology.name(key.neighbor).to_string(),
                    requirement: origin.clone(),
                    other,
                    reason,
                });
            }
        }
        for (key, primitive, origin) in bundle.entries.iter() {
            node.commit(key, primitive, origin);
        }
        Ok(())
    }

    /// Assign the sequence numbers of all route-maps, and drop routers without policy.
    pub fn finalize(&mut self) {
        self.nodes.retain(|_, p| *p != NodePolicy::default());
        self.nodes.values_mut().for_each(|p| p.finalize());
    }

    /// Flatten the model into its primitives. The set actions of a route-map clause are listed
    /// right after the clause.
    pub fn primitives(&self) -> Vec<(PolicyKey, PolicyPrimitive)> {
        let mut result = Vec::new();
        for (router, policy) in self.nodes.iter() {
            for ((neighbor, direction), maps) in policy.route_maps.iter() {
                let key = PolicyKey::new(*router, *neighbor, *direction);
                for map in maps {
                    result.push((key, PolicyPrimitive::RouteMapClause(map.clone())));
                    result.extend(map.actions().iter().map(|s| (key, PolicyPrimitive::from(s))));
                }
            }
            for (neighbor, cost) in policy.ospf_costs.iter() {
                let key = PolicyKey::new(*router, *neighbor, RouteMapDirection::Outgoing);
                result.push((key, PolicyPrimitive::OspfCost(*cost)));
            }
            for route in policy.static_routes.iter() {
                let key = PolicyKey::new(*router, route.next_hop, RouteMapDirection::Outgoing);
                result.push((key, PolicyPrimitive::StaticRoute(*route)));
            }
            for (protocol, paths) in policy.max_paths.iter() {
                let key = PolicyKey::new(*router, *router, RouteMapDirection::Outgoing);
                let primitive = PolicyPrimitive::MaxPaths { protocol: *protocol, paths: *paths };
                result.push((key, primitive));
            }
            for network in policy.bgp_networks.iter() {
                let key = PolicyKey::new(*router, *router, RouteMapDirection::Outgoing);
                result.push((key, PolicyPrimitive::BgpNetwork(*network)));
            }
        }
        result
    }
}
