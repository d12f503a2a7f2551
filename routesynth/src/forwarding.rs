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

//! # Forwarding State
//!
//! Computes the forwarding decision of every router toward a single destination under a
//! synthesized policy. This is used to check that the policy realizes the requirements:
//!
//! - **BGP**: Every router with an AS number has an eBGP session with every adjacent router that
//!   has one. The destination originates the network of its first loopback, if its policy
//!   announces it. Routes pass the export route-map of the
//!   sender and the import route-map of the receiver. The best route has the highest local
//!   preference, then the shortest AS path, then the neighbor with the lowest name. Up to
//!   maximum-paths routes with the same local preference are used.
//! - **OSPF**: Shortest paths over the outgoing interface costs, using the default cost where no
//!   cost is set. Up to maximum-paths equally short paths are used.
//! - **Static**: The static routes toward the loopbacks of the destination with the lowest
//!   distance.

use crate::requirements::{RequirementGroup, RequirementKind, RequirementRef};
use crate::synthesis::route_map::{apply_route_maps, RouteMapDirection};
use crate::synthesis::{PolicyModel, BGP_DEFAULT_LOCAL_PREF, OSPF_DEFAULT_COST};
use crate::topology::{IpAddr, Topology};
use crate::types::{Community, Protocol, RouterId};

use itertools::Itertools;
use log::*;
use petgraph::algo::dijkstra;
use petgraph::graphmap::DiGraphMap;
use petgraph::visit::EdgeRef;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::iter::once;
use thiserror::Error;

/// Route as it is advertised over an eBGP session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BgpRoute {
    /// Network the route leads to
    pub prefix: IpAddr,
    /// Routers the route traversed, starting with the neighbor it was learned from, and ending
    /// with the origin.
    pub as_path: Vec<RouterId>,
    /// Communities attached to the route
    pub communities: BTreeSet<Community>,
    /// Local preference
    pub local_pref: u32,
    /// Neighbor the route was learned from
    pub from: RouterId,
}

/// Error while following the forwarding state
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ForwardingError {
    /// The path visits a router twice
    #[error("Forwarding loop: {0:?}")]
    ForwardingLoop(Vec<RouterId>),
    /// The last router of the path has no route
    #[error("Black hole: {0:?}")]
    BlackHole(Vec<RouterId>),
    /// BGP did not converge
    #[error("BGP did not converge")]
    NoConvergence,
}

/// # Forwarding State
///
/// Next hops of every router toward one destination. The first next hop is the primary one,
/// which is followed by [`ForwardingState::get_route`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardingState {
    destination: RouterId,
    next_hops: HashMap<RouterId, Vec<RouterId>>,
}

impl ForwardingState {
    /// Compute the forwarding state toward the destination under the policy.
    pub fn compute(
        topology: &Topology,
        model: &PolicyModel,
        protocol: Protocol,
        destination: RouterId,
    ) -> Result<Self, ForwardingError> {
        let next_hops = match protocol {
            Protocol::Bgp => bgp_next_hops(topology, model, destination)?,
            Protocol::Ospf => ospf_next_hops(topology, model, destination),
            Protocol::Static => static_next_hops(topology, model, destination),
        };
        Ok(Self { destination, next_hops })
    }

    /// The destination
    pub fn destination(&self) -> RouterId {
        self.destination
    }

    /// All next hops of the router. Empty if the router has no route or is the destination.
    pub fn get_next_hops(&self, router: RouterId) -> &[RouterId] {
        self.next_hops.get(&router).map(|n| n.as_slice()).unwrap_or(&[])
    }

    /// Returns the route from the source router to the destination, following the primary next
    /// hops.
    pub fn get_route(&self, source: RouterId) -> Result<Vec<RouterId>, ForwardingError> {
        let mut path = vec![source];
        let mut visited: HashSet<RouterId> = HashSet::new();
        visited.insert(source);
        let mut current = source;
        while current != self.destination {
            current = match self.get_next_hops(current).first() {
                Some(next) => *next,
                None => return Err(ForwardingError::BlackHole(path)),
            };
            path.push(current);
            if !visited.insert(current) {
                return Err(ForwardingError::ForwardingLoop(path));
            }
        }
        Ok(path)
    }
}

fn bgp_next_hops(
    topology: &Topology,
    model: &PolicyModel,
    destination: RouterId,
) -> Result<HashMap<RouterId, Vec<RouterId>>, ForwardingError> {
    let speakers: Vec<RouterId> =
        topology.routers().into_iter().filter(|r| topology.as_id(*r).is_some()).collect();

    let prefix = match topology.get_router(destination).and_then(|r| r.loopbacks.first()) {
        Some(lo) => lo.network(),
        None => return Ok(HashMap::new()),
    };
    if !model.get(destination).map(|p| p.bgp_networks().contains(&prefix)).unwrap_or(false) {
        debug!("{} does not announce {}", topology.name(destination), prefix);
        return Ok(HashMap::new());
    }

    let mut rib: HashMap<RouterId, Vec<BgpRoute>> = HashMap::new();
    rib.insert(
        destination,
        vec![BgpRoute {
            prefix,
            as_path: Vec::new(),
            communities: BTreeSet::new(),
            local_pref: BGP_DEFAULT_LOCAL_PREF,
            from: destination,
        }],
    );

    let max_rounds = 2 * speakers.len() + 2;
    for round in 0..max_rounds {
        let mut next = rib.clone();
        let mut changed = false;
        for a in speakers.iter().copied().filter(|r| *r != destination) {
            let mut candidates: Vec<BgpRoute> = Vec::new();
            for b in topology.neighbors_of(a) {
                if topology.as_id(b).is_none() {
                    continue;
                }
                let best = match rib.get(&b).and_then(|r| r.first()) {
                    Some(r) => r,
                    None => continue,
                };
                let route = BgpRoute {
                    prefix,
                    as_path: once(b).chain(best.as_path.iter().copied()).collect(),
                    communities: best.communities.clone(),
                    local_pref: BGP_DEFAULT_LOCAL_PREF,
                    from: b,
                };
                if route.as_path.contains(&a) {
                    continue;
                }
                let export = model
                    .get(b)
                    .map(|p| p.route_map(a, RouteMapDirection::Outgoing))
                    .unwrap_or(&[]);
                let route = match apply_route_maps(export, route) {
                    Some(r) => r,
                    None => continue,
                };
                let import = model
                    .get(a)
                    .map(|p| p.route_map(b, RouteMapDirection::Incoming))
                    .unwrap_or(&[]);
                if let Some(r) = apply_route_maps(import, route) {
                    candidates.push(r);
                }
            }
            candidates.sort_by(|x, y| {
                y.local_pref
                    .cmp(&x.local_pref)
                    .then(x.as_path.len().cmp(&y.as_path.len()))
                    .then(topology.name(x.from).cmp(topology.name(y.from)))
            });
            let max_paths =
                model.get(a).and_then(|p| p.max_paths(Protocol::Bgp)).unwrap_or(1) as usize;
            let selected: Vec<BgpRoute> = match candidates.first() {
                Some(best) => candidates
                    .iter()
                    .filter(|c| c.local_pref == best.local_pref)
                    .take(max_paths)
                    .cloned()
                    .collect(),
                None => Vec::new(),
            };
            let current = rib.get(&a).map(|r| r.as_slice()).unwrap_or(&[]);
            if current != selected.as_slice() {
                changed = true;
                if selected.is_empty() {
                    next.remove(&a);
                } else {
                    next.insert(a, selected);
                }
            }
        }
        rib = next;
        if !changed {
            trace!("BGP converged after {} rounds", round);
            return Ok(rib
                .into_iter()
                .filter(|(r, _)| *r != destination)
                .map(|(r, routes)| (r, routes.into_iter().map(|x| x.from).collect()))
                .collect());
        }
    }
    Err(ForwardingError::NoConvergence)
}

fn ospf_next_hops(
    topology: &Topology,
    model: &PolicyModel,
    destination: RouterId,
) -> HashMap<RouterId, Vec<RouterId>> {
    let cost = |a: RouterId, b: RouterId| -> u64 {
        model.get(a).and_then(|p| p.ospf_cost(b)).unwrap_or(OSPF_DEFAULT_COST) as u64
    };

    // edges point toward the source of the traffic, such that a single run computes the distance
    // of every router to the destination
    let mut graph: DiGraphMap<RouterId, u64> = DiGraphMap::new();
    for link in topology.links() {
        let [x, y] = link.endpoints();
        graph.add_edge(y.router, x.router, cost(x.router, y.router));
        graph.add_edge(x.router, y.router, cost(y.router, x.router));
    }
    if !graph.contains_node(destination) {
        return HashMap::new();
    }
    let dist = dijkstra(&graph, destination, None, |e| *e.weight());

    let mut next_hops = HashMap::new();
    for a in topology.routers().into_iter().filter(|r| *r != destination) {
        let d = match dist.get(&a) {
            Some(d) => *d,
            None => continue,
        };
        let max_paths =
            model.get(a).and_then(|p| p.max_paths(Protocol::Ospf)).unwrap_or(1) as usize;
        let hops: Vec<RouterId> = topology
            .neighbors_of(a)
            .into_iter()
            .filter(|b| dist.get(b).map(|db| cost(a, *b) + db == d).unwrap_or(false))
            .take(max_paths)
            .collect();
        next_hops.insert(a, hops);
    }
    next_hops
}

fn static_next_hops(
    topology: &Topology,
    model: &PolicyModel,
    destination: RouterId,
) -> HashMap<RouterId, Vec<RouterId>> {
    let prefixes: Vec<_> = topology
        .get_router(destination)
        .map(|r| r.loopbacks.iter().map(|l| l.network()).collect())
        .unwrap_or_default();
    model
        .iter()
        .filter(|(r, _)| *r != destination)
        .filter_map(|(r, policy)| {
            let routes: Vec<_> =
                policy.static_routes().iter().filter(|s| prefixes.contains(&s.prefix)).collect();
            let best = routes.iter().map(|s| s.distance).min()?;
            let hops: Vec<RouterId> = routes
                .iter()
                .filter(|s| s.distance == best)
                .map(|s| s.next_hop)
                .sorted_by(|x, y| topology.name(*x).cmp(topology.name(*y)))
                .dedup()
                .collect();
            Some((r, hops))
        })
        .collect()
}

/// The realized path of a requirement differs from the required one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FidelityViolation {
    /// The requirement
    pub requirement: RequirementRef,
    /// The required path
    pub expected: Vec<String>,
    /// The realized path, or why there is none
    pub actual: Result<Vec<String>, String>,
}

impl fmt::Display for FidelityViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let actual = match &self.actual {
            Ok(path) => path.join(" -> "),
            Err(e) => e.clone(),
        };
        write!(
            f,
            "{}: expected {}, but traffic takes {}",
            self.requirement,
            self.expected.join(" -> "),
            actual
        )
    }
}

fn names(topology: &Topology, path: &[RouterId]) -> Vec<String> {
    path.iter().map(|r| topology.name(*r).to_string()).collect()
}

/// Check that the path of every `PathReq`, and the most preferred path of every `PathOrderReq`,
/// is realized by the policy.
pub fn check_fidelity(
    topology: &Topology,
    model: &PolicyModel,
    groups: &[RequirementGroup],
) -> Vec<FidelityViolation> {
    let mut violations = Vec::new();
    for group in groups {
        let state = ForwardingState::compute(topology, model, group.protocol, group.destination);
        for req in group.requirements.iter() {
            let path = match (req.kind(), req.paths.first()) {
                (RequirementKind::Path, Some(p)) | (RequirementKind::PathOrder, Some(p)) => p,
                _ => continue,
            };
            if path.len() < 2 {
                continue;
            }
            let actual = match &state {
                Ok(state) => state
                    .get_route(path[0])
                    .map(|p| names(topology, &p))
                    .map_err(|e| describe(topology, &e)),
                Err(e) => Err(describe(topology, e)),
            };
            if actual.as_ref() != Ok(&names(topology, path)) {
                violations.push(FidelityViolation {
                    requirement: req.reference.clone(),
                    expected: names(topology, path),
                    actual,
                });
            }
        }
    }
    debug!("Found {} fidelity violations", violations.len());
    violations
}

fn describe(topology: &Topology, e: &ForwardingError) -> String {
    match e {
        ForwardingError::ForwardingLoop(p) => format!("a loop {}", names(topology, p).join(" -> ")),
        ForwardingError::BlackHole(p) => {
            format!("a black hole after {}", names(topology, p).join(" -> "))
        }
        ForwardingError::NoConvergence => "no path, BGP does not converge".to_string(),
    }
}
