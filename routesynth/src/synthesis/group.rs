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

//! Synthesis of a single requirement group.
//!
//! Every requirement of the group is turned into intents, one for each neighbor of every router on
//! one of its paths (except the destination): either the neighbor is a permitted next hop, with a
//! value derived from its rank, or it is denied. The intents are folded into one mapping per group
//! in the order of decreasing strictness. The paths admitted by the permitted next hops are then
//! compared against the member paths. Finally, the surviving decisions are lowered to policy
//! primitives of the protocol.

use super::policy::{PolicyKey, PolicyPrimitive, StaticRoute};
use super::route_map::{PrefixList, RouteMapBuilder, RouteMapDirection};
use super::{
    ConflictReason, SynthesisError, BGP_DEFAULT_LOCAL_PREF, BGP_LEAST_PREFERRED_LOCAL_PREF,
    DEFAULT_COMMUNITY_ASN, OSPF_DEFAULT_COST, OSPF_DENY_COST, STATIC_DISTANCE,
};
use crate::requirements::{
    RequirementGroup, RequirementKind, RequirementRef, ValidatedRequirement,
};
use crate::topology::{IpAddr, Topology};
use crate::types::{Community, Protocol, RouterId};

use itertools::Itertools;
use log::*;
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Decision of a router about one of its neighbors, for one destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The neighbor is a permitted next hop. The value is the local preference (BGP), the
    /// interface cost (OSPF) or the administrative distance (Static).
    Permit(u32),
    /// The neighbor must not be used as next hop.
    Deny,
}

#[derive(Debug, Clone)]
struct Intent {
    key: PolicyKey,
    decision: Decision,
    origin: RequirementRef,
    defers: bool,
}

/// All primitives a group installs on a single router. A bundle is merged into the policy model as
/// a whole, or not at all.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyBundle {
    /// The router
    pub router: RouterId,
    /// The primitives, together with the requirement they originate from
    pub entries: Vec<(PolicyKey, PolicyPrimitive, RequirementRef)>,
}

/// Result of synthesizing a requirement group
#[derive(Debug, Clone)]
pub struct GroupPolicy {
    /// Protocol of the group
    pub protocol: Protocol,
    /// Destination of the group
    pub destination: RouterId,
    /// Community identifying the routes of this group (BGP only)
    pub community: Option<Community>,
    /// Decisions of all routers without conflict
    pub decisions: BTreeMap<PolicyKey, Decision>,
    /// Lowered primitives, one bundle per router, ordered by router
    pub bundles: Vec<PolicyBundle>,
    /// Conflicts within the group
    pub conflicts: Vec<SynthesisError>,
}

struct RequirementIntents {
    intents: Vec<Intent>,
    max_paths: Vec<(RouterId, u32)>,
}

/// Direction of the keys used by the protocol
pub(crate) fn key_direction(protocol: Protocol) -> RouteMapDirection {
    match protocol {
        Protocol::Bgp => RouteMapDirection::Incoming,
        Protocol::Ospf | Protocol::Static => RouteMapDirection::Outgoing,
    }
}

/// Synthesize a single requirement group. Conflicts are reported in the result. The function only
/// fails if an involved router is left without a decision for one of its neighbors, or if a BGP
/// or Static destination has no loopback network.
pub fn synthesize_group(
    topology: &Topology,
    group: &RequirementGroup,
    community: Option<Community>,
) -> Result<GroupPolicy, SynthesisError> {
    let destination = group.destination;
    let direction = key_direction(group.protocol);
    let community = match group.protocol {
        Protocol::Bgp => {
            Some(community.unwrap_or_else(|| Community::new(DEFAULT_COMMUNITY_ASN, 0)))
        }
        _ => None,
    };
    debug!("Synthesizing group ({}, {})", group.protocol, topology.name(destination));

    let networks: Vec<IpAddr> = topology
        .get_router(destination)
        .map(|r| r.loopbacks.iter().map(|l| l.network()).unique().collect())
        .unwrap_or_default();
    if networks.is_empty() && group.protocol != Protocol::Ospf {
        return Err(SynthesisError::MissingLoopback {
            protocol: group.protocol,
            destination: topology.name(destination).to_string(),
        });
    }

    let mut requirements: Vec<&ValidatedRequirement> = group.requirements.iter().collect();
    requirements.sort_by_key(|r| (r.kind(), r.reference.index));

    let members: BTreeSet<RouterId> =
        group.requirements.iter().flat_map(|r| r.paths.iter().flatten().copied()).collect();

    let mut committed: BTreeMap<PolicyKey, Intent> = BTreeMap::new();
    let mut max_paths: BTreeMap<RouterId, (u32, RequirementRef)> = BTreeMap::new();
    let mut conflicted: BTreeSet<RouterId> = BTreeSet::new();
    let mut conflicts: Vec<SynthesisError> = Vec::new();

    for req in requirements {
        let generated = match requirement_intents(topology, group, req) {
            Ok(g) => g,
            Err((node, neighbor)) => {
                conflicts.push(conflict(
                    topology,
                    node,
                    neighbor,
                    &req.reference,
                    None,
                    ConflictReason::ForwardingLoop,
                ));
                conflicted.extend(req.paths.iter().flatten().filter(|n| **n != destination));
                continue;
            }
        };

        for intent in generated.intents {
            trace!(
                "{}: {} -> {}: {:?}",
                intent.origin,
                topology.name(intent.key.router),
                topology.name(intent.key.neighbor),
                intent.decision
            );
            match committed.entry(intent.key) {
                Entry::Vacant(e) => {
                    e.insert(intent);
                }
                Entry::Occupied(e) => {
                    if let Err(reason) = reconcile(e.get(), &intent) {
                        conflicts.push(conflict(
                            topology,
                            intent.key.router,
                            intent.key.neighbor,
                            &intent.origin,
                            Some(e.get().origin.clone()),
                            reason,
                        ));
                        conflicted.insert(intent.key.router);
                    }
                }
            }
        }

        for (router, k) in generated.max_paths {
            let entry = max_paths.entry(router).or_insert_with(|| (k, req.reference.clone()));
            if k > entry.0 {
                *entry = (k, req.reference.clone());
            }
        }
    }

    // every neighbor of every involved router needs a decision
    for router in members.iter().filter(|r| **r != destination && !conflicted.contains(*r)) {
        for neighbor in topology.neighbors_of(*router) {
            if !committed.contains_key(&PolicyKey::new(*router, neighbor, direction)) {
                return Err(SynthesisError::UnderconstrainedNeighbor {
                    protocol: group.protocol,
                    destination: topology.name(destination).to_string(),
                    node: topology.name(*router).to_string(),
                    neighbor: topology.name(neighbor).to_string(),
                });
            }
        }
    }

    // every admitted path must be a member path
    let member_paths: BTreeSet<&Vec<RouterId>> =
        group.requirements.iter().flat_map(|r| r.paths.iter()).collect();
    let sources: BTreeSet<RouterId> = member_paths
        .iter()
        .filter_map(|p| p.first().copied())
        .filter(|s| *s != destination && !conflicted.contains(s))
        .collect();
    let mut spliced: BTreeSet<PolicyKey> = BTreeSet::new();
    for path in admitted_paths(&committed, &conflicted, &sources, destination) {
        if member_paths.contains(&path) {
            continue;
        }
        // first position where the path is no longer the beginning of a member path
        let i = match (1..path.len())
            .find(|i| !member_paths.iter().any(|m| m.starts_with(&path[..=*i])))
        {
            Some(i) => i,
            None => continue,
        };
        let key = PolicyKey::new(path[i - 1], path[i], direction);
        let intent = match committed.get(&key) {
            Some(intent) if spliced.insert(key) => intent,
            _ => continue,
        };
        let other = match i {
            1 => None,
            _ => committed
                .get(&PolicyKey::new(path[i - 2], path[i - 1], direction))
                .map(|x| x.origin.clone())
                .filter(|o| *o != intent.origin),
        };
        let names = path.iter().map(|r| topology.name(*r).to_string()).collect();
        conflicts.push(conflict(
            topology,
            key.router,
            key.neighbor,
            &intent.origin,
            other,
            ConflictReason::SplicedPath(names),
        ));
    }
    conflicted.extend(spliced.iter().map(|k| k.router));

    let mut bundles: BTreeMap<RouterId, PolicyBundle> = BTreeMap::new();
    let mut decisions = BTreeMap::new();
    for (key, intent) in committed.iter().filter(|(k, _)| !conflicted.contains(&k.router)) {
        decisions.insert(*key, intent.decision);
        let bundle = bundles
            .entry(key.router)
            .or_insert_with(|| PolicyBundle { router: key.router, entries: Vec::new() });
        for primitive in lower(group, community, &networks, key, intent.decision) {
            bundle.entries.push((*key, primitive, intent.origin.clone()));
        }
    }

    // the destination announces its networks
    let first = group.requirements.first().map(|r| r.reference.clone());
    if let (Protocol::Bgp, Some(origin)) = (group.protocol, first) {
        let bundle = bundles
            .entry(destination)
            .or_insert_with(|| PolicyBundle { router: destination, entries: Vec::new() });
        for network in networks.iter() {
            bundle.entries.push((
                PolicyKey::new(destination, destination, RouteMapDirection::Outgoing),
                PolicyPrimitive::BgpNetwork(*network),
                origin.clone(),
            ));
        }
    }
    for (router, (k, origin)) in max_paths.into_iter().filter(|(r, _)| !conflicted.contains(r)) {
        let bundle =
            bundles.entry(router).or_insert_with(|| PolicyBundle { router, entries: Vec::new() });
        bundle.entries.push((
            PolicyKey::new(router, router, RouteMapDirection::Outgoing),
            PolicyPrimitive::MaxPaths { protocol: group.protocol, paths: k },
            origin,
        ));
    }

    Ok(GroupPolicy {
        protocol: group.protocol,
        destination,
        community,
        decisions,
        bundles: bundles.into_iter().map(|(_, b)| b).collect(),
        conflicts,
    })
}

/// Checks if the new intent can be combined with the one already committed on the same key.
fn reconcile(existing: &Intent, new: &Intent) -> Result<(), ConflictReason> {
    match (existing.decision, new.decision) {
        (Decision::Deny, Decision::Deny) => Ok(()),
        (Decision::Permit(_), Decision::Deny) | (Decision::Deny, Decision::Permit(_)) => {
            Err(ConflictReason::PermitAndDeny)
        }
        (Decision::Permit(a), Decision::Permit(b)) if a == b || new.defers => Ok(()),
        (Decision::Permit(a), Decision::Permit(b)) => {
            Err(ConflictReason::ValueMismatch { existing: a, requested: b })
        }
    }
}

fn conflict(
    topology: &Topology,
    node: RouterId,
    neighbor: RouterId,
    requirement: &RequirementRef,
    other: Option<RequirementRef>,
    reason: ConflictReason,
) -> SynthesisError {
    SynthesisError::Conflict {
        node: topology.name(node).to_string(),
        neighbor: topology.name(neighbor).to_string(),
        requirement: requirement.clone(),
        other,
        reason,
    }
}

/// Generate the intents of a single requirement. Fails with the first hop of a forwarding loop
/// formed by the most preferred next hops.
fn requirement_intents(
    topology: &Topology,
    group: &RequirementGroup,
    req: &ValidatedRequirement,
) -> Result<RequirementIntents, (RouterId, RouterId)> {
    let kind = req.kind();
    let direction = key_direction(group.protocol);

    // next hops of every router, with the index of the most preferred member using that hop
    let mut successors: BTreeMap<RouterId, BTreeMap<RouterId, usize>> = BTreeMap::new();
    for (i, path) in req.paths.iter().enumerate() {
        let rank = if kind == RequirementKind::PathOrder { i } else { 0 };
        for hop in path.windows(2) {
            let r = successors.entry(hop[0]).or_default().entry(hop[1]).or_insert(rank);
            *r = (*r).min(rank);
        }
    }

    // dense rank among the next hops of each router
    let dense: BTreeMap<RouterId, BTreeMap<RouterId, u32>> = successors
        .iter()
        .map(|(a, next_hops)| {
            let ranks: Vec<usize> = next_hops.values().copied().sorted().dedup().collect();
            let dense: BTreeMap<RouterId, u32> = next_hops
                .iter()
                .map(|(b, r)| (*b, ranks.binary_search(r).unwrap_or_else(|p| p) as u32))
                .collect();
            (*a, dense)
        })
        .collect();

    let height = if kind == RequirementKind::KConnected {
        HashMap::new()
    } else {
        heights(&dense, group.destination)?
    };

    let n = topology.num_routers() as u32;
    let value = |a: RouterId, b: RouterId, d: u32| -> u32 {
        match (group.protocol, kind) {
            (Protocol::Bgp, RequirementKind::KConnected) => BGP_DEFAULT_LOCAL_PREF,
            (Protocol::Bgp, _) => {
                let levels = dense.get(&a).and_then(|n| n.values().max()).map_or(1, |m| m + 1);
                BGP_LEAST_PREFERRED_LOCAL_PREF + levels.saturating_sub(d + 1)
            }
            (Protocol::Ospf, RequirementKind::KConnected) => OSPF_DEFAULT_COST,
            (Protocol::Ospf, _) => {
                let ha = height.get(&a).copied().unwrap_or_default();
                let hb = height.get(&b).copied().unwrap_or_default();
                (ha + d * n).saturating_sub(hb).max(1)
            }
            (Protocol::Static, RequirementKind::KConnected) => STATIC_DISTANCE,
            (Protocol::Static, _) => STATIC_DISTANCE + d,
        }
    };

    let defers = kind == RequirementKind::KConnected;
    let mut intents = Vec::new();
    for (a, next_hops) in dense.iter() {
        for b in topology.neighbors_of(*a) {
            let decision = match next_hops.get(&b) {
                Some(d) => Decision::Permit(value(*a, b, *d)),
                None => Decision::Deny,
            };
            intents.push(Intent {
                key: PolicyKey::new(*a, b, direction),
                decision,
                origin: req.reference.clone(),
                defers,
            });
        }
    }

    let mut max_paths = Vec::new();
    if kind == RequirementKind::Ecmp && group.protocol != Protocol::Static {
        let k = req.paths.len() as u32;
        let sources: BTreeSet<RouterId> = req
            .paths
            .iter()
            .filter_map(|p| p.first().copied())
            .filter(|s| *s != group.destination)
            .collect();
        for (a, next_hops) in successors.iter() {
            if next_hops.len() > 1 || sources.contains(a) {
                max_paths.push((*a, k));
            }
        }
    }

    Ok(RequirementIntents { intents, max_paths })
}

/// Distance (in hops) from every router to the destination, following only the most preferred
/// next hops. If several are equally preferred, the longest one counts. Fails if the most
/// preferred next hops form a loop.
fn heights(
    dense: &BTreeMap<RouterId, BTreeMap<RouterId, u32>>,
    destination: RouterId,
) -> Result<HashMap<RouterId, u32>, (RouterId, RouterId)> {
    let mut graph: DiGraphMap<RouterId, ()> = DiGraphMap::new();
    graph.add_node(destination);
    for (a, next_hops) in dense.iter() {
        for (b, _) in next_hops.iter().filter(|(_, d)| **d == 0) {
            graph.add_edge(*a, *b, ());
        }
    }
    let order = toposort(&graph, None).map_err(|cycle| {
        let node = cycle.node_id();
        (node, graph.neighbors(node).next().unwrap_or(node))
    })?;
    let mut height: HashMap<RouterId, u32> = HashMap::new();
    for node in order.into_iter().rev() {
        let h = graph.neighbors(node).filter_map(|b| height.get(&b)).max().map(|h| h + 1);
        height.insert(node, h.unwrap_or(0));
    }
    Ok(height)
}

/// All simple paths from the sources to the destination that only follow permitted next hops of
/// routers without conflict.
fn admitted_paths(
    committed: &BTreeMap<PolicyKey, Intent>,
    conflicted: &BTreeSet<RouterId>,
    sources: &BTreeSet<RouterId>,
    destination: RouterId,
) -> Vec<Vec<RouterId>> {
    let mut next_hops: BTreeMap<RouterId, Vec<RouterId>> = BTreeMap::new();
    for (key, intent) in committed.iter().filter(|(k, _)| !conflicted.contains(&k.router)) {
        if let Decision::Permit(_) = intent.decision {
            next_hops.entry(key.router).or_default().push(key.neighbor);
        }
    }

    let mut paths = Vec::new();
    let mut stack: Vec<Vec<RouterId>> = sources.iter().map(|s| vec![*s]).collect();
    while let Some(path) = stack.pop() {
        let last = match path.last() {
            Some(last) => *last,
            None => continue,
        };
        if last == destination {
            paths.push(path);
            continue;
        }
        for b in next_hops.get(&last).into_iter().flatten() {
            if !path.contains(b) {
                stack.push(path.iter().copied().chain(std::iter::once(*b)).collect());
            }
        }
    }
    paths
}

/// Name of the prefix list matching the destination of the group with this community
fn prefix_list_name(community: Community) -> String {
    format!("PL_{}_{}", community.asn, community.value)
}

/// Lower a decision to the primitives of the protocol.
fn lower(
    group: &RequirementGroup,
    community: Option<Community>,
    networks: &[IpAddr],
    key: &PolicyKey,
    decision: Decision,
) -> Vec<PolicyPrimitive> {
    match group.protocol {
        Protocol::Bgp => {
            let community =
                community.unwrap_or_else(|| Community::new(DEFAULT_COMMUNITY_ASN, 0));
            let list = PrefixList::new(prefix_list_name(community), networks.to_vec());
            let clauses = match decision {
                Decision::Permit(lp) if key.neighbor == group.destination => {
                    vec![RouteMapBuilder::new()
                        .allow()
                        .match_prefix_list(list)
                        .add_community(community)
                        .set_local_pref(lp)
                        .build()]
                }
                // routes toward the destination without the community are dropped
                Decision::Permit(lp) => vec![
                    RouteMapBuilder::new()
                        .allow()
                        .match_prefix_list(list.clone())
                        .match_community(community)
                        .set_local_pref(lp)
                        .build(),
                    RouteMapBuilder::new().deny().match_prefix_list(list).build(),
                ],
                Decision::Deny => {
                    vec![RouteMapBuilder::new().deny().match_prefix_list(list).build()]
                }
            };
            clauses.into_iter().map(PolicyPrimitive::RouteMapClause).collect()
        }
        Protocol::Ospf => vec![PolicyPrimitive::OspfCost(match decision {
            Decision::Permit(cost) => cost,
            Decision::Deny => OSPF_DENY_COST,
        })],
        Protocol::Static => match decision {
            Decision::Permit(distance) => networks
                .iter()
                .map(|prefix| {
                    PolicyPrimitive::StaticRoute(StaticRoute {
                        prefix: *prefix,
                        next_hop: key.neighbor,
                        distance,
                    })
                })
                .collect(),
            Decision::Deny => Vec::new(),
        },
    }
}
