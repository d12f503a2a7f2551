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

//! # Policy Synthesis
//!
//! Turns validated requirement groups into per-router policy primitives. Each group (all
//! requirements sharing protocol and destination) is synthesized on its own, possibly on a worker
//! thread, into a [`GroupPolicy`]. The group policies are then merged into the [`PolicyModel`] on a
//! single thread, in the order of the groups, and every primitive that would overwrite an
//! incompatible one is reported as a conflict.
//!
//! ## Encoding
//!
//! | Protocol | Key                              | Permit                     | Deny          |
//! |----------|----------------------------------|----------------------------|---------------|
//! | BGP      | import route-map `RMap_a_from_b` | local-pref `levels - rank` | deny clause   |
//! | OSPF     | outgoing interface cost of `a`   | cost derived from the rank | cost `65535`  |
//! | Static   | static route of `a` via `b`      | distance `1 + rank`        | no route      |
//!
//! `KConnectedPathsReq` uses the default value (local-pref 100, cost 10, distance 1) for all its
//! members. For BGP, `levels` is the number of distinct ranks among the next hops of `a`, so the
//! least preferred next hop gets local-pref 1.
//!
//! Every BGP clause matches on the prefix list `PL_asn_i` of its group, holding the loopback
//! networks of the destination, and thus never touches routes toward other destinations. Every
//! BGP group also gets its own community `asn:i`, which is attached at the first hop of the route
//! (the neighbor of the destination) and matched on by all further hops. The destination
//! announces its loopback networks. After the per-hop decisions are fixed, every path they admit
//! from a source of the group must be one of its member paths; a path spliced together from hops
//! of different members is reported as conflict.

mod group;
mod policy;
pub mod route_map;

pub use group::{synthesize_group, Decision, GroupPolicy, PolicyBundle};
pub use policy::{NodePolicy, PolicyKey, PolicyModel, PolicyPrimitive, StaticRoute};

use crate::forwarding;
use crate::requirements::{RequirementGroup, RequirementRef, RequirementStore};
use crate::topology::Topology;
use crate::types::{Community, Protocol};
use crate::validation::PathValidator;
use crate::Error;

use log::*;
use std::fmt;
use std::sync::Arc;
use std::thread;
use thiserror::Error;

/// Local preference of the least preferred permitted next hop. Every better rank adds one.
pub const BGP_LEAST_PREFERRED_LOCAL_PREF: u32 = 1;
/// Local preference of routes without any preference
pub const BGP_DEFAULT_LOCAL_PREF: u32 = 100;
/// Cost of an interface without explicit cost
pub const OSPF_DEFAULT_COST: u32 = 10;
/// Cost used to avoid an interface
pub const OSPF_DENY_COST: u32 = 65535;
/// Administrative distance of a static route without preference
pub const STATIC_DISTANCE: u32 = 1;
/// Upper half of all communities generated by the synthesizer
pub const DEFAULT_COMMUNITY_ASN: u32 = 100;

/// Reason why two primitives cannot be combined
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictReason {
    /// One requirement permits the neighbor, the other one denies it
    PermitAndDeny,
    /// Both permit the neighbor, but with a different preference or cost
    ValueMismatch {
        /// Value already committed
        existing: u32,
        /// Value requested by the new requirement
        requested: u32,
    },
    /// The equally preferred next hops of a requirement form a forwarding loop
    ForwardingLoop,
    /// The permitted next hops admit a path toward the destination that is no member path. The
    /// conflict is reported at the hop where the path leaves the member paths.
    SplicedPath(Vec<String>),
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PermitAndDeny => write!(f, "permit and deny on the same neighbor"),
            Self::ValueMismatch { existing, requested } => {
                write!(f, "value {} requested, but {} is already set", requested, existing)
            }
            Self::ForwardingLoop => write!(f, "equally preferred next hops form a loop"),
            Self::SplicedPath(path) => {
                write!(f, "the permitted next hops admit the path {}", path.join(" -> "))
            }
        }
    }
}

fn repr_other(other: &Option<RequirementRef>) -> String {
    match other {
        Some(r) => format!(" (conflicts with {})", r),
        None => String::new(),
    }
}

/// Error raised during synthesis
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SynthesisError {
    /// Two requirements cannot be satisfied at the same time
    #[error(
        "Conflicting requirement {requirement} at {node} toward {neighbor}: {reason}{}",
        repr_other(.other)
    )]
    Conflict {
        /// Router where the conflict happens
        node: String,
        /// Neighbor the conflicting primitive is scoped to
        neighbor: String,
        /// The requirement that could not be applied
        requirement: RequirementRef,
        /// The requirement that installed the existing primitive
        other: Option<RequirementRef>,
        /// Why they conflict
        reason: ConflictReason,
    },
    /// After synthesis, a neighbor of an involved router has no policy decision
    #[error("No policy decision for ({protocol}, {destination}) at {node} toward {neighbor}")]
    UnderconstrainedNeighbor {
        /// Protocol of the group
        protocol: Protocol,
        /// Destination of the group
        destination: String,
        /// The involved router
        node: String,
        /// The neighbor without decision
        neighbor: String,
    },
    /// BGP announcements and static routes need the loopback networks of the destination
    #[error("No loopback address at {destination}, required by the {protocol} requirements")]
    MissingLoopback {
        /// Protocol of the group
        protocol: Protocol,
        /// Destination of the group
        destination: String,
    },
    /// A worker thread panicked
    #[error("A synthesis worker thread panicked")]
    WorkerPanicked,
}

/// Options of the synthesizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisOptions {
    /// Number of worker threads. `None` uses one thread per CPU.
    pub threads: Option<usize>,
    /// Accept loopback self hops in paths
    pub allow_self_paths: bool,
    /// Upper half of the generated communities
    pub community_asn: u32,
    /// Check the path fidelity of the result, and log every violation
    pub forwarding_check: bool,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            threads: None,
            allow_self_paths: false,
            community_asn: DEFAULT_COMMUNITY_ASN,
            forwarding_check: false,
        }
    }
}

/// # Synthesizer
///
/// ```
/// use routesynth::example_networks::velenj;
/// use routesynth::requirements::RequirementStore;
/// use routesynth::synthesis::{SynthesisOptions, Synthesizer};
/// use routesynth::synthesis::route_map::RouteMapDirection::Incoming;
///
/// let topo = velenj::topology();
/// let mut store = RequirementStore::new(&topo);
/// store.add(velenj::requirement()).unwrap();
///
/// let model = Synthesizer::new(&topo, SynthesisOptions::default()).synthesize(&store).unwrap();
///
/// let v = topo.get_router_id("Velenj").unwrap();
/// let peer = topo.get_router_id("PeerVelenj").unwrap();
/// let maps = model.get(v).unwrap().route_map(peer, Incoming);
/// assert_eq!(maps[0].local_pref(), Some(1));
/// ```
#[derive(Debug, Clone)]
pub struct Synthesizer<'a> {
    topology: &'a Topology,
    options: SynthesisOptions,
}

impl<'a> Synthesizer<'a> {
    /// Create a new synthesizer on the topology
    pub fn new(topology: &'a Topology, options: SynthesisOptions) -> Self {
        Self { topology, options }
    }

    /// Validate and group the requirements of the store.
    pub fn validate(&self, store: &RequirementStore) -> Result<Vec<RequirementGroup>, Error> {
        Ok(PathValidator::new(self.topology)
            .allow_self_paths(self.options.allow_self_paths)
            .validate(store)?)
    }

    /// Synthesize the policy, and fail if any conflict was found.
    pub fn synthesize(&self, store: &RequirementStore) -> Result<PolicyModel, Error> {
        let (model, conflicts) = self.synthesize_partial(store)?;
        if conflicts.is_empty() {
            info!("Synthesized the policy of {} routers", model.len());
            Ok(model)
        } else {
            error!("Synthesis failed with {} conflicts", conflicts.len());
            Err(Error::Conflicts(conflicts))
        }
    }

    /// Synthesize the policy. Conflicts do not abort the synthesis: the model contains everything
    /// that could be committed, and the conflicts are returned alongside. Structural errors (like
    /// invalid paths) still abort.
    pub fn synthesize_partial(
        &self,
        store: &RequirementStore,
    ) -> Result<(PolicyModel, Vec<SynthesisError>), Error> {
        let groups = self.validate(store)?;
        let communities = assign_communities(&groups, self.options.community_asn);
        let results = self.synthesize_groups(&groups, &communities)?;

        let mut model = PolicyModel::default();
        let mut conflicts = Vec::new();
        for group_policy in results {
            for conflict in group_policy.conflicts {
                warn!("{}", conflict);
                conflicts.push(conflict);
            }
            for bundle in group_policy.bundles.iter() {
                if let Err(conflict) = model.merge_bundle(self.topology, bundle) {
                    warn!("{}", conflict);
                    conflicts.push(conflict);
                }
            }
        }
        model.finalize();

        if self.options.forwarding_check {
            for violation in forwarding::check_fidelity(self.topology, &model, &groups) {
                warn!("{}", violation);
            }
        }

        Ok((model, conflicts))
    }

    /// Synthesize every group, in parallel if more than one thread is configured. The result is in
    /// the order of `groups`.
    fn synthesize_groups(
        &self,
        groups: &[RequirementGroup],
        communities: &[Option<Community>],
    ) -> Result<Vec<GroupPolicy>, Error> {
        let n_threads = self.options.threads.unwrap_or_else(num_cpus::get).max(1).min(groups.len());

        if n_threads <= 1 {
            debug!("Synthesizing {} groups on the main thread", groups.len());
            return groups
                .iter()
                .zip(communities.iter())
                .map(|(g, c)| synthesize_group(self.topology, g, *c).map_err(Error::from))
                .collect();
        }

        info!("Spawning {} threads for {} groups", n_threads, groups.len());
        let topology = Arc::new(self.topology.clone());

        let handles = (0..n_threads)
            .map(|t| {
                let topo = topology.clone();
                let work: Vec<(usize, RequirementGroup, Option<Community>)> = groups
                    .iter()
                    .zip(communities.iter())
                    .enumerate()
                    .filter(|(i, _)| i % n_threads == t)
                    .map(|(i, (g, c))| (i, g.clone(), *c))
                    .collect();
                thread::spawn(move || {
                    work.into_iter()
                        .map(|(i, g, c)| (i, synthesize_group(&topo, &g, c)))
                        .collect::<Vec<_>>()
                })
            })
            .collect::<Vec<_>>();

        let mut results: Vec<(usize, GroupPolicy)> = Vec::with_capacity(groups.len());
        for handle in handles {
            let finished = handle.join().map_err(|_| SynthesisError::WorkerPanicked)?;
            for (i, result) in finished {
                results.push((i, result?));
            }
        }
        results.sort_by_key(|(i, _)| *i);
        Ok(results.into_iter().map(|(_, r)| r).collect())
    }
}

/// Every BGP group gets a distinct community `asn:i`, where `i` counts the BGP groups in order.
fn assign_communities(groups: &[RequirementGroup], asn: u32) -> Vec<Option<Community>> {
    let mut next = 0;
    groups
        .iter()
        .map(|g| {
            if g.protocol == Protocol::Bgp {
                next += 1;
                Some(Community::new(asn, next - 1))
            } else {
                None
            }
        })
        .collect()
}

/// # Synthesize the policy
///
/// Synthesizes the policy for all requirements of the store on a single thread, and fails on the
/// first structural error, or with all conflicts found.
///
/// ```
/// use routesynth::example_networks::diamond;
/// use routesynth::requirements::*;
/// use routesynth::synthesize;
/// use routesynth::types::Protocol;
/// use routesynth::Error;
///
/// fn main() -> Result<(), Error> {
///     let topo = diamond::topology();
///     let mut store = RequirementStore::new(&topo);
///     store.add(Requirement::Path(PathReq::new(Protocol::Bgp, "D", vec!["S", "A", "D"])))?;
///
///     let model = synthesize(&topo, &store)?;
///     assert!(!model.is_empty());
///     Ok(())
/// }
/// ```
pub fn synthesize(topology: &Topology, store: &RequirementStore) -> Result<PolicyModel, Error> {
    let options = SynthesisOptions { threads: Some(1), ..Default::default() };
    Synthesizer::new(topology, options).synthesize(store)
}

/// # Synthesize the policy using multiple parallel threads
///
/// Same as [`synthesize`], but the requirement groups are distributed over `n_threads` worker
/// threads (or one per CPU if `None`).
pub fn synthesize_parallel(
    topology: &Topology,
    store: &RequirementStore,
    n_threads: Option<usize>,
) -> Result<PolicyModel, Error> {
    let options = SynthesisOptions { threads: n_threads, ..Default::default() };
    Synthesizer::new(topology, options).synthesize(store)
}
