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

//! Storage of the structurally valid requirements, grouped by protocol and destination.

use super::{Requirement, RequirementRef};
use crate::topology::Topology;
use crate::types::Protocol;

use log::*;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use thiserror::Error;

/// A requirement is structurally malformed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequirementError {
    /// The destination is not part of the topology
    #[error("Malformed requirement {requirement}: unknown destination {destination}")]
    UnknownDestination {
        /// The offending requirement
        requirement: RequirementRef,
        /// The unknown destination
        destination: String,
    },
    /// A member uses a different protocol than the requirement itself
    #[error("Malformed requirement {requirement}: member {member} uses protocol {found}")]
    ProtocolMismatch {
        /// The offending requirement
        requirement: RequirementRef,
        /// Index of the member path
        member: usize,
        /// Protocol of the member
        found: Protocol,
    },
    /// A member has a different destination than the requirement itself
    #[error("Malformed requirement {requirement}: member {member} has destination {found}")]
    DestinationMismatch {
        /// The offending requirement
        requirement: RequirementRef,
        /// Index of the member path
        member: usize,
        /// Destination of the member
        found: String,
    },
    /// A path has no nodes
    #[error("Malformed requirement {requirement}: member {member} has an empty path")]
    EmptyPath {
        /// The offending requirement
        requirement: RequirementRef,
        /// Index of the member path
        member: usize,
    },
    /// A set requirement without any member
    #[error("Malformed requirement {requirement}: no member paths")]
    NoMembers {
        /// The offending requirement
        requirement: RequirementRef,
    },
    /// Static routes and BGP announcements need a network of the destination
    #[error("Malformed requirement {requirement}: destination has no loopback address")]
    NoLoopback {
        /// The offending requirement
        requirement: RequirementRef,
    },
}

/// Key of a requirement group.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupKey {
    /// Protocol
    pub protocol: Protocol,
    /// Name of the destination
    pub destination: String,
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.protocol, self.destination)
    }
}

/// # Requirement Store
///
/// Holds all requirements of one run, indexed by the order in which they were added, and grouped
/// by `(protocol, destination)`. Groups iterate in the order of protocol, then destination name.
///
/// ```
/// use routesynth::example_networks::velenj;
/// use routesynth::requirements::*;
/// use routesynth::types::Protocol;
///
/// let topo = velenj::topology();
/// let mut store = RequirementStore::new(&topo);
/// store.add(velenj::requirement()).unwrap();
/// assert_eq!(store.requirements_for(Protocol::Bgp, "PeerVelenj").len(), 1);
/// assert!(store.requirements_for(Protocol::Ospf, "PeerVelenj").is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequirementStore {
    nodes: HashSet<String>,
    loopbacks: HashSet<String>,
    requirements: Vec<Requirement>,
    groups: BTreeMap<GroupKey, Vec<usize>>,
}

impl RequirementStore {
    /// Create an empty store for requirements on the given topology.
    pub fn new(topology: &Topology) -> Self {
        let routers = topology.routers();
        let nodes = routers.iter().map(|r| topology.name(*r).to_string()).collect();
        let loopbacks = routers
            .iter()
            .filter_map(|r| topology.get_router(*r))
            .filter(|r| !r.loopbacks.is_empty())
            .map(|r| r.name.clone())
            .collect();
        Self { nodes, loopbacks, requirements: Vec::new(), groups: BTreeMap::new() }
    }

    /// Add a requirement after checking its structure. Returns the index of the requirement.
    pub fn add(&mut self, requirement: Requirement) -> Result<usize, RequirementError> {
        let index = self.requirements.len();
        let reference = requirement.reference(index);

        if !self.nodes.contains(requirement.destination()) {
            return Err(RequirementError::UnknownDestination {
                destination: requirement.destination().to_string(),
                requirement: reference,
            });
        }
        if requirement.protocol() != Protocol::Ospf
            && !self.loopbacks.contains(requirement.destination())
        {
            return Err(RequirementError::NoLoopback { requirement: reference });
        }

        let members = requirement.members();
        if members.is_empty() {
            return Err(RequirementError::NoMembers { requirement: reference });
        }
        for (member, path) in members.into_iter().enumerate() {
            if path.protocol != requirement.protocol() {
                return Err(RequirementError::ProtocolMismatch {
                    requirement: reference,
                    member,
                    found: path.protocol,
                });
            }
            if path.destination != requirement.destination() {
                return Err(RequirementError::DestinationMismatch {
                    requirement: reference,
                    member,
                    found: path.destination.clone(),
                });
            }
            if path.path.is_empty() {
                return Err(RequirementError::EmptyPath { requirement: reference, member });
            }
        }

        debug!("Add requirement {}", reference);
        let key = GroupKey {
            protocol: requirement.protocol(),
            destination: requirement.destination().to_string(),
        };
        self.groups.entry(key).or_insert_with(Vec::new).push(index);
        self.requirements.push(requirement);
        Ok(index)
    }

    /// Add all requirements, stopping at the first malformed one.
    pub fn extend(
        &mut self,
        requirements: impl IntoIterator<Item = Requirement>,
    ) -> Result<(), RequirementError> {
        for r in requirements {
            self.add(r)?;
        }
        Ok(())
    }

    /// All requirements of the group `(protocol, destination)`, in the order they were added.
    pub fn requirements_for(&self, protocol: Protocol, destination: &str) -> Vec<&Requirement> {
        let key = GroupKey { protocol, destination: destination.to_string() };
        self.group(&key).into_iter().map(|(_, r)| r).collect()
    }

    /// All requirements of a group, together with their index.
    pub fn group(&self, key: &GroupKey) -> Vec<(usize, &Requirement)> {
        self.groups
            .get(key)
            .map(|idx| idx.iter().map(|i| (*i, &self.requirements[*i])).collect())
            .unwrap_or_default()
    }

    /// All group keys, ordered by protocol and destination name.
    pub fn groups(&self) -> impl Iterator<Item = &GroupKey> {
        self.groups.keys()
    }

    /// Returns the requirement with the given index
    pub fn get(&self, index: usize) -> Option<&Requirement> {
        self.requirements.get(index)
    }

    /// Iterate over all requirements, in the order they were added.
    pub fn iter(&self) -> impl Iterator<Item = &Requirement> {
        self.requirements.iter()
    }

    /// Number of requirements
    pub fn len(&self) -> usize {
        self.requirements.len()
    }

    /// Returns true if the store holds no requirement
    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }
}
