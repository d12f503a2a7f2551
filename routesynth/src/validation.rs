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

//! # Path Validation
//!
//! Checks that every path of every requirement is a simple walk over the links of the topology,
//! ending at the destination, and resolves the node names to router ids.

use crate::requirements::{
    GroupKey, PathReq, RequirementGroup, RequirementRef, RequirementStore, ValidatedRequirement,
};
use crate::topology::Topology;
use crate::types::{Protocol, RouterId};

use log::*;
use std::collections::HashSet;
use thiserror::Error;

/// A path of a requirement is invalid.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    /// The path references a node that is not part of the topology
    #[error("{requirement}: unknown node {node} in path")]
    UnknownNode {
        /// The offending requirement
        requirement: RequirementRef,
        /// Name of the unknown node
        node: String,
    },
    /// Two consecutive nodes of the path are not adjacent. `index` is the position of the first
    /// node of the broken hop.
    #[error("{requirement}: discontinuous path at hop {index} ({from} -> {to})")]
    DiscontinuousPath {
        /// The offending requirement
        requirement: RequirementRef,
        /// Position of the hop
        index: usize,
        /// First node of the hop
        from: String,
        /// Second node of the hop
        to: String,
    },
    /// The path does not end at the destination
    #[error("{requirement}: path ends at {found} instead of {expected}")]
    DestinationMismatch {
        /// The offending requirement
        requirement: RequirementRef,
        /// The destination of the requirement
        expected: String,
        /// The last node of the path
        found: String,
    },
    /// The path visits a node twice
    #[error("{requirement}: path visits {node} twice")]
    CyclicPath {
        /// The offending requirement
        requirement: RequirementRef,
        /// The repeated node
        node: String,
    },
    /// A node on a BGP path has no AS number
    #[error("{requirement}: node {node} does not speak BGP")]
    NotBgpSpeaker {
        /// The offending requirement
        requirement: RequirementRef,
        /// The node without AS number
        node: String,
    },
}

/// # Path Validator
///
/// Checks run in the order: unknown node, destination mismatch, cyclic path, discontinuous path.
/// Loopback self hops (the same node twice in a row) are rejected as cyclic, unless
/// [`PathValidator::allow_self_paths`] is enabled, in which case they are collapsed.
#[derive(Debug, Clone)]
pub struct PathValidator<'a> {
    topology: &'a Topology,
    allow_self_paths: bool,
}

impl<'a> PathValidator<'a> {
    /// Create a new validator for the given topology.
    pub fn new(topology: &'a Topology) -> Self {
        Self { topology, allow_self_paths: false }
    }

    /// Accept (and collapse) loopback self hops.
    pub fn allow_self_paths(mut self, allow: bool) -> Self {
        self.allow_self_paths = allow;
        self
    }

    /// Validate a single path and return the resolved router ids.
    pub fn validate_path(
        &self,
        requirement: &RequirementRef,
        path: &PathReq,
    ) -> Result<Vec<RouterId>, PathError> {
        let mut ids = Vec::with_capacity(path.path.len());
        // last position of every kept id in the path as written
        let mut positions = Vec::with_capacity(path.path.len());
        for (position, name) in path.path.iter().enumerate() {
            let id = self.topology.get_router_id(name).ok_or_else(|| PathError::UnknownNode {
                requirement: requirement.clone(),
                node: name.clone(),
            })?;
            if self.allow_self_paths && ids.last() == Some(&id) {
                trace!("{}: collapse self hop at {}", requirement, name);
                if let Some(p) = positions.last_mut() {
                    *p = position;
                }
                continue;
            }
            ids.push(id);
            positions.push(position);
        }

        match path.path.last() {
            Some(last) if last == &path.destination => {}
            last => {
                return Err(PathError::DestinationMismatch {
                    requirement: requirement.clone(),
                    expected: path.destination.clone(),
                    found: last.cloned().unwrap_or_default(),
                })
            }
        }

        let mut seen: HashSet<RouterId> = HashSet::new();
        for id in ids.iter() {
            if !seen.insert(*id) {
                return Err(PathError::CyclicPath {
                    requirement: requirement.clone(),
                    node: self.topology.name(*id).to_string(),
                });
            }
        }

        for (i, hop) in ids.windows(2).enumerate() {
            if self.topology.edge_between(hop[0], hop[1]).is_none() {
                return Err(PathError::DiscontinuousPath {
                    requirement: requirement.clone(),
                    index: positions[i],
                    from: self.topology.name(hop[0]).to_string(),
                    to: self.topology.name(hop[1]).to_string(),
                });
            }
        }

        if path.protocol == Protocol::Bgp {
            if let Some(id) = ids.iter().find(|id| self.topology.as_id(**id).is_none()) {
                return Err(PathError::NotBgpSpeaker {
                    requirement: requirement.clone(),
                    node: self.topology.name(*id).to_string(),
                });
            }
        }

        Ok(ids)
    }

    /// Validate all requirements of a group.
    pub fn validate_group(
        &self,
        store: &RequirementStore,
        key: &GroupKey,
    ) -> Result<Option<RequirementGroup>, PathError> {
        let destination = match self.topology.get_router_id(&key.destination) {
            Some(d) => d,
            None => return Ok(None),
        };
        let mut requirements = Vec::new();
        for (index, req) in store.group(key) {
            let reference = req.reference(index);
            let paths = req
                .members()
                .into_iter()
                .map(|p| self.validate_path(&reference, p))
                .collect::<Result<Vec<_>, _>>()?;
            requirements.push(ValidatedRequirement { reference, exact: req.exact(), paths });
        }
        Ok(Some(RequirementGroup { protocol: key.protocol, destination, requirements }))
    }

    /// Validate every requirement of the store, returning the groups in the order of the store.
    pub fn validate(&self, store: &RequirementStore) -> Result<Vec<RequirementGroup>, PathError> {
        let mut groups = Vec::new();
        for key in store.groups() {
            if let Some(group) = self.validate_group(store, key)? {
                groups.push(group);
            }
        }
        debug!("Validated {} requirement groups", groups.len());
        Ok(groups)
    }
}
