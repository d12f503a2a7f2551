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

//! # Requirements
//!
//! The four requirement kinds describe how traffic toward a destination should be forwarded:
//!
//! - [`PathReq`]: traffic must take exactly this path.
//! - `ECMPPathsReq`: traffic must be load-balanced over all members.
//! - `PathOrderReq`: the members are used in the listed order of preference.
//! - `KConnectedPathsReq`: any of the members may be used, but no other path.
//!
//! The three set kinds share the [`PathSetReq`] payload, and all four are collected in the
//! [`Requirement`] sum type.

pub mod parser;
mod store;

pub use parser::{parse_requirements, ParseError};
pub use store::{GroupKey, RequirementError, RequirementStore};

use crate::topology::Topology;
use crate::types::{Protocol, RouterId};
use crate::Error;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Traffic toward `destination` must follow `path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathReq {
    /// Protocol used to realize the path
    pub protocol: Protocol,
    /// Destination node
    pub destination: String,
    /// Node names, starting at the source and ending at the destination
    pub path: Vec<String>,
    /// Reserved flag, stored and printed but never interpreted
    pub exact: bool,
}

impl PathReq {
    /// Create a new path requirement with `exact` set to false.
    pub fn new<S: Into<String>>(
        protocol: Protocol,
        destination: impl Into<String>,
        path: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            protocol,
            destination: destination.into(),
            path: path.into_iter().map(|s| s.into()).collect(),
            exact: false,
        }
    }
}

impl fmt::Display for PathReq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PathReq({}, {}, [{}], {})",
            self.protocol,
            self.destination,
            self.path.iter().join(", "),
            repr_bool(self.exact)
        )
    }
}

/// Payload of the requirement kinds that combine several paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSetReq {
    /// Protocol, shared with all members
    pub protocol: Protocol,
    /// Destination, shared with all members
    pub destination: String,
    /// Members. The order is only significant for `PathOrderReq`.
    pub paths: Vec<PathReq>,
    /// Reserved flag
    pub exact: bool,
}

impl PathSetReq {
    /// Create a new set of paths with `exact` set to false.
    pub fn new(protocol: Protocol, destination: impl Into<String>, paths: Vec<PathReq>) -> Self {
        Self { protocol, destination: destination.into(), paths, exact: false }
    }
}

/// Kind of a requirement. The ordering is the order of decreasing strictness in which
/// requirements of one group are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RequirementKind {
    /// `PathReq`
    Path,
    /// `PathOrderReq`
    PathOrder,
    /// `ECMPPathsReq`
    Ecmp,
    /// `KConnectedPathsReq`
    KConnected,
}

impl RequirementKind {
    /// Name of the kind in the formal grammar
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Path => "PathReq",
            Self::PathOrder => "PathOrderReq",
            Self::Ecmp => "ECMPPathsReq",
            Self::KConnected => "KConnectedPathsReq",
        }
    }
}

impl fmt::Display for RequirementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// A single requirement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Requirement {
    /// Traffic must take exactly this path.
    Path(PathReq),
    /// Traffic must be load-balanced over all members.
    Ecmp(PathSetReq),
    /// Members are preferred in the listed order.
    PathOrder(PathSetReq),
    /// Any member may be used, but no other path.
    KConnected(PathSetReq),
}

impl Requirement {
    /// Kind of the requirement
    pub fn kind(&self) -> RequirementKind {
        match self {
            Self::Path(_) => RequirementKind::Path,
            Self::Ecmp(_) => RequirementKind::Ecmp,
            Self::PathOrder(_) => RequirementKind::PathOrder,
            Self::KConnected(_) => RequirementKind::KConnected,
        }
    }

    /// Protocol of the requirement
    pub fn protocol(&self) -> Protocol {
        match self {
            Self::Path(r) => r.protocol,
            Self::Ecmp(r) | Self::PathOrder(r) | Self::KConnected(r) => r.protocol,
        }
    }

    /// Destination of the requirement
    pub fn destination(&self) -> &str {
        match self {
            Self::Path(r) => &r.destination,
            Self::Ecmp(r) | Self::PathOrder(r) | Self::KConnected(r) => &r.destination,
        }
    }

    /// The reserved `exact` flag
    pub fn exact(&self) -> bool {
        match self {
            Self::Path(r) => r.exact,
            Self::Ecmp(r) | Self::PathOrder(r) | Self::KConnected(r) => r.exact,
        }
    }

    /// All member paths. A `PathReq` is its own single member.
    pub fn members(&self) -> Vec<&PathReq> {
        match self {
            Self::Path(r) => vec![r],
            Self::Ecmp(r) | Self::PathOrder(r) | Self::KConnected(r) => r.paths.iter().collect(),
        }
    }

    /// Reference used to attribute errors to this requirement.
    pub fn reference(&self, index: usize) -> RequirementRef {
        RequirementRef {
            index,
            kind: self.kind(),
            protocol: self.protocol(),
            destination: self.destination().to_string(),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(r) => fmt::Display::fmt(r, f),
            Self::Ecmp(r) | Self::PathOrder(r) | Self::KConnected(r) => write!(
                f,
                "{}({}, {}, [{}], {})",
                self.kind(),
                r.protocol,
                r.destination,
                r.paths.iter().join(", "),
                repr_bool(r.exact)
            ),
        }
    }
}

fn repr_bool(b: bool) -> &'static str {
    if b {
        "True"
    } else {
        "False"
    }
}

/// Short reference to a requirement, naming its kind, protocol, destination, and the position in
/// which it was added to the store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequirementRef {
    /// Index in the [`RequirementStore`]
    pub index: usize,
    /// Kind
    pub kind: RequirementKind,
    /// Protocol
    pub protocol: Protocol,
    /// Destination name
    pub destination: String,
}

impl fmt::Display for RequirementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}, {}) #{}", self.kind, self.protocol, self.destination, self.index)
    }
}

/// Role a node plays with respect to a set of requirements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Destination of at least one requirement
    Destination,
    /// First node of at least one member path
    Source,
    /// Intermediate node of a member path
    Relay,
    /// Not part of any requirement
    NonInvolved,
}

/// Computes the role of `node` with respect to `requirements`. If a node plays several roles, the
/// destination role dominates the source role, which dominates the relay role.
///
/// ```
/// use routesynth::requirements::*;
/// use routesynth::types::Protocol;
///
/// let req = Requirement::Path(PathReq::new(Protocol::Bgp, "D", vec!["A", "B", "D"]));
/// assert_eq!(role_of("A", &[req.clone()]), Role::Source);
/// assert_eq!(role_of("B", &[req.clone()]), Role::Relay);
/// assert_eq!(role_of("D", &[req.clone()]), Role::Destination);
/// assert_eq!(role_of("X", &[req]), Role::NonInvolved);
/// ```
pub fn role_of(node: &str, requirements: &[Requirement]) -> Role {
    if requirements.iter().any(|r| r.destination() == node) {
        return Role::Destination;
    }
    let paths = || requirements.iter().flat_map(|r| r.members()).map(|p| &p.path);
    if paths().any(|p| p.first().map(|s| s == node).unwrap_or(false)) {
        Role::Source
    } else if paths().any(|p| p.iter().any(|s| s == node)) {
        Role::Relay
    } else {
        Role::NonInvolved
    }
}

/// A requirement whose paths were resolved to router ids and checked against the topology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequirement {
    /// Reference to the source requirement
    pub reference: RequirementRef,
    /// Reserved flag
    pub exact: bool,
    /// Member paths, from the source to the destination
    pub paths: Vec<Vec<RouterId>>,
}

impl ValidatedRequirement {
    /// Kind of the requirement
    pub fn kind(&self) -> RequirementKind {
        self.reference.kind
    }
}

/// All validated requirements sharing the same protocol and destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementGroup {
    /// Protocol
    pub protocol: Protocol,
    /// Destination
    pub destination: RouterId,
    /// Requirements, in the order they were added
    pub requirements: Vec<ValidatedRequirement>,
}

/// Translates an operator intent into formal requirements. Natural-language translation lives
/// outside of this crate, behind this trait.
pub trait IntentTranslator {
    /// Translate the intent into a sequence of requirements on the given topology.
    fn translate(&self, intent: &str, topology: &Topology) -> Result<Vec<Requirement>, Error>;
}

/// Translator accepting intents already written in the formal requirement grammar.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormalTranslator;

impl IntentTranslator for FormalTranslator {
    fn translate(&self, intent: &str, _topology: &Topology) -> Result<Vec<Requirement>, Error> {
        Ok(parse_requirements(intent)?)
    }
}
