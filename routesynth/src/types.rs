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

//! Module containing the basic type definitions shared by all stages

use petgraph::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

type IndexType = u32;
/// Router Identification (and index into the topology graph)
pub type RouterId = NodeIndex<IndexType>;

/// AS Number
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AsId(pub u32);

impl fmt::Display for AsId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Routing protocol a requirement is expressed for.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy, Serialize, Deserialize)]
pub enum Protocol {
    /// Border Gateway Protocol, steered with import route-maps
    Bgp,
    /// OSPF, steered with outgoing interface costs
    Ospf,
    /// Static routes toward the loopbacks of the destination
    Static,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bgp => write!(f, "BGP"),
            Self::Ospf => write!(f, "OSPF"),
            Self::Static => write!(f, "Static"),
        }
    }
}

/// The protocol name is not one of `BGP`, `OSPF` or `Static`.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown protocol: {0}")]
pub struct UnknownProtocol(pub String);

impl FromStr for Protocol {
    type Err = UnknownProtocol;

    /// Parses the protocol name. The name may be prefixed with `Protocols.`, and is matched case
    /// insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.strip_prefix("Protocols.").unwrap_or(s);
        match name.to_ascii_lowercase().as_str() {
            "bgp" => Ok(Self::Bgp),
            "ospf" => Ok(Self::Ospf),
            "static" => Ok(Self::Static),
            _ => Err(UnknownProtocol(s.to_string())),
        }
    }
}

/// BGP community in the `asn:value` notation.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Community {
    /// Upper half, usually the AS number of the operator
    pub asn: u32,
    /// Lower half
    pub value: u32,
}

impl Community {
    /// Create a new community
    pub fn new(asn: u32, value: u32) -> Self {
        Self { asn, value }
    }

    /// Name of the standard community-list matching exactly this community.
    ///
    /// ```
    /// # use routesynth::types::Community;
    /// assert_eq!(Community::new(100, 3).list_name(), "CL_100_3");
    /// ```
    pub fn list_name(&self) -> String {
        format!("CL_{}_{}", self.asn, self.value)
    }
}

impl fmt::Display for Community {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.asn, self.value)
    }
}
