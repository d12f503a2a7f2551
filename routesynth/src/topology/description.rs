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

//! Structural topology description, as read from JSON.
//!
//! ```json
//! {
//!   "nodes": ["Celje", {"name": "Velenj", "as_number": 260, "loopbacks": ["192.168.0.1/32"]}],
//!   "edges": [
//!     {"node1": {"name": "Celje", "interface": "eth0", "ip": "10.0.0.1/24"},
//!      "node2": {"name": "Velenj", "interface": "eth0", "ip": "10.0.0.2/24"}}
//!   ]
//! }
//! ```

use super::{Endpoint, IpAddr};

use serde::{Deserialize, Serialize};

/// Description of the whole topology
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyDescription {
    /// All nodes
    pub nodes: Vec<NodeDescription>,
    /// All edges
    #[serde(default)]
    pub edges: Vec<EdgeDescription>,
}

/// A node is either given by its name only, or with its annotations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeDescription {
    /// Only the name, without AS number or loopbacks
    Name(String),
    /// Node with its annotations
    Annotated {
        /// Name of the node
        name: String,
        /// AS number
        #[serde(default, alias = "asnum")]
        as_number: Option<u32>,
        /// Loopback addresses
        #[serde(default)]
        loopbacks: Vec<IpAddr>,
    },
}

impl NodeDescription {
    /// Name of the node
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) => name,
            Self::Annotated { name, .. } => name,
        }
    }

    /// AS number of the node
    pub fn as_number(&self) -> Option<u32> {
        match self {
            Self::Name(_) => None,
            Self::Annotated { as_number, .. } => *as_number,
        }
    }

    /// Loopbacks of the node
    pub fn loopbacks(&self) -> &[IpAddr] {
        match self {
            Self::Name(_) => &[],
            Self::Annotated { loopbacks, .. } => loopbacks,
        }
    }
}

/// Edge between two endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeDescription {
    /// First endpoint
    pub node1: EndpointDescription,
    /// Second endpoint
    pub node2: EndpointDescription,
}

/// Endpoint of an edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointDescription {
    /// Name of the node
    pub name: String,
    /// Interface name
    pub interface: String,
    /// Interface address, as `a.b.c.d/len`
    pub ip: IpAddr,
}

impl From<EndpointDescription> for Endpoint {
    fn from(desc: EndpointDescription) -> Self {
        Endpoint { node: desc.name, interface: desc.interface, addr: desc.ip }
    }
}
