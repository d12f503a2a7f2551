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

//! # Diamond Network
//!
//! ```text
//!      A
//!    /   \
//!  S       D
//!    \   /
//!      B
//! ```
//!
//! Every router has its own AS and a single loopback `192.168.0.x/32`.

use crate::requirements::{PathReq, PathSetReq, Requirement};
use crate::topology::{IpAddr, Topology};
use crate::types::{AsId, Protocol};

use std::net::Ipv4Addr;

/// Get the topology
pub fn topology() -> Topology {
    let mut t = Topology::new();
    for (i, name) in ["S", "A", "B", "D"].iter().enumerate() {
        let lo = IpAddr::new(Ipv4Addr::new(192, 168, 0, i as u8 + 1), 32);
        t.add_router(*name, Some(AsId(65001 + i as u32)), vec![lo]).unwrap();
    }
    t.connect("S", "A").unwrap();
    t.connect("S", "B").unwrap();
    t.connect("A", "D").unwrap();
    t.connect("B", "D").unwrap();
    t
}

/// Path `S -> A -> D` (or `S -> B -> D` if `via_b`) for the given protocol
pub fn path(protocol: Protocol, via_b: bool) -> PathReq {
    let middle = if via_b { "B" } else { "A" };
    PathReq::new(protocol, "D", vec!["S", middle, "D"])
}

/// BGP traffic from S to D is load-balanced over A and B.
pub fn ecmp_requirement() -> Requirement {
    Requirement::Ecmp(PathSetReq::new(
        Protocol::Bgp,
        "D",
        vec![path(Protocol::Bgp, false), path(Protocol::Bgp, true)],
    ))
}

/// Traffic from S to D prefers A over B.
pub fn order_requirement(protocol: Protocol) -> Requirement {
    Requirement::PathOrder(PathSetReq::new(
        protocol,
        "D",
        vec![path(protocol, false), path(protocol, true)],
    ))
}
