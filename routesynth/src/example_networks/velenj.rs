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

//! # Velenj Network
//!
//! ```text
//!            Celje (AS30)
//!                 |
//! Sloven (AS250) -- Velenj (AS260) -- PeerVelenj (AS1020)
//! ```
//!
//! Velenj must reach PeerVelenj directly, and must not use any route learned from Celje or
//! Sloven.

use crate::requirements::{PathReq, PathSetReq, Requirement};
use crate::topology::{IpAddr, Topology};
use crate::types::{AsId, Protocol};

use std::net::Ipv4Addr;

/// Get the topology
pub fn topology() -> Topology {
    let mut t = Topology::new();
    let routers = [("Celje", 30), ("Velenj", 260), ("Sloven", 250), ("PeerVelenj", 1020)];
    for (i, (name, as_id)) in routers.iter().enumerate() {
        let lo = IpAddr::new(Ipv4Addr::new(192, 168, 0, i as u8 + 1), 32);
        t.add_router(*name, Some(AsId(*as_id)), vec![lo]).unwrap();
    }
    t.connect("Velenj", "Celje").unwrap();
    t.connect("Velenj", "Sloven").unwrap();
    t.connect("Velenj", "PeerVelenj").unwrap();
    t
}

/// Get the requirement: `PathOrderReq(BGP, PeerVelenj, [PathReq(BGP, PeerVelenj, [Velenj,
/// PeerVelenj])])`
pub fn requirement() -> Requirement {
    Requirement::PathOrder(PathSetReq::new(
        Protocol::Bgp,
        "PeerVelenj",
        vec![PathReq::new(Protocol::Bgp, "PeerVelenj", vec!["Velenj", "PeerVelenj"])],
    ))
}
