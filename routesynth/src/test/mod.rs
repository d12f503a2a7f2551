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

use crate::topology::{IpAddr, Topology};
use crate::types::AsId;

use std::net::Ipv4Addr;

/// Topology built from the links, where every router gets its own AS and a single loopback
/// `192.168.0.x/32`, numbered in order of appearance.
pub(crate) fn bgp_network(links: &[(&str, &str)]) -> Topology {
    let mut topo = Topology::new();
    for (a, b) in links.iter() {
        for name in [*a, *b] {
            if topo.get_router_id(name).is_none() {
                let i = topo.num_routers() as u32 + 1;
                let lo = IpAddr::new(Ipv4Addr::new(192, 168, 0, i as u8), 32);
                topo.add_router(name, Some(AsId(65000 + i)), vec![lo]).unwrap();
            }
        }
        topo.connect(a, b).unwrap();
    }
    topo
}

#[cfg(test)]
mod test_emitter;
#[cfg(test)]
mod test_forwarding;
#[cfg(test)]
mod test_route_map;
#[cfg(test)]
mod test_topology;
#[cfg(test)]
mod test_validation;
