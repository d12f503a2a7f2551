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

use crate::example_networks::{diamond, velenj};
use crate::topology::*;
use crate::types::AsId;

use std::net::Ipv4Addr;

fn names(topo: &Topology, routers: Vec<crate::types::RouterId>) -> Vec<&str> {
    routers.into_iter().map(|r| topo.name(r)).collect()
}

#[test]
fn connect_generates_interfaces() {
    let topo = velenj::topology();
    assert_eq!(topo.num_routers(), 4);
    assert_eq!(topo.num_links(), 3);

    let v = topo.get_router_id("Velenj").unwrap();
    let s = topo.get_router_id("Sloven").unwrap();
    assert_eq!(topo.as_id(v), Some(AsId(260)));

    let iface = topo.interface_for(v, s).unwrap();
    assert_eq!(iface.name, "eth1");
    assert_eq!(iface.addr, IpAddr::new(Ipv4Addr::new(10, 0, 1, 1), 24));
    let iface = topo.interface_for(s, v).unwrap();
    assert_eq!(iface.name, "eth0");
    assert_eq!(iface.addr, IpAddr::new(Ipv4Addr::new(10, 0, 1, 2), 24));

    let link = topo.edge_between(s, v).unwrap();
    assert_eq!(link.opposite(v).unwrap().router, s);
    assert_eq!(link.endpoint(v).unwrap().router, v);
}

#[test]
fn sorted_by_name() {
    let topo = velenj::topology();
    let v = topo.get_router_id("Velenj").unwrap();
    assert_eq!(names(&topo, topo.neighbors_of(v)), vec!["Celje", "PeerVelenj", "Sloven"]);
    assert_eq!(names(&topo, topo.routers()), vec!["Celje", "PeerVelenj", "Sloven", "Velenj"]);
    assert_eq!(topo.name(1000.into()), "?");
}

#[test]
fn invalid_topology() {
    let mut topo = diamond::topology();
    assert!(matches!(
        topo.add_router("S", None, vec![]),
        Err(TopologyError::DuplicateNode(n)) if n == "S"
    ));
    assert!(matches!(topo.connect("S", "X"), Err(TopologyError::UnknownNode(n)) if n == "X"));
    assert!(matches!(topo.connect("S", "S"), Err(TopologyError::SelfLoop(_))));
    // interface names differ from the existing link
    assert!(matches!(topo.connect("S", "A"), Err(TopologyError::DuplicateEdge(_, _))));
    assert_eq!(topo.num_links(), 4);
}

#[test]
fn duplicate_link_is_ignored() {
    let mut topo = Topology::new();
    topo.add_router("A", None, vec![]).unwrap();
    topo.add_router("B", None, vec![]).unwrap();
    let a = || Endpoint::new("A", "eth0", "10.0.0.1/24".parse().unwrap());
    let b = || Endpoint::new("B", "eth0", "10.0.0.2/24".parse().unwrap());
    topo.add_link(a(), b()).unwrap();
    topo.add_link(b(), a()).unwrap();
    assert_eq!(topo.num_links(), 1);
}

#[test]
fn from_json() {
    let json = r#"{
        "nodes": [
            "Celje",
            {"name": "Velenj", "as_number": 260, "loopbacks": ["192.168.0.1/32"]},
            {"name": "Sloven", "asnum": 250}
        ],
        "edges": [
            {"node1": {"name": "Celje", "interface": "eth0", "ip": "10.0.0.1/24"},
             "node2": {"name": "Velenj", "interface": "eth0", "ip": "10.0.0.2/24"}},
            {"node1": {"name": "Velenj", "interface": "eth1", "ip": "10.0.1.1/24"},
             "node2": {"name": "Sloven", "interface": "eth0", "ip": "10.0.1.2/24"}}
        ]
    }"#;
    let topo = Topology::from_json(json).unwrap();
    assert_eq!(topo.num_routers(), 3);
    assert_eq!(topo.num_links(), 2);

    let c = topo.get_router_id("Celje").unwrap();
    let v = topo.get_router_id("Velenj").unwrap();
    let s = topo.get_router_id("Sloven").unwrap();
    assert_eq!(topo.as_id(c), None);
    assert_eq!(topo.as_id(s), Some(AsId(250)));
    let lo: IpAddr = "192.168.0.1".parse().unwrap();
    assert_eq!(topo.get_router(v).unwrap().loopbacks, vec![lo]);
    assert_eq!(topo.interface_for(v, s).unwrap().name, "eth1");
    assert_eq!(topo.interface_for(c, v).unwrap().addr.to_string(), "10.0.0.1/24");
}

#[test]
fn from_json_errors() {
    assert!(matches!(Topology::from_json("{\"nodes\": [1]}"), Err(TopologyError::Json(_))));
    let json = r#"{"nodes": ["A"], "edges": [
        {"node1": {"name": "A", "interface": "eth0", "ip": "10.0.0.1/24"},
         "node2": {"name": "B", "interface": "eth0", "ip": "10.0.0.2/24"}}]}"#;
    assert!(matches!(Topology::from_json(json), Err(TopologyError::UnknownNode(n)) if n == "B"));
    let json = r#"{"nodes": ["A", "A"]}"#;
    assert!(matches!(Topology::from_json(json), Err(TopologyError::DuplicateNode(_))));
    let json = r#"{"nodes": [{"name": "A", "loopbacks": ["10.0.0.300/32"]}]}"#;
    assert!(matches!(Topology::from_json(json), Err(TopologyError::Json(_))));
}
