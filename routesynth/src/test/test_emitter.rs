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

use super::bgp_network;
use crate::emitter::reader::read_config;
use crate::emitter::*;
use crate::example_networks::{diamond, velenj};
use crate::requirements::*;
use crate::synthesis::route_map::{RouteMapDirection, RouteMapState};
use crate::synthesis::{PolicyModel, PolicyPrimitive};
use crate::topology::{IpAddr, Topology};
use crate::types::{AsId, Protocol};
use crate::synthesize;

use std::collections::BTreeSet;
use std::net::Ipv4Addr;

fn model(topo: &Topology, reqs: Vec<Requirement>) -> PolicyModel {
    let mut store = RequirementStore::new(topo);
    store.extend(reqs).unwrap();
    synthesize(topo, &store).unwrap()
}

fn device<'a>(configs: &'a [DeviceConfig], name: &str) -> &'a DeviceConfig {
    configs.iter().find(|c| c.name == name).unwrap()
}

#[test]
fn velenj_config() {
    let topo = velenj::topology();
    let model = model(&topo, vec![velenj::requirement()]);
    let configs = ConfigEmitter::new(&topo, &model).emit();
    assert_eq!(
        configs.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
        vec!["Celje", "PeerVelenj", "Sloven", "Velenj"]
    );

    let text = device(&configs, "Velenj").to_string();
    assert!(text.starts_with(
        "Configuration of Velenj:\ninterface lo0\n ip address 192.168.0.2 255.255.255.255\n!\n"
    ));
    assert!(text.contains(
        "interface eth2\n ip address 10.0.2.1 255.255.255.0\n description \"To PeerVelenj\"\n!\n"
    ));
    assert!(text.contains("router ospf 100\n network 192.168.0.2 0.0.0.0 area 0\n"));
    assert!(text.contains(" network 10.0.0.0 0.0.0.255 area 0\n"));
    assert!(text.contains("!\nip prefix-list PL_100_0 seq 5 permit 192.168.0.4/32\n!\n"));
    assert!(text.contains(
        "route-map RMap_Velenj_from_PeerVelenj permit 10\n \
         match ip address prefix-list PL_100_0\n \
         set community 100:0 additive\n \
         set local-preference 1\n!\n\
         route-map RMap_Velenj_from_PeerVelenj permit 20\n!\n"
    ));
    assert!(text.contains(
        "route-map RMap_Velenj_from_Celje deny 10\n \
         match ip address prefix-list PL_100_0\n!\n\
         route-map RMap_Velenj_from_Celje permit 20\n!\n"
    ));
    assert!(text.contains(
        "route-map RMap_Velenj_from_Sloven deny 10\n \
         match ip address prefix-list PL_100_0\n!\n"
    ));
    assert!(text.contains("route-map RMap_Velenj_to_Celje permit 10\n!\n"));
    assert!(text.contains(
        "router bgp 260\n \
         bgp router-id 192.168.0.2\n \
         neighbor 10.0.0.2 remote-as 30\n \
         neighbor 10.0.0.2 description \"To Celje\"\n \
         neighbor 10.0.0.2 route-map RMap_Velenj_from_Celje in\n \
         neighbor 10.0.0.2 route-map RMap_Velenj_to_Celje out\n \
         neighbor 10.0.0.2 send-community\n"
    ));
    assert!(!text.contains("ip community-list"));
    assert!(!text.contains("maximum-paths"));
    assert!(!text.contains("ip route"));
    assert!(!text.contains(" mask "));

    // only the destination announces its loopback
    let peer = device(&configs, "PeerVelenj");
    let bgp = peer.bgp.as_ref().unwrap();
    assert_eq!(bgp.networks, vec![IpAddr::new(Ipv4Addr::new(192, 168, 0, 4), 32)]);
    assert!(peer.to_string().contains(
        " neighbor 10.0.2.1 send-community\n network 192.168.0.4 mask 255.255.255.255\n!\n"
    ));
    assert!(peer.prefix_lists.is_empty());

    // routers without policy only get the placeholder route-maps
    let celje = device(&configs, "Celje");
    assert!(celje.route_maps.iter().all(|m| m.clauses.len() == 1
        && m.clauses[0].state == RouteMapState::Allow
        && m.clauses[0].sets.is_empty()));
}

#[test]
fn ecmp_config() {
    let topo = diamond::topology();
    let model = model(&topo, vec![diamond::ecmp_requirement()]);
    let configs = ConfigEmitter::new(&topo, &model).emit();

    let text = device(&configs, "S").to_string();
    assert!(text.contains("ip community-list standard CL_100_0 permit 100:0\n!\n"));
    assert!(text.contains(
        "route-map RMap_S_from_A permit 10\n \
         match ip address prefix-list PL_100_0\n \
         match community CL_100_0\n \
         set local-preference 1\n!\n\
         route-map RMap_S_from_A deny 20\n \
         match ip address prefix-list PL_100_0\n!\n\
         route-map RMap_S_from_A permit 30\n!\n"
    ));
    assert!(text.contains(" maximum-paths 2\n bgp bestpath as-path multipath-relax\n!\n"));

    let text = device(&configs, "A").to_string();
    assert!(text.contains(
        "route-map RMap_A_from_S deny 10\n match ip address prefix-list PL_100_0\n!\n"
    ));
    assert!(!text.contains("ip community-list"));
}

#[test]
fn ospf_config() {
    let topo = diamond::topology();
    let model = model(&topo, vec![diamond::order_requirement(Protocol::Ospf)]);
    let configs = ConfigEmitter::new(&topo, &model).emit();
    let s = device(&configs, "S");
    let costs: Vec<(String, Option<u32>)> =
        s.interfaces.iter().map(|i| (i.name.clone(), i.ospf_cost)).collect();
    assert_eq!(
        costs,
        vec![
            ("lo0".to_string(), None),
            ("eth0".to_string(), Some(1)),
            ("eth1".to_string(), Some(5))
        ]
    );
    let text = s.to_string();
    assert!(text.contains(
        "interface eth1\n ip address 10.0.1.1 255.255.255.0\n description \"To B\"\n \
         ip ospf cost 5\n!\n"
    ));
}

#[test]
fn static_config() {
    let topo = diamond::topology();
    let model = model(&topo, vec![diamond::order_requirement(Protocol::Static)]);
    let configs = ConfigEmitter::new(&topo, &model).emit();
    let text = device(&configs, "S").to_string();
    assert!(text.ends_with(
        "ip route 192.168.0.4 255.255.255.255 10.0.0.2 1\n\
         ip route 192.168.0.4 255.255.255.255 10.0.1.2 2\n!\n"
    ));
}

#[test]
fn round_trip() {
    let topo = diamond::topology();
    let model = model(
        &topo,
        vec![
            diamond::order_requirement(Protocol::Bgp),
            Requirement::Path(PathReq::new(Protocol::Bgp, "A", vec!["S", "A"])),
        ],
    );
    let text = ConfigEmitter::new(&topo, &model).render();
    let parsed = read_config(&text).unwrap();
    assert_eq!(parsed.devices, vec!["A", "B", "D", "S"]);

    let expected: BTreeSet<_> = model
        .primitives()
        .into_iter()
        .filter_map(|(key, p)| match p {
            PolicyPrimitive::RouteMapClause(map) => Some((
                topo.name(key.router).to_string(),
                topo.name(key.neighbor).to_string(),
                key.direction,
                map.state(),
            )),
            _ => None,
        })
        .collect();
    assert_eq!(parsed.actions(), expected);

    // prefix lists and announcements
    let mut lists = BTreeSet::new();
    for (router, policy) in model.iter() {
        for list in policy.matched_prefix_lists() {
            for network in list.networks.iter() {
                lists.insert((topo.name(router).to_string(), list.name.clone(), *network));
            }
        }
        let bgp = parsed.bgp(topo.name(router)).unwrap();
        assert_eq!(bgp.networks, policy.bgp_networks().iter().copied().collect::<Vec<_>>());
    }
    let parsed_lists: BTreeSet<_> = parsed
        .prefix_lists
        .iter()
        .map(|l| (l.node.clone(), l.name.clone(), l.network))
        .collect();
    assert_eq!(parsed_lists, lists);
    assert_eq!(parsed.bgp("A").unwrap().networks.len(), 1);
    assert_eq!(parsed.bgp("D").unwrap().networks.len(), 1);
    assert!(parsed.bgp("S").unwrap().networks.is_empty());
    assert_eq!(parsed.bgp("S").unwrap().router_id, Some(Ipv4Addr::new(192, 168, 0, 1)));

    // every session references both route-maps
    let (a, d) = (topo.get_router_id("A").unwrap(), topo.get_router_id("D").unwrap());
    let d_addr = topo.interface_for(d, a).unwrap().addr.addr.to_string();
    let session = parsed.neighbor("A", &d_addr).unwrap();
    assert_eq!(session.remote_as, Some(65004));
    assert_eq!(session.route_map_in.as_deref(), Some("RMap_A_from_D"));
    assert_eq!(session.route_map_out.as_deref(), Some("RMap_A_to_D"));
    assert!(session.send_community);
}

#[test]
fn parallel_rendering() {
    let topo = velenj::topology();
    let model = model(&topo, vec![velenj::requirement()]);
    let emitter = ConfigEmitter::new(&topo, &model);
    assert_eq!(emitter.emit_parallel(Some(3)), emitter.emit());
    assert_eq!(emitter.emit_parallel(Some(1)), emitter.emit());
}

#[test]
fn json_output() {
    let topo = velenj::topology();
    let model = model(&topo, vec![velenj::requirement()]);
    let configs = ConfigEmitter::new(&topo, &model).emit();
    let json = serde_json::to_string(&configs).unwrap();
    assert!(json.contains("\"route_map_in\":\"RMap_Velenj_from_PeerVelenj\""));
    let back: Vec<DeviceConfig> = serde_json::from_str(&json).unwrap();
    assert_eq!(back, configs);
}

#[test]
fn routers_without_as() {
    let mut topo = Topology::new();
    topo.add_router("A", None, vec![]).unwrap();
    topo.add_router("B", None, vec!["192.168.0.2/32".parse().unwrap()]).unwrap();
    topo.connect("A", "B").unwrap();
    let req = Requirement::Path(PathReq::new(Protocol::Ospf, "B", vec!["A", "B"]));
    let model = model(&topo, vec![req]);
    let configs = ConfigEmitter::new(&topo, &model).emit();
    let a = device(&configs, "A");
    assert!(a.bgp.is_none());
    assert!(a.route_maps.is_empty());
    assert_eq!(a.interfaces[0].ospf_cost, Some(1));
    assert!(!a.to_string().contains("router bgp"));
}

#[test]
fn names_with_spaces() {
    let topo = bgp_network(&[("Velenj 2", "Peer Velenj")]);
    let path = vec!["Velenj 2", "Peer Velenj"];
    let req = Requirement::Path(PathReq::new(Protocol::Bgp, "Peer Velenj", path));
    let model = model(&topo, vec![req]);
    let parsed = read_config(&ConfigEmitter::new(&topo, &model).render()).unwrap();
    assert_eq!(parsed.devices, vec!["Peer Velenj", "Velenj 2"]);
    assert_eq!(
        parsed.actions(),
        vec![(
            "Velenj 2".to_string(),
            "Peer Velenj".to_string(),
            RouteMapDirection::Incoming,
            RouteMapState::Allow
        )]
        .into_iter()
        .collect::<BTreeSet<_>>()
    );
    let session = parsed.neighbors.iter().find(|n| n.node == "Velenj 2").unwrap();
    assert_eq!(session.route_map_in.as_deref(), Some("RMap_Velenj 2_from_Peer Velenj"));
}

#[test]
fn ospf_networks_are_unique() {
    let mut topo = Topology::new();
    let loopbacks = vec![
        "192.168.0.1/24".parse().unwrap(),
        "192.168.1.1/32".parse().unwrap(),
        "192.168.0.2/24".parse().unwrap(),
    ];
    topo.add_router("A", Some(AsId(1)), loopbacks).unwrap();
    topo.add_router("B", Some(AsId(2)), vec!["192.168.2.1/32".parse().unwrap()]).unwrap();
    topo.connect("A", "B").unwrap();
    let configs = ConfigEmitter::new(&topo, &PolicyModel::default()).emit();
    let networks: Vec<String> =
        device(&configs, "A").ospf.networks.iter().map(|n| n.to_string()).collect();
    assert_eq!(networks.len(), 3);
    assert_eq!(networks[..2], ["192.168.0.0/24".to_string(), "192.168.1.1/32".to_string()]);
    assert!(!networks[2].starts_with("192.168."));
}
