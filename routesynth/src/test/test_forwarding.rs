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
use crate::example_networks::{diamond, velenj};
use crate::forwarding::*;
use crate::requirements::*;
use crate::synthesis::route_map::apply_route_maps;
use crate::synthesis::route_map::RouteMapDirection::{Incoming, Outgoing};
use crate::synthesis::*;
use crate::topology::Topology;
use crate::types::{Protocol, RouterId};
use crate::validation::PathValidator;
use crate::synthesize;

use std::collections::BTreeSet;

fn id(topo: &Topology, name: &str) -> RouterId {
    topo.get_router_id(name).unwrap()
}

fn prepare(topo: &Topology, reqs: Vec<Requirement>) -> (PolicyModel, Vec<RequirementGroup>) {
    let mut store = RequirementStore::new(topo);
    store.extend(reqs).unwrap();
    let groups = PathValidator::new(topo).validate(&store).unwrap();
    (synthesize(topo, &store).unwrap(), groups)
}

#[test]
fn velenj_fidelity() {
    let _ = pretty_env_logger::try_init();
    let topo = velenj::topology();
    let (model, groups) = prepare(&topo, vec![velenj::requirement()]);
    assert_eq!(check_fidelity(&topo, &model, &groups), vec![]);

    let peer = id(&topo, "PeerVelenj");
    let state = ForwardingState::compute(&topo, &model, Protocol::Bgp, peer).unwrap();
    assert_eq!(state.destination(), peer);
    assert_eq!(state.get_route(id(&topo, "Celje")).unwrap().len(), 3);
    assert!(state.get_next_hops(peer).is_empty());
}

#[test]
fn bgp_order() {
    let topo = diamond::topology();
    let (model, groups) = prepare(&topo, vec![diamond::order_requirement(Protocol::Bgp)]);
    assert_eq!(check_fidelity(&topo, &model, &groups), vec![]);

    let (s, a, d) = (id(&topo, "S"), id(&topo, "A"), id(&topo, "D"));
    let state = ForwardingState::compute(&topo, &model, Protocol::Bgp, d).unwrap();
    assert_eq!(state.get_route(s), Ok(vec![s, a, d]));
    assert_eq!(state.get_next_hops(s), &[a]);
}

#[test]
fn bgp_ecmp() {
    let topo = diamond::topology();
    let (model, _) = prepare(&topo, vec![diamond::ecmp_requirement()]);
    let (s, a, b, d) = (id(&topo, "S"), id(&topo, "A"), id(&topo, "B"), id(&topo, "D"));
    let state = ForwardingState::compute(&topo, &model, Protocol::Bgp, d).unwrap();
    assert_eq!(state.get_next_hops(s), &[a, b]);
    assert_eq!(state.get_next_hops(a), &[d]);
}

#[test]
fn ospf_order() {
    let topo = diamond::topology();
    let (model, groups) = prepare(&topo, vec![diamond::order_requirement(Protocol::Ospf)]);
    assert_eq!(check_fidelity(&topo, &model, &groups), vec![]);

    let (s, a, b, d) = (id(&topo, "S"), id(&topo, "A"), id(&topo, "B"), id(&topo, "D"));
    let state = ForwardingState::compute(&topo, &model, Protocol::Ospf, d).unwrap();
    assert_eq!(state.get_route(s), Ok(vec![s, a, d]));
    assert_eq!(state.get_next_hops(b), &[d]);
}

#[test]
fn static_order() {
    let topo = diamond::topology();
    let (model, groups) = prepare(&topo, vec![diamond::order_requirement(Protocol::Static)]);
    assert_eq!(check_fidelity(&topo, &model, &groups), vec![]);

    let (s, a, d) = (id(&topo, "S"), id(&topo, "A"), id(&topo, "D"));
    let state = ForwardingState::compute(&topo, &model, Protocol::Static, d).unwrap();
    assert_eq!(state.get_next_hops(s), &[a]);
    assert_eq!(state.get_route(s), Ok(vec![s, a, d]));
}

#[test]
fn defaults_without_policy() {
    let topo = diamond::topology();
    let model = PolicyModel::default();
    let (s, a, d) = (id(&topo, "S"), id(&topo, "A"), id(&topo, "D"));

    // nothing is announced
    let state = ForwardingState::compute(&topo, &model, Protocol::Bgp, d).unwrap();
    assert_eq!(state.get_route(s), Err(ForwardingError::BlackHole(vec![s])));

    // ties are broken by the name of the neighbor
    let state = ForwardingState::compute(&topo, &model, Protocol::Ospf, d).unwrap();
    assert_eq!(state.get_route(s), Ok(vec![s, a, d]));

    let state = ForwardingState::compute(&topo, &model, Protocol::Static, d).unwrap();
    assert_eq!(state.get_route(s), Err(ForwardingError::BlackHole(vec![s])));
}

#[test]
fn fidelity_violation() {
    let topo = diamond::topology();
    let mut store = RequirementStore::new(&topo);
    store.add(Requirement::Path(PathReq::new(Protocol::Ospf, "D", vec!["S", "B", "D"]))).unwrap();
    let groups = PathValidator::new(&topo).validate(&store).unwrap();

    let violations = check_fidelity(&topo, &PolicyModel::default(), &groups);
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].expected, vec!["S", "B", "D"]);
    assert_eq!(violations[0].actual, Ok(vec!["S".to_string(), "A".to_string(), "D".to_string()]));
    assert_eq!(
        violations[0].to_string(),
        "PathReq(OSPF, D) #0: expected S -> B -> D, but traffic takes S -> A -> D"
    );
}

#[test]
fn forwarding_loop() {
    let topo = diamond::topology();
    let (s, a, d) = (id(&topo, "S"), id(&topo, "A"), id(&topo, "D"));
    let lo = topo.get_router(d).unwrap().loopbacks[0];
    let origin =
        Requirement::Path(PathReq::new(Protocol::Static, "D", vec!["S", "A", "D"])).reference(0);

    let mut model = PolicyModel::default();
    for (router, next_hop) in [(s, a), (a, s)] {
        let bundle = PolicyBundle {
            router,
            entries: vec![(
                PolicyKey::new(router, next_hop, Outgoing),
                PolicyPrimitive::StaticRoute(StaticRoute { prefix: lo, next_hop, distance: 1 }),
                origin.clone(),
            )],
        };
        model.merge_bundle(&topo, &bundle).unwrap();
    }
    model.finalize();

    let state = ForwardingState::compute(&topo, &model, Protocol::Static, d).unwrap();
    assert_eq!(state.get_route(s), Err(ForwardingError::ForwardingLoop(vec![s, a, s])));
}

#[test]
fn forwarding_check_option() {
    let _ = pretty_env_logger::try_init();
    let topo = diamond::topology();
    let mut store = RequirementStore::new(&topo);
    store.add(diamond::order_requirement(Protocol::Bgp)).unwrap();
    let options = SynthesisOptions { forwarding_check: true, ..Default::default() };
    let checked = Synthesizer::new(&topo, options).synthesize(&store).unwrap();
    assert_eq!(checked, synthesize(&topo, &store).unwrap());
}

#[test]
fn destinations_share_routers() {
    let _ = pretty_env_logger::try_init();
    let topo = bgp_network(&[("S", "A"), ("S", "B"), ("A", "D"), ("B", "D"), ("D", "E")]);
    let reqs = vec![
        Requirement::Path(PathReq::new(Protocol::Bgp, "D", vec!["S", "A", "D"])),
        Requirement::Path(PathReq::new(Protocol::Bgp, "E", vec!["S", "B", "D", "E"])),
    ];
    let (model, groups) = prepare(&topo, reqs);
    assert_eq!(check_fidelity(&topo, &model, &groups), vec![]);

    let (s, b, d, e) = (id(&topo, "S"), id(&topo, "B"), id(&topo, "D"), id(&topo, "E"));
    let state = ForwardingState::compute(&topo, &model, Protocol::Bgp, e).unwrap();
    assert_eq!(state.get_route(s), Ok(vec![s, b, d, e]));
}

#[test]
fn star_with_two_destinations() {
    let topo = bgp_network(&[("X", "Y"), ("X", "Z")]);
    let reqs = vec![
        Requirement::Path(PathReq::new(Protocol::Bgp, "Y", vec!["X", "Y"])),
        Requirement::Path(PathReq::new(Protocol::Bgp, "Z", vec!["X", "Z"])),
    ];
    let mut store = RequirementStore::new(&topo);
    store.extend(reqs).unwrap();
    let groups = PathValidator::new(&topo).validate(&store).unwrap();
    let model = synthesize(&topo, &store).unwrap();
    assert_eq!(check_fidelity(&topo, &model, &groups), vec![]);
}

/// All simple paths from the source to the destination
fn simple_paths(topo: &Topology, source: RouterId, destination: RouterId) -> Vec<Vec<RouterId>> {
    let mut paths = Vec::new();
    let mut stack = vec![vec![source]];
    while let Some(path) = stack.pop() {
        let last = *path.last().unwrap();
        if last == destination {
            paths.push(path);
            continue;
        }
        for n in topo.neighbors_of(last).into_iter().filter(|n| !path.contains(n)) {
            let mut next = path.clone();
            next.push(n);
            stack.push(next);
        }
    }
    paths
}

/// Send the route of the destination backwards along the path, through the export and import
/// route-maps of every session. Returns if it reaches the source.
fn admits(topo: &Topology, model: &PolicyModel, path: &[RouterId]) -> bool {
    let destination = *path.last().unwrap();
    let mut route = Some(BgpRoute {
        prefix: topo.get_router(destination).unwrap().loopbacks[0].network(),
        as_path: Vec::new(),
        communities: BTreeSet::new(),
        local_pref: 100,
        from: destination,
    });
    for hop in path.windows(2).rev() {
        let (a, b) = (hop[0], hop[1]);
        let export = model.get(b).map(|p| p.route_map(a, Outgoing)).unwrap_or(&[]);
        let import = model.get(a).map(|p| p.route_map(b, Incoming)).unwrap_or(&[]);
        route = route
            .map(|r| BgpRoute { from: b, as_path: [vec![b], r.as_path].concat(), ..r })
            .and_then(|r| apply_route_maps(export, r))
            .and_then(|r| apply_route_maps(import, r));
    }
    route.is_some()
}

#[test]
fn only_member_paths_are_admitted() {
    let links = [("S", "A"), ("S", "B"), ("S", "X"), ("A", "D"), ("B", "D"), ("X", "D")];
    let topo = bgp_network(&links);
    let members = vec![
        PathReq::new(Protocol::Bgp, "D", vec!["S", "A", "D"]),
        PathReq::new(Protocol::Bgp, "D", vec!["S", "B", "D"]),
    ];
    let (s, d) = (id(&topo, "S"), id(&topo, "D"));
    let expected: BTreeSet<Vec<RouterId>> =
        members.iter().map(|p| p.path.iter().map(|n| id(&topo, n)).collect()).collect();

    let set = PathSetReq::new(Protocol::Bgp, "D", members);
    for req in [Requirement::KConnected(set.clone()), Requirement::PathOrder(set)] {
        let (model, groups) = prepare(&topo, vec![req]);
        assert_eq!(check_fidelity(&topo, &model, &groups), vec![]);
        let admitted: BTreeSet<Vec<RouterId>> =
            simple_paths(&topo, s, d).into_iter().filter(|p| admits(&topo, &model, p)).collect();
        assert_eq!(admitted, expected);
    }
}
