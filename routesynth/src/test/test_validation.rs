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

use crate::example_networks::diamond;
use crate::requirements::*;
use crate::topology::Topology;
use crate::types::{AsId, Protocol, RouterId};
use crate::validation::*;

fn reference() -> RequirementRef {
    Requirement::Path(PathReq::new(Protocol::Bgp, "D", vec!["D"])).reference(0)
}

fn ids(topo: &Topology, names: &[&str]) -> Vec<RouterId> {
    names.iter().map(|n| topo.get_router_id(n).unwrap()).collect()
}

#[test]
fn valid_path() {
    let topo = diamond::topology();
    let validator = PathValidator::new(&topo);
    let path = PathReq::new(Protocol::Bgp, "D", vec!["S", "A", "D"]);
    assert_eq!(validator.validate_path(&reference(), &path), Ok(ids(&topo, &["S", "A", "D"])));

    // a path consisting of the destination only
    let path = PathReq::new(Protocol::Bgp, "D", vec!["D"]);
    assert_eq!(validator.validate_path(&reference(), &path), Ok(ids(&topo, &["D"])));
}

#[test]
fn invalid_paths() {
    let topo = diamond::topology();
    let validator = PathValidator::new(&topo);
    let r = reference();

    let path = PathReq::new(Protocol::Bgp, "D", vec!["S", "X", "D"]);
    assert_eq!(
        validator.validate_path(&r, &path),
        Err(PathError::UnknownNode { requirement: r.clone(), node: "X".to_string() })
    );

    let path = PathReq::new(Protocol::Bgp, "D", vec!["S", "A"]);
    assert_eq!(
        validator.validate_path(&r, &path),
        Err(PathError::DestinationMismatch {
            requirement: r.clone(),
            expected: "D".to_string(),
            found: "A".to_string()
        })
    );

    let path = PathReq::new(Protocol::Bgp, "D", vec!["A", "S", "A", "D"]);
    assert_eq!(
        validator.validate_path(&r, &path),
        Err(PathError::CyclicPath { requirement: r.clone(), node: "A".to_string() })
    );

    let path = PathReq::new(Protocol::Bgp, "D", vec!["S", "A", "B", "D"]);
    assert_eq!(
        validator.validate_path(&r, &path),
        Err(PathError::DiscontinuousPath {
            requirement: r.clone(),
            index: 1,
            from: "A".to_string(),
            to: "B".to_string()
        })
    );
}

#[test]
fn unknown_node_is_checked_first() {
    let topo = diamond::topology();
    let validator = PathValidator::new(&topo);
    let path = PathReq::new(Protocol::Bgp, "D", vec!["S", "S", "X"]);
    assert!(matches!(
        validator.validate_path(&reference(), &path),
        Err(PathError::UnknownNode { .. })
    ));
}

#[test]
fn self_hops() {
    let topo = diamond::topology();
    let path = PathReq::new(Protocol::Bgp, "D", vec!["S", "S", "A", "D"]);

    let strict = PathValidator::new(&topo);
    assert!(matches!(
        strict.validate_path(&reference(), &path),
        Err(PathError::CyclicPath { node, .. }) if node == "S"
    ));

    let relaxed = PathValidator::new(&topo).allow_self_paths(true);
    assert_eq!(relaxed.validate_path(&reference(), &path), Ok(ids(&topo, &["S", "A", "D"])));
}

#[test]
fn self_hops_keep_written_position() {
    let topo = diamond::topology();
    let relaxed = PathValidator::new(&topo).allow_self_paths(true);
    let path = PathReq::new(Protocol::Bgp, "D", vec!["S", "S", "A", "A", "B", "D"]);
    assert_eq!(
        relaxed.validate_path(&reference(), &path),
        Err(PathError::DiscontinuousPath {
            requirement: reference(),
            index: 3,
            from: "A".to_string(),
            to: "B".to_string()
        })
    );
}

#[test]
fn bgp_needs_as_number() {
    let mut topo = Topology::new();
    topo.add_router("A", Some(AsId(1)), vec![]).unwrap();
    topo.add_router("B", None, vec![]).unwrap();
    topo.add_router("C", Some(AsId(3)), vec![]).unwrap();
    topo.connect("A", "B").unwrap();
    topo.connect("B", "C").unwrap();
    let validator = PathValidator::new(&topo);

    let path = PathReq::new(Protocol::Bgp, "C", vec!["A", "B", "C"]);
    assert!(matches!(
        validator.validate_path(&reference(), &path),
        Err(PathError::NotBgpSpeaker { node, .. }) if node == "B"
    ));

    let path = PathReq::new(Protocol::Ospf, "C", vec!["A", "B", "C"]);
    assert!(validator.validate_path(&reference(), &path).is_ok());
}

#[test]
fn validate_store() {
    let topo = diamond::topology();
    let mut store = RequirementStore::new(&topo);
    store.add(Requirement::Path(PathReq::new(Protocol::Ospf, "D", vec!["S", "B", "D"]))).unwrap();
    store.add(diamond::ecmp_requirement()).unwrap();
    store.add(diamond::order_requirement(Protocol::Bgp)).unwrap();

    let groups = PathValidator::new(&topo).validate(&store).unwrap();
    assert_eq!(groups.len(), 2);

    let d = topo.get_router_id("D").unwrap();
    assert_eq!(groups[0].protocol, Protocol::Bgp);
    assert_eq!(groups[0].destination, d);
    assert_eq!(groups[0].requirements.len(), 2);
    assert_eq!(groups[0].requirements[0].reference.index, 1);
    assert_eq!(groups[0].requirements[1].kind(), RequirementKind::PathOrder);
    assert_eq!(groups[0].requirements[1].paths[1], ids(&topo, &["S", "B", "D"]));

    assert_eq!(groups[1].protocol, Protocol::Ospf);
    assert_eq!(groups[1].requirements[0].reference.index, 0);

    // a single invalid path rejects everything
    store.add(Requirement::Path(PathReq::new(Protocol::Ospf, "D", vec!["S", "D"]))).unwrap();
    assert!(matches!(
        PathValidator::new(&topo).validate(&store),
        Err(PathError::DiscontinuousPath { index: 0, .. })
    ));
}
