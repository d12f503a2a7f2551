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

use crate::forwarding::BgpRoute;
use crate::synthesis::route_map::RouteMapMatch as Match;
use crate::synthesis::route_map::RouteMapSet as Set;
use crate::synthesis::route_map::RouteMapState::*;
use crate::synthesis::route_map::*;
use crate::types::Community;

use maplit::btreeset;

fn route(communities: &[Community]) -> BgpRoute {
    BgpRoute {
        prefix: "192.168.0.4/32".parse().unwrap(),
        as_path: vec![1.into()],
        communities: communities.iter().copied().collect(),
        local_pref: 100,
        from: 1.into(),
    }
}

#[test]
fn community_matches() {
    let c0 = Community::new(100, 0);
    let c1 = Community::new(100, 1);

    let map = RouteMap::new(10, Deny, vec![Match::Community(c0)], vec![]);
    assert_eq!(map.apply(route(&[c0])).0, true);
    assert_eq!(map.apply(route(&[c1, c0])).0, true);
    assert_eq!(map.apply(route(&[c1])).0, false);
    assert_eq!(map.apply(route(&[])).0, false);

    // no match statement matches everything
    let map = RouteMap::new(10, Deny, vec![], vec![]);
    assert!(map.is_unconditional());
    assert_eq!(map.apply(route(&[])).0, true);
}

#[test]
fn deny_drops_set_actions() {
    let map = RouteMap::new(10, Deny, vec![], vec![Set::LocalPref(200)]);
    assert!(map.actions().is_empty());
    assert_eq!(map.apply(route(&[])), (true, None));
}

#[test]
fn set_actions() {
    let c0 = Community::new(100, 0);
    let c1 = Community::new(100, 1);

    let map = RouteMapBuilder::new().allow().add_community(c0).set_local_pref(200).build();
    let (matched, result) = map.apply(route(&[c1]));
    assert!(matched);
    let result = result.unwrap();
    assert_eq!(result.local_pref, 200);
    assert_eq!(result.communities, btreeset! {c0, c1});

    let map = RouteMapBuilder::new().allow().set_community(c0).build();
    let result = map.apply(route(&[c1])).1.unwrap();
    assert_eq!(result.communities, btreeset! {c0});
    assert_eq!(result.local_pref, 100);
}

#[test]
fn accessors() {
    let c0 = Community::new(100, 0);
    let map = RouteMapBuilder::new()
        .order(20)
        .allow()
        .match_community(c0)
        .set_local_pref(199)
        .build();
    assert_eq!(map.order(), 20);
    assert_eq!(map.state(), Allow);
    assert_eq!(map.match_community(), Some(c0));
    assert_eq!(map.local_pref(), Some(199));
    assert!(!map.is_unconditional());

    let other = RouteMapBuilder::new()
        .order(10)
        .allow()
        .match_community(c0)
        .set_local_pref(199)
        .build();
    assert!(map.same_clause(&other));
    assert_ne!(map, other);
}

#[test]
fn route_map_sequence() {
    let c0 = Community::new(100, 0);
    let c1 = Community::new(100, 1);
    let maps = vec![
        RouteMapBuilder::new().order(20).deny().build(),
        RouteMapBuilder::new().order(10).allow().match_community(c0).set_local_pref(200).build(),
    ];

    // first matching clause decides, ordered by their sequence number
    let result = apply_route_maps(&maps, route(&[c0])).unwrap();
    assert_eq!(result.local_pref, 200);
    assert_eq!(apply_route_maps(&maps, route(&[c1])), None);

    // routes no clause matches pass unchanged
    let maps = vec![RouteMapBuilder::new().allow().match_community(c0).set_local_pref(2).build()];
    assert_eq!(apply_route_maps(&maps, route(&[c1])), Some(route(&[c1])));

    // an empty route-map permits everything unchanged
    assert_eq!(apply_route_maps(&[], route(&[c1])), Some(route(&[c1])));
}

#[test]
fn prefix_list_matches() {
    let c0 = Community::new(100, 0);
    let ours = PrefixList::new("PL_100_0", vec!["192.168.0.4/32".parse().unwrap()]);
    let other = PrefixList::new("PL_100_1", vec!["192.168.0.5/32".parse().unwrap()]);
    assert!(ours.contains(&route(&[]).prefix));
    assert!(!other.contains(&route(&[]).prefix));

    let map = RouteMapBuilder::new().deny().match_prefix_list(other.clone()).build();
    assert_eq!(map.prefix_list(), Some(&other));
    assert_eq!(map.apply(route(&[c0])).0, false);

    // all match statements must hold
    let maps = vec![
        RouteMapBuilder::new()
            .order(10)
            .allow()
            .match_prefix_list(ours.clone())
            .match_community(c0)
            .set_local_pref(2)
            .build(),
        RouteMapBuilder::new().order(20).deny().match_prefix_list(ours).build(),
        RouteMapBuilder::new().order(30).deny().match_prefix_list(other).build(),
    ];
    assert_eq!(apply_route_maps(&maps, route(&[c0])).map(|r| r.local_pref), Some(2));
    assert_eq!(apply_route_maps(&maps, route(&[])), None);

    let mut elsewhere = route(&[]);
    elsewhere.prefix = "192.168.0.6/32".parse().unwrap();
    assert_eq!(apply_route_maps(&maps, elsewhere.clone()), Some(elsewhere));
}

#[test]
fn keywords() {
    assert_eq!(Allow.to_string(), "permit");
    assert_eq!(Deny.to_string(), "deny");
    assert_eq!(RouteMapDirection::Incoming.keyword(), "from");
    assert_eq!(RouteMapDirection::Outgoing.keyword(), "to");
    assert_eq!(RouteMapDirection::Incoming.to_string(), "in");
    assert_eq!(RouteMapDirection::Outgoing.to_string(), "out");
}
