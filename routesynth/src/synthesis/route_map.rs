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

//! # Route-Maps
//!
//! This module contains the structures used to express the BGP import policy of a router toward a
//! single neighbor.

use crate::forwarding::BgpRoute;
use crate::topology::IpAddr;
use crate::types::Community;

use serde::{Deserialize, Serialize};
use std::fmt;

/// # Main RouteMap structure
/// A route map can match on a BGP route, to change some value of the route, or to block it. Use
/// the [`RouteMapBuilder`] type to conveniently build a route map:
///
/// ```
/// # use routesynth::synthesis::route_map::*;
/// # use routesynth::types::Community;
/// let destination = PrefixList::new("PL_100_0", vec!["192.168.0.4/32".parse().unwrap()]);
/// let map = RouteMapBuilder::new()
///     .order(10)
///     .allow()
///     .match_prefix_list(destination)
///     .match_community(Community::new(100, 0))
///     .set_local_pref(2)
///     .build();
/// assert!(map.state().is_allow());
/// assert_eq!(map.prefix_list().unwrap().name, "PL_100_0");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteMap {
    /// Sequence number. Clauses with a lower number are evaluated first.
    pub(crate) order: usize,
    /// permit or deny
    pub(crate) state: RouteMapState,
    /// All of them must match
    pub(crate) conds: Vec<RouteMapMatch>,
    /// Applied on a permitted route
    pub(crate) set: Vec<RouteMapSet>,
}

impl RouteMap {
    /// Generate a new route map
    pub fn new(
        order: usize,
        state: RouteMapState,
        conds: Vec<RouteMapMatch>,
        set: Vec<RouteMapSet>,
    ) -> Self {
        let set = if state.is_deny() { vec![] } else { set };
        Self { order, state, conds, set }
    }

    /// Apply the route map on a route. The function returns wether the route matched, and either
    /// None if the route matched and the state is `Deny`, or `Some(BgpRoute)` with the values
    /// modified as described.
    pub fn apply(&self, mut route: BgpRoute) -> (bool, Option<BgpRoute>) {
        if self.matches(&route) {
            if self.state.is_deny() {
                (true, None)
            } else {
                self.set.iter().for_each(|s| s.apply(&mut route));
                (true, Some(route))
            }
        } else {
            (false, Some(route))
        }
    }

    /// Sequence number of the clause
    pub fn order(&self) -> usize {
        self.order
    }

    /// permit or deny
    pub fn state(&self) -> RouteMapState {
        self.state
    }

    /// The match statements
    pub fn conds(&self) -> &Vec<RouteMapMatch> {
        &self.conds
    }

    /// The set statements
    pub fn actions(&self) -> &Vec<RouteMapSet> {
        &self.set
    }

    /// Returns wether the Route Map matches the given route
    pub fn matches(&self, route: &BgpRoute) -> bool {
        self.conds.iter().all(|c| c.matches(route))
    }

    /// Returns true if the route map has no match statement, and thus matches every route.
    pub fn is_unconditional(&self) -> bool {
        self.conds.is_empty()
    }

    /// Returns the community this route map matches on, if any.
    pub fn match_community(&self) -> Option<Community> {
        self.conds
            .iter()
            .filter_map(|c| if let RouteMapMatch::Community(c) = c { Some(*c) } else { None })
            .next()
    }

    /// Returns the prefix list this route map matches on, if any.
    pub fn prefix_list(&self) -> Option<&PrefixList> {
        self.conds
            .iter()
            .filter_map(|c| if let RouteMapMatch::PrefixList(l) = c { Some(l) } else { None })
            .next()
    }

    /// Returns the local preference set by this route map, if any.
    pub fn local_pref(&self) -> Option<u32> {
        self.set
            .iter()
            .filter_map(|s| if let RouteMapSet::LocalPref(lp) = s { Some(*lp) } else { None })
            .next()
    }

    /// Returns true if both route maps are equal, ignoring the order.
    pub fn same_clause(&self, other: &RouteMap) -> bool {
        self.state == other.state && self.conds == other.conds && self.set == other.set
    }
}

/// Apply a sequence of route maps, ordered by their `order`. The first matching route map decides.
/// Every sequence ends with an implicit clause permitting all routes unchanged, such that a route
/// for a prefix no clause is concerned with passes. The emitter renders this clause explicitly.
pub fn apply_route_maps(maps: &[RouteMap], route: BgpRoute) -> Option<BgpRoute> {
    let mut maps: Vec<&RouteMap> = maps.iter().collect();
    maps.sort_by_key(|m| m.order);
    let mut route = route;
    for map in maps {
        match map.apply(route) {
            (true, result) => return result,
            (false, Some(r)) => route = r,
            (false, None) => return None,
        }
    }
    Some(route)
}

/// # Route Map Builder
///
/// Convenience type to build a route map. You are required to call `state` (or `allow` or `deny`)
/// before `build`. The order defaults to 10. If you don't add any `match` statement, the route map
/// matches on any route.
#[derive(Debug, Default)]
pub struct RouteMapBuilder {
    order: Option<usize>,
    state: Option<RouteMapState>,
    conds: Vec<RouteMapMatch>,
    set: Vec<RouteMapSet>,
}

impl RouteMapBuilder {
    /// Start a new clause
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence number of the clause
    pub fn order(&mut self, order: usize) -> &mut Self {
        self.order = Some(order);
        self
    }

    /// permit or deny
    pub fn state(&mut self, state: RouteMapState) -> &mut Self {
        self.state = Some(state);
        self
    }

    /// Shorthand for `state(RouteMapState::Allow)`
    pub fn allow(&mut self) -> &mut Self {
        self.state = Some(RouteMapState::Allow);
        self
    }

    /// Shorthand for `state(RouteMapState::Deny)`
    pub fn deny(&mut self) -> &mut Self {
        self.state = Some(RouteMapState::Deny);
        self
    }

    /// Add a match condition to the Route-Map, matching on routes toward one of the networks of
    /// the list
    pub fn match_prefix_list(&mut self, list: PrefixList) -> &mut Self {
        self.conds.push(RouteMapMatch::PrefixList(list));
        self
    }

    /// Add a match condition to the Route-Map, matching on routes carrying the community
    pub fn match_community(&mut self, community: Community) -> &mut Self {
        self.conds.push(RouteMapMatch::Community(community));
        self
    }

    /// Overwrite the local preference of matching routes
    pub fn set_local_pref(&mut self, local_pref: u32) -> &mut Self {
        self.set.push(RouteMapSet::LocalPref(local_pref));
        self
    }

    /// Add a set expression, attaching the community to the route
    pub fn add_community(&mut self, community: Community) -> &mut Self {
        self.set.push(RouteMapSet::Community { community, additive: true });
        self
    }

    /// Add a set expression, replacing all communities of the route
    pub fn set_community(&mut self, community: Community) -> &mut Self {
        self.set.push(RouteMapSet::Community { community, additive: false });
        self
    }

    /// Build the route-map.
    ///
    /// # Panics
    /// The function panics if the state is not set (neither `state`, `allow` nor `deny` were
    /// called).
    pub fn build(&self) -> RouteMap {
        let state = match self.state {
            Some(s) => s,
            None => panic!("route-map clause built without permit or deny"),
        };
        RouteMap::new(self.order.unwrap_or(10), state, self.conds.clone(), self.set.clone())
    }
}

/// Action of a route-map clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RouteMapState {
    /// Set the state to allow
    Allow,
    /// Set the state to deny
    Deny,
}

impl RouteMapState {
    /// `permit`
    pub fn is_allow(&self) -> bool {
        self == &Self::Allow
    }

    /// `deny`
    pub fn is_deny(&self) -> bool {
        self == &Self::Deny
    }
}

impl fmt::Display for RouteMapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => write!(f, "permit"),
            Self::Deny => write!(f, "deny"),
        }
    }
}

/// Named list of networks. A route matches if its prefix is exactly one of them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PrefixList {
    /// Name of the list
    pub name: String,
    /// Permitted networks
    pub networks: Vec<IpAddr>,
}

impl PrefixList {
    /// Create a new prefix list
    pub fn new(name: impl Into<String>, networks: Vec<IpAddr>) -> Self {
        Self { name: name.into(), networks }
    }

    /// Returns true if the prefix is in the list
    pub fn contains(&self, prefix: &IpAddr) -> bool {
        self.networks.contains(prefix)
    }
}

/// Match statement of the route map.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RouteMapMatch {
    /// Matches routes toward one of the networks of the list
    PrefixList(PrefixList),
    /// Matches routes carrying the community
    Community(Community),
}

impl RouteMapMatch {
    /// Returns true if the route matches the expression
    pub fn matches(&self, route: &BgpRoute) -> bool {
        match self {
            Self::PrefixList(l) => l.contains(&route.prefix),
            Self::Community(c) => route.communities.contains(c),
        }
    }
}

/// Set statement of a permitting clause
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RouteMapSet {
    /// Attach a community. If `additive` is false, all existing communities are removed.
    Community {
        /// The community
        community: Community,
        /// Keep the existing communities
        additive: bool,
    },
    /// Overwrite the local preference
    LocalPref(u32),
}

impl RouteMapSet {
    /// Apply the set action to the route
    pub fn apply(&self, route: &mut BgpRoute) {
        match self {
            Self::Community { community, additive } => {
                if !additive {
                    route.communities.clear();
                }
                route.communities.insert(*community);
            }
            Self::LocalPref(lp) => route.local_pref = *lp,
        }
    }
}

/// Direction of a policy, relative to the router it is configured on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RouteMapDirection {
    /// Routes learned from the neighbor (import), or traffic arriving from it
    Incoming,
    /// Routes sent to the neighbor (export), or traffic leaving toward it
    Outgoing,
}

impl RouteMapDirection {
    /// Keyword used in the route-map name, `from` or `to`.
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Incoming => "from",
            Self::Outgoing => "to",
        }
    }
}

impl fmt::Display for RouteMapDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Incoming => write!(f, "in"),
            Self::Outgoing => write!(f, "out"),
        }
    }
}
