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

//! # Config Emitter
//!
//! Renders the policy model into one [`DeviceConfig`] per router. The structured configuration
//! can be serialized with serde, or written in the textual format:
//!
//! ```text
//! Configuration of Velenj:
//! interface eth0
//!  ip address 10.0.0.2 255.255.255.0
//!  description "To Celje"
//! !
//! router ospf 100
//!  network 10.0.0.0 0.0.0.255 area 0
//! !
//! ip prefix-list PL_100_0 seq 5 permit 192.168.0.4/32
//! !
//! route-map RMap_Velenj_from_Celje deny 10
//!  match ip address prefix-list PL_100_0
//! !
//! route-map RMap_Velenj_from_Celje permit 20
//! !
//! router bgp 260
//!  bgp router-id 192.168.0.2
//!  neighbor 10.0.0.1 remote-as 30
//!  ...
//! !
//! ```
//!
//! Every route-map ends with a clause permitting all remaining routes, such that routes toward
//! destinations without requirements pass unchanged.

pub mod reader;

use crate::synthesis::route_map::{
    RouteMap, RouteMapDirection, RouteMapMatch, RouteMapSet, RouteMapState,
};
use crate::synthesis::{NodePolicy, PolicyModel};
use crate::topology::{IpAddr, Topology};
use crate::types::{AsId, Community, Protocol, RouterId};

use itertools::Itertools;
use log::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::panic;
use std::thread;

/// Process id of the OSPF process
pub const OSPF_PROCESS_ID: u32 = 100;

/// Name of the route-map of `router` toward `neighbor`
///
/// ```
/// # use routesynth::emitter::route_map_name;
/// # use routesynth::synthesis::route_map::RouteMapDirection;
/// assert_eq!(route_map_name("A", "B", RouteMapDirection::Incoming), "RMap_A_from_B");
/// assert_eq!(route_map_name("A", "B", RouteMapDirection::Outgoing), "RMap_A_to_B");
/// ```
pub fn route_map_name(router: &str, neighbor: &str, direction: RouteMapDirection) -> String {
    format!("RMap_{}_{}_{}", router, direction.keyword(), neighbor)
}

/// Configuration of a single router
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Name of the router
    pub name: String,
    /// Loopback and link interfaces
    pub interfaces: Vec<InterfaceConfig>,
    /// OSPF process
    pub ospf: OspfConfig,
    /// Prefix lists used by the route-maps
    pub prefix_lists: Vec<PrefixListConfig>,
    /// Standard community lists used by the route-maps
    pub community_lists: Vec<CommunityListConfig>,
    /// Route-maps, two per BGP neighbor
    pub route_maps: Vec<RouteMapConfig>,
    /// BGP process, only for routers with an AS number
    pub bgp: Option<BgpConfig>,
    /// Static routes
    pub static_routes: Vec<StaticRouteConfig>,
}

/// Interface stanza
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceConfig {
    /// Interface name
    pub name: String,
    /// Address and mask
    pub addr: IpAddr,
    /// Description, naming the neighbor
    pub description: Option<String>,
    /// Outgoing OSPF cost
    pub ospf_cost: Option<u32>,
}

/// OSPF stanza
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OspfConfig {
    /// Process id
    pub process_id: u32,
    /// Networks of all interfaces, all in area 0
    pub networks: Vec<IpAddr>,
    /// maximum-paths
    pub max_paths: Option<u32>,
}

/// Prefix list permitting the networks, one entry each
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixListConfig {
    /// Name of the list
    pub name: String,
    /// The permitted networks
    pub networks: Vec<IpAddr>,
}

/// Standard community list with a single permit entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunityListConfig {
    /// Name of the list
    pub name: String,
    /// The permitted community
    pub community: Community,
}

/// Route-map with its clauses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteMapConfig {
    /// Name of the route-map
    pub name: String,
    /// Clauses, ordered by sequence number
    pub clauses: Vec<RouteMapClauseConfig>,
}

/// Clause of a route-map
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteMapClauseConfig {
    /// permit or deny
    pub state: RouteMapState,
    /// Sequence number
    pub seq: usize,
    /// match statements, as (key, value)
    pub matches: Vec<(String, String)>,
    /// set statements, as (key, value)
    pub sets: Vec<(String, String)>,
}

impl From<&RouteMap> for RouteMapClauseConfig {
    fn from(map: &RouteMap) -> Self {
        Self {
            state: map.state(),
            seq: map.order(),
            matches: map
                .conds()
                .iter()
                .map(|c| match c {
                    RouteMapMatch::PrefixList(l) => {
                        ("ip address prefix-list".to_string(), l.name.clone())
                    }
                    RouteMapMatch::Community(c) => ("community".to_string(), c.list_name()),
                })
                .collect(),
            sets: map
                .actions()
                .iter()
                .map(|s| match s {
                    RouteMapSet::Community { community, additive: true } => {
                        ("community".to_string(), format!("{} additive", community))
                    }
                    RouteMapSet::Community { community, additive: false } => {
                        ("community".to_string(), community.to_string())
                    }
                    RouteMapSet::LocalPref(lp) => ("local-preference".to_string(), lp.to_string()),
                })
                .collect(),
        }
    }
}

/// BGP stanza
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BgpConfig {
    /// Own AS number
    pub as_id: AsId,
    /// Router id, the address of the first loopback
    pub router_id: Option<Ipv4Addr>,
    /// Announced networks
    pub networks: Vec<IpAddr>,
    /// Neighbors, ordered by name
    pub neighbors: Vec<BgpNeighborConfig>,
    /// maximum-paths
    pub max_paths: Option<u32>,
}

/// eBGP session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BgpNeighborConfig {
    /// Name of the neighbor
    pub name: String,
    /// Address of the neighbor on the shared link
    pub addr: Ipv4Addr,
    /// AS number of the neighbor
    pub remote_as: AsId,
    /// Import route-map
    pub route_map_in: String,
    /// Export route-map
    pub route_map_out: String,
}

/// Static route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticRouteConfig {
    /// Destination network
    pub prefix: IpAddr,
    /// Address of the next hop
    pub next_hop: Ipv4Addr,
    /// Administrative distance
    pub distance: u32,
}

impl fmt::Display for DeviceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Configuration of {}:", self.name)?;

        for iface in self.interfaces.iter() {
            writeln!(f, "interface {}", iface.name)?;
            writeln!(f, " ip address {} {}", iface.addr.addr, iface.addr.repr_mask())?;
            if let Some(desc) = iface.description.as_ref() {
                writeln!(f, " description \"{}\"", desc)?;
            }
            if let Some(cost) = iface.ospf_cost {
                writeln!(f, " ip ospf cost {}", cost)?;
            }
            writeln!(f, "!")?;
        }

        writeln!(f, "router ospf {}", self.ospf.process_id)?;
        for net in self.ospf.networks.iter() {
            writeln!(f, " network {} {} area 0", net.addr, net.repr_wildcard())?;
        }
        if let Some(k) = self.ospf.max_paths {
            writeln!(f, " maximum-paths {}", k)?;
        }
        writeln!(f, "!")?;

        if !self.prefix_lists.is_empty() {
            for list in self.prefix_lists.iter() {
                for (i, net) in list.networks.iter().enumerate() {
                    writeln!(f, "ip prefix-list {} seq {} permit {}", list.name, (i + 1) * 5, net)?;
                }
            }
            writeln!(f, "!")?;
        }

        if !self.community_lists.is_empty() {
            for list in self.community_lists.iter() {
                writeln!(f, "ip community-list standard {} permit {}", list.name, list.community)?;
            }
            writeln!(f, "!")?;
        }

        for map in self.route_maps.iter() {
            for clause in map.clauses.iter() {
                writeln!(f, "route-map {} {} {}", map.name, clause.state, clause.seq)?;
                for (k, v) in clause.matches.iter() {
                    writeln!(f, " match {} {}", k, v)?;
                }
                for (k, v) in clause.sets.iter() {
                    writeln!(f, " set {} {}", k, v)?;
                }
                writeln!(f, "!")?;
            }
        }

        if let Some(bgp) = self.bgp.as_ref() {
            writeln!(f, "router bgp {}", bgp.as_id)?;
            if let Some(id) = bgp.router_id {
                writeln!(f, " bgp router-id {}", id)?;
            }
            for n in bgp.neighbors.iter() {
                writeln!(f, " neighbor {} remote-as {}", n.addr, n.remote_as)?;
                writeln!(f, " neighbor {} description \"To {}\"", n.addr, n.name)?;
                writeln!(f, " neighbor {} route-map {} in", n.addr, n.route_map_in)?;
                writeln!(f, " neighbor {} route-map {} out", n.addr, n.route_map_out)?;
                writeln!(f, " neighbor {} send-community", n.addr)?;
            }
            for net in bgp.networks.iter() {
                writeln!(f, " network {} mask {}", net.addr, net.repr_mask())?;
            }
            if let Some(k) = bgp.max_paths {
                writeln!(f, " maximum-paths {}", k)?;
                writeln!(f, " bgp bestpath as-path multipath-relax")?;
            }
            writeln!(f, "!")?;
        }

        if !self.static_routes.is_empty() {
            for r in self.static_routes.iter() {
                writeln!(
                    f,
                    "ip route {} {} {} {}",
                    r.prefix.addr,
                    r.prefix.repr_mask(),
                    r.next_hop,
                    r.distance
                )?;
            }
            writeln!(f, "!")?;
        }
        Ok(())
    }
}

/// # Config Emitter
///
/// Pure projection of the topology and the policy model into device configurations. The emitter
/// performs no validation.
///
/// ```
/// use routesynth::emitter::ConfigEmitter;
/// use routesynth::example_networks::velenj;
/// use routesynth::requirements::RequirementStore;
/// use routesynth::synthesize;
///
/// let topo = velenj::topology();
/// let mut store = RequirementStore::new(&topo);
/// store.add(velenj::requirement()).unwrap();
/// let model = synthesize(&topo, &store).unwrap();
///
/// let text = ConfigEmitter::new(&topo, &model).render();
/// assert!(text.contains("route-map RMap_Velenj_from_PeerVelenj permit 10"));
/// assert!(text.contains(" network 192.168.0.4 mask 255.255.255.255"));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ConfigEmitter<'a> {
    topology: &'a Topology,
    model: &'a PolicyModel,
}

impl<'a> ConfigEmitter<'a> {
    /// Create a new emitter
    pub fn new(topology: &'a Topology, model: &'a PolicyModel) -> Self {
        Self { topology, model }
    }

    /// Configuration of a single router, or `None` if the router does not exist.
    pub fn device_config(&self, router: RouterId) -> Option<DeviceConfig> {
        let topo = self.topology;
        let r = topo.get_router(router)?;
        let empty = NodePolicy::default();
        let policy = self.model.get(router).unwrap_or(&empty);
        let neighbors = topo.neighbors_of(router);

        let mut interfaces: Vec<InterfaceConfig> = r
            .loopbacks
            .iter()
            .enumerate()
            .map(|(i, addr)| InterfaceConfig {
                name: format!("lo{}", i),
                addr: *addr,
                description: None,
                ospf_cost: None,
            })
            .collect();
        for n in neighbors.iter() {
            if let Some(iface) = topo.interface_for(router, *n) {
                interfaces.push(InterfaceConfig {
                    name: iface.name.clone(),
                    addr: iface.addr,
                    description: Some(format!("To {}", topo.name(*n))),
                    ospf_cost: policy.ospf_cost(*n),
                });
            }
        }

        let networks: Vec<IpAddr> = interfaces.iter().map(|i| i.addr.network()).unique().collect();
        let ospf = OspfConfig {
            process_id: OSPF_PROCESS_ID,
            networks,
            max_paths: policy.max_paths(Protocol::Ospf),
        };

        let mut route_maps = Vec::new();
        let bgp = r.as_id.map(|as_id| {
            let mut sessions = Vec::new();
            for n in neighbors.iter().copied() {
                let (remote_as, addr) = match (topo.as_id(n), topo.interface_for(n, router)) {
                    (Some(remote_as), Some(iface)) => (remote_as, iface.addr.addr),
                    _ => continue,
                };
                for direction in [RouteMapDirection::Incoming, RouteMapDirection::Outgoing] {
                    let mut clauses: Vec<RouteMapClauseConfig> =
                        policy.route_map(n, direction).iter().map(|m| m.into()).collect();
                    let seq = clauses.last().map_or(10, |c| c.seq + 10);
                    clauses.push(RouteMapClauseConfig {
                        state: RouteMapState::Allow,
                        seq,
                        matches: Vec::new(),
                        sets: Vec::new(),
                    });
                    route_maps.push(RouteMapConfig {
                        name: route_map_name(&r.name, topo.name(n), direction),
                        clauses,
                    });
                }
                sessions.push(BgpNeighborConfig {
                    name: topo.name(n).to_string(),
                    addr,
                    remote_as,
                    route_map_in: route_map_name(
                        &r.name,
                        topo.name(n),
                        RouteMapDirection::Incoming,
                    ),
                    route_map_out: route_map_name(
                        &r.name,
                        topo.name(n),
                        RouteMapDirection::Outgoing,
                    ),
                });
            }
            BgpConfig {
                as_id,
                router_id: r.loopbacks.first().map(|lo| lo.addr),
                networks: policy.bgp_networks().iter().copied().collect(),
                neighbors: sessions,
                max_paths: policy.max_paths(Protocol::Bgp),
            }
        });

        let prefix_lists = policy
            .matched_prefix_lists()
            .into_iter()
            .map(|l| PrefixListConfig { name: l.name, networks: l.networks })
            .collect();

        let community_lists = policy
            .matched_communities()
            .into_iter()
            .map(|c| CommunityListConfig { name: c.list_name(), community: c })
            .collect();

        let static_routes = policy
            .static_routes()
            .iter()
            .filter_map(|s| {
                let next_hop = topo.interface_for(s.next_hop, router)?.addr.addr;
                Some(StaticRouteConfig { prefix: s.prefix, next_hop, distance: s.distance })
            })
            .collect();

        Some(DeviceConfig {
            name: r.name.clone(),
            interfaces,
            ospf,
            prefix_lists,
            community_lists,
            route_maps,
            bgp,
            static_routes,
        })
    }

    /// Configuration of all routers, ordered by name.
    pub fn emit(&self) -> Vec<DeviceConfig> {
        self.topology.routers().into_iter().filter_map(|r| self.device_config(r)).collect()
    }

    /// Configuration of all routers, ordered by name, rendered on `n_threads` threads (or one per
    /// CPU if `None`).
    pub fn emit_parallel(&self, n_threads: Option<usize>) -> Vec<DeviceConfig> {
        let routers = self.topology.routers();
        let n_threads = n_threads.unwrap_or_else(num_cpus::get).max(1);
        if n_threads == 1 || routers.len() <= 1 {
            return self.emit();
        }
        let chunk_size = (routers.len() + n_threads - 1) / n_threads;
        debug!("Rendering {} routers on {} threads", routers.len(), n_threads);
        thread::scope(|s| {
            let handles = routers
                .chunks(chunk_size)
                .map(|chunk| {
                    s.spawn(move || {
                        chunk.iter().filter_map(|r| self.device_config(*r)).collect::<Vec<_>>()
                    })
                })
                .collect::<Vec<_>>();
            let mut configs = Vec::with_capacity(routers.len());
            for handle in handles {
                match handle.join() {
                    Ok(c) => configs.extend(c),
                    Err(e) => panic::resume_unwind(e),
                }
            }
            configs
        })
    }

    /// Textual configuration of all routers.
    pub fn render(&self) -> String {
        self.emit().iter().map(|c| c.to_string()).collect::<Vec<_>>().join("\n")
    }
}
