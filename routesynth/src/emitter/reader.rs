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

//! Reader for the textual configuration format, used to recover the route-map clauses, prefix
//! lists and BGP processes of rendered configurations. Node names may contain spaces.

use crate::synthesis::route_map::{RouteMapDirection, RouteMapState};
use crate::topology::IpAddr;

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use thiserror::Error;

lazy_static! {
    static ref HEADER: Regex = Regex::new(r"^Configuration of (.+):$").unwrap();
    static ref ROUTE_MAP: Regex = Regex::new(r"^route-map RMap_(.+) (permit|deny) (\d+)$").unwrap();
    static ref MATCH: Regex =
        Regex::new(r"^ match (ip address prefix-list|\S+) (.+)$").unwrap();
    static ref SET: Regex = Regex::new(r"^ set (\S+) (.+)$").unwrap();
    static ref PREFIX_LIST: Regex =
        Regex::new(r"^ip prefix-list (\S+) seq \d+ permit (\S+)$").unwrap();
    static ref ROUTER_BGP: Regex = Regex::new(r"^router bgp (\d+)$").unwrap();
    static ref ROUTER_ID: Regex = Regex::new(r"^ bgp router-id (\S+)$").unwrap();
    static ref NETWORK: Regex = Regex::new(r"^ network (\S+) mask (\S+)$").unwrap();
    static ref NEIGHBOR: Regex =
        Regex::new(r"^ neighbor (\S+) (remote-as|description|route-map|send-community)\s*(.*)$")
            .unwrap();
    static ref ROUTE_MAP_REF: Regex = Regex::new(r"^(.+) (in|out)$").unwrap();
}

/// Error while reading a configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReadError {
    /// A statement appears before the first `Configuration of` header
    #[error("Line {0}: statement outside of any device configuration")]
    OutsideDevice(usize),
    /// The route-map name does not follow `RMap_<node>_<from|to>_<neighbor>`
    #[error("Line {0}: invalid route-map name: {1}")]
    InvalidRouteMapName(usize, String),
    /// A number could not be parsed
    #[error("Line {0}: invalid number: {1}")]
    InvalidNumber(usize, String),
    /// A match or set statement appears outside of a route-map clause
    #[error("Line {0}: statement outside of a route-map clause")]
    OutsideClause(usize),
    /// An address, network or mask could not be parsed
    #[error("Line {0}: invalid address: {1}")]
    InvalidAddress(usize, String),
}

/// Route-map clause recovered from the text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedClause {
    /// Router holding the route-map
    pub node: String,
    /// Neighbor the route-map is attached to
    pub neighbor: String,
    /// Direction of the route-map
    pub direction: RouteMapDirection,
    /// permit or deny
    pub state: RouteMapState,
    /// Sequence number
    pub seq: usize,
    /// match statements
    pub matches: Vec<(String, String)>,
    /// set statements
    pub sets: Vec<(String, String)>,
}

impl ParsedClause {
    /// Empty `permit` clause, rendered for route-maps without any policy.
    pub fn is_placeholder(&self) -> bool {
        self.state == RouteMapState::Allow && self.matches.is_empty() && self.sets.is_empty()
    }
}

/// BGP session recovered from the text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedNeighbor {
    /// Router holding the session
    pub node: String,
    /// Address of the neighbor
    pub addr: String,
    /// remote-as
    pub remote_as: Option<u32>,
    /// description, without quotes
    pub description: Option<String>,
    /// Import route-map
    pub route_map_in: Option<String>,
    /// Export route-map
    pub route_map_out: Option<String>,
    /// Whether communities are sent
    pub send_community: bool,
}

/// BGP process recovered from the text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedBgp {
    /// Router running the process
    pub node: String,
    /// Own AS number
    pub as_id: u32,
    /// `bgp router-id`
    pub router_id: Option<Ipv4Addr>,
    /// Announced networks
    pub networks: Vec<IpAddr>,
}

/// Entry of a prefix list recovered from the text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPrefixList {
    /// Router holding the list
    pub node: String,
    /// Name of the list
    pub name: String,
    /// Permitted network
    pub network: IpAddr,
}

/// Parsed configuration of all devices
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedConfig {
    /// Device names, in order of appearance
    pub devices: Vec<String>,
    /// All route-map clauses
    pub clauses: Vec<ParsedClause>,
    /// All BGP sessions
    pub neighbors: Vec<ParsedNeighbor>,
    /// All BGP processes
    pub bgp: Vec<ParsedBgp>,
    /// All prefix list entries
    pub prefix_lists: Vec<ParsedPrefixList>,
}

impl ParsedConfig {
    /// Set of (node, neighbor, direction, action) of all clauses, skipping placeholders.
    pub fn actions(&self) -> BTreeSet<(String, String, RouteMapDirection, RouteMapState)> {
        self.clauses
            .iter()
            .filter(|c| !c.is_placeholder())
            .map(|c| (c.node.clone(), c.neighbor.clone(), c.direction, c.state))
            .collect()
    }

    /// Session of `node` with the neighbor at `addr`
    pub fn neighbor(&self, node: &str, addr: &str) -> Option<&ParsedNeighbor> {
        self.neighbors.iter().find(|n| n.node == node && n.addr == addr)
    }

    /// BGP process of `node`
    pub fn bgp(&self, node: &str) -> Option<&ParsedBgp> {
        self.bgp.iter().find(|b| b.node == node)
    }
}

fn parse_addr(line_nr: usize, s: &str) -> Result<Ipv4Addr, ReadError> {
    s.parse().map_err(|_| ReadError::InvalidAddress(line_nr, s.to_string()))
}

/// Split `<node>_<from|to>_<neighbor>` for a known node.
fn split_route_map_name(node: &str, name: &str) -> Option<(String, RouteMapDirection)> {
    let rest = name.strip_prefix(node)?.strip_prefix('_')?;
    if let Some(neighbor) = rest.strip_prefix("from_") {
        Some((neighbor.to_string(), RouteMapDirection::Incoming))
    } else {
        rest.strip_prefix("to_").map(|n| (n.to_string(), RouteMapDirection::Outgoing))
    }
}

/// Read the textual configuration of one or more devices.
///
/// ```
/// use routesynth::emitter::reader::read_config;
///
/// let text = "Configuration of A:\nroute-map RMap_A_from_B deny 10\n!\n";
/// let parsed = read_config(text).unwrap();
/// assert_eq!(parsed.clauses.len(), 1);
/// assert_eq!(parsed.clauses[0].neighbor, "B");
/// ```
pub fn read_config(text: &str) -> Result<ParsedConfig, ReadError> {
    let mut result = ParsedConfig::default();
    let mut device: Option<String> = None;
    let mut in_clause = false;
    let mut in_bgp = false;

    for (i, line) in text.lines().enumerate() {
        let line_nr = i + 1;
        if let Some(cap) = HEADER.captures(line) {
            device = Some(cap[1].to_string());
            result.devices.push(cap[1].to_string());
            in_clause = false;
            in_bgp = false;
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }
        let node = device.as_ref().ok_or(ReadError::OutsideDevice(line_nr))?;

        if line.trim() == "!" || !line.starts_with(' ') {
            in_clause = false;
            in_bgp = false;
        }

        if let Some(cap) = ROUTE_MAP.captures(line) {
            let (neighbor, direction) = split_route_map_name(node, &cap[1])
                .ok_or_else(|| ReadError::InvalidRouteMapName(line_nr, cap[1].to_string()))?;
            let state =
                if &cap[2] == "permit" { RouteMapState::Allow } else { RouteMapState::Deny };
            let seq = cap[3]
                .parse()
                .map_err(|_| ReadError::InvalidNumber(line_nr, cap[3].to_string()))?;
            result.clauses.push(ParsedClause {
                node: node.clone(),
                neighbor,
                direction,
                state,
                seq,
                matches: Vec::new(),
                sets: Vec::new(),
            });
            in_clause = true;
        } else if let Some(cap) = MATCH.captures(line) {
            match (in_clause, result.clauses.last_mut()) {
                (true, Some(clause)) => {
                    clause.matches.push((cap[1].to_string(), cap[2].to_string()))
                }
                _ => return Err(ReadError::OutsideClause(line_nr)),
            }
        } else if let Some(cap) = SET.captures(line) {
            match (in_clause, result.clauses.last_mut()) {
                (true, Some(clause)) => {
                    clause.sets.push((cap[1].to_string(), cap[2].to_string()))
                }
                _ => return Err(ReadError::OutsideClause(line_nr)),
            }
        } else if let Some(cap) = PREFIX_LIST.captures(line) {
            let network = cap[2]
                .parse()
                .map_err(|_| ReadError::InvalidAddress(line_nr, cap[2].to_string()))?;
            result.prefix_lists.push(ParsedPrefixList {
                node: node.clone(),
                name: cap[1].to_string(),
                network,
            });
        } else if let Some(cap) = ROUTER_BGP.captures(line) {
            let as_id = cap[1]
                .parse()
                .map_err(|_| ReadError::InvalidNumber(line_nr, cap[1].to_string()))?;
            result.bgp.push(ParsedBgp {
                node: node.clone(),
                as_id,
                router_id: None,
                networks: Vec::new(),
            });
            in_bgp = true;
        } else if let (true, Some(cap)) = (in_bgp, ROUTER_ID.captures(line)) {
            let id = parse_addr(line_nr, &cap[1])?;
            if let Some(bgp) = result.bgp.last_mut() {
                bgp.router_id = Some(id);
            }
        } else if let (true, Some(cap)) = (in_bgp, NETWORK.captures(line)) {
            let addr = parse_addr(line_nr, &cap[1])?;
            let mask = u32::from(parse_addr(line_nr, &cap[2])?).count_ones();
            if let Some(bgp) = result.bgp.last_mut() {
                bgp.networks.push(IpAddr::new(addr, mask));
            }
        } else if let Some(cap) = NEIGHBOR.captures(line) {
            let addr = cap[1].to_string();
            let pos = match result.neighbors.iter().position(|n| &n.node == node && n.addr == addr)
            {
                Some(pos) => pos,
                None => {
                    result.neighbors.push(ParsedNeighbor {
                        node: node.clone(),
                        addr,
                        ..Default::default()
                    });
                    result.neighbors.len() - 1
                }
            };
            let session = &mut result.neighbors[pos];
            let arg = cap[3].trim();
            match &cap[2] {
                "remote-as" => {
                    let asn = arg
                        .parse()
                        .map_err(|_| ReadError::InvalidNumber(line_nr, arg.to_string()))?;
                    session.remote_as = Some(asn);
                }
                "description" => session.description = Some(arg.trim_matches('"').to_string()),
                "route-map" => {
                    if let Some(rm) = ROUTE_MAP_REF.captures(arg) {
                        if &rm[2] == "in" {
                            session.route_map_in = Some(rm[1].to_string());
                        } else {
                            session.route_map_out = Some(rm[1].to_string());
                        }
                    }
                }
                _ => session.send_community = true,
            }
        }
    }

    Ok(result)
}
