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

#![deny(missing_docs)]

//! # RouteSynth: Synthesizing Routing Policies from Path Requirements
//! This is a library for compiling declarative path requirements into per-router routing policy.
//! Given a topology and a set of requirements stating which paths traffic toward a destination
//! must (or may) take, it generates route-maps, community lists, local preferences, OSPF interface
//! costs and static routes that realize them, and renders those into device configurations.
//!
//! ## Structure
//!
//! - **[`Topology`](topology::Topology)**: Routers, their AS numbers and loopbacks, and the links
//!   between them. Can be read from a JSON description.
//!
//! - **[`Requirements`](requirements)**: The four requirement kinds (`PathReq`, `PathOrderReq`,
//!   `ECMPPathsReq` and `KConnectedPathsReq`), a parser for their textual form, and the
//!   [`RequirementStore`](requirements::RequirementStore), which groups them by protocol and
//!   destination.
//!
//! - **[`Validation`](validation)**: Resolves the node names of every path and checks that it is
//!   realizable on the topology.
//!
//! - **[`Synthesis`](synthesis)**: Synthesizes every requirement group independently (and in
//!   parallel), and merges the results into a single [`PolicyModel`](synthesis::PolicyModel).
//!   Conflicting requirements are reported, never silently resolved.
//!
//! - **[`Forwarding`](forwarding)**: Computes the forwarding state the synthesized policy induces,
//!   and checks it against the requirements.
//!
//! - **[`Emitter`](emitter)**: Renders the policy model into device configurations.
//!
//! - **[`ExampleNetworks`](example_networks)**: Small networks used in tests and documentation.
//!
//! ## Usage
//!
//! ```
//! use routesynth::emitter::ConfigEmitter;
//! use routesynth::requirements::{parse_requirements, RequirementStore};
//! use routesynth::synthesize;
//! use routesynth::Error;
//! # use routesynth::example_networks::diamond;
//!
//! fn main() -> Result<(), Error> {
//!     // let topo = Topology::from_json(...)?;
//! # let topo = diamond::topology();
//!     let mut store = RequirementStore::new(&topo);
//!     store.extend(parse_requirements(
//!         "ECMPPathsReq(Protocols.BGP, D, [
//!             PathReq(Protocols.BGP, D, [S, A, D], False),
//!             PathReq(Protocols.BGP, D, [S, B, D], False)
//!         ], False)",
//!     )?)?;
//!
//!     let model = synthesize(&topo, &store)?;
//!     let config = ConfigEmitter::new(&topo, &model).render();
//!     assert!(config.contains("maximum-paths 2"));
//!     Ok(())
//! }
//! ```

pub mod emitter;
pub mod error;
pub mod example_networks;
pub mod forwarding;
pub mod requirements;
pub mod synthesis;
pub mod topology;
pub mod types;
pub mod validation;

#[cfg(test)]
mod test;

pub use error::Error;
pub use synthesis::{synthesize, synthesize_parallel};
