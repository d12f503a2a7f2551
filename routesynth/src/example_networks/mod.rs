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

//! Networks for testing and documentation

use crate::requirements::Requirement;
use crate::topology::Topology;

pub mod diamond;
pub mod velenj;

/// Trait for easier access to example networks.
pub trait ExampleNetwork {
    /// Name of the example
    fn name() -> &'static str;
    /// Get the topology.
    fn topology() -> Topology;
    /// Get the requirements.
    fn requirements() -> Vec<Requirement>;
}

/// Velenj network, see [`velenj`].
#[derive(Debug, Clone, Copy)]
pub struct Velenj;

impl ExampleNetwork for Velenj {
    fn name() -> &'static str {
        "velenj"
    }

    fn topology() -> Topology {
        velenj::topology()
    }

    fn requirements() -> Vec<Requirement> {
        vec![velenj::requirement()]
    }
}

/// Diamond network, see [`diamond`].
#[derive(Debug, Clone, Copy)]
pub struct Diamond;

impl ExampleNetwork for Diamond {
    fn name() -> &'static str {
        "diamond"
    }

    fn topology() -> Topology {
        diamond::topology()
    }

    fn requirements() -> Vec<Requirement> {
        vec![diamond::ecmp_requirement()]
    }
}
