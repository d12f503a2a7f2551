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

//! Module containing the main error type

use crate::requirements::{ParseError, RequirementError};
use crate::synthesis::SynthesisError;
use crate::topology::{AddrParseError, TopologyError};
use crate::validation::PathError;

use itertools::Itertools;
use thiserror::Error;

/// Main error type
#[derive(Debug, Error)]
pub enum Error {
    /// The topology is invalid
    #[error("Topology Error: {0}")]
    Topology(#[from] TopologyError),
    /// An address could not be parsed
    #[error("Address Error: {0}")]
    Addr(#[from] AddrParseError),
    /// The requirement text could not be parsed
    #[error("Parse Error: {0}")]
    Parse(#[from] ParseError),
    /// A requirement is structurally malformed
    #[error("{0}")]
    MalformedRequirement(#[from] RequirementError),
    /// A path cannot be realized on the topology
    #[error("Invalid path: {0}")]
    Path(#[from] PathError),
    /// Synthesis failed
    #[error("Synthesis Error: {0}")]
    Synthesis(#[from] SynthesisError),
    /// Some requirements cannot be satisfied together
    #[error("{} conflicts found:\n{}", .0.len(), .0.iter().join("\n"))]
    Conflicts(Vec<SynthesisError>),
}
