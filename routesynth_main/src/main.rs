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

use routesynth::emitter::ConfigEmitter;
use routesynth::example_networks::{Diamond, ExampleNetwork, Velenj};
use routesynth::requirements::{FormalTranslator, IntentTranslator, Requirement, RequirementStore};
use routesynth::synthesis::{PolicyModel, SynthesisOptions, Synthesizer, DEFAULT_COMMUNITY_ASN};
use routesynth::topology::Topology;

use clap::{Parser, Subcommand};
use log::*;
use std::error::Error;
use std::fs;

fn main() -> Result<(), Box<dyn Error>> {
    // initialize the env logger
    pretty_env_logger::init();

    // run clap
    let args = CommandLineArguments::parse();

    match args.cmd {
        MainCommand::Synthesize { topology, requirements, options } => {
            let topo = Topology::from_json(&fs::read_to_string(&topology)?)?;
            let intent = fs::read_to_string(&requirements)?;
            let reqs = FormalTranslator.translate(&intent, &topo)?;
            run(&topo, reqs, options)?;
        }
        MainCommand::Example { network, options } => match network {
            ExampleSelection::Velenj => run_example::<Velenj>(options)?,
            ExampleSelection::Diamond => run_example::<Diamond>(options)?,
        },
    }

    Ok(())
}

fn run_example<N: ExampleNetwork>(options: RunOptions) -> Result<(), Box<dyn Error>> {
    info!("Running example {}", N::name());
    let topo = N::topology();
    run(&topo, N::requirements(), options)
}

fn run(
    topo: &Topology,
    requirements: Vec<Requirement>,
    args: RunOptions,
) -> Result<(), Box<dyn Error>> {
    let mut store = RequirementStore::new(topo);
    store.extend(requirements)?;
    info!("Loaded {} requirements in {} groups", store.len(), store.groups().count());

    let threads = args.threads.unwrap_or_else(num_cpus::get);
    let options = SynthesisOptions {
        threads: Some(threads),
        allow_self_paths: args.allow_self_paths,
        community_asn: args.community_asn.unwrap_or(DEFAULT_COMMUNITY_ASN),
        forwarding_check: args.check,
    };
    let synthesizer = Synthesizer::new(topo, options);

    let model = if args.partial {
        let (model, conflicts) = synthesizer.synthesize_partial(&store)?;
        if !conflicts.is_empty() {
            warn!("Emitting a partial configuration, {} conflicts were skipped", conflicts.len());
        }
        model
    } else {
        synthesizer.synthesize(&store)?
    };

    output(topo, &model, threads, args.json_filename)
}

fn output(
    topo: &Topology,
    model: &PolicyModel,
    threads: usize,
    json_filename: Option<String>,
) -> Result<(), Box<dyn Error>> {
    let configs = ConfigEmitter::new(topo, model).emit_parallel(Some(threads));
    match json_filename {
        Some(filename) => {
            fs::write(&filename, serde_json::to_string_pretty(&configs)?)?;
            info!("Stored the configuration of {} routers in {}", configs.len(), filename);
        }
        None => {
            let text = configs.iter().map(|c| c.to_string()).collect::<Vec<_>>().join("\n");
            println!("{}", text);
        }
    }
    Ok(())
}

/// Synthesizes routing policies (BGP route-maps, OSPF costs and static routes) from path
/// requirements, and prints the resulting router configurations.
#[derive(Parser, Debug)]
#[clap(name = "RouteSynth (Binary)", author = "Tibor Schneider")]
struct CommandLineArguments {
    /// Action to perform
    #[clap(subcommand)]
    cmd: MainCommand,
}

#[derive(Subcommand, Debug)]
enum MainCommand {
    /// Synthesize the configuration of a topology
    #[clap(name = "synthesize")]
    Synthesize {
        /// JSON file describing the topology
        topology: String,
        /// File containing the requirements in their formal notation
        requirements: String,
        #[clap(flatten)]
        options: RunOptions,
    },
    /// Synthesize the configuration of a built-in example network
    #[clap(name = "example")]
    Example {
        /// The example network
        #[clap(subcommand)]
        network: ExampleSelection,
        #[clap(flatten)]
        options: RunOptions,
    },
}

#[derive(clap::Args, Debug)]
struct RunOptions {
    /// Number of worker threads (default: one per CPU)
    #[clap(short = 't', long)]
    threads: Option<usize>,
    /// Accept and collapse self hops in paths
    #[clap(short = 's', long)]
    allow_self_paths: bool,
    /// Check that the synthesized policy realizes every path, and log all violations
    #[clap(short = 'c', long)]
    check: bool,
    /// Skip conflicting requirements instead of failing
    #[clap(short = 'p', long)]
    partial: bool,
    /// Upper half of the generated communities
    #[clap(long)]
    community_asn: Option<u32>,
    /// Store the configuration as json file instead of printing it
    #[clap(long = "json")]
    json_filename: Option<String>,
}

#[derive(Subcommand, Debug)]
enum ExampleSelection {
    /// Velenj prefers its direct peer over all other neighbors
    #[clap(name = "velenj")]
    Velenj,
    /// Load-balancing over both sides of a diamond
    #[clap(name = "diamond")]
    Diamond,
}
