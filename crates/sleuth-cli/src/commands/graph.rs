//! Graph traversal commands.

use anyhow::{bail, Result};
use clap::Args;

use sleuth_graph::{expansion_cone, find_all_paths, focus_partition, path_edges, ConeDirection};
use sleuth_sync::Session;

use super::Globals;
use crate::output;

#[derive(Args)]
pub struct ConeArgs {
    /// Center node id
    pub node: String,

    /// Number of hops
    #[arg(long, default_value = "2")]
    pub depth: usize,

    /// Edge direction to follow (both, out, in)
    #[arg(long, default_value = "both")]
    pub direction: String,
}

#[derive(Args)]
pub struct PathsArgs {
    /// Start node id
    pub from: String,

    /// End node id
    pub to: String,

    /// Maximum number of edges per path
    #[arg(long)]
    pub max_depth: usize,
}

#[derive(Args)]
pub struct FocusArgs {
    /// Node to focus
    pub node: String,
}

pub fn cone(session: &Session, args: ConeArgs, globals: &Globals) -> Result<()> {
    let Some(direction) = ConeDirection::from_str(&args.direction) else {
        bail!("Unknown direction '{}' (expected both, out or in)", args.direction);
    };

    let store = session.store();
    let graph = store.graph_snapshot();
    let cone = expansion_cone(graph, &args.node, args.depth, direction)?;

    if globals.json {
        println!("{}", serde_json::to_string_pretty(&cone)?);
    } else {
        output::print_cone(graph, &cone);
    }
    Ok(())
}

pub fn paths(session: &Session, args: PathsArgs, globals: &Globals) -> Result<()> {
    let store = session.store();
    let graph = store.graph_snapshot();
    let paths = find_all_paths(graph, &args.from, &args.to, args.max_depth)?;

    if globals.json {
        let value: Vec<_> = paths
            .iter()
            .map(|p| serde_json::json!({ "nodes": p, "edges": path_edges(graph, p) }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        output::print_paths(graph, &args.from, &args.to, &paths);
    }
    Ok(())
}

pub fn focus(session: &Session, args: FocusArgs, globals: &Globals) -> Result<()> {
    let store = session.store();
    let graph = store.graph_snapshot();
    let partition = focus_partition(graph, &args.node)?;

    if globals.json {
        println!("{}", serde_json::to_string_pretty(&partition)?);
    } else {
        output::print_focus(graph, &partition);
    }
    Ok(())
}
