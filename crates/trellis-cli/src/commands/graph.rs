//! Graph command - Graphviz dump of one target's dependency graph

use crate::commands::resolve_one;
use crate::config::Session;
use anyhow::Result;
use trellis_build::dot_graph;

pub fn run(session: &Session, target: &str, solution: Option<String>) -> Result<()> {
    let resolution = resolve_one(session, target, solution)?;
    print!("{}", dot_graph(&resolution));
    Ok(())
}
