//! Targets command - list expanded targets

use crate::config::Session;
use anyhow::Result;
use trellis_build::Target;

/// List the targets of one project, or of the whole workspace
pub fn run(session: &Session, project: Option<&str>) -> Result<()> {
    let targets: Vec<Target> = match project {
        Some(name) => session.workspace.project(name)?.targets()?,
        None => session.workspace.targets()?,
    };

    for target in &targets {
        println!("{}\t{}", target.key(), target.configuration_name());
    }
    Ok(())
}
