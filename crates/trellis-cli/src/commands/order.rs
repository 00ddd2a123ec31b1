//! Order command - print one target's dependency order

use crate::commands::resolve_one;
use crate::config::Session;
use anyhow::Result;

/// Print projects dependencies-first, one per line
pub fn run(session: &Session, target: &str, solution: Option<String>) -> Result<()> {
    let resolution = resolve_one(session, target, solution)?;
    for project in &resolution.order {
        println!("{}", project);
    }
    Ok(())
}
