//! Check command - resolve every target without emitting

use crate::commands::{failure_error, run_planner};
use crate::config::{PlanFlags, Session};
use anyhow::Result;
use colored::Colorize;

/// Run the check command
pub fn run(session: &Session, flags: PlanFlags) -> Result<()> {
    let outcome = run_planner(session, &flags)?;
    let stats = &outcome.stats;

    if !outcome.is_success() {
        return Err(failure_error(&outcome.failures));
    }

    println!(
        "{} {} target(s), {} descriptor(s) in {:.2}s",
        "Checked".green().bold(),
        stats.planned_targets,
        stats.descriptors,
        stats.total_time.as_secs_f64()
    );
    Ok(())
}
