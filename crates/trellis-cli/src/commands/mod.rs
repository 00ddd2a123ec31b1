pub mod check;
pub mod graph;
pub mod order;
pub mod plan;
pub mod targets;

use crate::config::{PlanFlags, Session};
use anyhow::{anyhow, Result};
use colored::Colorize;
use trellis_build::{FailureReport, PlanOutcome, Planner, TargetResolution};

/// Run the planner with flags merged over the session's settings
pub(crate) fn run_planner(session: &Session, flags: &PlanFlags) -> Result<PlanOutcome> {
    let config = flags.plan_config(session.settings());
    Ok(Planner::new(&session.workspace).with_config(config).plan()?)
}

/// Print the failure report to stderr and turn it into the command's error
pub(crate) fn failure_error(report: &FailureReport) -> anyhow::Error {
    eprintln!("{} {}", "error:".red().bold(), report.to_string().trim_end());
    anyhow!("{} target(s) failed to resolve", report.len())
}

/// Resolve exactly one target, for the per-target inspection commands
pub(crate) fn resolve_one(
    session: &Session,
    target: &str,
    solution: Option<String>,
) -> Result<TargetResolution> {
    let flags = PlanFlags {
        targets: vec![target.to_string()],
        solution,
        ..PlanFlags::default()
    };
    let outcome = run_planner(session, &flags)?;
    if !outcome.is_success() {
        return Err(failure_error(&outcome.failures));
    }
    outcome
        .resolutions
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("No projects are built for target '{}'", target))
}
