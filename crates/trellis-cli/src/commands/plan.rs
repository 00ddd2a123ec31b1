//! Plan command - resolve every target and emit the executor input

use crate::commands::{failure_error, run_planner};
use crate::config::{OutputFormat, PlanFlags, Session};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use trellis_build::{emit, stream, JsonLinesExecutor};

/// Plan command arguments
#[derive(Debug, Default)]
pub struct PlanArgs {
    pub flags: PlanFlags,
    /// Write the plan here instead of stdout
    pub output: Option<PathBuf>,
    /// Stream one JSON object per line
    pub jsonl: bool,
}

/// Run the plan command
///
/// Successful targets are always emitted; if any target failed, the failure
/// report is printed afterwards and the command fails.
pub fn run(session: &Session, args: PlanArgs) -> Result<()> {
    let outcome = run_planner(session, &args.flags)?;
    let input = emit(&outcome).context("Failed to emit plan")?;

    let mut writer: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(io::stdout().lock()),
    };

    match OutputFormat::resolve(args.jsonl, session.settings()) {
        OutputFormat::Json => {
            writeln!(writer, "{}", input.to_json()?)?;
        }
        OutputFormat::JsonLines => {
            let mut executor = JsonLinesExecutor::new(&mut writer);
            stream(&input, &mut executor)?;
        }
    }
    writer.flush()?;

    tracing::info!(
        targets = outcome.stats.planned_targets,
        descriptors = outcome.stats.descriptors,
        elapsed_ms = outcome.stats.total_time.as_millis() as u64,
        "plan emitted"
    );

    if outcome.is_success() {
        Ok(())
    } else {
        Err(failure_error(&outcome.failures))
    }
}
