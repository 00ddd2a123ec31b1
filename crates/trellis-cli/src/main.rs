use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;

mod commands;
mod config;
mod logging;

use config::{PlanFlags, Session};

/// Trellis build plan compiler.
///
/// Reads trellis.toml and its included fragments, expands every project over
/// its target axes, resolves dependencies per target and emits build
/// descriptors for a downstream executor.
///
/// EXAMPLES:
///     trellis plan                          Plan every target as JSON
///     trellis plan --solution Game --jsonl  Stream one solution's plan
///     trellis targets Core                  List a project's targets
///     trellis order --target KEY            Show one target's build order
///     trellis check --strict                Resolve without emitting
///
/// ENVIRONMENT VARIABLES:
///     TRELLIS_MANIFEST  Path to the root manifest
///     TRELLIS_STRICT    Set to '1' to fail on conflicting settings
///     TRELLIS_PARALLEL  Set to '0' to plan targets sequentially
///     TRELLIS_JOBS      Worker threads for parallel planning
///     TRELLIS_FORMAT    Default plan format (json or jsonl)
///     TRELLIS_LOG       Log filter (e.g. 'trellis_build=debug')
///     NO_COLOR          Set to disable colored output
#[derive(Parser)]
#[command(name = "trellis")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Root manifest (defaults to the nearest trellis.toml)
    #[arg(long, short = 'm', global = true, env = "TRELLIS_MANIFEST")]
    manifest: Option<PathBuf>,

    /// Log planning progress to stderr
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve targets and emit the build plan
    ///
    /// Every selected target is resolved independently. Targets that fail are
    /// reported after the successful ones have been emitted.
    ///
    /// EXAMPLES:
    ///     trellis plan                          Plan every target
    ///     trellis plan --target KEY             Plan selected targets
    ///     trellis plan -o plan.json             Write the plan to a file
    #[command(visible_alias = "p")]
    Plan {
        /// Target keys to plan (repeatable; all targets when omitted)
        #[arg(long = "target", short = 't')]
        targets: Vec<String>,
        /// Restrict planning to one solution
        #[arg(long, short = 's')]
        solution: Option<String>,
        /// Fail on conflicting scalar settings
        #[arg(long)]
        strict: bool,
        /// Worker threads for parallel planning
        #[arg(long, short = 'j')]
        jobs: Option<usize>,
        /// Plan targets one at a time
        #[arg(long)]
        no_parallel: bool,
        /// Output file (stdout when omitted)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        /// Stream one JSON object per line
        #[arg(long)]
        jsonl: bool,
    },

    /// List expanded targets
    ///
    /// EXAMPLES:
    ///     trellis targets           Every target in the workspace
    ///     trellis targets Core      Targets of one project
    #[command(visible_alias = "t")]
    Targets {
        /// Only list this project's targets
        project: Option<String>,
    },

    /// Print one target's dependency order
    Order {
        /// Target key
        #[arg(long, short = 't')]
        target: String,
        /// Restrict to one solution's projects
        #[arg(long, short = 's')]
        solution: Option<String>,
    },

    /// Print one target's dependency graph in Graphviz format
    ///
    /// EXAMPLES:
    ///     trellis graph --target KEY | dot -Tsvg > graph.svg
    Graph {
        /// Target key
        #[arg(long, short = 't')]
        target: String,
        /// Restrict to one solution's projects
        #[arg(long, short = 's')]
        solution: Option<String>,
    },

    /// Resolve every target without emitting a plan
    #[command(visible_alias = "c")]
    Check {
        /// Restrict to one solution
        #[arg(long, short = 's')]
        solution: Option<String>,
        /// Fail on conflicting scalar settings
        #[arg(long)]
        strict: bool,
    },

    /// Generate shell completions
    ///
    /// EXAMPLES:
    ///     trellis completions bash > ~/.bash_completions/trellis.bash
    ///     trellis completions zsh > ~/.zfunc/_trellis
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        generate(shell, &mut cmd, name, &mut io::stdout());
        return Ok(());
    }

    let config = config::load_config(cli.manifest.as_deref())?;
    logging::init(config.settings.log_filter.as_deref(), cli.verbose)?;
    let session = Session::from_config(config)?;

    match cli.command {
        Commands::Plan {
            targets,
            solution,
            strict,
            jobs,
            no_parallel,
            output,
            jsonl,
        } => {
            let args = commands::plan::PlanArgs {
                flags: PlanFlags {
                    targets,
                    solution,
                    strict,
                    jobs,
                    no_parallel,
                },
                output,
                jsonl,
            };
            commands::plan::run(&session, args)?;
        }
        Commands::Targets { project } => {
            commands::targets::run(&session, project.as_deref())?;
        }
        Commands::Order { target, solution } => {
            commands::order::run(&session, &target, solution)?;
        }
        Commands::Graph { target, solution } => {
            commands::graph::run(&session, &target, solution)?;
        }
        Commands::Check { solution, strict } => {
            let flags = PlanFlags {
                solution,
                strict,
                ..PlanFlags::default()
            };
            commands::check::run(&session, flags)?;
        }
        // Generated before loading the manifest
        Commands::Completions { .. } => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_smoke() {
        let _cli = Cli::parse_from(["trellis", "check"]);
    }

    #[test]
    fn test_plan_flags() {
        let cli = Cli::parse_from([
            "trellis",
            "plan",
            "--target",
            "win64-vs2022-debug-lib-editor-fastbuild",
            "-t",
            "win64-vs2022-release-lib-editor-fastbuild",
            "--solution",
            "Game",
            "-j",
            "4",
            "--no-parallel",
            "--jsonl",
        ]);
        match cli.command {
            Commands::Plan {
                targets,
                solution,
                jobs,
                no_parallel,
                jsonl,
                strict,
                output,
            } => {
                assert_eq!(targets.len(), 2);
                assert_eq!(solution.as_deref(), Some("Game"));
                assert_eq!(jobs, Some(4));
                assert!(no_parallel);
                assert!(jsonl);
                assert!(!strict);
                assert!(output.is_none());
            }
            _ => panic!("Expected Plan command"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["trellis", "targets", "Core", "-v", "--manifest", "ws/trellis.toml"]);
        assert!(cli.verbose);
        assert_eq!(cli.manifest, Some(PathBuf::from("ws/trellis.toml")));
        match cli.command {
            Commands::Targets { project } => assert_eq!(project.as_deref(), Some("Core")),
            _ => panic!("Expected Targets command"),
        }
    }

    #[test]
    fn test_order_requires_target() {
        assert!(Cli::try_parse_from(["trellis", "order"]).is_err());
    }

    #[test]
    fn test_alias_p_for_plan() {
        let cli = Cli::parse_from(["trellis", "p"]);
        assert!(matches!(cli.command, Commands::Plan { .. }));
    }

    #[test]
    fn test_alias_c_for_check() {
        let cli = Cli::parse_from(["trellis", "c", "--strict"]);
        assert!(matches!(cli.command, Commands::Check { strict: true, .. }));
    }

    #[test]
    fn test_completions_bash() {
        let cli = Cli::parse_from(["trellis", "completions", "bash"]);
        match cli.command {
            Commands::Completions { shell } => assert_eq!(shell, Shell::Bash),
            _ => panic!("Expected Completions command"),
        }
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }
}
