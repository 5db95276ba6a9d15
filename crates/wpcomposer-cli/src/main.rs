//! wpcomposer - convert WordPress installs to Composer-managed projects

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

mod convert;
mod inspect;
mod locate;
mod logging;

#[derive(Parser)]
#[command(name = "wpcomposer")]
#[command(version)]
#[command(
    about = "Convert a WordPress install into a Composer-managed project",
    long_about = None
)]
struct Cli {
    /// Show debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by commands that plan a migration.
#[derive(Args, Debug, Clone, Default)]
struct PlanArgs {
    /// WordPress root directory (searched for upward from the current directory by default)
    #[arg(long, value_name = "PATH")]
    core_root: Option<PathBuf>,

    /// Directory holding the manifest to write (the located manifest root by default)
    #[arg(long, value_name = "PATH")]
    composer_root: Option<PathBuf>,

    /// Require exact versions instead of caret ranges
    #[arg(long)]
    exact_versions: bool,

    /// Core version to use when wp-includes/version.php cannot be read
    #[arg(long, value_name = "VERSION")]
    core_version: Option<String>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

impl From<PlanArgs> for inspect::InspectOptions {
    fn from(args: PlanArgs) -> Self {
        Self {
            core_root: args.core_root,
            composer_root: args.composer_root,
            exact_versions: args.exact_versions,
            core_version: args.core_version,
            json: args.json,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the manifest root, WordPress root and vendor directory
    Locate {
        /// Directory to start searching from
        #[arg(long, value_name = "PATH")]
        core_root: Option<PathBuf>,
    },

    /// Show what a conversion would require without changing anything
    Inspect {
        #[command(flatten)]
        plan: PlanArgs,
    },

    /// Write requirements to the manifest and remove re-installable extensions
    Convert {
        #[command(flatten)]
        plan: PlanArgs,

        /// Show what would change without writing or deleting anything
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("warning: failed to initialise logging: {e}");
    }

    if let Err(e) = run(cli.command) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Locate { core_root } => {
            let root = locate::locate_root(core_root)?;
            locate::print_root(&root);
        }

        Commands::Inspect { plan } => {
            let options = inspect::InspectOptions::from(plan);
            let report = inspect::inspect(&options)?;
            if options.json {
                report.print_json()?;
            } else {
                report.print_summary();
            }
        }

        Commands::Convert { plan, dry_run } => {
            let options = convert::ConvertOptions {
                plan: plan.into(),
                dry_run,
            };
            let result = convert::convert(&options)?;
            if options.plan.json {
                result.print_json()?;
            } else {
                result.print_summary();
            }
        }
    }

    Ok(())
}
