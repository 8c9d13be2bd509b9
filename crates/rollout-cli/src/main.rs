use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "rollout",
    about = "Rollout — percentage feature flags with automatic degrade",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Path to rollout.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// redb database file (overrides [store].path; defaults to ./rollout.redb)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Activate a feature flag, replacing any previous state.
    ///
    /// Passing both --min and --threshold attaches a per-flag degrade
    /// config: once the flag has seen `min` guarded calls and more than
    /// `threshold` of them failed, it switches itself off.
    On {
        name: String,
        /// Share of determinators that see the feature (0-100)
        #[arg(default_value_t = 100)]
        percentage: u32,
        /// Requests before the error rate is judged
        #[arg(long, requires = "threshold")]
        min: Option<u64>,
        /// Tolerated error fraction (0.0-1.0)
        #[arg(long, requires = "min")]
        threshold: Option<f64>,
    },
    /// Deactivate and delete a feature flag
    Off { name: String },
    /// List every stored feature flag
    List {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Copy legacy-format flags into the current format
    Migrate {
        /// Leave flags that already have a current record untouched
        #[arg(long)]
        skip_existing: bool,
    },
    /// Evaluate a flag for an optional determinator
    Check {
        name: String,
        #[arg(short, long)]
        determinator: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let rollout = commands::open(cli.config.as_deref(), cli.db)?;
    let mut out = std::io::stdout().lock();

    match cli.command {
        Commands::On {
            name,
            percentage,
            min,
            threshold,
        } => commands::flags::on(&rollout, &mut out, &name, percentage, min.zip(threshold)),
        Commands::Off { name } => commands::flags::off(&rollout, &mut out, &name),
        Commands::List { format } => commands::flags::list(&rollout, &mut out, &format),
        Commands::Migrate { skip_existing } => {
            commands::migrate::migrate(&rollout, &mut out, skip_existing)
        }
        Commands::Check { name, determinator } => {
            commands::flags::check(&rollout, &mut out, &name, determinator.as_deref())
        }
    }
}
