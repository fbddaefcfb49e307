//! Command line entry point.
//!
//! Each subcommand runs one simulation and writes its raw numbers to stdout,
//! ready for an external plotting or reporting tool. Logs go to stderr.

use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use stochsim::{
    format_table, ks_distance, mean, sample_chains, sweep_parallel, BoxDomain, Config, UnitDisk,
    UniformSource,
};

#[derive(Parser)]
#[command(name = "stochsim")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// TOML configuration file; defaults are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a linear congruential uniform stream
    Uniform {
        #[arg(long)]
        seed: Option<u64>,

        #[arg(short, long)]
        num_draws: Option<usize>,
    },

    /// Sample the two-kernel target with the Metropolis algorithm
    Metropolis {
        #[arg(long)]
        seed: Option<u64>,

        #[arg(short, long)]
        num_steps: Option<usize>,

        /// Number of independent chains, printed as tab separated columns
        #[arg(long)]
        chains: Option<usize>,
    },

    /// Estimate pi on a ladder of sample counts
    Pi {
        #[arg(long)]
        seed: Option<u64>,

        #[arg(short, long)]
        repetitions: Option<usize>,

        /// Significant digits of the printed estimates
        #[arg(long, default_value = "6")]
        digits: u32,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "stochsim=debug" } else { "stochsim=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    match cli.command {
        Commands::Uniform { seed, num_draws } => {
            let settings = &mut config.uniform;
            settings.seed = seed.unwrap_or(settings.seed);
            settings.num_draws = num_draws.unwrap_or(settings.num_draws);
            let mut lcg = settings
                .generator()
                .context("Invalid uniform stream settings")?;
            info!(seed = settings.seed, num_draws = settings.num_draws, "Generating stream");
            for _ in 0..settings.num_draws {
                writeln!(out, "{}", lcg.next_uniform())?;
            }
        }
        Commands::Metropolis {
            seed,
            num_steps,
            chains,
        } => {
            let settings = &mut config.metropolis;
            settings.seed = seed.unwrap_or(settings.seed);
            settings.num_steps = num_steps.unwrap_or(settings.num_steps);
            settings.num_chains = chains.unwrap_or(settings.num_chains);
            let target = config
                .target
                .density()
                .context("Invalid target density")?;
            let chains =
                sample_chains(settings, &target).context("Metropolis sampling failed")?;
            for (chain_id, chain) in chains.iter().enumerate() {
                let kept = chain.after_burn_in(settings.burn_in);
                let distance = ks_distance(kept, |x| target.cdf(x))?;
                info!(
                    chain_id,
                    acceptance_rate = chain.acceptance_rate(),
                    mean = mean(kept),
                    ks_distance = distance,
                    "Chain summary"
                );
            }
            for step in settings.burn_in..settings.num_steps {
                let row = chains
                    .iter()
                    .map(|chain| chain.samples()[step].to_string())
                    .collect::<Vec<_>>();
                writeln!(out, "{}", row.join("\t"))?;
            }
        }
        Commands::Pi {
            seed,
            repetitions,
            digits,
        } => {
            let settings = &mut config.sweep;
            settings.seed = seed.unwrap_or(settings.seed);
            settings.repetitions = repetitions.unwrap_or(settings.repetitions);
            let domain = BoxDomain::<2>::symmetric(1.)?;
            let table = sweep_parallel(&UnitDisk::default(), &domain, settings)
                .context("Convergence sweep failed")?;
            for rung in 0..table.num_rungs() {
                info!(
                    num_draws = table.rung_sizes()[rung],
                    mean = table.rung_mean(rung),
                    std = table.rung_std(rung),
                    "Rung summary"
                );
            }
            write!(out, "{}", format_table(&table, digits))?;
        }
    }
    out.flush()?;
    Ok(())
}
