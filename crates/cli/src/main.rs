mod args;
mod runner;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use args::{Cli, Commands};
use runner::{run_precheck, run_simulation};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run {
            config,
            sources,
            destinations,
            ports,
            mode,
            max_hosts,
            workers,
            max_tasks,
            out_total,
            out_accepted,
        } => {
            run_simulation(
                config,
                sources,
                destinations,
                ports,
                mode,
                max_hosts,
                workers,
                max_tasks,
                out_total,
                out_accepted,
            )
            .await?;
        }
        Commands::Precheck {
            config,
            sources,
            destinations,
            ports,
            format,
        } => {
            run_precheck(config, sources, destinations, ports, format).await?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let log_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    fmt().with_env_filter(filter).compact().init();
}
