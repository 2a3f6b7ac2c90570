use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "drishti")]
#[command(version = "0.1.0")]
#[command(about = "Static firewall policy reachability analyzer", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Simulate every flow and write the two result sinks
    Run {
        /// FortiGate configuration dump providing the policy set
        #[arg(short, long, required = true)]
        config: PathBuf,

        /// Source networks file (one CIDR per line)
        #[arg(short, long, required = true)]
        sources: PathBuf,

        /// Destination CSV with a 'Network Segment' column
        #[arg(short, long, required = true)]
        destinations: PathBuf,

        /// Port entries CSV (label,port,protocol)
        #[arg(short, long, required = true)]
        ports: PathBuf,

        /// Expansion mode: sample one address per CIDR, or expand small CIDRs
        #[arg(long, default_value = "sample", value_parser = ["sample", "expand"])]
        mode: String,

        /// Host-count threshold above which a CIDR is sampled even in expand mode
        #[arg(long, default_value = "65536")]
        max_hosts: u64,

        /// Number of parallel workers (defaults to the CPU count)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Advisory task ceiling; 0 disables the check
        #[arg(long, default_value = "0")]
        max_tasks: u64,

        /// Path of the total results sink
        #[arg(long, default_value = "results_total.csv")]
        out_total: PathBuf,

        /// Path of the accepted-only results sink
        #[arg(long, default_value = "results_accepted.csv")]
        out_accepted: PathBuf,
    },

    /// Classify every (source CIDR, destination CIDR, port) pair without
    /// enumerating hosts
    Precheck {
        /// FortiGate configuration dump providing the policy set
        #[arg(short, long, required = true)]
        config: PathBuf,

        /// Source networks file (one CIDR per line)
        #[arg(short, long, required = true)]
        sources: PathBuf,

        /// Destination CSV with a 'Network Segment' column
        #[arg(short, long, required = true)]
        destinations: PathBuf,

        /// Port entries CSV (label,port,protocol)
        #[arg(short, long, required = true)]
        ports: PathBuf,

        /// Report format
        #[arg(short, long, default_value = "csv", value_parser = ["csv", "json"])]
        format: String,
    },
}
