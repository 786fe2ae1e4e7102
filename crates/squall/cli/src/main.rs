use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cluster;
mod config;
mod ls;
mod providers;
mod sh;
mod spinner;

#[derive(Parser, Debug)]
#[command(name = "squall")]
#[command(about = "Squall - attach to and provision stream-processing clusters")]
struct Args {
    /// Path to the config file (default: ~/.squall/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Rediscover a cluster from the provider and write its host lists
    Attach {
        cluster: String,
        /// Fail when the cluster has no master or conflicting roles
        #[arg(long)]
        strict: bool,
    },
    /// Show the live topology of a cluster
    Topology {
        cluster: String,
    },
    /// Build the provisioning plan for a cluster's nodes
    Plan {
        cluster: String,
        /// Write the plan as a bash script instead of printing a summary
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        strict: bool,
    },
    /// Build the plan and run it on a host over ssh
    Deploy {
        cluster: String,
        /// Address of the instance to provision
        #[arg(long)]
        host: String,
        #[arg(long)]
        strict: bool,
    },
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    let config_path = args.config.as_deref();
    let result = match args.command {
        Commands::Attach { cluster, strict } => cluster::handle_attach(config_path, cluster, strict),
        Commands::Topology { cluster } => ls::handle_topology_command(config_path, cluster),
        Commands::Plan { cluster, output, strict } => cluster::handle_plan(config_path, cluster, output, strict),
        Commands::Deploy { cluster, host, strict } => cluster::handle_deploy(config_path, cluster, host, strict),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
