//! xfrmctl command - IPsec SA, policy and tunnel interface management.

mod commands;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use xfrmctl::{ControllerConfig, XfrmController};

use commands::OutputOptions;

#[derive(Parser)]
#[command(name = "xfrmctl", version, about = "IPsec control plane tool")]
struct Cli {
    /// Output JSON.
    #[arg(short = 'j', long, global = true)]
    json: bool,

    /// Pretty print JSON.
    #[arg(short = 'p', long, global = true)]
    pretty: bool,

    /// Controller configuration file (JSON).
    #[arg(short = 'c', long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// How tunnel SAs, policies and interfaces are addressed.
    #[arg(long, global = true, value_enum, default_value_t = TunnelBackend::Auto)]
    backend: TunnelBackend,

    #[command(subcommand)]
    command: Command,
}

/// Tunnel interface flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TunnelBackend {
    /// Probe the kernel for XFRM interfaces.
    Auto,
    /// XFRM interfaces, addressed by interface id.
    Xfrmi,
    /// VTI devices, addressed by mark.
    Vti,
}

#[derive(Subcommand)]
enum Command {
    /// Remove prefixed interfaces, probe the kernel and flush all SAs and policies.
    Init,

    /// Show controller status.
    Status,

    /// Manage Security Associations.
    #[command(visible_alias = "state")]
    Sa(commands::sa::SaCmd),

    /// Reserve SPIs.
    Spi(commands::spi::SpiCmd),

    /// Manage Security Policies.
    Policy(commands::policy::PolicyCmd),

    /// Manage tunnel interfaces.
    #[command(visible_alias = "tun")]
    Tunnel(commands::tunnel::TunnelCmd),
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<ControllerConfig> {
    let Some(path) = path else {
        return Ok(ControllerConfig::default());
    };
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let config: ControllerConfig = serde_json::from_str(&data)
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(config)
}

fn run(command: Command, xfrm: &mut XfrmController, opts: &OutputOptions) -> anyhow::Result<()> {
    match command {
        Command::Init => {
            xfrm.init()?;
            commands::print_status(xfrm, opts)
        }
        Command::Status => commands::print_status(xfrm, opts),
        Command::Sa(cmd) => cmd.run(xfrm, opts),
        Command::Spi(cmd) => cmd.run(xfrm, opts),
        Command::Policy(cmd) => cmd.run(xfrm, opts),
        Command::Tunnel(cmd) => cmd.run(xfrm),
    }
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    let opts = OutputOptions {
        json: cli.json,
        pretty: cli.pretty,
    };

    let config = load_config(cli.config.as_ref())?;
    let mut xfrm = XfrmController::new(config)?;

    // init decides the backend itself
    if !matches!(cli.command, Command::Init) {
        match cli.backend {
            TunnelBackend::Auto => {
                xfrm.detect_xfrm_interface_support();
            }
            TunnelBackend::Xfrmi | TunnelBackend::Vti => {
                xfrm = XfrmController::with_xfrm_interface_support(
                    xfrmctl::KernelSyscalls,
                    xfrm.config().clone(),
                    cli.backend == TunnelBackend::Xfrmi,
                )?;
            }
        }
    }

    let result = run(cli.command, &mut xfrm, &opts);

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
