use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use modemd::channel::SerialChannelFactory;
use modemd::config::Config;
use modemd::discovery;
use modemd::probe::{self, PortReport};
use modemd::server::Server;
use modemd::telemetry::{init_tracing, TracingConfig};

#[derive(Parser, Debug)]
#[command(name = "modemd")]
#[command(author, version, about = "Serial modem fleet manager: SMS and USSD over AT commands")]
struct Args {
    /// Path to config file (defaults apply when omitted)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the daemon: autoconnect ports and serve the HTTP API
    Serve,

    /// List serial ports visible to the host
    Ports,

    /// Probe ports for a live modem and its subscriber number
    Probe {
        /// Probe a single port instead of the whole inventory
        #[arg(long)]
        port: Option<String>,
    },

    /// Validate the config file and exit
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration first (to get log settings)
    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let tracing_config = TracingConfig {
        service_name: "modemd".to_string(),
        log_level: config.telemetry.log_level.clone(),
        json_logs: config.telemetry.json_logs,
    };
    init_tracing(&tracing_config)?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            info!(version = env!("CARGO_PKG_VERSION"), "starting modemd");
            Server::new(config).run().await
        }
        Command::Validate => {
            info!("configuration is valid");
            Ok(())
        }
        Command::Ports => {
            let ports = discovery::list_ports()?;
            if ports.is_empty() {
                println!("no serial ports found");
            }
            for port in &ports {
                println!(
                    "{}\t{}",
                    port.device,
                    port.description.as_deref().unwrap_or("-")
                );
            }
            Ok(())
        }
        Command::Probe { port } => {
            let factory = SerialChannelFactory;
            let reports = match port {
                Some(port) => vec![probe::probe_port(&factory, &port, &config.probe).await],
                None => probe::scan_all(&factory, &config.probe).await?,
            };
            for report in &reports {
                print_report(report);
            }
            Ok(())
        }
    }
}

fn print_report(report: &PortReport) {
    println!("{}", "-".repeat(50));
    println!(
        "Port:         {} ({})",
        report.port,
        report.description.as_deref().unwrap_or("?")
    );
    println!("AT OK:        {}", report.at_ok);
    if let Some(status) = report.sim_status {
        println!("SIM status:   {status}");
    }
    println!(
        "Phone number: {}",
        report.phone_number.as_deref().unwrap_or("-")
    );
    if let Some(code) = &report.used_ussd {
        println!("USSD used:    {code}");
    }
    if let Some(raw) = &report.raw_response {
        println!("Raw response: {raw:?}");
    }
    if let Some(error) = &report.error {
        println!("Error:        {error}");
    }
}
