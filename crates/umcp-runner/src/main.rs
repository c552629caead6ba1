use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use umcp_runner::{logging, run_simulation, Bridge, LineFormat, RunConfig, RunnerResult, SimulationReport};

#[derive(Parser)]
#[command(name = "umcp", about = "uMCP reliable link: simulator and TCP bridge")]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Default log level when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run two nodes against each other over a simulated line
    Simulate {
        /// Random seed
        #[arg(long)]
        seed: Option<u64>,
        /// Simulated time limit in seconds
        #[arg(long)]
        duration: Option<f64>,
        /// Probability that a line write is lost
        #[arg(long)]
        loss: Option<f64>,
        /// Probability that a line write is corrupted
        #[arg(long)]
        corrupt: Option<f64>,
        /// Bytes sent from node A to node B
        #[arg(long)]
        bytes: Option<usize>,
        /// Bytes sent from node B to node A
        #[arg(long)]
        reverse_bytes: Option<usize>,
        /// Line encoding
        #[arg(long, value_enum)]
        line_format: Option<LineFormat>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Bridge a host TCP port onto a line TCP port
    Bridge {
        /// This node's id
        #[arg(long)]
        self_id: Option<u8>,
        /// Peer node's id
        #[arg(long)]
        peer_id: Option<u8>,
        /// Host port listen address
        #[arg(long)]
        host_listen: Option<String>,
        /// Listen for the line on this address
        #[arg(long, conflicts_with = "line_connect")]
        line_listen: Option<String>,
        /// Connect to the line at this address
        #[arg(long)]
        line_connect: Option<String>,
        /// Line encoding
        #[arg(long, value_enum)]
        line_format: Option<LineFormat>,
    },
    /// Print the effective configuration as YAML
    Config,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> RunnerResult<()> {
    let mut config = match &cli.config {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };

    match cli.command {
        Command::Simulate {
            seed,
            duration,
            loss,
            corrupt,
            bytes,
            reverse_bytes,
            line_format,
            json,
        } => {
            let sim = &mut config.simulation;
            if let Some(v) = seed {
                sim.seed = v;
            }
            if let Some(v) = duration {
                sim.duration_secs = v;
            }
            if let Some(v) = loss {
                sim.loss_rate = v;
            }
            if let Some(v) = corrupt {
                sim.corrupt_rate = v;
            }
            if let Some(v) = bytes {
                sim.payload_bytes = v;
            }
            if let Some(v) = reverse_bytes {
                sim.reverse_payload_bytes = v;
            }
            if let Some(v) = line_format {
                sim.line_format = v;
            }

            umcp_metrics::describe_metrics();
            let report = run_simulation(config.link, config.simulation)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }
        Command::Bridge {
            self_id,
            peer_id,
            host_listen,
            line_listen,
            line_connect,
            line_format,
        } => {
            if let Some(v) = self_id {
                config.link.self_id = v;
            }
            if let Some(v) = peer_id {
                config.link.peer_id = v;
            }
            let bridge = &mut config.bridge;
            if let Some(v) = host_listen {
                bridge.host_listen = v;
            }
            if line_listen.is_some() {
                bridge.line_listen = line_listen;
                bridge.line_connect = None;
            }
            if line_connect.is_some() {
                bridge.line_connect = line_connect;
                bridge.line_listen = None;
            }
            if let Some(v) = line_format {
                bridge.line_format = v;
            }

            let shutdown = Arc::new(AtomicBool::new(false));
            let flag = shutdown.clone();
            if let Err(e) = ctrlc::set_handler(move || {
                info!("received interrupt, shutting down");
                flag.store(true, Ordering::Relaxed);
            }) {
                error!("failed to install interrupt handler: {}", e);
            }

            umcp_metrics::describe_metrics();
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(async {
                let bridge = Bridge::bind(config.link, config.bridge).await?;
                info!("host port on {}", bridge.host_addr()?);
                if let Some(addr) = bridge.line_addr() {
                    info!("line port on {}", addr);
                }
                bridge.run(shutdown).await
            })?;
        }
        Command::Config => {
            print!("{}", config.to_yaml()?);
        }
    }
    Ok(())
}

fn print_report(report: &SimulationReport) {
    println!(
        "seed {} ({:?} line): {} after {:.1}s",
        report.seed,
        report.line_format,
        if report.completed { "completed" } else { "INCOMPLETE" },
        report.sim_time_secs
    );
    for (label, dir) in [("A -> B", &report.a_to_b), ("B -> A", &report.b_to_a)] {
        println!(
            "  {}: {}/{} bytes{}, {:.1} B/s, line writes {} (lost {}, corrupted {})",
            label,
            dir.delivered_bytes,
            dir.offered_bytes,
            if dir.intact { "" } else { " CORRUPTED" },
            dir.goodput_bps,
            dir.line.writes,
            dir.line.lost,
            dir.line.corrupted
        );
    }
    for node in [&report.node_a, &report.node_b] {
        println!(
            "  {} [{}]: {} tx / {} rx frames, {} blocks, {} resent, {} timeouts, {} bad headers, {} bad payloads, {} give-ups",
            node.name,
            node.final_state,
            node.frames_tx,
            node.frames_rx,
            node.blocks_sent,
            node.retransmissions,
            node.timeouts,
            node.header_errors,
            node.data_errors,
            node.give_ups
        );
    }
}
