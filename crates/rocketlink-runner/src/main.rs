//! rocketlink ground station.
//!
//! ```bash
//! # Open the transports listed in a config file and start the console
//! rocketlink run --config station.yaml
//!
//! # Replay the built-in scenarios
//! rocketlink self-test
//! ```

use std::error::Error;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use crossbeam_channel::select;
use rocketlink_core::AppContext;
use rocketlink_metrics::{describe_metrics, global_recorder, metric_defs};
use rocketlink_runner::{console, handle_line, logging, self_test, ConsoleAction, GroundStationConfig};
use tracing::info;

#[derive(Parser)]
#[command(name = "rocketlink")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Rocket telemetry ground station")]
struct Cli {
    /// Log filter, e.g. `debug` or `rocketlink_core=trace` (overrides RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Open the configured transports and read operator commands from stdin
    Run {
        /// YAML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Replay the built-in scenarios; exits with status 1 on failure
    SelfTest,
}

fn main() -> Result<ExitCode, Box<dyn Error>> {
    let cli = Cli::parse();
    logging::init(cli.log_level.as_deref());

    match cli.command {
        Command::Run { config } => {
            let config = match config {
                Some(path) => GroundStationConfig::load(&path)?,
                None => GroundStationConfig::default(),
            };
            run(&config)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::SelfTest => {
            let report = self_test::run_all();
            println!("{report}");
            Ok(if report.passed() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            })
        }
    }
}

fn run(config: &GroundStationConfig) -> Result<(), Box<dyn Error>> {
    let recorder = global_recorder();
    describe_metrics();

    let context = AppContext::start(config.context_config())?;
    for transport in &config.transports {
        let transport = transport.build(config.ground_address, config.send_timeout());
        if let Err(err) = context.add_transport(transport) {
            context.shutdown();
            return Err(err.into());
        }
    }
    info!(
        ground = %config.ground_address,
        transports = config.transports.len(),
        "ground station running"
    );

    let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
    ctrlc::set_handler(move || {
        let _ = stop_tx.try_send(());
    })?;

    let lines = console::spawn_line_reader(BufReader::new(io::stdin()))?;
    let notices = context.notices();
    let mut stdin_open = true;
    println!("{}", console::HELP);

    loop {
        // Stdin may close while the station keeps running until Ctrl+C
        let input = if stdin_open { lines.clone() } else { crossbeam_channel::never() };
        select! {
            recv(stop_rx) -> _ => {
                info!("received Ctrl+C, shutting down");
                break;
            }
            recv(input) -> line => match line {
                Ok(line) => match handle_line(&context, &line) {
                    ConsoleAction::Reply(Some(reply)) => println!("{reply}"),
                    ConsoleAction::Reply(None) => {}
                    ConsoleAction::Quit => break,
                },
                Err(_) => stdin_open = false,
            },
            recv(notices) -> notice => match notice {
                Ok(notice) => println!("{notice}"),
                Err(_) => break,
            },
        }
    }

    context.shutdown();
    info!(
        decoded = recorder.counter(metric_defs::PACKETS_DECODED.name, &[]),
        decode_errors = recorder.counter(metric_defs::PACKET_DECODE_ERRORS.name, &[]),
        commands = recorder.counter(metric_defs::COMMANDS_SENT.name, &[]),
        autosaves = recorder.counter(metric_defs::AUTOSAVE_WRITES.name, &[]),
        "session summary"
    );
    Ok(())
}
