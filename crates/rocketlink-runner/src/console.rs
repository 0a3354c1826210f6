//! Operator console.
//!
//! Lines are read on their own thread so the main loop can wait on operator
//! input, Ctrl+C and send notices at once.

use std::io::{self, BufRead};
use std::thread;

use crossbeam_channel::Receiver;
use rocketlink_core::AppContext;
use tracing::debug;

pub const HELP: &str = "commands: DEVICE.COMMAND (e.g. stage1_flight.arm), devices, help, quit";

/// What the main loop should do after a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleAction {
    /// Print the reply, if any, and keep reading.
    Reply(Option<String>),
    Quit,
}

/// Interpret one operator line.
pub fn handle_line(context: &AppContext, line: &str) -> ConsoleAction {
    let line = line.trim();
    match line.to_ascii_lowercase().as_str() {
        "" => ConsoleAction::Reply(None),
        "quit" | "exit" => ConsoleAction::Quit,
        "help" | "?" => ConsoleAction::Reply(Some(HELP.to_string())),
        "devices" => {
            let devices = context.devices().devices();
            if devices.is_empty() {
                return ConsoleAction::Reply(Some("no devices registered".to_string()));
            }
            let lines: Vec<String> = devices
                .iter()
                .map(|(device_type, address)| format!("{:<16} {address}", device_type.to_string()))
                .collect();
            ConsoleAction::Reply(Some(lines.join("\n")))
        }
        _ => match context.execute_command(line) {
            Ok(parsed) => ConsoleAction::Reply(Some(format!(
                "queued {} for {}",
                parsed.command, parsed.device_type
            ))),
            Err(err) => ConsoleAction::Reply(Some(format!("error: {err}"))),
        },
    }
}

/// Forward lines from `input` until it closes. The channel disconnects at
/// end of input.
pub fn spawn_line_reader<R>(input: R) -> io::Result<Receiver<String>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = crossbeam_channel::unbounded();
    thread::Builder::new().name("console".to_string()).spawn(move || {
        for line in input.lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    debug!(error = %err, "console input failed");
                    break;
                }
            }
        }
    })?;
    Ok(rx)
}
