//! netaction - Network Action CLI
//!
//! Runs exactly one action per invocation:
//!
//! ```bash
//! netaction GetInterfaces '{"Version":"IPv4"}'
//! netaction SetIP '{"Name":"eth0","Version":"IPv4","Prefix":"10.0.0.5/24"}'
//! echo '{"Target":"8.8.8.8","Count":4}' | netaction Ping -
//! ```
//!
//! The result is printed to stdout as JSON with exit status 0. Any failure
//! prints one line to stderr and exits with status 1.

use clap::error::ErrorKind;
use clap::Parser;
use libnetaction::dispatch::{format_error, EXIT_FAILURE, EXIT_SUCCESS};
use libnetaction::logging;
use libnetaction::*;
use std::path::PathBuf;
use std::process;
use tokio::io::AsyncReadExt;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "netaction")]
#[command(version)]
#[command(about = "Network action shim - query and change interfaces, addresses and routes, probe hosts", long_about = None)]
struct Cli {
    /// Action name (see --list-actions)
    #[arg(required_unless_present = "list_actions")]
    action: Option<String>,

    /// Arguments as a JSON object, or '-' to read them from stdin
    payload: Option<String>,

    /// List supported actions and their arguments
    #[arg(long)]
    list_actions: bool,

    /// Pretty-print the JSON result
    #[arg(long)]
    pretty: bool,

    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, value_parser = ["trace", "debug", "info", "warn", "error"])]
    log_level: Option<String>,

    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Disable console logging (only log to file)
    #[arg(long)]
    no_console_log: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                let _ = e.print();
                process::exit(EXIT_SUCCESS);
            }
            _ => {
                let message = e.to_string();
                let first = message.lines().next().unwrap_or_default();
                eprintln!("Error: UsageError: {}", first.trim_start_matches("error: "));
                process::exit(EXIT_FAILURE);
            }
        },
    };

    process::exit(run(cli).await);
}

async fn run(cli: Cli) -> i32 {
    if cli.list_actions {
        print_actions();
        return EXIT_SUCCESS;
    }

    let config = match &cli.config {
        Some(path) => match NetactionConfig::load(path) {
            Ok(config) => config,
            Err(e) => return fail(&e),
        },
        None => NetactionConfig::default(),
    };

    let level = cli.log_level.clone().unwrap_or_else(|| config.logging.level.clone());
    let log_file = cli.log_file.clone().or_else(|| config.logging.file.clone());
    if let Err(e) = logging::init_logging(&level, log_file.as_deref(), !cli.no_console_log) {
        return fail(&e);
    }

    let Some(action) = cli.action.as_deref() else {
        return fail(&ActionError::MissingArgument("action".to_string()));
    };

    let payload = match read_payload(cli.payload.as_deref()).await {
        Ok(payload) => payload,
        Err(e) => return fail(&e),
    };

    let capability = host_capability(&config);
    debug!("Using {} capability", capability.name());

    let dispatcher = Dispatcher::new(capability, config);
    let encoded = dispatcher.dispatch(action, &payload).await.encode(cli.pretty);

    if let Some(stdout) = &encoded.stdout {
        println!("{}", stdout);
    }
    if let Some(stderr) = &encoded.stderr {
        eprintln!("{}", stderr);
    }
    encoded.exit_code
}

async fn read_payload(arg: Option<&str>) -> NetResult<String> {
    match arg {
        None => Ok("{}".to_string()),
        Some("-") => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .map_err(|e| ActionError::PayloadParse(format!("Failed to read stdin: {}", e)))?;
            Ok(buf)
        }
        Some(payload) => Ok(payload.to_string()),
    }
}

fn fail(err: &ActionError) -> i32 {
    eprintln!("{}", format_error(err));
    EXIT_FAILURE
}

fn print_actions() {
    println!("{:<18} {:<32} {:<26} DESCRIPTION", "ACTION", "REQUIRED", "OPTIONAL");
    for spec in ACTIONS {
        let optional = if spec.optional.is_empty() {
            "-".to_string()
        } else {
            spec.optional.join(",")
        };
        println!(
            "{:<18} {:<32} {:<26} {}",
            spec.name,
            spec.required.join(","),
            optional,
            spec.description
        );
    }
}
