//! Command-line front end: open a port and stream stdin through its
//! buffer flow, printing hub events to stdout.

use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use bufferflow::{
    flow_options, init_logging, list_ports, resolve_algorithm, serial_settings, BufferAlgorithm,
    Config, EventBus, RealSerialPort, SerialConnection,
};
use clap::{Parser, Subcommand};

/// Bufferflow - keep small firmware receive buffers full but never overrun.
#[derive(Parser, Debug)]
#[command(name = "bufferflow")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform.
    #[command(subcommand)]
    command: Command,

    /// Configuration file (.toml or .json).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Open a port and send stdin to it, one command per line.
    Run {
        /// Serial port path.
        #[arg(short, long)]
        port: Option<String>,
        /// Baud rate.
        #[arg(short, long)]
        baud: Option<u32>,
        /// Buffer algorithm, e.g. repetier or marlin.
        #[arg(short, long)]
        firmware: Option<String>,
        /// Device buffer capacity in bytes.
        #[arg(long)]
        capacity: Option<usize>,
        /// Status query interval in milliseconds.
        #[arg(long)]
        poll_interval_ms: Option<u64>,
        /// Do not send periodic status queries.
        #[arg(long)]
        no_status_poll: bool,
        /// Seconds to wait at end of input for staged commands to go out.
        #[arg(long, default_value_t = 30)]
        drain_timeout_secs: u64,
    },
    /// List serial ports present on this machine.
    ListPorts,
    /// List buffer algorithm names and whether this build supports them.
    ListAlgorithms,
    /// Write a configuration file with default values.
    InitConfig {
        /// Where to write; defaults to the platform config directory.
        path: Option<PathBuf>,
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    init_logging()?;
    let args = Args::parse();

    match args.command {
        Command::Run {
            port,
            baud,
            firmware,
            capacity,
            poll_interval_ms,
            no_status_poll,
            drain_timeout_secs,
        } => {
            let mut config = load_config(args.config.as_deref())?;
            if let Some(port) = port {
                config.connection.port = port;
            }
            if let Some(baud) = baud {
                config.connection.baud_rate = baud;
            }
            if let Some(firmware) = firmware {
                config.connection.firmware = firmware;
            }
            if capacity.is_some() {
                config.flow.capacity = capacity;
            }
            if poll_interval_ms.is_some() {
                config.flow.status_poll_interval_ms = poll_interval_ms;
            }
            if no_status_poll {
                config.flow.status_poll_enabled = false;
            }
            config.validate()?;

            run(&config, Duration::from_secs(drain_timeout_secs))
        }
        Command::ListPorts => {
            for port in list_ports()? {
                println!("{}", port);
            }
            Ok(())
        }
        Command::ListAlgorithms => {
            for algorithm in BufferAlgorithm::ALL {
                let status = if algorithm.is_supported() {
                    "supported"
                } else {
                    "not available"
                };
                println!("{:<16} {}", algorithm.as_str(), status);
            }
            Ok(())
        }
        Command::InitConfig { path, force } => {
            let path = match path.or(args.config) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            if path.exists() && !force {
                bail!("{} already exists; pass --force to overwrite", path.display());
            }
            Config::default().save_to_file(&path)?;
            println!("Wrote {}", path.display());
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => match Config::default_path() {
            Ok(path) => Config::load_or_default(&path)?,
            Err(e) => {
                tracing::warn!("{}; using default configuration", e);
                Config::default()
            }
        },
    };
    Ok(config)
}

fn run(config: &Config, drain_timeout: Duration) -> Result<()> {
    if config.connection.port.is_empty() {
        bail!("no serial port given; pass --port or set connection.port");
    }
    let algorithm = resolve_algorithm(&config.connection)?;

    let bus = Arc::new(EventBus::new());
    bus.subscribe(|event| println!("{}", event.to_wire()));

    let port = RealSerialPort::open(&serial_settings(&config.connection))?;
    let connection = SerialConnection::open(
        Box::new(port),
        algorithm,
        flow_options(&config.flow),
        bus.clone(),
    )?;

    for (n, line) in io::stdin().lock().lines().enumerate() {
        let line = line.context("reading stdin")?;
        let id = format!("stdin-{}", n + 1);
        connection.submit(&format!("{}\n", line), &id)?;
    }

    let deadline = Instant::now() + drain_timeout;
    while !connection.is_idle() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(50));
    }
    if !connection.is_idle() {
        tracing::warn!(
            "{} commands unsent and {} unacknowledged on {} after {:?}; dropping them",
            connection.items_in_buffer(),
            connection.flow().in_flight(),
            connection.port_name(),
            drain_timeout
        );
    }

    connection.close()?;
    Ok(())
}
