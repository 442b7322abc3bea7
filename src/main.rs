//! uartctl
//!
//! Command-line front end for host UART access through device files.
//!
//! # Usage
//!
//! ```bash
//! # List serial devices under /dev
//! uartctl list --prefix ttyUSB
//!
//! # Show which GPIO pins carry a port's signals (from the [pins] config table)
//! uartctl pins ttyS1
//!
//! # Send a command and read a 16-byte reply
//! uartctl send -p ttyUSB0 --newline --read 16 "AT"
//!
//! # Print incoming lines with timestamps
//! uartctl monitor -p ttyUSB0 --frequency 9600
//! ```

use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use colored::Colorize;

use uart_devfs::config::{Config, LineSettings};
use uart_devfs::{DevFs, DriverRegistry, DriverState, Flow, Frequency, Parity, Pin, Port, StopBits, UartPins};

/// Host UART access through device files
#[derive(Parser)]
#[command(name = "uartctl")]
#[command(version = "0.1.0")]
#[command(about = "Enumerate, configure and talk to serial ports exposed as device files")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (default: ./uartctl.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List serial devices
    List {
        /// Only devices whose name starts with this
        #[arg(short, long)]
        prefix: Option<String>,
    },

    /// Show the pins bound to a port
    Pins {
        /// Device name relative to /dev (e.g. ttyS1)
        port: Option<String>,
    },

    /// Send text and optionally read a reply
    Send {
        /// Device name relative to /dev
        #[arg(short, long)]
        port: Option<String>,

        /// Text to send
        text: String,

        /// Append CR LF to the text
        #[arg(long)]
        newline: bool,

        /// Number of reply bytes to read
        #[arg(short, long, default_value_t = 0)]
        read: usize,

        #[command(flatten)]
        line: LineArgs,
    },

    /// Print incoming lines until the device closes
    Monitor {
        /// Device name relative to /dev
        #[arg(short, long)]
        port: Option<String>,

        /// Disable timestamps
        #[arg(long)]
        no_timestamps: bool,

        #[command(flatten)]
        line: LineArgs,
    },

    /// Register and initialise host drivers
    Drivers,
}

/// Overrides for the configured line settings
#[derive(clap::Args)]
struct LineArgs {
    /// Clock in Hz
    #[arg(short, long)]
    frequency: Option<u64>,

    /// Bits per word (5-8)
    #[arg(short, long)]
    bits: Option<u8>,

    #[arg(long, value_enum)]
    parity: Option<Parity>,

    #[arg(long, value_enum)]
    stop_bits: Option<StopBits>,

    #[arg(long, value_enum)]
    flow: Option<Flow>,
}

impl LineArgs {
    fn apply(&self, base: &LineSettings) -> LineSettings {
        LineSettings {
            frequency: self.frequency.map(Frequency::from_hz).unwrap_or(base.frequency),
            bits: self.bits.unwrap_or(base.bits),
            stop_bits: self.stop_bits.unwrap_or(base.stop_bits),
            parity: self.parity.unwrap_or(base.parity),
            flow: self.flow.unwrap_or(base.flow),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    let config = Config::discover(cli.config.as_deref())?;
    let devfs = DevFs::default().with_pins(std::sync::Arc::new(config.pin_map()));

    match cli.command {
        Commands::List { prefix } => handle_list(&devfs, prefix.as_deref().unwrap_or(&config.prefix)),
        Commands::Pins { port } => handle_pins(&devfs, &port_name(port, &config)?),
        Commands::Send {
            port,
            text,
            newline,
            read,
            line,
        } => {
            let port = open_connected(&devfs, &port_name(port, &config)?, &line.apply(&config.line))?;
            handle_send(&port, &text, newline, read)
        }
        Commands::Monitor {
            port,
            no_timestamps,
            line,
        } => {
            let port = open_connected(&devfs, &port_name(port, &config)?, &line.apply(&config.line))?;
            handle_monitor(&port, !no_timestamps)
        }
        Commands::Drivers => handle_drivers(),
    }
}

fn port_name(arg: Option<String>, config: &Config) -> Result<String> {
    arg.or_else(|| config.port.clone())
        .ok_or_else(|| anyhow::anyhow!("No port given. Pass one or set `port` in the config file."))
}

fn open_connected(devfs: &DevFs, name: &str, line: &LineSettings) -> Result<Port> {
    let port = devfs
        .open(name)
        .with_context(|| format!("Failed to open serial port: {}{}", devfs.root(), name))?;
    port.connect(line.frequency, line.stop_bits, line.parity, line.flow, line.bits)
        .with_context(|| format!("Failed to configure {}", port))?;
    log::info!("{} at {} ({} bits, parity {}, flow {})", port, line.frequency, line.bits, line.parity, line.flow);
    Ok(port)
}

fn handle_list(devfs: &DevFs, prefix: &str) -> Result<()> {
    let names = devfs
        .enumerate(prefix)
        .with_context(|| format!("Failed to list {}{}*", devfs.root(), prefix))?;

    if names.is_empty() {
        println!("{}", "No serial devices found".yellow());
        return Ok(());
    }

    println!("{}", "Serial Devices:".green().bold());
    for name in names {
        println!("  {}", name.white().bold());
    }
    Ok(())
}

fn handle_pins(devfs: &DevFs, name: &str) -> Result<()> {
    let port = devfs
        .open(name)
        .with_context(|| format!("Failed to open serial port: {}{}", devfs.root(), name))?;

    println!("{} {}", "Port".cyan(), port.to_string().white().bold());
    let number = port.port_number();
    if !number.is_known() {
        println!("  {}", "No port number in device name; using 0".yellow());
    }
    for (label, pin) in [("RX", port.rx()), ("TX", port.tx()), ("RTS", port.rts()), ("CTS", port.cts())] {
        println!("  {:<4} {}", label, describe_pin(&pin));
    }
    port.close()?;
    Ok(())
}

fn describe_pin(pin: &Pin) -> String {
    if pin.is_valid() {
        pin.to_string().green().to_string()
    } else {
        pin.to_string().dimmed().to_string()
    }
}

fn handle_send(port: &Port, text: &str, newline: bool, read: usize) -> Result<()> {
    let mut out = text.as_bytes().to_vec();
    if newline {
        out.extend_from_slice(b"\r\n");
    }
    let mut reply = vec![0u8; read];
    port.connection()
        .transfer(&out, &mut reply)
        .with_context(|| format!("Transfer on {} failed", port))?;

    println!("{} {} bytes", "Sent".green(), out.len());
    if !reply.is_empty() {
        println!("{}", "Reply:".cyan().bold());
        for chunk in reply.chunks(16) {
            println!("  {}", format_row(chunk));
        }
    }
    port.close()?;
    Ok(())
}

fn format_row(chunk: &[u8]) -> String {
    let hex: Vec<String> = chunk.iter().map(|b| format!("{:02x}", b)).collect();
    let ascii: String = chunk
        .iter()
        .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
        .collect();
    format!("{:<48} {}", hex.join(" "), ascii)
}

fn handle_monitor(port: &Port, timestamps: bool) -> Result<()> {
    println!("{} {} (until the device closes)", "Monitoring".green().bold(), port);

    let mut reader = BufReader::new(port);
    let mut line = Vec::new();
    loop {
        line.clear();
        let n = reader
            .read_until(b'\n', &mut line)
            .with_context(|| "Failed to read from serial port")?;
        if n == 0 {
            break;
        }
        while matches!(line.last(), Some(b'\n' | b'\r')) {
            line.pop();
        }
        let text = String::from_utf8_lossy(&line);
        if timestamps {
            println!("{} {}", Local::now().format("[%H:%M:%S%.3f]").to_string().dimmed(), text);
        } else {
            println!("{}", text);
        }
    }
    port.close()?;
    Ok(())
}

fn handle_drivers() -> Result<()> {
    let mut registry = DriverRegistry::new();
    uart_devfs::register_drivers(&mut registry)?;

    println!("{}", "Drivers:".green().bold());
    for (name, state) in registry.init_all() {
        let state = match state {
            DriverState::Loaded => state.to_string().green(),
            DriverState::Skipped => state.to_string().yellow(),
            DriverState::Failed(_) => state.to_string().red(),
        };
        println!("  {:<10} {}", name, state);
    }
    Ok(())
}
