use std::fs::File;
use std::io::{self, Read, Write};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use snafu::{ResultExt, Whatever};

use iotextra_config::channel::{Actions, Channel};
use iotextra_config::config::{mezzanine_adc_count, Configuration};
use iotextra_config::link::{pull_document, push_config, ConfigLink, TransportError};
use iotextra_config::{document, topics};

const SERIAL_POLL_TIMEOUT_MS: u64 = 50;
const DEFAULT_BAUD_RATE: u32 = 115_200;

#[derive(Parser, Debug)]
#[command(about = "Configure IoTextra I/O nodes over a serial link")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a configuration file and print a summary
    Check { config: PathBuf },
    /// Push a configuration file to the device and wait for the acknowledgment
    Push {
        config: PathBuf,
        #[arg(long)]
        port: String,
        #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
        baud: u32,
    },
    /// Read the stored configuration back from the device
    Pull {
        #[arg(long)]
        port: String,
        #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
        baud: u32,
        /// Write the configuration here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

/// Adapts a serial port to the link trait: short read timeouts surface as
/// "nothing pending yet" so the protocol layer can keep its own deadline.
struct SerialConfigLink {
    port: Box<dyn serialport::SerialPort>,
}

impl ConfigLink for SerialConfigLink {
    fn send(&mut self, buf: &[u8]) -> Result<(), TransportError> {
        self.port
            .write_all(buf)
            .and_then(|()| self.port.flush())
            .map_err(|source| TransportError::Stream { source })
    }

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
            Err(source) => Err(TransportError::Stream { source }),
        }
    }
}

fn main() -> Result<(), Whatever> {
    env_logger::init();

    let args = Args::parse();
    match args.command {
        Command::Check { config } => {
            let cfg = load_config(&config)?;
            print_summary(&cfg);
        }
        Command::Push { config, port, baud } => {
            let cfg = load_config(&config)?;
            let mut link = open_link(&port, baud)?;
            log::info!("Pushing configuration to {port}");
            let ack = push_config(&mut link, &cfg)
                .with_whatever_context(|e| format!("Push failed: {e}"))?;
            println!("Device acknowledged: {ack}");
        }
        Command::Pull { port, baud, out } => {
            let mut link = open_link(&port, baud)?;
            log::info!("Requesting stored configuration from {port}");
            let doc = pull_document(&mut link)
                .with_whatever_context(|e| format!("Read-back failed: {e}"))?;
            let cfg = document::decode(&doc)
                .with_whatever_context(|e| format!("Device returned an invalid configuration: {e}"))?;
            let pretty = serde_json::to_string_pretty(&document::encode(&cfg))
                .with_whatever_context(|e| format!("Error serializing configuration: {e}"))?;
            match out {
                Some(path) => {
                    std::fs::write(&path, pretty + "\n")
                        .with_whatever_context(|e| format!("Cannot write {}: {e}", path.display()))?;
                    println!("Configuration written to {}", path.display());
                }
                None => println!("{pretty}"),
            }
        }
    }
    Ok(())
}

fn load_config(path: &Path) -> Result<Configuration, Whatever> {
    let file = File::open(path)
        .with_whatever_context(|e| format!("Cannot open config file: {e}"))?;
    let doc: serde_json::Value = serde_json::from_reader(BufReader::new(file))
        .with_whatever_context(|e| format!("Config file is not valid JSON: {e}"))?;
    document::decode(&doc)
        .with_whatever_context(|e| format!("Invalid configuration: {e}"))
}

fn open_link(port: &str, baud: u32) -> Result<SerialConfigLink, Whatever> {
    let port = serialport::new(port, baud)
        .timeout(Duration::from_millis(SERIAL_POLL_TIMEOUT_MS))
        .open()
        .with_whatever_context(|e| format!("Failed to open serial port {port}: {e}"))?;
    Ok(SerialConfigLink { port })
}

fn print_summary(cfg: &Configuration) {
    println!("Module:    {}", cfg.module_type);
    println!("Mezzanine: {}", cfg.mezzanine_type);
    if let Some(expected) = mezzanine_adc_count(&cfg.mezzanine_type) {
        if cfg.hardware().adc_count != expected {
            log::warn!(
                "{} boards usually carry {expected} ADCs, configuration has {}",
                cfg.mezzanine_type,
                cfg.hardware().adc_count
            );
        }
    }
    println!("Hardware:  {} mode", cfg.hardware().mode);
    println!("Status topic: {}", topics::status(&cfg.mqtt().base_topic));
    println!();
    println!("{:<10} {:<8} {:<24} {:<4} {}", "Name", "Kind", "Interface", "#", "Details");
    for channel in cfg.channels() {
        match channel {
            Channel::Digital(ch) => {
                let actions = match ch.actions {
                    Actions::ReadOnly => "read only",
                    Actions::ReadWrite => "read+write",
                };
                println!(
                    "{:<10} {:<8} {:<24} {:<4} {actions}",
                    ch.name,
                    "digital",
                    ch.interface.label(),
                    ch.number,
                );
            }
            Channel::Analog(ch) => {
                println!(
                    "{:<10} {:<8} {:<24} {:<4} {} (K={}, Rs={}Ω, offset={}V)",
                    ch.name,
                    "analog",
                    ch.interface.label(),
                    ch.number,
                    ch.range.label(),
                    ch.calibration.gain,
                    ch.calibration.shunt_ohms,
                    ch.calibration.offset_volts,
                );
            }
        }
    }
}
