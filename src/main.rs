//! # Fiscalia CLI
//!
//! Command-line interface for PnP fiscal printers.
//!
//! ## Usage
//!
//! ```bash
//! # List candidate serial ports
//! fiscalia ports
//!
//! # Query printer and fiscal status
//! fiscalia status --device /dev/ttyUSB0
//!
//! # Print a non-fiscal test page
//! fiscalia test-print --device /dev/ttyUSB0
//!
//! # Print an invoice described in JSON
//! fiscalia invoice factura.json --device /dev/ttyUSB0 --profile pnp-legacy
//!
//! # Serve the HTTP API
//! fiscalia serve --listen 127.0.0.1:8080 --device /dev/ttyUSB0
//! ```
//!
//! Logging goes to stderr and is controlled with `RUST_LOG`
//! (e.g. `RUST_LOG=fiscalia=debug` to see every frame on the wire).

use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use fiscalia::{
    FiscalError,
    fiscal::{FiscalPrinter, Invoice, test_page},
    printer::DeviceProfile,
    server::{self, ServerConfig},
    transport::{self, SerialConfig, SerialTransport},
};

/// Fiscalia - Fiscal printer driver
#[derive(Parser, Debug)]
#[command(name = "fiscalia")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Debug)]
struct DeviceArgs {
    /// Serial device path
    #[arg(long, default_value = "/dev/ttyUSB0")]
    device: String,

    /// Device profile (pnp, pnp-legacy)
    #[arg(long, default_value = "pnp", value_parser = DeviceProfile::parse)]
    profile: DeviceProfile,

    /// Baud rate
    #[arg(long, default_value_t = 9600)]
    baud: u32,
}

impl DeviceArgs {
    fn open(&self) -> Result<FiscalPrinter<SerialTransport>, FiscalError> {
        let serial = SerialConfig {
            baud_rate: self.baud,
            ..SerialConfig::default()
        };
        let transport = SerialTransport::open(&self.device, serial)?;
        Ok(FiscalPrinter::new(transport, self.profile.clone()))
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List serial ports
    Ports,

    /// Query printer and fiscal status words
    Status {
        #[command(flatten)]
        device: DeviceArgs,
    },

    /// Print a non-fiscal test document
    TestPrint {
        #[command(flatten)]
        device: DeviceArgs,

        /// Line to print (repeatable, max 40 characters each)
        #[arg(long = "line", value_name = "TEXT")]
        lines: Vec<String>,
    },

    /// Print a fiscal invoice from a JSON file
    Invoice {
        /// Invoice JSON file
        file: PathBuf,

        #[command(flatten)]
        device: DeviceArgs,
    },

    /// Start the HTTP API
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:8080")]
        listen: String,

        /// Serial device to open at startup
        #[arg(long)]
        device: Option<String>,

        /// Device profile (pnp, pnp-legacy)
        #[arg(long, default_value = "pnp", value_parser = DeviceProfile::parse)]
        profile: DeviceProfile,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), FiscalError> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ports => {
            let ports = transport::list_ports()?;
            if ports.is_empty() {
                println!("No serial ports found.");
            }
            for port in ports {
                println!("{}", port);
            }
        }

        Commands::Status { device } => {
            let mut printer = device.open()?;
            let report = printer.query_status()?;
            println!("Printer status: {}", report.printer);
            println!("Fiscal status:  {}", report.fiscal);
            if report.is_ready() {
                println!("Ready.");
            } else {
                for condition in &report.conditions {
                    println!("  - {}", condition);
                }
            }
        }

        Commands::TestPrint { device, lines } => {
            let lines = if lines.is_empty() { test_page() } else { lines };
            let mut printer = device.open()?;
            printer.test_print(&lines)?;
            println!("Test print sent ({} lines).", lines.len());
        }

        Commands::Invoice { file, device } => {
            let json = fs::read_to_string(&file)?;
            let invoice: Invoice = serde_json::from_str(&json).map_err(|e| {
                FiscalError::InvalidField(format!("{}: {}", file.display(), e))
            })?;

            let mut printer = device.open()?;
            let outcome = printer.print_invoice(&invoice);
            println!(
                "{}",
                serde_json::to_string_pretty(&outcome).map_err(|e| FiscalError::Io(e.into()))?
            );
            if !outcome.ok {
                eprintln!("Error: {}", outcome.message);
                std::process::exit(1);
            }
        }

        Commands::Serve {
            listen,
            device,
            profile,
        } => {
            let config = ServerConfig {
                listen_addr: listen,
                device_path: device,
                profile,
                serial: SerialConfig::default(),
            };
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(server::serve(config))?;
        }
    }

    Ok(())
}
