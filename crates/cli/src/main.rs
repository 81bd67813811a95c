//! usb-session command-line front end
//!
//! Lists attached USB devices, or opens one HID-class device, claims its
//! interface, and exchanges fixed-size reports over its interrupt endpoints.

mod commands;
mod config;
mod report;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use commands::ExchangeSettings;
use common::setup_logging;
use config::Config;
use std::path::PathBuf;
use tracing::{error, info};
use usb_session::{EnumerationError, InitializationError, RusbTransport};

#[derive(Parser, Debug)]
#[command(name = "usb-session")]
#[command(author, version, about = "USB device session tool - list devices and exchange reports")]
#[command(long_about = "
Enumerates USB devices and exchanges interrupt reports with a selected device.

EXAMPLES:
    # List every attached device
    usb-session list

    # List only Microchip devices, as JSON
    usb-session list --filter 0x04d8:* --json

    # Exchange reports with the configured device
    usb-session exchange

    # Exchange with another device and a shorter timeout
    usb-session exchange --vendor-id 0x1234 --product-id 0x5678 --timeout-ms 1000

CONFIGURATION:
    Configuration files are looked up in the following order:
    1. Path specified with --config
    2. ~/.config/usb-session/config.toml
    3. /etc/usb-session/config.toml
    4. Built-in defaults
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List attached USB devices
    List {
        /// Device filter ("0xVID:0xPID", "0xVID:*", "*:*"); repeatable
        #[arg(short, long, value_name = "FILTER")]
        filter: Vec<String>,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Write a report, read the reply, then write a send-only report
    Exchange {
        /// Vendor ID (e.g. 0x04d8)
        #[arg(long, value_name = "VID")]
        vendor_id: Option<String>,

        /// Product ID (e.g. 0x003f)
        #[arg(long, value_name = "PID")]
        product_id: Option<String>,

        /// Interface number to claim
        #[arg(short, long, value_name = "N")]
        interface: Option<u8>,

        /// Per-transfer timeout in milliseconds
        #[arg(short, long, value_name = "MS")]
        timeout_ms: Option<u64>,

        /// Leave any kernel driver bound to the interface
        #[arg(long)]
        no_detach: bool,

        /// Skip the trailing send-only report
        #[arg(long)]
        skip_send_only: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    if let Err(err) = run(args) {
        // Transport start-up and enumeration failures exit with the libusb code
        if let Some(code) = transport_exit_code(&err) {
            error!("{:#}", err);
            std::process::exit(code);
        }
        return Err(err);
    }
    Ok(())
}

fn run(args: Args) -> Result<()> {
    if args.save_config {
        let config = Config::default();
        let path = Config::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let mut config = if let Some(ref path) = args.config {
        Config::load(Some(path.clone()))
    } else {
        Config::load_or_default()
    }
    .context("Failed to load configuration")?;

    if let Some(level) = args.log_level {
        config.general.log_level = level;
    }
    setup_logging(&config.general.log_level).context("Failed to setup logging")?;

    info!("usb-session v{}", env!("CARGO_PKG_VERSION"));

    let command = args.command.unwrap_or(Command::List {
        filter: Vec::new(),
        json: false,
    });

    match command {
        Command::List { filter, json } => {
            if !filter.is_empty() {
                config.list.filters = filter;
            }
            config.validate()?;
            list_mode(&config, json)
        }
        Command::Exchange {
            vendor_id,
            product_id,
            interface,
            timeout_ms,
            no_detach,
            skip_send_only,
        } => {
            if let Some(vid) = vendor_id {
                config.device.vendor_id = vid;
            }
            if let Some(pid) = product_id {
                config.device.product_id = pid;
            }
            if let Some(interface) = interface {
                config.device.interface_number = interface;
            }
            if let Some(ms) = timeout_ms {
                config.device.timeout_ms = ms;
            }
            if no_detach {
                config.device.detach_kernel_driver = false;
            }
            config.validate()?;
            exchange_mode(&config, !skip_send_only)
        }
    }
}

/// List USB devices and exit
fn list_mode(config: &Config, json: bool) -> Result<()> {
    let selectors = config.list.selectors()?;
    let transport = RusbTransport::new()?;
    let records = commands::list_devices(&transport, &selectors)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else if records.is_empty() {
        println!("No USB devices found.");
    } else {
        for record in &records {
            println!("{}", record.render());
        }
    }
    Ok(())
}

fn exchange_mode(config: &Config, send_only: bool) -> Result<()> {
    let settings = ExchangeSettings {
        vendor_id: config.device.vendor_id()?,
        product_id: config.device.product_id()?,
        interface: config.device.interface_number,
        out_endpoint: config.endpoints.interrupt_out()?,
        in_endpoint: config.endpoints.interrupt_in()?,
        timeout: config.device.timeout(),
        report_size: config.endpoints.report_size,
        detach_kernel_driver: config.device.detach_kernel_driver,
        send_only,
    };

    let transport = RusbTransport::new()?;
    let report = commands::run_exchange(&transport, &settings)?;
    println!("{}", report.render());

    if let Some(err) = report.failure() {
        return Err(anyhow::Error::new(err.clone()).context("Report exchange failed"));
    }
    Ok(())
}

/// Negative libusb code for failures that happen before any device is opened
fn transport_exit_code(err: &anyhow::Error) -> Option<i32> {
    err.downcast_ref::<InitializationError>()
        .map(InitializationError::code)
        .or_else(|| err.downcast_ref::<EnumerationError>().map(EnumerationError::code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::UsbError;

    #[test]
    fn test_exit_code_for_initialization_failure() {
        let err = anyhow::Error::new(InitializationError {
            source: UsbError::Access,
        });
        assert_eq!(transport_exit_code(&err), Some(-3));
    }

    #[test]
    fn test_exit_code_through_context() {
        let err = anyhow::Error::new(EnumerationError::List {
            source: UsbError::NoMem,
        })
        .context("Failed to list devices");
        assert_eq!(transport_exit_code(&err), Some(-11));
    }

    #[test]
    fn test_other_failures_have_no_transport_code() {
        let err = anyhow::anyhow!("Unable to find device 04d8:003f");
        assert_eq!(transport_exit_code(&err), None);
    }

    #[test]
    fn test_args_parse_exchange_overrides() {
        let args = Args::parse_from([
            "usb-session",
            "--log-level",
            "debug",
            "exchange",
            "--vendor-id",
            "0x1234",
            "--timeout-ms",
            "250",
            "--skip-send-only",
        ]);
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        match args.command {
            Some(Command::Exchange {
                vendor_id,
                timeout_ms,
                skip_send_only,
                ..
            }) => {
                assert_eq!(vendor_id.as_deref(), Some("0x1234"));
                assert_eq!(timeout_ms, Some(250));
                assert!(skip_send_only);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_args_parse_list_filters() {
        let args = Args::parse_from([
            "usb-session",
            "list",
            "-f",
            "0x04d8:*",
            "-f",
            "*:0x0001",
            "--json",
        ]);
        match args.command {
            Some(Command::List { filter, json }) => {
                assert_eq!(filter.len(), 2);
                assert!(json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
