//! udmx-artnet
//!
//! Art-Net to uDMX bridge. Receives DMX512 frames for one universe over
//! UDP and reproduces them on an attached Anyma uDMX interface (or clone)
//! using vendor control transfers.

mod artnet;
mod config;
mod usb;

use anyhow::{Context as _, Result};
use artnet::ArtNetNode;
use clap::Parser;
use common::{DmxCommand, create_dmx_bridge, setup_logging};
use config::BridgeConfig;
use rusb::UsbContext as _;
use std::path::PathBuf;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "udmx-artnet")]
#[command(author, version, about = "Art-Net to uDMX bridge")]
#[command(long_about = "
An Art-Net node that drives an Anyma uDMX USB interface. DMX512 frames
arriving for the configured universe are reproduced on the device through
vendor control transfers.

EXAMPLES:
    # Run with default config
    udmx-artnet

    # Run with custom config
    udmx-artnet --config ~/.config/udmx-artnet/bridge.toml

    # Listen on one interface only
    udmx-artnet -a 192.168.1.10

    # List attached USB devices and exit
    udmx-artnet --list-devices

    # Run with debug logging
    udmx-artnet --log-level debug

CONFIGURATION:
    The bridge looks for configuration files in the following order:
    1. Path specified with --config
    2. ~/.config/udmx-artnet/bridge.toml
    3. /etc/udmx-artnet/bridge.toml
    4. Built-in defaults
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<String>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// List USB devices and exit
    #[arg(long)]
    list_devices: bool,

    /// IP address to listen on (overrides the configured bind address)
    #[arg(short = 'a', long, value_name = "ADDR")]
    bind: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle --save-config flag early (before loading config)
    if args.save_config {
        let config = BridgeConfig::default();
        let path = BridgeConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    // Load configuration first (to get log level from config if not specified)
    let mut config = if let Some(ref path) = args.config {
        let path = PathBuf::from(shellexpand::tilde(path).as_ref());
        BridgeConfig::load(Some(path)).context("Failed to load configuration")?
    } else {
        BridgeConfig::load_or_default()
    };

    if let Some(bind) = args.bind {
        config.node.bind_addr = Some(bind);
        config.validate().context("Invalid configuration")?;
    }

    // Use CLI log level if specified, otherwise use config value
    let log_level = args.log_level.as_deref().unwrap_or(&config.node.log_level);

    setup_logging(log_level).context("Failed to setup logging")?;

    info!("udmx-artnet v{}", env!("CARGO_PKG_VERSION"));
    info!("Log level: {}", log_level);

    let usb_context = rusb::Context::new().context("Failed to initialize USB context")?;

    if args.list_devices {
        return list_devices_mode(&usb_context);
    }

    // Bind the device before anything else; without it there is nothing
    // to serve and the process must not pretend otherwise.
    let timeout = Duration::from_millis(config.usb.transfer_timeout_ms);
    let device = usb::find_device(&usb_context, &config.usb.identity(), timeout)
        .context("uDMX discovery failed")?;

    let (dmx_bridge, worker) = create_dmx_bridge();
    let worker_handle = usb::spawn_usb_worker(worker, device, config.dmx.channel_start)
        .context("Failed to spawn USB worker thread")?;

    let node = ArtNetNode::bind(&config.node, &config.dmx, dmx_bridge.clone())
        .await
        .context("Failed to start Art-Net node")?;

    info!("Press Ctrl+C to shutdown");

    tokio::select! {
        result = node.run() => {
            if let Err(e) = result {
                error!("Art-Net node failed: {:#}", e);
            }
        }
        result = signal::ctrl_c() => {
            match result {
                Ok(()) => info!("Received Ctrl+C, shutting down gracefully..."),
                Err(e) => error!("Error waiting for Ctrl+C: {}", e),
            }
        }
    }

    // Cleanup: the worker drops the device handle when its loop ends
    info!("Shutting down USB worker...");
    if let Err(e) = dmx_bridge.send_command(DmxCommand::Shutdown).await {
        error!("Error shutting down USB worker: {}", e);
    }
    if worker_handle.join().is_err() {
        error!("USB worker thread panicked");
    }

    info!("Shutdown complete");
    Ok(())
}

/// List USB devices and exit
fn list_devices_mode(context: &rusb::Context) -> Result<()> {
    let devices = usb::list_candidates(context).context("Failed to enumerate USB devices")?;

    if devices.is_empty() {
        println!("No USB devices found.");
        return Ok(());
    }

    println!("Found {} USB device(s):\n", devices.len());
    for device in devices {
        println!(
            "  {:04x}:{:04x} - {} {}",
            device.vendor_id,
            device.product_id,
            device
                .manufacturer
                .as_deref()
                .unwrap_or("Unknown Manufacturer"),
            device.product.as_deref().unwrap_or("Unknown Product")
        );
        println!("      Bus {:03} Device {:03}", device.bus_number, device.address);
        println!();
    }

    Ok(())
}
