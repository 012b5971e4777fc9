//! usb-topology service binary
//!
//! Prints the current USB topology tree (virtual root hub, devices,
//! configurations, interfaces) and can stay resident to log hot-plug events
//! as devices come and go.

use anyhow::{Context, Result};
use clap::Parser;
use common::setup_logging;
use std::sync::Arc;
use tokio::signal;
use topology::config::ServiceConfig;
use topology::{LibusbBackend, TopologyListener, UsbDevice, UsbServices};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "usb-topology")]
#[command(
    author,
    version,
    about = "USB topology service - hierarchical view of attached USB devices"
)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<std::path::PathBuf>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// Keep running and log hot-plug events until interrupted
    #[arg(long)]
    watch: bool,

    /// Override the scan interval in milliseconds
    #[arg(long, value_name = "MS")]
    interval_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,
}

/// Logs attach/detach events in watch mode
struct WatchListener;

impl TopologyListener for WatchListener {
    fn device_attached(&self, device: &Arc<UsbDevice>) {
        info!(
            "attached: {}  {:04x}:{:04x}",
            device.id(),
            device.vendor_id(),
            device.product_id()
        );
    }

    fn device_detached(&self, device: &Arc<UsbDevice>) {
        info!(
            "detached: {}  {:04x}:{:04x}",
            device.id(),
            device.vendor_id(),
            device.product_id()
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.save_config {
        let config = ServiceConfig::default();
        let path = ServiceConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let mut config = if let Some(ref path) = args.config {
        ServiceConfig::load(Some(path.clone())).context("Failed to load configuration")?
    } else {
        ServiceConfig::load_or_default()
    };
    if let Some(interval) = args.interval_ms {
        config.scan.interval_ms = interval;
    }
    config.validate().context("Invalid configuration")?;

    let log_level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.service.log_level);
    setup_logging(log_level).context("Failed to setup logging")?;

    info!("usb-topology v{}", env!("CARGO_PKG_VERSION"));

    let backend =
        Arc::new(LibusbBackend::new(&config.usb).context("Failed to initialize USB backend")?);
    let services = UsbServices::new(backend, &config);

    print_tree(&services);

    if args.watch {
        let listener: Arc<dyn TopologyListener> = Arc::new(WatchListener);
        services.add_listener(listener.clone());
        info!("watching for hot-plug events, press Ctrl-C to stop");

        signal::ctrl_c()
            .await
            .context("Failed to listen for shutdown signal")?;

        services.remove_listener(&listener);
    }

    services.shutdown();
    Ok(())
}

fn print_tree(services: &UsbServices) {
    let root = services.root_hub();
    let devices = root.devices();

    println!("{} ({} devices)", root.description(), devices.len());
    for device in devices {
        let product = device.product().ok().flatten().unwrap_or_default();
        println!(
            "  {}  {:04x}:{:04x}  {}",
            device.id(),
            device.vendor_id(),
            device.product_id(),
            product
        );
        for config in device.configurations() {
            let marker = if config.is_active().unwrap_or(false) {
                " (active)"
            } else {
                ""
            };
            println!("    configuration {}{}", config.value(), marker);
            for interface in config.interfaces() {
                let settings = config.setting_count(interface.number());
                if settings > 1 {
                    println!(
                        "      interface {} alt {} ({} settings)",
                        interface.number(),
                        interface.alternate_setting(),
                        settings
                    );
                } else {
                    println!("      interface {}", interface.number());
                }
            }
        }
    }
}
