use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, mpsc};

use clap::Parser;
#[cfg(feature = "gpio")]
use inkpanel_core::GpioInputs;
use inkpanel_core::{
    DeviceConfig, DisplayManager, InputListener, JsonConfig, PanelController,
    QueuedRefreshTrigger,
};
use log::{error, info, warn};

const CONFIG_FILE: &str = "config/device.json";
const DEV_CONFIG_FILE: &str = "config/device_dev.json";
const PORT: u16 = 80;
const DEV_PORT: u16 = 8080;

#[derive(Parser)]
#[command(name = "inkpanel")]
#[command(about = "E-paper display service", long_about = None)]
#[command(version)]
struct Cli {
    /// Use the development configuration and port
    #[arg(long)]
    dev: bool,
    /// Configuration file, overriding the one selected by --dev
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let (default_config, port) = if cli.dev {
        info!("development mode");
        (DEV_CONFIG_FILE, DEV_PORT)
    } else {
        (CONFIG_FILE, PORT)
    };
    let path = cli.config.unwrap_or_else(|| PathBuf::from(default_config));

    info!("loading configuration from {}", path.display());
    let config = Arc::new(JsonConfig::load(&path)?);
    let manager = Arc::new(DisplayManager::new(config.clone())?);
    let (width, height) = manager.resolution();
    info!(
        "{} display ready at {}x{}, caching to {}",
        manager.get_state().driver,
        width,
        height,
        config.current_image_file().display()
    );

    let (trigger, requests) = QueuedRefreshTrigger::channel();
    let listener = Arc::new(InputListener::new(
        manager.clone(),
        config.clone(),
        Arc::new(trigger),
    ));

    // Held for the life of the process so the listener never sees a closed channel.
    let (events, rx) = mpsc::channel();
    #[cfg(feature = "gpio")]
    match GpioInputs::from_config(config.as_ref()).spawn(events.clone()) {
        Ok(watchers) => info!("{} input watcher(s) running", watchers.len()),
        Err(e) => warn!("physical inputs unavailable: {}", e),
    }
    let _listener = listener.spawn(rx)?;

    info!("serving on port {}", port);
    for request in requests {
        info!("manual refresh requested for {}", request.source);
        // Pick up settings edited since the last refresh.
        if let Err(e) = config.reload() {
            warn!("could not reload configuration: {}", e);
        }
    }

    drop(events);
    Ok(())
}
