// Wireless driver reload daemon

use anyhow::{Context, Result};
use clap::Parser;
use iwup::{
    bus::BusSession,
    config::{load_config, resolve_settings},
    error::{FatalError, EXIT_FATAL, EXIT_OK},
    executor::SystemExecutor,
    reactor::{shutdown_signal, Reactor, ShutdownSignal},
    types::{Config, GeneralConfig, InterruptPolicy, Settings},
};
use nix::unistd::Uid;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "iwup", version)]
#[command(
    about = "Reload a wireless driver module when wpa_supplicant reports a de-authentication",
    long_about = None
)]
struct Args {
    /// Network interface to monitor [default: wlan0]
    #[arg(short, long)]
    interface: Option<String>,

    /// Kernel module to remove and re-insert [default: ath6kl_sdio]
    #[arg(short, long)]
    module: Option<String>,

    /// Path to an optional configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seconds an external command may run before it is killed [default: 30]
    #[arg(long)]
    command_timeout: Option<u64>,

    /// What to do with a reload in progress when SIGINT/SIGTERM arrives [default: finish]
    #[arg(long, value_enum)]
    on_interrupt: Option<InterruptPolicy>,

    /// Log filter, overridden by RUST_LOG [default: info]
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn overrides(&self) -> GeneralConfig {
        GeneralConfig {
            interface: self.interface.clone(),
            module: self.module.clone(),
            command_timeout: self.command_timeout,
            on_interrupt: self.on_interrupt,
            log_level: self.log_level.clone(),
        }
    }
}

fn load_settings(args: &Args) -> Result<Settings> {
    let file = match &args.config {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => Config::default(),
    };

    resolve_settings(file, args.overrides())
}

fn check_privileges() -> Result<(), FatalError> {
    if Uid::effective().is_root() {
        Ok(())
    } else {
        Err(FatalError::NotPrivileged)
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let settings = match load_settings(&args) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::from(EXIT_FATAL);
        }
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&settings.log_level))
        .init();

    // One thread: signals are handled strictly one after another
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .thread_name("iwup")
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("Failed to build runtime: {}", e);
            return ExitCode::from(EXIT_FATAL);
        }
    };

    match runtime.block_on(async_main(settings)) {
        Ok(signal) => {
            log::info!("Shutting down ({})", signal);
            ExitCode::from(EXIT_OK)
        }
        Err(e) => {
            log::error!("{}", e);
            log::error!("Bailing out");
            ExitCode::from(e.exit_code())
        }
    }
}

async fn async_main(settings: Settings) -> Result<ShutdownSignal, FatalError> {
    check_privileges()?;

    log::info!("Starting iwup v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Interface: {}", settings.interface);
    log::info!("Kernel module: {}", settings.module);
    log::info!(
        "Command timeout: {}s, on interrupt: {}",
        settings.command_timeout.as_secs(),
        settings.on_interrupt
    );

    let shutdown = shutdown_signal()?;

    let bus = BusSession::system()
        .await
        .map_err(FatalError::MissingBusDependency)?;
    let executor = SystemExecutor::new(settings.command_timeout);

    let reactor = Reactor::start(bus, executor, &settings).await?;
    reactor.run(shutdown).await
}
