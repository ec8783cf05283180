use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use boothcam::{
    BoothcamConfig, ConsoleShell, Coordinator, KeyboardInputHandler, NullCanvas,
};

#[derive(Parser, Debug)]
#[command(name = "boothcam")]
#[command(about = "Tethered camera controller with a serial-keyed accept/reject capture workflow")]
#[command(version)]
#[command(long_about = "Controls a tethered camera for studio booth operation: open a device \
session, stream live view, capture stills and video, and accept or reject each capture against \
a scanned serial number with per-shooting-day duplicate detection.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "boothcam.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without starting")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Also write logs to this file
    #[arg(long, value_name = "PATH", help = "Append logs to the given file")]
    log_file: Option<String>,

    /// Run without keyboard input (events come from the SDK only)
    #[arg(long, help = "Run without taking over the terminal for keyboard input")]
    headless: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        println!("# Boothcam configuration file");
        println!("# All values shown are the defaults");
        println!();
        println!("{}", BoothcamConfig::default().to_toml());
        return Ok(());
    }

    let _log_guard = init_logging(&args)?;

    info!("Starting boothcam v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match BoothcamConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if args.validate_config {
        println!("✓ Configuration is valid");
        return Ok(());
    }

    // A camera SDK that cannot come up at all is fatal: show the message
    // and end the process.
    let sdk = match boothcam::sdk::connect() {
        Ok(sdk) => sdk,
        Err(e) => {
            error!("Camera SDK unavailable: {}", e);
            eprintln!("Camera SDK unavailable: {}", e);
            std::process::exit(1);
        }
    };

    let shell = Arc::new(ConsoleShell::new());
    let canvas = Arc::new(NullCanvas);
    let cancel = CancellationToken::new();

    let (coordinator, commands) =
        Coordinator::new(sdk, shell, canvas, &config, cancel.clone());

    let keyboard = if args.headless {
        None
    } else {
        let handler = KeyboardInputHandler::new(commands.clone(), cancel.clone());
        handler.start().await?;
        Some(handler)
    };

    // Ctrl-C takes the same shutdown path as the quit key.
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, shutting down");
            ctrl_c_cancel.cancel();
        }
    });

    let result = coordinator.run().await;

    if let Some(keyboard) = keyboard {
        keyboard.stop().await?;
    }

    result?;
    info!("Boothcam exited cleanly");
    Ok(())
}

fn init_logging(args: &Args) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, fmt, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("boothcam={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer().with_target(true).boxed()
        }
    };

    let registry = tracing_subscriber::registry().with(fmt_layer).with(env_filter);

    // Optional non-blocking file sink alongside the console output.
    let guard = if let Some(path) = &args.log_file {
        let path = std::path::Path::new(path);
        let directory = path.parent().unwrap_or_else(|| std::path::Path::new("."));
        let filename = path
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_else(|| "boothcam.log".to_string());
        let appender = tracing_appender::rolling::never(directory, filename);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        registry
            .with(fmt::layer().with_ansi(false).with_writer(writer))
            .init();
        Some(guard)
    } else {
        registry.init();
        None
    };

    Ok(guard)
}
