use anyhow::Result;
use camflow::{
    CamflowConfig, CameraCoordinator, FrameRenderer, LogRenderer, MockBackend, MockBackendConfig,
    RenderSink, Size,
};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "camflow")]
#[command(about = "Camera session coordinator streaming sensor frames to a GPU renderer")]
#[command(version)]
#[command(long_about = "Opens a camera device, negotiates a capture session against a \
bounded frame buffer pool, and streams each produced frame to a GPU renderer exactly once. \
This binary runs the pipeline against the simulated backend.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "camflow.toml", help = "Path to TOML configuration file")]
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
    #[arg(long, help = "Validate configuration file and exit without starting the pipeline")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// How long to run before closing, in seconds (0 = until ctrl-c)
    #[arg(long, default_value_t = 0, help = "Run duration in seconds, 0 runs until ctrl-c")]
    run_seconds: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config();
        return Ok(());
    }

    init_logging(&args);

    info!("Starting camflow v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match CamflowConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                println!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }
    config.validate()?;

    let backend = Arc::new(MockBackend::new(MockBackendConfig {
        frame_interval: Duration::from_millis(config.runtime.frame_interval_ms),
        ..Default::default()
    }));
    let metrics = backend.metrics();

    let renderer = Arc::new(LogRenderer::new());
    let sink = Arc::new(RenderSink::new(renderer.clone()));

    let (hint_width, hint_height) = config.camera.display_hint;
    let display_hint = Size::new(hint_width, hint_height);

    let coordinator = CameraCoordinator::new(backend, config);

    let preview_renderer = Arc::clone(&renderer);
    coordinator
        .initialize(
            display_hint,
            move |geometry| {
                preview_renderer.surface_available(Size::new(geometry.width, geometry.height));
            },
            sink,
            None,
        )
        .await?;

    if args.run_seconds > 0 {
        info!("Capturing for {}s", args.run_seconds);
        tokio::time::sleep(Duration::from_secs(args.run_seconds)).await;
    } else {
        info!("Capturing until ctrl-c");
        tokio::signal::ctrl_c().await?;
    }

    coordinator.shutdown().await;

    use std::sync::atomic::Ordering;
    info!(
        "Done: {} frames produced, {} rendered, {} GPU buffers released",
        metrics.frames_produced.load(Ordering::SeqCst),
        renderer.frames_rendered(),
        metrics.gpu_buffers_released.load(Ordering::SeqCst)
    );

    Ok(())
}

fn init_logging(args: &Args) {
    let default_level = if args.debug {
        "camflow=debug"
    } else if args.verbose {
        "camflow=info"
    } else if args.quiet {
        "camflow=error"
    } else {
        "camflow=warn"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn print_default_config() {
    let config = CamflowConfig::default();
    match toml::to_string_pretty(&config) {
        Ok(toml) => println!("{}", toml),
        Err(e) => eprintln!("Failed to serialize default configuration: {}", e),
    }
}
