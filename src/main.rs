use clap::Parser;
use sparkyd::config::schema::AppConfig;
use sparkyd::media::resize::ResizePipeline;
use sparkyd::media::{self, ExtensionFilter, ScanOutcome};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Headless GIF kiosk daemon for Raspberry Pi
#[derive(Parser)]
#[command(name = "sparkyd", version, about)]
struct Cli {
    /// Path to the config file (TOML).
    #[arg(short, long, default_value = "/etc/sparkyd/config.toml")]
    config: PathBuf,

    /// Enable JSON log output (for journald).
    #[arg(long)]
    json: bool,

    /// Validate config, scan the media directory and exit.
    #[arg(long)]
    check: bool,

    /// Resize every media file to the screen size once and exit.
    #[arg(long, conflicts_with = "check")]
    resize_only: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sparkyd=info"));

    if cli.json {
        fmt().with_env_filter(filter).json().init();
    } else {
        fmt().with_env_filter(filter).init();
    }

    info!("sparkyd v{}", env!("CARGO_PKG_VERSION"));

    let config_path = cli
        .config
        .canonicalize()
        .unwrap_or_else(|_| cli.config.clone());
    let config = sparkyd::config::load(&config_path)?;

    if cli.check {
        let outcome = scan(&config)?;
        println!(
            "config OK: {:?} mode, {} media files in {}",
            config.kiosk.mode,
            outcome.media().map_or(0, media::MediaSet::len),
            config.kiosk.media_dir.display(),
        );
        return Ok(());
    }

    if cli.resize_only {
        let ScanOutcome::Loaded(set) = scan(&config)? else {
            println!("nothing to resize in {}", config.kiosk.media_dir.display());
            return Ok(());
        };
        let target = sparkyd::daemon::resize_target(&config.display);
        let report = ResizePipeline::new(target, config.resize.workers)
            .run(set.to_vec())
            .await;
        for (path, outcome) in &report.items {
            println!("{:?}\t{}", outcome, path.display());
        }
        anyhow::ensure!(report.is_clean(), "some files could not be resized");
        return Ok(());
    }

    sparkyd::daemon::run(config).await?;

    Ok(())
}

fn scan(config: &AppConfig) -> anyhow::Result<ScanOutcome> {
    let filter = ExtensionFilter::new(&config.kiosk.extensions);
    Ok(media::scan(&config.kiosk.media_dir, &filter)?)
}
