//! Audition samples from a directory (or a sample server) on the default output.
//!
//! ```text
//! cargo run --example audition -- --root ./kits kick.wav snare.wav
//! cargo run --example audition -- --server http://127.0.0.1:8000 12 13 12
//! ```

use clap::Parser;
use log::{info, warn};
use std::io::{self, Write};
use std::rc::Rc;
use std::time::Duration;

use sample_deck::{
    AudioContextManager, AudioHost, AudioLogger, ConfigManager, CpalHost, EngineConfig, EngineError,
    FileSampleFetcher, PlaybackController, SampleFetcher, SampleKey, SampleLoader,
};

#[derive(Parser)]
#[command(name = "audition")]
#[command(about = "Play samples one after another through the sample-deck engine")]
struct Args {
    /// Sample names (relative to --root) or numeric ids (with --server)
    #[arg(required_unless_present = "list_devices")]
    samples: Vec<String>,

    /// Directory the sample names are resolved against
    #[arg(long, default_value = ".")]
    root: std::path::PathBuf,

    /// Fetch from a sample server instead of the filesystem; numeric ids
    /// alone fall back to the configured `server_url`
    #[cfg(feature = "http")]
    #[arg(long)]
    server: Option<String>,

    /// Output device name
    #[arg(long)]
    device: Option<String>,

    /// Volume from 0.0 to 1.0 (defaults to the configured volume)
    #[arg(long)]
    volume: Option<f32>,

    /// Loop each sample for this many seconds
    #[arg(long = "loop", value_name = "SECONDS")]
    loop_secs: Option<f64>,

    /// Start each sample at this fraction of its length
    #[arg(long, default_value_t = 0.0)]
    seek: f64,

    #[arg(long)]
    list_devices: bool,
}

fn parse_key(raw: &str) -> SampleKey {
    match raw.parse::<i64>() {
        Ok(id) => SampleKey::Id(id),
        Err(_) => SampleKey::Name(raw.to_string()),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if std::env::var("SAMPLE_DECK_LOG_LEVEL").is_err() {
        std::env::set_var("SAMPLE_DECK_LOG_LEVEL", "warn");
    }
    if let Err(e) = AudioLogger::init() {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    let args = Args::parse();
    if let Err(e) = run(args).await {
        log::log!(e.severity().log_level(), "Audition aborted: {}", e);
        eprintln!("Error: {}", e.user_message());
        for suggestion in e.recovery_suggestions() {
            eprintln!("  - {}", suggestion);
        }
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), EngineError> {
    let config = match ConfigManager::new() {
        Ok(manager) => manager.get_config().clone(),
        Err(e) => {
            warn!("Using default configuration: {}", e);
            EngineConfig::default()
        }
    };

    let device = args.device.as_deref().or(config.preferred_device.as_deref());
    let host = CpalHost::new(device)?;

    if args.list_devices {
        for name in host.list_devices()? {
            let marker = if name == host.device_name() { "*" } else { " " };
            println!("{} {}", marker, name);
        }
        return Ok(());
    }

    let host: Rc<dyn AudioHost> = Rc::new(host);
    let manager = Rc::new(AudioContextManager::new(host));
    let logger = AudioLogger::new();
    let mut controller = PlaybackController::new(Rc::clone(&manager), logger.clone());
    controller.set_volume(args.volume.unwrap_or(config.default_volume));

    let keys: Vec<SampleKey> = args.samples.iter().map(|s| parse_key(s)).collect();

    #[cfg(feature = "http")]
    if let Some(server) = config.sample_server(args.server.as_deref(), &keys) {
        info!("Fetching samples from {}", server);
        let fetcher = sample_deck::HttpSampleFetcher::new(server)?;
        let mut loader = SampleLoader::new(fetcher, config.cache_max_bytes);
        return audition(&mut controller, &mut loader, &keys, &args, &config, &logger).await;
    }

    let mut loader = SampleLoader::new(FileSampleFetcher::new(&args.root), config.cache_max_bytes);
    audition(&mut controller, &mut loader, &keys, &args, &config, &logger).await
}

async fn audition<F: SampleFetcher>(
    controller: &mut PlaybackController,
    loader: &mut SampleLoader<F>,
    keys: &[SampleKey],
    args: &Args,
    config: &EngineConfig,
    logger: &AudioLogger,
) -> Result<(), EngineError> {
    for key in keys {
        if let Err(e) = controller.load_sample(loader, key.clone()).await {
            eprintln!("Skipping {}: {}", key, e.user_message());
            continue;
        }

        if controller.is_looping() != args.loop_secs.is_some() {
            controller.toggle_loop();
        }
        if args.seek > 0.0 {
            controller.seek(args.seek)?;
        }

        println!("▶ {} ({:.2}s)", key, controller.duration());
        controller.play()?;

        let frames = controller.run_frame_loop(config.frame_interval(), |update| {
            print!("\r  {:>6.2}s / {:.2}s", update.position_secs(), update.duration);
            let _ = io::stdout().flush();
        });

        match args.loop_secs {
            Some(secs) => {
                // A looping sample never ends on its own
                let _ = tokio::time::timeout(Duration::from_secs_f64(secs.max(0.0).min(86_400.0)), frames).await;
                controller.stop()?;
            }
            None => frames.await,
        }
        println!();
    }

    let stats = logger.get_event_statistics();
    info!(
        "Auditioned {} samples, cache hit ratio {:.0}%",
        keys.len(),
        stats.cache_hit_ratio() * 100.0
    );
    println!("{}", loader.cache_stats().format_stats());
    Ok(())
}
