//! # timepix_tracks_cli
//!
//! Part of the timepix_tracks crate family.
//!
//! Command line application to cluster Pixelman acquisitions and measure particle tracks.
//!
//! ## Use
//!
//! Make a template configuration with
//!
//! ```bash
//! timepix_tracks_cli -p config.yml new
//! ```
//!
//! edit it, then run with
//!
//! ```bash
//! timepix_tracks_cli -p config.yml
//! ```
//!
//! Acquisitions are divided amongst `n_threads` workers, each with its own progress bar.
//! Library output goes to `timepix_tracks.log` in the output directory.
use clap::{Arg, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};

use libtimepix_tracks::config::Config;
use libtimepix_tracks::process::{create_subsets, process_subset};
use libtimepix_tracks::worker_status::{BarColor, WorkerStatus};

const LOG_FILE_NAME: &str = "timepix_tracks.log";

fn make_template_config(path: &Path) {
    if let Err(e) = Config::default().write_config_file(path) {
        log::error!("Could not write template config: {e}");
    }
}

/// Route the library's spdlog output to a file in the output directory
fn setup_file_log(output_path: &Path) -> Result<(), spdlog::Error> {
    let file_sink = Arc::new(
        spdlog::sink::FileSink::builder()
            .path(output_path.join(LOG_FILE_NAME))
            .formatter(Box::new(spdlog::formatter::PatternFormatter::new(
                spdlog::formatter::pattern!(
                    "[{date_short} {time_short}] - [thread: {tid}] - [{^{level}}] - {payload}{eol}"
                ),
            )))
            .truncate(true)
            .build()?,
    );
    let logger = Arc::new(
        spdlog::Logger::builder()
            .flush_level_filter(spdlog::LevelFilter::All)
            .sink(file_sink)
            .build()?,
    );
    spdlog::set_default_logger(logger);
    Ok(())
}

fn bar_style(color: &BarColor) -> ProgressStyle {
    let template = match color {
        BarColor::CYAN => "{prefix} [{bar:40.cyan/blue}] {percent}% {msg}",
        BarColor::GREEN => "{prefix} [{bar:40.green/blue}] {percent}% {msg}",
    };
    ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_bar())
}

fn main() {
    // Create a cli
    let matches = Command::new("timepix_tracks_cli")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .required(true)
                .help("Path to the configuration file"),
        )
        .get_matches();

    // Initialize feedback
    let logger = simplelog::TermLogger::new(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );

    let pb_manager = MultiProgress::new();

    if let Err(e) = LogWrapper::new(pb_manager.clone(), logger).try_init() {
        eprintln!("Could not create logging/progress: {e}");
        return;
    }

    // Parse the cli
    let config_path = match matches.get_one::<String>("path") {
        Some(p) => PathBuf::from(p),
        None => {
            log::error!("A configuration path is required");
            return;
        }
    };

    if let Some(("new", _)) = matches.subcommand() {
        log::info!(
            "Making a template config at {}...",
            config_path.to_string_lossy()
        );
        make_template_config(&config_path);
        log::info!("Done.");
        return;
    }

    // Load our config
    log::info!("Loading config from {}...", config_path.to_string_lossy());
    let config = match Config::read_config_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };
    log::info!("Config successfully loaded.");
    log::info!("Acquisitions: {}", config.acquisitions.len());
    log::info!("Output Path: {}", config.output_path.to_string_lossy());
    log::info!("Description Suffix: {}", config.description_suffix);
    log::info!("Calibrated: {}", config.has_calibration());
    log::info!("Malformed Frames: {:?}", config.malformed_frame_policy);
    log::info!("Number of Workers: {}", config.n_threads);

    if !config.is_n_threads_valid() {
        log::error!("Number of workers must be at least 1!");
        return;
    }
    if !config.output_path.exists() {
        log::error!(
            "Output directory {} does not exist!",
            config.output_path.to_string_lossy()
        );
        return;
    }
    if let Err(e) = setup_file_log(&config.output_path) {
        log::error!("Could not create the log file: {e}");
        return;
    }
    spdlog::info!("Starting timepix_tracks");

    // The calibration is loaded once and shared by all workers
    let calibration = match config.load_calibration() {
        Ok(c) => c.map(Arc::new),
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };

    // Spawn the workers!
    let (tx, rx) = mpsc::channel::<WorkerStatus>();
    let mut workers = vec![];
    let mut bars = HashMap::new();
    for (idx, subset) in create_subsets(&config).into_iter().enumerate() {
        // Dont make empty workers
        if subset.is_empty() {
            continue;
        }
        let pb = pb_manager.add(ProgressBar::new(100));
        pb.set_style(bar_style(&BarColor::default()));
        pb.set_prefix(format!("Worker {idx}"));
        bars.insert(idx, pb);

        let conf = config.clone();
        let worker_tx = tx.clone();
        let calib = calibration.clone();
        workers.push(std::thread::spawn(move || {
            process_subset(conf, worker_tx, idx, subset, calib)
        }));
    }
    // Only the workers hold senders now
    drop(tx);

    // Poll for progress until every worker hangs up
    for status in rx.iter() {
        if let Some(pb) = bars.get(&status.worker_id) {
            pb.set_style(bar_style(&status.color));
            pb.set_message(status.acquisition.clone());
            pb.set_position((status.progress * 100.0) as u64);
        }
    }

    let mut is_ok = true;
    for worker in workers {
        match worker.join() {
            Ok(Ok(_)) => spdlog::info!("Worker complete"),
            Ok(Err(e)) => {
                is_ok = false;
                log::error!("Processing failed with error: {e}");
                spdlog::error!("Processor error: {e}");
            }
            Err(_) => {
                is_ok = false;
                log::error!("Failed to join a processing task!");
            }
        }
    }

    for pb in bars.values() {
        pb.finish();
    }

    if is_ok {
        log::info!("Successfully processed all acquisitions!");
    } else {
        log::warn!(
            "There were errors! Check {} for more information.",
            config.output_path.join(LOG_FILE_NAME).to_string_lossy()
        );
    }
    log::info!("Done.");
}
