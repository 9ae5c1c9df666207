//! inputcal – touchscreen calibration and region routing.
//!
//! CLI entry point.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;
use std::sync::atomic::Ordering;
use std::time::SystemTime;

use clap::Parser;
use log::{Level, LevelFilter, Log, Metadata, Record};

use inputcal::manager::{CalibrationManager, list_input_devices};
use inputcal::settings::{Settings, parse_settings_file};

#[derive(Parser)]
#[command(name = "inputcal", about = "Touchscreen calibration and region routing")]
struct Cli {
    /// Path to the region configuration file
    #[arg(short = 'c', long = "input-configuration")]
    input_configuration: Option<PathBuf>,

    /// Path to the daemon settings file (TOML)
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// List routable input devices and exit
    #[arg(short, long)]
    list_devices: bool,
}

/// Simple logger that writes to stderr and optionally to a log file.
struct InputcalLogger {
    level: LevelFilter,
    file: Option<Mutex<std::fs::File>>,
}

impl Log for InputcalLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level && metadata.target().starts_with("inputcal")
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let secs = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let level = match record.level() {
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        };
        let line = format!("[{secs} {level} inputcal] {}\n", record.args());

        eprint!("{line}");

        if let Some(ref file_mutex) = self.file {
            if let Ok(mut f) = file_mutex.lock() {
                let _ = f.write_all(line.as_bytes());
            }
        }
    }

    fn flush(&self) {
        if let Some(ref file_mutex) = self.file {
            if let Ok(mut f) = file_mutex.lock() {
                let _ = f.flush();
            }
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.list_devices {
        return list_input_devices();
    }

    // Settings come first so the configured log level applies to config parsing.
    let settings = match cli.settings.as_deref().map(parse_settings_file) {
        None => Settings::default(),
        Some(Ok(s)) => s,
        Some(Err(e)) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    // CLI --verbose overrides the settings file.
    let log_level: LevelFilter = if cli.verbose {
        LevelFilter::Debug
    } else {
        settings.log_level.parse().unwrap_or(LevelFilter::Info)
    };

    let log_file = settings.log_file.as_deref().and_then(|path| {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(Mutex::new(file)),
            Err(e) => {
                eprintln!("Warning: cannot open log file '{path}': {e}");
                None
            }
        }
    });

    let logger = InputcalLogger {
        level: log_level,
        file: log_file,
    };
    if log::set_boxed_logger(Box::new(logger)).is_ok() {
        log::set_max_level(log_level);
    }

    if let Some(path) = &cli.input_configuration {
        log::info!("Loading input configuration from: {}", path.display());
    }
    let mut manager = CalibrationManager::new(cli.input_configuration.as_deref(), settings);

    let running = manager.running_flag();
    if let Err(e) = ctrlc::set_handler(move || {
        running.store(false, Ordering::Relaxed);
    }) {
        log::error!("Cannot install signal handler: {e}");
        return ExitCode::FAILURE;
    }

    match manager.start() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
