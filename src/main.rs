//! # wayshim
//!
//! Opens one window on the running Wayland compositor and keeps it painted
//! until the compositor closes it or the process receives SIGINT.

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use wayshim::logging::{self, LogLevel};
use wayshim::present::Rgba;
use wayshim::{BackendKind, Session, ShimConfig, ShimError, Window};

#[derive(Parser)]
#[command(name = "wayshim")]
#[command(about = "Open a Wayland window and keep it presented")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "~/.config/wayshim/wayshim.toml")]
    config: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Log level (trace, debug, info, warn, error); RUST_LOG still wins
    #[arg(long, value_parser = parse_log_level)]
    log_level: Option<LogLevel>,

    /// Presentation backend, overrides the configuration file
    #[arg(long, value_enum)]
    backend: Option<BackendKind>,

    /// Initial window width
    #[arg(long)]
    width: Option<i32>,

    /// Initial window height
    #[arg(long)]
    height: Option<i32>,

    /// Window title
    #[arg(long)]
    title: Option<String>,
}

impl Cli {
    fn apply_overrides(&self, config: &mut ShimConfig) {
        if let Some(backend) = self.backend {
            config.presentation.backend = backend;
        }
        if let Some(width) = self.width {
            config.window.width = width;
        }
        if let Some(height) = self.height {
            config.window.height = height;
        }
        if let Some(title) = &self.title {
            config.window.title = title.clone();
        }
        if self.debug {
            config.general.debug = true;
        }
        if let Some(level) = self.log_level {
            config.general.log_level = Some(level.as_str().to_string());
        }
    }

    /// Command line first, then whatever the configuration file asks for
    fn log_level(&self, config: Option<&ShimConfig>) -> LogLevel {
        match (self.log_level, self.debug) {
            (Some(level), _) => level,
            (None, true) => LogLevel::Debug,
            (None, false) => config.map_or(LogLevel::Info, |c| c.general.log_level()),
        }
    }
}

fn parse_log_level(name: &str) -> Result<LogLevel, String> {
    LogLevel::from_str(name).ok_or_else(|| format!("unknown log level '{}'", name))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = ShimConfig::load(&cli.config);
    let level = cli.log_level(loaded.as_ref().ok());
    logging::init(level);

    info!("🚀 Starting wayshim {}", wayshim::VERSION);
    info!("📄 Log level: {}", level.as_str());
    info!(
        "📄 Built {} for {} ({})",
        option_env!("BUILD_DATE").unwrap_or("unknown date"),
        option_env!("TARGET_TRIPLE").unwrap_or("unknown target"),
        option_env!("GIT_COMMIT").unwrap_or("no git commit"),
    );

    let mut config = match loaded {
        Ok(config) => {
            info!("✅ Configuration loaded from: {}", cli.config);
            config
        }
        Err(e) => {
            warn!("⚠️ Failed to load configuration: {:#}", e);
            info!("📝 Using default configuration");
            ShimConfig::default()
        }
    };
    cli.apply_overrides(&mut config);

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("❌ {:#}", e);
            ExitCode::from(exit_code_for(&e))
        }
    }
}

fn exit_code_for(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<ShimError>()
        .map_or(1, ShimError::exit_code)
}

fn run(config: &ShimConfig) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = running.clone();
    ctrlc::set_handler(move || handler_flag.store(false, Ordering::SeqCst))
        .context("Failed to install Ctrl-C handler")?;

    let mut session = Session::connect()?;
    session.discover_globals()?;
    let mut window = Window::new(&mut session, config)?;
    window.set_clear_color(Rgba::opaque(32, 32, 48));

    let frame_budget = frame_budget(config.general.max_fps);
    let mut frames: u64 = 0;

    while running.load(Ordering::SeqCst) && window.is_open() {
        let started = Instant::now();

        window.poll(&mut session)?;
        if !window.is_open() {
            break;
        }

        if let Some(mut frame) = window.framebuffer() {
            let geometry = frame.geometry();
            let (width, height) = (geometry.width as usize, geometry.height as usize);
            frame.paint(|x, y| gradient(x, y, width, height));
        }
        window.present()?;
        session.flush()?;
        frames += 1;

        if let Some(budget) = frame_budget {
            if let Some(rest) = budget.checked_sub(started.elapsed()) {
                std::thread::sleep(rest);
            }
        }
    }

    if window.is_open() {
        info!("🛑 Interrupted after {} frames", frames);
    } else {
        info!("👋 Window closed by compositor after {} frames", frames);
    }
    Ok(())
}

fn frame_budget(max_fps: u32) -> Option<Duration> {
    (max_fps > 0).then(|| Duration::from_nanos(1_000_000_000 / u64::from(max_fps)))
}

/// Red follows x, green follows y
fn gradient(x: usize, y: usize, width: usize, height: usize) -> Rgba {
    let red = (x * 255 / width.max(1)) as u8;
    let green = (y * 255 / height.max(1)) as u8;
    Rgba::opaque(red, green, 0)
}
