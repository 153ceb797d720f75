use anyhow::Context as _;
use display_info::DisplayInfo;
use std::io::BufRead;
use std::sync::Arc;
use sysinfo::System;

use hudwatch::capture::ScreenCapture;
use hudwatch::config::Config;
use hudwatch::detect::{Context, Runtime};
use hudwatch::error::AppResult;
use hudwatch::matcher::{NccCorrelator, TemplateLibrary, TemplateMatcher};
use hudwatch::messaging::{EventBus, HudEvent};

const LOG_TARGET_STARTUP: &str = "hudwatch::startup";

/// Initialize tracing with file rotation
///
/// Logs are written to `<config dir>/hudwatch/logs/`, one file per day
/// (`hudwatch.YYYY-MM-DD.log`). Debug builds also log to the console.
fn initialize_tracing() {
    use tracing_appender::rolling;
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let log_dir = Config::logs_dir();
    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Failed to create log directory: {}", e);
    }

    let file_appender = rolling::daily(&log_dir, "hudwatch.log");

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(true)
        .with_thread_names(true)
        .with_line_number(true);

    #[cfg(debug_assertions)]
    {
        let console_layer = fmt::layer()
            .with_writer(std::io::stdout)
            .with_ansi(true)
            .with_target(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(console_layer)
            .init();
    }

    #[cfg(not(debug_assertions))]
    {
        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();
    }

    tracing::info!("Log directory: {}", log_dir.display());
}

fn log_runtime_environment() {
    let os_name = System::long_os_version()
        .or_else(System::name)
        .unwrap_or_else(|| "Unknown OS".to_string());
    let kernel = System::kernel_version().unwrap_or_else(|| "Unknown Kernel".to_string());

    tracing::info!(
        target: LOG_TARGET_STARTUP,
        "Starting hudwatch v{} on ({})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::ARCH
    );
    tracing::info!(target: LOG_TARGET_STARTUP, "Operating System: {} (kernel {})", os_name, kernel);

    if let Ok(displays) = DisplayInfo::all() {
        tracing::info!(target: LOG_TARGET_STARTUP, "Displays: {} detected", displays.len());
        for (index, disp) in displays.iter().enumerate() {
            tracing::debug!(
                target: LOG_TARGET_STARTUP,
                "  Display {}: {}x{}{}",
                index,
                disp.width,
                disp.height,
                if disp.is_primary { " (primary)" } else { "" }
            );
        }
    }
}

/// Print feed lines and notifications as they arrive.
fn spawn_feed_printer(bus: &EventBus) -> AppResult<()> {
    let (rx, _id) = bus.subscribe();
    std::thread::Builder::new()
        .name("hudwatch-feed".into())
        .spawn(move || {
            while let Ok(event) = rx.recv() {
                match event {
                    HudEvent::Feed { message, .. } => println!("{}", message),
                    HudEvent::Desktop { title, body } => println!("** {}: {}", title, body),
                    HudEvent::Shutdown => break,
                    other => tracing::trace!("{:?}", other),
                }
            }
        })
        .context("Failed to spawn feed printer")?;
    Ok(())
}

fn print_help() {
    println!("Commands: pause | resume | log | history | quit");
}

fn main() -> AppResult<()> {
    initialize_tracing();
    log_runtime_environment();

    let config = Config::load().context("Failed to load configuration")?;

    let library = Arc::new(
        TemplateLibrary::load(&config.templates_dir).with_context(|| {
            format!("Failed to load templates from {}", config.templates_dir.display())
        })?,
    );
    tracing::info!("Loaded {} templates", library.len());

    let source = Arc::new(
        ScreenCapture::new(config.monitor_index).context("Failed to initialize screen capture")?,
    );
    let correlator = Arc::new(NccCorrelator);
    let classifier = Arc::new(TemplateMatcher::new(
        library.clone(),
        correlator.clone(),
        config.acceptance,
    ));

    let bus = EventBus::new();
    spawn_feed_printer(&bus)?;

    let (context, shutdown) = Context::new(config, source, classifier, library, correlator, bus);
    let runtime = Runtime::spawn(context, shutdown)?;

    print_help();
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("Failed to read command")?;
        let ctx = runtime.context();
        match line.trim() {
            "pause" => ctx.set_idle(true),
            "resume" => ctx.set_idle(false),
            "log" => {
                for line in ctx.log.dump() {
                    println!("{}", line);
                }
            }
            "history" => {
                for line in ctx.history.dump() {
                    println!("{}", line);
                }
            }
            "quit" | "exit" => break,
            "" => {}
            other => {
                println!("Unknown command: {}", other);
                print_help();
            }
        }
    }

    runtime.shutdown();
    Ok(())
}
