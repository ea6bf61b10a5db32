//! runpane - launch a command and watch it finish
//!
//! runpane starts an executable, streams its stdout and stderr into a
//! styled scrollback on the hosting terminal, and closes itself a
//! configurable number of seconds after the command exits.
//!
//! # Quick Start
//!
//! ```text
//! runpane make -j8            # run, then close 15s after it finishes
//! runpane -t 3 ./deploy.sh    # close 3s after finish
//! runpane --wait cargo bench  # stay open until dismissed
//! ```
//!
//! # Keys
//!
//! | Key | Action |
//! |-----|--------|
//! | q / Esc / Ctrl+C | quit (kills the command if still running) |
//! | space | suspend/resume the command; cancel the countdown |
//! | h / m | minimize |

mod config;
mod core;
mod ui;

use std::env;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::config::Config;
use crate::core::controller::{ConsoleController, Phase};
use crate::core::process::{ProcessControl, ProcessSession};
use crate::ui::keymap;
use crate::ui::{ConsoleSurface, TerminalView};

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Parsed command line.
struct LaunchSpec {
    /// Target executable
    program: PathBuf,
    /// Arguments passed through verbatim
    args: Vec<String>,
    /// Countdown override; negative means wait for manual dismissal
    timeout_secs: Option<i64>,
    /// Force manual dismissal regardless of timeout
    wait_on_finish: bool,
}

fn print_version() {
    eprintln!("runpane {}", VERSION);
}

fn print_help() {
    eprintln!("runpane {} - launch a command and watch it finish", VERSION);
    eprintln!();
    eprintln!("Usage: runpane [OPTIONS] [--] PROGRAM [ARGS...]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -t, --timeout <SECS>  Close SECS seconds after the command exits");
    eprintln!("                        (negative: stay open until dismissed)");
    eprintln!("      --wait            Stay open until dismissed, ignoring the timeout");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Keys:");
    eprintln!("  q, Esc, Ctrl+C        Quit (kills the command if still running)");
    eprintln!("  space                 Suspend/resume the command, or cancel the");
    eprintln!("                        auto-close countdown once it finished");
    eprintln!("  h, m                  Minimize");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  runpane make -j8");
    eprintln!("  runpane -t 3 ./deploy.sh --prod");
    eprintln!("  runpane --wait cargo bench");
    eprintln!();
    eprintln!("Configuration: ~/.runpane/config.toml");
}

fn parse_args() -> Result<LaunchSpec, String> {
    let args: Vec<String> = env::args().collect();
    let mut timeout_secs = None;
    let mut wait_on_finish = false;
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                std::process::exit(0);
            }
            "-t" | "--timeout" => {
                i += 1;
                if i >= args.len() {
                    return Err("missing timeout argument".to_string());
                }
                let secs: i64 = args[i]
                    .parse()
                    .map_err(|_| format!("invalid timeout: {}", args[i]))?;
                timeout_secs = Some(secs);
            }
            "--wait" => {
                wait_on_finish = true;
            }
            "--" => {
                i += 1;
                break;
            }
            arg if arg.starts_with('-') => {
                return Err(format!("unknown argument: {}. Use -h for help.", arg));
            }
            _ => break,
        }
        i += 1;
    }

    if i >= args.len() {
        return Err("missing program to launch. Use -h for help.".to_string());
    }

    Ok(LaunchSpec {
        program: PathBuf::from(&args[i]),
        args: args[i + 1..].to_vec(),
        timeout_secs,
        wait_on_finish,
    })
}

fn init_logging() {
    let log_path = config::home_dir()
        .map(|h| h.join(".runpane").join("runpane.log"))
        .unwrap_or_else(|| PathBuf::from("runpane.log"));

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::INFO)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

fn main() -> anyhow::Result<()> {
    let spec = match parse_args() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    init_logging();
    info!("runpane starting...");

    // Merge config: command line overrides the file
    let mut config = Config::load();
    if let Some(secs) = spec.timeout_secs {
        config.timeout_secs = secs;
    }
    if spec.wait_on_finish {
        config.wait_on_finish = true;
    }

    let title = spec
        .program
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| spec.program.display().to_string());

    info!(
        "launching {} with args {:?} as {}",
        spec.program.display(),
        spec.args,
        title
    );

    let session = match ProcessSession::launch(&spec.program, &spec.args) {
        Ok(s) => s,
        Err(e) => {
            error!("launch failed: {}", e);
            eprintln!("Error: {}", e);
            return Err(e.into());
        }
    };

    let mut controller = ConsoleController::new(session, title, config.close_behavior());

    let mut view = TerminalView::new();
    view.init()?;

    let result = run_console_loop(&mut controller, &mut view);

    // Teardown is best-effort and must never stop the quit
    view.cleanup();

    match controller.exit_status() {
        Some(status) => info!("runpane exiting, child status {:?}", status),
        None => info!("runpane exiting, child was still running"),
    }

    result
}

/// Main event loop: session events, timer ticks and key input all funnel
/// through the controller; effects go to the view.
fn run_console_loop<P: ProcessControl>(
    controller: &mut ConsoleController<P>,
    view: &mut TerminalView,
) -> anyhow::Result<()> {
    let poll_timeout = Duration::from_millis(10);

    view.apply(&controller.startup_effects())?;

    loop {
        let effects = controller.pump(Instant::now());
        view.apply(&effects)?;

        if controller.phase() == Phase::Closing {
            break;
        }

        // Poll keeps the loop responsive without spinning; the countdown
        // advances on the next pump, never via a blocking sleep
        if event::poll(poll_timeout)? {
            match event::read()? {
                Event::Key(key) => {
                    if let Some(command) =
                        keymap::map_key(key, controller.phase(), controller.is_suspended())
                    {
                        let effects = controller.handle_command(command);
                        view.apply(&effects)?;

                        if controller.phase() == Phase::Closing {
                            break;
                        }
                    }
                }
                // Scrollback view: nothing to reflow on resize
                _ => {}
            }
        }
    }

    Ok(())
}
