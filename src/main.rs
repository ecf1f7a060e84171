//! menush - a menu-driven shell front end
//!
//! The screen is split in three: a live console showing an interactive shell
//! running on a pseudo-terminal, a one-line command strip, and a menu of
//! canned commands.
//!
//! # Quick Start
//!
//! ```text
//! menush                 # Start with $SHELL (or /bin/bash)
//! menush -s /bin/zsh     # Start with another shell
//! menush -c menu.toml    # Use another config file
//! ```
//!
//! # Keys
//!
//! | Mode | Key | Action |
//! |------|-----|--------|
//! | Menu | Arrows | Move the selection; its command is typed into the shell |
//! | Menu | Enter | Run the selected command |
//! | Menu | Shortcut letter | Select the item |
//! | Menu | Ctrl+shortcut | Run the item |
//! | Menu | Esc | Switch to the console |
//! | Console | Esc | Back to the menu |
//! | Console | Ctrl+L | Clear the console view |

mod app;
mod config;
mod core;
mod ui;

use std::env;
use std::path::PathBuf;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app::App;
use crate::config::Config;
use crate::ui::renderer::Renderer;

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable overriding the log filter
const LOG_ENV: &str = "MENUSH_LOG";

/// Command line options
#[derive(Debug, Default)]
struct Options {
    /// Shell command, overriding the config file
    shell: Option<String>,
    /// Config file path
    config: Option<PathBuf>,
}

fn print_version() {
    eprintln!("menush {}", VERSION);
}

fn print_help() {
    eprintln!("menush {} - A menu-driven shell front end", VERSION);
    eprintln!();
    eprintln!("Usage: menush [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -s, --shell <CMD>     Shell to run (default: from config.toml, $SHELL or /bin/bash)");
    eprintln!("  -c, --config <PATH>   Config file (default: ~/.menush/config.toml)");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Menu mode:");
    eprintln!("  ↑/↓/←/→               Move the selection (previewed in the shell)");
    eprintln!("  Enter                 Run the selected command");
    eprintln!("  <letter>              Select the item with that shortcut");
    eprintln!("  Ctrl+<letter>         Run the item with that shortcut");
    eprintln!("  Esc                   Switch to console mode");
    eprintln!();
    eprintln!("Console mode:");
    eprintln!("  Esc                   Back to menu mode");
    eprintln!("  Ctrl+L                Clear the console view");
    eprintln!("  (other keys)          Sent to the shell");
    eprintln!();
    eprintln!("Log: ~/.menush/menush.log (filter with {}=debug)", LOG_ENV);
}

fn parse_args() -> Result<Options, String> {
    let args: Vec<String> = env::args().collect();
    let mut options = Options::default();
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
            "-s" | "--shell" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing shell argument".to_string());
                }
                options.shell = Some(args[i].clone());
            }
            "-c" | "--config" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing config path".to_string());
                }
                options.config = Some(PathBuf::from(&args[i]));
            }
            arg => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
        }
        i += 1;
    }

    Ok(options)
}

/// Log to `~/.menush/menush.log`; the terminal itself belongs to the UI.
fn init_logging(default_level: &str) {
    let log_path = config::config_dir()
        .map(|dir| dir.join("menush.log"))
        .unwrap_or_else(|| PathBuf::from("menush.log"));

    // Create log directory if needed
    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let filter = EnvFilter::try_from_env(LOG_ENV)
            .or_else(|_| EnvFilter::try_new(default_level))
            .unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .try_init();
    }
}

fn main() -> anyhow::Result<()> {
    let options = match parse_args() {
        Ok(o) => o,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    let (mut config, config_problem) = Config::load(options.config.as_deref());
    init_logging(&config.log_level);
    if let Some(problem) = config_problem {
        warn!("{}; using defaults", problem);
    }

    // Command line overrides the config file
    if let Some(shell) = options.shell {
        config.shell = shell;
    }

    info!("menush {} starting", VERSION);
    info!("Shell: {} {:?} (TERM={})", config.shell, config.shell_args, config.term);

    let mut renderer = Renderer::new();
    renderer.init().context("failed to initialise the terminal")?;

    let mut app = match App::new(renderer, &config) {
        Ok(app) => app,
        Err(e) => {
            error!("Setup failed: {:#}", e);
            return Err(e);
        }
    };

    let result = app.run();
    let code = app.close();
    info!("Shell exit code: {:?}", code);

    if let Err(e) = &result {
        error!("Main loop failed: {:#}", e);
    }
    result
}
