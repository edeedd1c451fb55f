use anyhow::{Context, Result};
use std::path::PathBuf;
use termsql::app_state::AppState;
use termsql::config::Config;
use termsql::ui::tui_app::TuiApp;
use termsql::utils::logging::init_tracing;
use termsql::utils::AppPaths;
use tracing::{error, info, warn};

fn print_help() {
    println!("termsql - browse and edit SQLite database files in the terminal");
    println!();
    println!("Usage: termsql [OPTIONS] <FILE>");
    println!();
    println!("Options:");
    println!("  --ascii            Plain rendering without colors");
    println!("  --generate-config  Write a commented config file and exit");
    println!("  -h, --help         Show this help");
    println!();
    println!("Press '?' inside the browser for key bindings.");
}

struct Args {
    ascii: bool,
    generate_config: bool,
    help: bool,
    file: Option<PathBuf>,
}

fn parse_args(args: &[String]) -> Result<Args> {
    let mut parsed = Args {
        ascii: false,
        generate_config: false,
        help: false,
        file: None,
    };
    for arg in args {
        match arg.as_str() {
            "--ascii" => parsed.ascii = true,
            "--generate-config" => parsed.generate_config = true,
            "-h" | "--help" => parsed.help = true,
            flag if flag.starts_with('-') => anyhow::bail!("Unknown option: {}", flag),
            file => {
                if parsed.file.is_some() {
                    anyhow::bail!("Only one database file can be opened");
                }
                parsed.file = Some(PathBuf::from(file));
            }
        }
    }
    Ok(parsed)
}

fn generate_config() -> Result<()> {
    let path = Config::get_config_path()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Error creating config directory {}", parent.display()))?;
    }
    std::fs::write(&path, Config::create_default_with_comments())
        .with_context(|| format!("Error writing config file {}", path.display()))?;
    println!("Configuration file created at: {}", path.display());
    Ok(())
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Err(e) = run(&args) {
        error!(target: "termsql", "{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: &[String]) -> Result<()> {
    let args = parse_args(args)?;
    if args.help {
        print_help();
        return Ok(());
    }
    if args.generate_config {
        return generate_config();
    }
    let Some(file) = args.file else {
        print_help();
        anyhow::bail!("No database file given");
    };

    let logging = init_tracing(&AppPaths::log_dir()?);
    eprintln!("Logs: {}", logging.log_path.display());

    let mut config = Config::load().unwrap_or_else(|e| {
        warn!(target: "config", "Using default configuration: {}", e);
        Config::default()
    });
    if args.ascii {
        config.display.ascii = true;
    }

    let temp_dir = AppPaths::temp_dir(&config)?;
    info!(target: "termsql", "Opening {}", file.display());
    let state = AppState::open(&file, config, &temp_dir)
        .with_context(|| format!("Cannot open {}", file.display()))?
        .with_log_buffer(logging.buffer);

    TuiApp::new(state).run()
}
