use anyhow::{Context, Result};
use clap::{Arg, Command};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{fs, io, path::PathBuf, sync::Arc, sync::Mutex};
use todo_term::{
    commands,
    config::{load_settings, Overrides, Settings},
    storage::ClientStorage,
    task::Filter,
    ui, Controller, HttpTaskApi, Timing,
};
use tokio::sync::mpsc::unbounded_channel;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("todo_term")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Terminal client for a remote to-do list service")
        .arg(
            Arg::new("api-url")
                .long("api-url")
                .global(true)
                .help("Base URL of the to-do API"),
        )
        .arg(
            Arg::new("storage")
                .long("storage")
                .global(true)
                .help("Path of the session storage file"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .help("Path of a TOML config file"),
        )
        .arg(
            Arg::new("log-file")
                .long("log-file")
                .global(true)
                .help("Where to write logs"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .global(true)
                .default_value("info")
                .help("Log filter used when RUST_LOG is unset"),
        )
        .subcommand(
            Command::new("list").about("Print tasks of the signed-in user").arg(
                Arg::new("filter")
                    .long("filter")
                    .value_parser(["all", "active", "completed"])
                    .default_value("all")
                    .help("Which tasks to show"),
            ),
        )
        .subcommand(
            Command::new("add")
                .about("Add a new task")
                .arg(Arg::new("text").required(true).help("Task text")),
        )
        .subcommand(Command::new("logout").about("Forget the stored session"))
        .subcommand(Command::new("theme").about("Toggle between light and dark theme"))
}

fn init_logging(settings: &Settings, level: &str) -> Result<()> {
    if let Some(parent) = settings.log_file.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&settings.log_file)
        .with_context(|| format!("failed to open log file {}", settings.log_file.display()))?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    let overrides = Overrides {
        config_path: matches.get_one::<String>("config").map(PathBuf::from),
        api_url: matches.get_one::<String>("api-url").cloned(),
        storage_path: matches.get_one::<String>("storage").map(PathBuf::from),
        log_file: matches.get_one::<String>("log-file").map(PathBuf::from),
    };
    let settings = load_settings(&overrides).context("failed to load settings")?;
    let level = matches
        .get_one::<String>("log-level")
        .map(String::as_str)
        .unwrap_or("info");
    init_logging(&settings, level)?;
    info!(api_url = %settings.api_url, storage = %settings.storage_path.display(), "starting");

    let api = Arc::new(HttpTaskApi::new(settings.api_url.clone()));
    let mut storage = ClientStorage::open(&settings.storage_path);
    let mut out = io::stdout();

    match matches.subcommand() {
        Some(("list", sub_matches)) => {
            let filter = sub_matches
                .get_one::<String>("filter")
                .map(|f| f.parse::<Filter>())
                .transpose()
                .map_err(anyhow::Error::msg)?
                .unwrap_or_default();
            commands::list_tasks(api.as_ref(), &storage, filter, &mut out)
                .await
                .context("failed to list tasks")
        }
        Some(("add", sub_matches)) => {
            let text = sub_matches
                .get_one::<String>("text")
                .map(String::as_str)
                .unwrap_or_default();
            commands::add_task(api.as_ref(), &storage, text, &mut out)
                .await
                .map(drop)
                .context("failed to add task")
        }
        Some(("logout", _)) => {
            commands::logout(&mut storage, &mut out).context("failed to clear session")
        }
        Some(("theme", _)) => commands::toggle_theme(&mut storage, &mut out)
            .map(drop)
            .context("failed to save theme"),
        _ => run_tui(&settings, api, storage).await,
    }
}

async fn run_tui(settings: &Settings, api: Arc<HttpTaskApi>, storage: ClientStorage) -> Result<()> {
    let (tx, mut rx) = unbounded_channel();
    let timing = Timing {
        delete_delay: settings.delete_delay(),
        error_display: settings.error_display(),
    };
    let mut controller = Controller::new(api, storage, timing, tx.clone());

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    ui::spawn_input_thread(tx);
    let result = ui::run_app(&mut terminal, &mut controller, &mut rx).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    info!("exiting");
    result.context("terminal ui failed")
}
