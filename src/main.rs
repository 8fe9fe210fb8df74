mod app;
mod components;
mod config;
mod error;
mod event;
mod fs;
mod handler;
mod logging;
mod preview;
mod render;
mod scheduler;
mod services;
mod theme;
mod tui;
mod ui;

use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use crate::app::App;
use crate::config::AppConfig;
use crate::scheduler::Scheduler;
use crate::services::git::GitCli;
use crate::services::search::RipgrepSearch;
use crate::services::watch::PollingWatch;
use crate::services::Services;
use crate::tui::{install_panic_hook, Tui};

/// Browse a directory tree with live file, directory and diff previews.
#[derive(Parser, Debug)]
#[command(name = "lv", version, about)]
struct Cli {
    /// Root path to browse (defaults to current directory)
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Path to a custom config file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Never switch to the diff view
    #[arg(long)]
    no_diff: bool,

    /// Show plain text without syntax colors
    #[arg(long)]
    no_color: bool,

    /// Do not wrap long lines
    #[arg(long)]
    nowrap: bool,

    /// Leave the mouse to the terminal
    #[arg(long)]
    no_mouse: bool,

    /// Show dotfiles
    #[arg(long)]
    show_hidden: bool,

    /// Write a trace log to FILE
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,
}

impl Cli {
    /// Only flags the user actually passed become overrides.
    fn overrides(&self) -> AppConfig {
        let mut config = AppConfig::default();
        if self.no_diff {
            config.preview.diff = Some(false);
        }
        if self.no_color {
            config.preview.colorize = Some(false);
        }
        if self.nowrap {
            config.preview.wrap = Some(false);
        }
        if self.no_mouse {
            config.general.mouse = Some(false);
        }
        if self.show_hidden {
            config.general.show_hidden = Some(true);
        }
        config.general.log_file = self.log_file.clone();
        config
    }
}

fn main() -> error::Result<()> {
    let cli = Cli::parse();

    let root = cli.path.canonicalize().map_err(|_| {
        error::AppError::InvalidPath(format!("{} does not exist", cli.path.display()))
    })?;
    if !root.is_dir() {
        return Err(error::AppError::InvalidPath(format!(
            "{} is not a directory",
            root.display()
        )));
    }

    let config = AppConfig::load(cli.config.as_deref(), Some(&cli.overrides()));
    if let Some(log_file) = config.log_file() {
        logging::init(log_file)?;
    }
    info!(root = %root.display(), "starting");

    let git = GitCli::discover(&root);
    let watch = PollingWatch::new(git.git_dir());
    let search = RipgrepSearch {
        show_hidden: config.show_hidden(),
        skip_ignored: config.skip_ignored(),
        ..RipgrepSearch::default()
    };
    let services = Services::offline()
        .with_watch(watch)
        .with_vcs(git)
        .with_search(search);

    let mut app = App::new(&root, &config, services)?;
    let mut scheduler = Scheduler::new(&config);

    install_panic_hook();
    let mut tui = Tui::new(config.mouse_enabled())?;
    let result = scheduler.run(&mut app, &mut tui);
    tui.restore()?;
    result
}
