//! fwatch CLI - watch a single file and print its changes

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use notifier::{ChangeEvent, EventMask, Notifier};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::level_filters::LevelFilter;

mod config;
mod output;

/// fwatch - print a line every time a file changes
#[derive(Parser)]
#[command(name = "fwatch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// File to watch (it may not exist yet, its directory must)
    path: PathBuf,

    /// Kinds of change to report, comma separated (default: all)
    #[arg(short, long, value_enum, value_delimiter = ',')]
    events: Vec<EventArg>,

    /// Config file (default: <config dir>/fwatch/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Don't prefix lines with the time
    #[arg(long)]
    no_timestamps: bool,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum EventArg {
    /// Rename, create, delete
    Name,
    /// Timestamps, permissions
    Attributes,
    /// Content writes
    Size,
    /// Everything
    All,
}

impl Cli {
    /// Mask from the command line, if any was given
    fn mask(&self) -> Option<EventMask> {
        if self.events.contains(&EventArg::All) {
            return Some(EventMask::ALL);
        }
        EventMask::from_events(self.events.iter().filter_map(|arg| match arg {
            EventArg::Name => Some(ChangeEvent::FileName),
            EventArg::Attributes => Some(ChangeEvent::FileAttributes),
            EventArg::Size => Some(ChangeEvent::FileSize),
            EventArg::All => None,
        }))
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = config::load(cli.config.as_deref())?;
    let mask = cli.mask().unwrap_or_else(|| config.watch.mask());
    let timestamps = config.watch.timestamps && !cli.no_timestamps;
    let color = std::io::stdout().is_terminal();

    // Callbacks run on the notifier's thread; print from here
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut notifier = Notifier::with_events(
        &cli.path,
        move |path, event| {
            let _ = tx.send((path.to_path_buf(), event, chrono::Local::now()));
        },
        mask,
    )
    .with_context(|| format!("Cannot watch {}", cli.path.display()))?;

    notifier
        .start_watching()
        .with_context(|| format!("Cannot watch {}", cli.path.display()))?;
    eprintln!("Watching {} for {}", notifier.path().display(), mask);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut health = tokio::time::interval(Duration::from_millis(250));
    let outcome = loop {
        tokio::select! {
            _ = &mut ctrl_c => break Ok(()),
            Some((path, event, at)) = rx.recv() => {
                let at = timestamps.then_some(at);
                println!("{}", output::event_line(&path, event, at, color));
            }
            _ = health.tick() => {
                if let Some(err) = notifier.last_error() {
                    break Err(anyhow::Error::new(err).context("Watch session ended"));
                }
            }
        }
    };

    notifier.stop_watching();
    tracing::debug!("Stopped");
    outcome
}
