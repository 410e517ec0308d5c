//! Terminal output for notifications

use chrono::{DateTime, Local};
use notifier::ChangeEvent;
use owo_colors::OwoColorize;
use std::path::Path;

/// Render one notification line
pub fn event_line(
    path: &Path,
    event: ChangeEvent,
    at: Option<DateTime<Local>>,
    color: bool,
) -> String {
    let label = match event {
        ChangeEvent::FileName => "name",
        ChangeEvent::FileAttributes => "attributes",
        ChangeEvent::FileSize => "size",
    };
    let label = format!("{:<10}", label);
    let label = if !color {
        label
    } else {
        match event {
            ChangeEvent::FileName => label.yellow().to_string(),
            ChangeEvent::FileAttributes => label.cyan().to_string(),
            ChangeEvent::FileSize => label.green().to_string(),
        }
    };

    match at {
        Some(at) => {
            let stamp = at.format("%H:%M:%S%.3f").to_string();
            let stamp = if color { stamp.dimmed().to_string() } else { stamp };
            format!("{} {} {}", stamp, label, path.display())
        }
        None => format!("{} {}", label, path.display()),
    }
}
