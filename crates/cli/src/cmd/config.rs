//! Show the resolved configuration for a watcher instance
//!
//! Useful for checking a config file and flags before installing a service.

use crate::config::{self, WatchArgs};
use anyhow::Result;
use owo_colors::{OwoColorize, Style};
use std::fmt::Write as _;
use std::io::IsTerminal;
use std::path::Path;
use std::process::ExitCode;
use watcher::config::describe_mask;
use watcher::WatchConfig;

pub fn run(args: &WatchArgs) -> Result<ExitCode> {
    let config = config::resolve(args)?;
    let color = std::io::stdout().is_terminal();

    print!("{}", render(&config, args.config.as_deref(), color));
    Ok(ExitCode::SUCCESS)
}

/// Styles for each kind of output; all plain when color is off
struct Palette {
    heading: Style,
    dim: Style,
    section: Style,
    key: Style,
    warning: Style,
}

impl Palette {
    fn new(color: bool) -> Self {
        if !color {
            let plain = Style::new();
            return Self {
                heading: plain,
                dim: plain,
                section: plain,
                key: plain,
                warning: plain,
            };
        }
        Self {
            heading: Style::new().bold(),
            dim: Style::new().dimmed(),
            section: Style::new().yellow(),
            key: Style::new().cyan(),
            warning: Style::new().yellow().bold(),
        }
    }
}

/// Format the resolved configuration for display
pub fn render(config: &WatchConfig, source: Option<&Path>, color: bool) -> String {
    let p = Palette::new(color);
    let mut out = String::new();

    let _ = writeln!(out, "{}", "Watcher Configuration".style(p.heading));
    match source {
        Some(path) => {
            let _ = writeln!(
                out,
                "{}: {}\n",
                "Config file".style(p.dim),
                path.display().style(p.dim)
            );
        }
        None => {
            let _ = writeln!(out, "{}\n", "(from command-line flags)".style(p.dim));
        }
    }

    let _ = writeln!(out, "{}", format!("[{}]", config.label).style(p.section));
    let _ = writeln!(out, "  {} = {}", "path".style(p.key), config.path.display());
    let _ = writeln!(out, "  {} = {}", "handler".style(p.key), config.handler.display());
    let _ = writeln!(
        out,
        "  {} = {} {}",
        "debounce_secs".style(p.key),
        config.debounce.as_secs_f64(),
        format!("({}ms)", config.debounce.as_millis()).style(p.dim)
    );
    let _ = writeln!(out, "  {} = {}", "events".style(p.key), describe_mask(config.mask));

    if !config.path.is_dir() {
        let _ = writeln!(
            out,
            "\n{} {} does not exist yet; `run` will fail until it is created",
            "warning:".style(p.warning),
            config.path.display()
        );
    }

    out
}
