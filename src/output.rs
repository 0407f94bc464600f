use std::io::{self, Write};

use serde::Serialize;

use crate::app::{
    ObjectOutcome, ProgressEvent, ProgressSink, ProvisionReport, StatusResult,
};
use crate::catalog::OverlayEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_provision(result: &ProvisionReport) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_status(result: &StatusResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_overlay(entries: &[OverlayEntry]) -> io::Result<()> {
        Self::print_json(&entries)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Line-oriented progress for pipes and CI logs.
pub struct TextOutput;

impl TextOutput {
    /// `phase=Fetch; m57 25/40 tiles` becomes `[Fetch] m57 25/40 tiles`.
    pub fn format_event(event: &ProgressEvent) -> String {
        let message = event.message.trim();
        let mut line = match message
            .strip_prefix("phase=")
            .and_then(|rest| rest.split_once(';'))
        {
            Some((phase, rest)) => format!("[{phase}] {}", rest.trim()),
            None => message.to_string(),
        };
        if let Some(elapsed) = event.elapsed {
            line.push_str(&format!(" ({:.1}s)", elapsed.as_secs_f64()));
        }
        line
    }

    pub fn print_provision(result: &ProvisionReport) {
        let green = "\x1b[32m";
        let yellow = "\x1b[33m";
        let cyan = "\x1b[36m";
        let red = "\x1b[31m";
        let reset = "\x1b[0m";

        let summary = &result.summary;
        println!("{cyan}HiPS provisioning summary ({}){reset}", result.output_base);
        if result.dry_run {
            println!("{yellow}Dry run: {} objects planned{reset}", summary.planned);
        } else {
            println!("{green}Completed: {}{reset}", summary.completed);
            println!("{red}Failed: {}{reset}", summary.failed);
        }
        println!("Already done: {}", summary.already_done);
        println!("Total: {}", summary.total);
        if !result.dry_run {
            println!(
                "Tiles: {} fetched, {} present, {} not found, {} failed",
                summary.tiles.fetched,
                summary.tiles.present,
                summary.tiles.not_found,
                summary.tiles.failed
            );
        }

        for object in &result.objects {
            match &object.outcome {
                ObjectOutcome::Completed { max_order, tiles } => {
                    let color = if tiles.failed > 0 { yellow } else { green };
                    println!(
                        "{color}  {} {} (order {max_order}): {} tiles, {} failed{reset}",
                        object.id,
                        object.name,
                        tiles.stored(),
                        tiles.failed
                    );
                }
                ObjectOutcome::Failed { reason } => {
                    println!("{red}  {} {}: {reason}{reset}", object.id, object.name);
                }
                ObjectOutcome::Planned { max_order, orders } => {
                    let cells: usize = orders.iter().map(|plan| plan.cells).sum();
                    println!(
                        "{cyan}  {} {} (order {max_order}): {cells} tiles{reset}",
                        object.id, object.name
                    );
                }
                ObjectOutcome::AlreadyDone => {}
            }
        }
    }

    pub fn print_status(result: &StatusResult) {
        println!("{:<12} {:<28} {:<14} {:>5} {:>7}", "ID", "NAME", "STATE", "ORDER", "TILES");
        for entry in &result.objects {
            let state = serde_json::to_value(entry.state)
                .ok()
                .and_then(|value| value.as_str().map(str::to_string))
                .unwrap_or_default();
            let tiles = entry
                .tiles
                .map(|tally| tally.stored().to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{:<12} {:<28} {:<14} {:>5} {:>7}",
                entry.id, entry.name, state, entry.max_order, tiles
            );
        }
    }
}

impl ProgressSink for TextOutput {
    fn event(&self, event: ProgressEvent) {
        println!("{}", Self::format_event(&event));
    }
}
