//! Human-friendly CLI output formatters.
//!
//! Each `fmt_*` function formats one tool's output for terminal display.
//! When `color` is true, ANSI escape codes are emitted via `owo_colors`.

use crate::services::{Delivery, DeliveryOutcome, DispatcherStatus};
use crate::tools::SearchOutput;
use crate::types::Record;
use owo_colors::OwoColorize;
use std::io::{self, Write};

/// Longest record summary printed on one line.
const MAX_LINE_CHARS: usize = 100;

fn outcome_label(outcome: DeliveryOutcome) -> &'static str {
    match outcome {
        DeliveryOutcome::Cached => "cached",
        DeliveryOutcome::Fresh => "fresh",
        DeliveryOutcome::Exhausted => "failed",
    }
}

/// One-line summary: the record's label if it has one, else compact JSON.
fn summarize(record: &Record) -> String {
    let line = record
        .label()
        .map_or_else(|| serde_json::to_string(&record.0).unwrap_or_default(), str::to_owned);
    if line.chars().count() <= MAX_LINE_CHARS {
        return line;
    }
    let mut cut: String = line.chars().take(MAX_LINE_CHARS - 1).collect();
    cut.push('…');
    cut
}

fn fmt_records(w: &mut impl Write, records: &[Record], color: bool) -> io::Result<()> {
    for (i, record) in records.iter().enumerate() {
        let line = summarize(record);
        if color {
            writeln!(w, "  {} {}", format_args!("{:>3}.", i + 1).dimmed(), line.bold())?;
        } else {
            writeln!(w, "  {:>3}. {}", i + 1, line)?;
        }
    }
    Ok(())
}

// ── search ──────────────────────────────────────────────────────────────────

pub fn fmt_search(w: &mut impl Write, out: &SearchOutput, color: bool) -> io::Result<()> {
    let header = format!(
        "{} \"{}\" · {} result(s) · {}",
        out.category,
        out.query,
        out.total_returned,
        outcome_label(out.outcome)
    );
    if color {
        writeln!(w, "{}", header.cyan())?;
    } else {
        writeln!(w, "{header}")?;
    }

    if out.outcome == DeliveryOutcome::Exhausted {
        if color {
            writeln!(w, "  {}", "search failed after all retries".red())?;
        } else {
            writeln!(w, "  search failed after all retries")?;
        }
        return Ok(());
    }

    if out.results.is_empty() {
        writeln!(w, "  no matches")?;
    }
    fmt_records(w, &out.results, color)?;

    if out.has_more {
        if color {
            writeln!(w, "{}", "... more results available".dimmed())?;
        } else {
            writeln!(w, "... more results available")?;
        }
    }

    Ok(())
}

// ── delivery ────────────────────────────────────────────────────────────────

pub fn fmt_delivery(w: &mut impl Write, delivery: &Delivery, color: bool) -> io::Result<()> {
    let header = format!(
        "{} · {} result(s) · {}",
        delivery.key,
        delivery.records.len(),
        outcome_label(delivery.outcome)
    );
    if color {
        match delivery.outcome {
            DeliveryOutcome::Exhausted => writeln!(w, "{}", header.red())?,
            DeliveryOutcome::Cached => writeln!(w, "{}", header.green())?,
            DeliveryOutcome::Fresh => writeln!(w, "{}", header.cyan())?,
        }
    } else {
        writeln!(w, "{header}")?;
    }
    fmt_records(w, &delivery.records, color)
}

// ── status ──────────────────────────────────────────────────────────────────

pub fn fmt_status(w: &mut impl Write, status: &DispatcherStatus, color: bool) -> io::Result<()> {
    let fields: [(&str, u64); 6] = [
        ("pending", status.pending as u64),
        ("active", status.active as u64),
        ("retrying", status.retrying as u64),
        ("cached", status.cached as u64),
        ("completed", status.completed),
        ("exhausted", status.exhausted),
    ];
    for (name, value) in fields {
        if color {
            writeln!(w, "{:<10} {}", name.dimmed(), value.bold())?;
        } else {
            writeln!(w, "{name:<10} {value}")?;
        }
    }
    Ok(())
}
