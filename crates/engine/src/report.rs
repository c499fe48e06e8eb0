// crates/engine/src/report.rs
use common::{RankedTable, Result, ScoredInstrument};
use serde::Serialize;
use std::fmt::Write;
use universe::{WeightResolution, WeightSource};

const HEADERS: [&str; 9] = [
    "Rank", "Ticker", "Name", "Current", "Target", "Upside %", "Bonus", "Factor", "Final",
];

/// Header line with the applied weights, plus a warning line on fallback
pub fn weights_banner(resolution: &WeightResolution) -> String {
    let mut out = format!("Applied factor weights: {}", resolution.weights);
    if let WeightSource::Fallback(reason) = &resolution.source {
        let _ = write!(out, "\nWARNING: default weights in use ({})", reason);
    }
    out
}

/// Unknown prices print as "-"
fn price_cell(price: u64) -> String {
    if price == 0 {
        "-".to_string()
    } else {
        group_thousands(price)
    }
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn cells(row: &ScoredInstrument) -> [String; 9] {
    [
        row.rank.to_string(),
        row.instrument.ticker.clone(),
        row.instrument.name.clone(),
        price_cell(row.quote.current_price),
        price_cell(row.quote.target_price),
        format!("{:.1}", row.quote.upside_pct),
        format!("{:.1}", row.upside_bonus),
        format!("{:.1}", row.factor_score),
        format!("{:.1}", row.final_score),
    ]
}

/// Aligned text table; the name column is left-aligned, the rest right-aligned
pub fn render_table(table: &RankedTable, resolution: &WeightResolution) -> String {
    let mut out = weights_banner(resolution);
    out.push_str("\n\n");

    if table.is_empty() {
        out.push_str("No instruments could be scored.\n");
        return out;
    }

    let rows: Vec<[String; 9]> = table.rows.iter().map(cells).collect();
    let mut widths = HEADERS.map(|h| h.chars().count());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let header = HEADERS.map(String::from);
    for row in std::iter::once(&header).chain(rows.iter()) {
        let line: Vec<String> = row
            .iter()
            .zip(widths)
            .enumerate()
            .map(|(col, (cell, width))| {
                if col == 2 {
                    format!("{:<width$}", cell, width = width)
                } else {
                    format!("{:>width$}", cell, width = width)
                }
            })
            .collect();
        out.push_str(line.join("  ").trim_end());
        out.push('\n');
    }

    out
}

#[derive(Serialize)]
struct JsonReport<'a> {
    weights: &'a common::WeightVector,
    fallback: Option<String>,
    rows: &'a [ScoredInstrument],
}

pub fn render_json(table: &RankedTable, resolution: &WeightResolution) -> Result<String> {
    let fallback = match &resolution.source {
        WeightSource::Parsed => None,
        WeightSource::Fallback(reason) => Some(reason.to_string()),
    };
    let report = JsonReport {
        weights: &resolution.weights,
        fallback,
        rows: &table.rows,
    };
    Ok(serde_json::to_string_pretty(&report)?)
}
