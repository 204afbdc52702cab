//! Column-aligned comparison tables.

use crate::ansi;
use crate::scale::Scaler;
use ktest_domain::is_within_noise;
use ktest_types::{Classification, ComparisonRow, ComparisonTable, MetricSummary};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    pub colorize: bool,
    /// Header labels of a two-configuration table.
    pub old_label: String,
    pub new_label: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            colorize: false,
            old_label: "old".to_string(),
            new_label: "new".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct Cell {
    text: String,
    color: Option<&'static str>,
}

impl Cell {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            color: None,
        }
    }
}

enum Line {
    Blank,
    Group(String),
    Row(Vec<Cell>),
}

pub fn render_tables(tables: &[ComparisonTable], opts: &RenderOptions) -> String {
    let mut lines = Vec::new();
    for (i, table) in tables.iter().enumerate() {
        if i > 0 {
            lines.push(Line::Blank);
        }
        lines.push(Line::Row(header(table, opts)));
        if !table.group.is_empty() {
            lines.push(Line::Group(table.group.clone()));
        }
        for row in &table.rows {
            lines.push(Line::Row(row_cells(table, row, opts.colorize)));
        }
    }

    let mut widths: Vec<usize> = Vec::new();
    for line in &lines {
        if let Line::Row(cells) = line {
            if widths.len() < cells.len() {
                widths.resize(cells.len(), 0);
            }
            for (w, cell) in widths.iter_mut().zip(cells) {
                *w = (*w).max(cell.text.chars().count());
            }
        }
    }

    let mut out = String::new();
    for line in &lines {
        match line {
            Line::Blank => {}
            Line::Group(group) => out.push_str(group),
            Line::Row(cells) => out.push_str(&format_row(cells, &widths)),
        }
        out.push('\n');
    }
    out
}

fn format_row(cells: &[Cell], widths: &[usize]) -> String {
    let mut line = String::new();
    let last = cells.len().saturating_sub(1);
    for (i, cell) in cells.iter().enumerate() {
        let pad = widths[i].saturating_sub(cell.text.chars().count());
        let padded = if i == 0 {
            format!("{}{}", cell.text, " ".repeat(pad))
        } else if i == last && cell.text.starts_with('(') {
            format!("  {}", cell.text)
        } else {
            format!("  {}{}", " ".repeat(pad), cell.text)
        };
        match cell.color {
            Some(color) => {
                let (lead, body) = padded.split_at(padded.len() - padded.trim_start().len());
                line.push_str(lead);
                line.push_str(&ansi::paint(body, color));
            }
            None => line.push_str(&padded),
        }
    }
    line.trim_end().to_string()
}

fn header(table: &ComparisonTable, opts: &RenderOptions) -> Vec<Cell> {
    match table.configs.len() {
        1 => vec![Cell::plain("name"), Cell::plain(table.metric.clone())],
        2 => vec![
            Cell::plain("name"),
            Cell::plain(format!("{} {}", opts.old_label, table.metric)),
            Cell::plain(format!("{} {}", opts.new_label, table.metric)),
            Cell::plain("delta"),
        ],
        _ => std::iter::once(Cell::plain(format!("name \\ {}", table.metric)))
            .chain(table.configs.iter().map(|c| Cell::plain(c.clone())))
            .collect(),
    }
}

fn row_cells(table: &ComparisonTable, row: &ComparisonRow, colorize: bool) -> Vec<Cell> {
    let reference = row.metrics.iter().flatten().next().map_or(0.0, |m| m.mean);
    let scaler = Scaler::new(reference, &table.unit);

    let mut cells = vec![Cell::plain(row.benchmark.clone())];
    cells.extend(
        row.metrics
            .iter()
            .map(|m| Cell::plain(m.as_ref().map_or_else(String::new, |m| metric_cell(m, &scaler)))),
    );
    if table.has_delta() {
        cells.push(delta_cell(row, colorize));
        cells.push(Cell::plain(row.note.clone()));
    }
    cells
}

fn metric_cell(m: &MetricSummary, scaler: &Scaler) -> String {
    let mean = scaler.format(m.mean);
    if m.values.is_empty() || m.mean == 0.0 {
        return format!("{mean}     ");
    }
    let spread = format!("{:.0}%", ktest_stats::relative_spread(m) * 100.0);
    format!("{mean} ±{spread:>3}")
}

const NOISE_MARK: &str = "~   ";

fn delta_cell(row: &ComparisonRow, colorize: bool) -> Cell {
    let Some(pct) = row.pct_delta else {
        return Cell {
            text: "?".to_string(),
            color: colorize.then_some(ansi::YELLOW),
        };
    };
    let text = match row.classification {
        Classification::NotSignificant => NOISE_MARK.to_string(),
        Classification::Regression | Classification::Improvement => format!("{pct:+.2}%"),
    };
    if !colorize {
        return Cell::plain(text);
    }
    if is_within_noise(row) {
        return Cell {
            text: NOISE_MARK.to_string(),
            color: Some(ansi::YELLOW),
        };
    }
    let color = if text.starts_with('+') {
        ansi::RED
    } else if text.starts_with('-') {
        ansi::GREEN
    } else {
        ansi::YELLOW
    };
    Cell {
        text,
        color: Some(color),
    }
}
