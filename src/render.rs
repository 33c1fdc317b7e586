// Plain-text rendering of a view's display state (headless `list` command)

use crate::format::{format_field, truncate, Cell, FieldFormat};
use crate::paginate::{Page, PageMeta};
use crate::record::Record;
use crate::view::{card_lines, format_row, DisplayState, Layout, ViewDescriptor};
use std::fmt::Write;

const MAX_CELL_WIDTH: usize = 40;

pub fn render_display(descriptor: &ViewDescriptor, display: &DisplayState<'_>) -> String {
    match display {
        DisplayState::Loading => "Loading...\n".to_string(),
        DisplayState::Error { message, retryable } => {
            let mut out = format!("Error: {}\n", message);
            if *retryable {
                out.push_str("Run the command again to retry.\n");
            }
            out
        }
        DisplayState::Empty { message } => format!("{}\n", message),
        DisplayState::Rows(page) => match descriptor.layout {
            Layout::Table => render_table(descriptor, page),
            Layout::Cards => render_cards(descriptor, page),
        },
    }
}

fn cell_text(cell: &Cell) -> String {
    match cell {
        Cell::Badge { label, .. } => format!("[{}]", label),
        other => truncate(other.text(), MAX_CELL_WIDTH),
    }
}

fn render_table(descriptor: &ViewDescriptor, page: &Page<&Record>) -> String {
    let headers: Vec<String> = descriptor.columns.iter().map(|c| c.header.clone()).collect();
    let rows: Vec<Vec<String>> = page
        .items
        .iter()
        .map(|r| format_row(descriptor, r).cells.iter().map(cell_text).collect())
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_line(&mut out, &headers, &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_line(&mut out, &rule, &widths);
    for row in &rows {
        push_line(&mut out, row, &widths);
    }
    out.push_str(&footer(&page.meta));
    out
}

fn push_line(out: &mut String, cells: &[String], widths: &[usize]) {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| {
            let pad = width.saturating_sub(cell.chars().count());
            format!("{}{}", cell, " ".repeat(pad))
        })
        .collect();
    let _ = writeln!(out, "{}", padded.join("  ").trim_end());
}

fn render_cards(descriptor: &ViewDescriptor, page: &Page<&Record>) -> String {
    let mut out = String::new();
    for record in &page.items {
        let Some(card) = &descriptor.card else {
            continue;
        };
        let mut heading = format_field(record, &card.title_field, &FieldFormat::Text).to_string();
        if let Some(subtitle) = &card.subtitle_field {
            if record.is_present(subtitle) {
                let _ = write!(heading, " ({})", record.key(subtitle).unwrap_or_default());
            }
        }
        if let Some(badge) = &card.badge {
            let _ = write!(heading, " {}", cell_text(&format_field(record, &badge.field, &badge.format)));
        }
        let _ = writeln!(out, "== {}", heading);
        for (label, cell) in card_lines(descriptor, record) {
            let _ = writeln!(out, "   {}: {}", label, cell_text(&cell));
        }
        out.push('\n');
    }
    out.push_str(&footer(&page.meta));
    out
}

fn footer(meta: &PageMeta) -> String {
    if meta.total_pages > 1 {
        format!("Page {} of {} ({} total)\n", meta.page, meta.total_pages, meta.total)
    } else {
        format!("{} total\n", meta.total)
    }
}
