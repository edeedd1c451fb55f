//! Frame assembly.
//!
//! Everything a frame shows is copied into a [`FrameSnapshot`] first. The
//! header, body and footer are then built from that snapshot on separate
//! scoped threads; none of them touches application state, so there is
//! nothing to lock and nothing a panel can change under another.

use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use std::thread;
use tracing::warn;

/// What the body area shows
#[derive(Debug, Clone, PartialEq)]
pub enum BodyContent {
    /// Rows of the snapshot's table window
    Table,
    /// Read-only text: a selected cell, help, logs
    Text(Vec<String>),
    /// Visible lines of a format buffer; `cursor` is relative to them
    Editor {
        lines: Vec<String>,
        first_line: usize,
        cursor: (usize, usize),
    },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FooterInfo {
    pub mode: String,
    pub position: String,
    pub total_rows: usize,
    pub undo_depth: usize,
    pub redo_depth: usize,
    pub showing_results: bool,
    pub status: Option<String>,
    /// Open input line and its cursor, in chars
    pub input: Option<(String, usize)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameSnapshot {
    pub title: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub cell_width: usize,
    /// Selected cell as (row, column) within `rows`
    pub highlight: Option<(usize, usize)>,
    pub body: BodyContent,
    pub border: bool,
    pub ascii: bool,
    pub footer: FooterInfo,
}

/// The three rendered panels of one frame
#[derive(Debug, Default)]
pub struct RenderedFrame {
    pub header: Vec<Line<'static>>,
    pub body: Vec<Line<'static>>,
    pub footer: Vec<Line<'static>>,
}

/// Build all panels concurrently. A panel whose worker panicked is drawn
/// empty rather than taking the application down.
pub fn assemble(snapshot: &FrameSnapshot) -> RenderedFrame {
    thread::scope(|scope| {
        let header = scope.spawn(|| render_header(snapshot));
        let body = scope.spawn(|| render_body(snapshot));
        let footer = scope.spawn(|| render_footer(snapshot));

        RenderedFrame {
            header: join_panel("header", header),
            body: join_panel("body", body),
            footer: join_panel("footer", footer),
        }
    })
}

fn join_panel(
    name: &str,
    handle: thread::ScopedJoinHandle<'_, Vec<Line<'static>>>,
) -> Vec<Line<'static>> {
    handle.join().unwrap_or_else(|_| {
        warn!(target: "render", "Rendering the {} panel failed", name);
        Vec::new()
    })
}

/// Pad or cut `text` to exactly `width` chars
pub fn fit_cell(text: &str, width: usize) -> String {
    // Newlines would break the row layout
    let flat: String = text
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    let count = flat.chars().count();
    if count > width {
        if width == 0 {
            return String::new();
        }
        let mut cut: String = flat.chars().take(width.saturating_sub(1)).collect();
        cut.push('~');
        cut
    } else {
        format!("{}{}", flat, " ".repeat(width - count))
    }
}

fn separator(snapshot: &FrameSnapshot) -> &'static str {
    match (snapshot.border, snapshot.ascii) {
        (false, _) => "",
        (true, true) => "|",
        (true, false) => "│",
    }
}

/// Width of the text inside one cell, leaving room for the separator
fn inner_width(snapshot: &FrameSnapshot) -> usize {
    let sep = separator(snapshot).chars().count();
    snapshot.cell_width.saturating_sub(sep).max(1)
}

pub fn render_header(snapshot: &FrameSnapshot) -> Vec<Line<'static>> {
    let title_style = if snapshot.ascii {
        Style::default()
    } else {
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    };
    let mut lines = vec![Line::from(Span::styled(snapshot.title.clone(), title_style))];

    if snapshot.body != BodyContent::Table {
        return lines;
    }

    let width = inner_width(snapshot);
    let sep = separator(snapshot);
    let header_style = if snapshot.ascii {
        Style::default()
    } else {
        Style::default().add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
    };
    let spans: Vec<Span<'static>> = snapshot
        .headers
        .iter()
        .flat_map(|h| {
            [
                Span::styled(fit_cell(h, width), header_style),
                Span::raw(sep),
            ]
        })
        .collect();
    lines.push(Line::from(spans));
    lines
}

pub fn render_body(snapshot: &FrameSnapshot) -> Vec<Line<'static>> {
    match &snapshot.body {
        BodyContent::Table => render_table_rows(snapshot),
        BodyContent::Text(text) => text.iter().map(|l| Line::from(l.clone())).collect(),
        BodyContent::Editor {
            lines,
            first_line,
            cursor,
        } => lines
            .iter()
            .enumerate()
            .map(|(i, line)| {
                let number = format!("{:>4} ", first_line + i + 1);
                let mut spans = vec![Span::styled(number, Style::default().fg(Color::DarkGray))];
                if i == cursor.0 && !snapshot.ascii {
                    spans.extend(cursor_spans(line, cursor.1));
                } else {
                    spans.push(Span::raw(line.clone()));
                }
                Line::from(spans)
            })
            .collect(),
    }
}

/// Line split around the cursor so the char under it can be reversed
fn cursor_spans(line: &str, col: usize) -> Vec<Span<'static>> {
    let before: String = line.chars().take(col).collect();
    let at: String = line.chars().nth(col).map_or(" ".to_string(), String::from);
    let after: String = line.chars().skip(col + 1).collect();
    vec![
        Span::raw(before),
        Span::styled(at, Style::default().add_modifier(Modifier::REVERSED)),
        Span::raw(after),
    ]
}

fn render_table_rows(snapshot: &FrameSnapshot) -> Vec<Line<'static>> {
    let width = inner_width(snapshot);
    let sep = separator(snapshot);
    let selected = Style::default().bg(Color::Blue).fg(Color::White);

    snapshot
        .rows
        .iter()
        .enumerate()
        .map(|(r, row)| {
            let spans: Vec<Span<'static>> = row
                .iter()
                .enumerate()
                .flat_map(|(c, value)| {
                    let text = fit_cell(value, width);
                    let is_selected = snapshot.highlight == Some((r, c));
                    let cell = if is_selected && snapshot.ascii {
                        // No colour to mark the cell with
                        let marked: String =
                            std::iter::once('>').chain(text.chars().skip(1)).collect();
                        Span::raw(marked)
                    } else if is_selected {
                        Span::styled(text, selected)
                    } else {
                        Span::raw(text)
                    };
                    [cell, Span::raw(sep)]
                })
                .collect();
            Line::from(spans)
        })
        .collect()
}

pub fn render_footer(snapshot: &FrameSnapshot) -> Vec<Line<'static>> {
    let info = &snapshot.footer;
    let mut lines = Vec::with_capacity(3);

    let mut summary = format!(
        "[{}] {} of {} rows | undo {} redo {}",
        info.mode, info.position, info.total_rows, info.undo_depth, info.redo_depth
    );
    if info.showing_results {
        summary.push_str(" | query results (:d to leave)");
    }
    let summary_style = if snapshot.ascii {
        Style::default()
    } else {
        Style::default().fg(Color::Black).bg(Color::Gray)
    };
    lines.push(Line::from(Span::styled(summary, summary_style)));

    match &info.input {
        Some((text, _)) => lines.push(Line::from(format!("> {}", text))),
        None => lines.push(Line::from(info.status.clone().unwrap_or_default())),
    }
    if info.input.is_some() {
        if let Some(status) = &info.status {
            lines.push(Line::from(status.clone()));
        }
    }
    lines
}
