//! UI rendering functions for the TUI.
//!
//! Draws the column layout (status, notes, live stats, controls) with a
//! one-line banner at the bottom, then any modal on top.

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::Line,
    widgets::{Block, Borders, Clear, Paragraph},
};

use super::app::{App, Focus, Mode};
use super::layout::{Container, allocate_columns};
use super::views;

/// Main rendering function for the TUI.
///
/// # Arguments
///
/// * `frame` - The ratatui Frame to render into
/// * `app` - The application state
pub fn draw(frame: &mut Frame, app: &App) {
    let size = frame.area();

    // Columns on top, banner / command line at the bottom
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(size);

    render_columns(frame, app, rows[0]);
    frame.render_widget(Paragraph::new(views::bottom_line(app)), rows[1]);

    // Draw every modal above Main, bottom to top
    for mode in app.modes().iter().skip(1) {
        render_modal(frame, app, *mode, size);
    }
}

/// Renders the visible columns with a one-cell separator between them.
fn render_columns(frame: &mut Frame, app: &App, area: Rect) {
    let columns = allocate_columns(area.width);
    let mut x = area.x;

    let mut panels: Vec<(u16, Vec<Line<'static>>)> = Vec::new();
    panels.push((columns.status, views::status_lines(app, usize::from(columns.status))));
    if let Some(width) = columns.list {
        panels.push((width, views::list_lines(app, usize::from(area.height))));
    }
    if let Some(width) = columns.stats {
        panels.push((width, views::stats_panel_lines(app, usize::from(width))));
    }
    if let Some(width) = columns.controls {
        panels.push((width, views::controls_lines(app.focus())));
    }

    let count = panels.len();
    for (index, (width, lines)) in panels.into_iter().enumerate() {
        let rect = Rect::new(x, area.y, width, area.height);
        let content = Container::new(width, area.height).render(lines);
        frame.render_widget(Paragraph::new(content), rect);
        x += width;

        if index + 1 < count {
            let separator = Rect::new(x, area.y, 1, area.height);
            let style = if index == 0 && app.focus() == Focus::Video {
                Style::default().fg(Color::Cyan)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            let bar: Vec<Line> = (0..area.height).map(|_| Line::styled("│", style)).collect();
            frame.render_widget(Paragraph::new(bar), separator);
            x += 1;
        }
    }
}

/// Renders one modal as a bordered popup.
fn render_modal(frame: &mut Frame, app: &App, mode: Mode, area: Rect) {
    let (title, width, lines) = match mode {
        Mode::Main | Mode::CommandInput => return,
        Mode::Help => ("Help", 72, views::help_lines()),
        Mode::Stats => {
            let width = area.width.saturating_sub(8).clamp(40, 100);
            (
                "Stats",
                width,
                views::stats_view_lines(app, usize::from(width.saturating_sub(2))),
            )
        }
        Mode::NoteForm => match app.note_form() {
            Some(form) => ("Note", 64, views::note_form_lines(form)),
            None => return,
        },
        Mode::TackleForm => match app.tackle_form() {
            Some(form) => ("Tackle", 64, views::tackle_form_lines(form)),
            None => return,
        },
        Mode::ConfirmDiscard => ("Confirm", 40, views::confirm_lines()),
        Mode::ClipsView => ("Clips", 72, views::clips_lines(&app.clips, app.clips_scroll)),
        Mode::ExportProgress => match app.export_progress() {
            Some(progress) => ("Export", 50, views::export_lines(progress, 46)),
            None => return,
        },
    };

    let height = popup_height(lines.len(), area.height);
    let popup = centered(area, width.min(area.width), height);
    let inner_width = popup.width.saturating_sub(2);
    let inner_height = popup.height.saturating_sub(2);

    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(Style::default().fg(Color::Cyan));
    let content = Container::new(inner_width, inner_height).render(lines);

    frame.render_widget(Clear, popup);
    frame.render_widget(Paragraph::new(content).block(block), popup);
}

/// Content rows plus the border, capped at the available height.
fn popup_height(rows: usize, available: u16) -> u16 {
    u16::try_from(rows)
        .unwrap_or(u16::MAX)
        .saturating_add(2)
        .min(available)
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    Rect::new(
        area.x + (area.width.saturating_sub(width)) / 2,
        area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn popup_is_centered_and_clipped() {
        let area = Rect::new(0, 0, 100, 40);
        assert_eq!(centered(area, 40, 10), Rect::new(30, 15, 40, 10));
        assert_eq!(centered(area, 120, 50), Rect::new(0, 0, 120, 50));
    }

    #[test]
    fn popup_height_saturates_on_long_content() {
        assert_eq!(popup_height(5, 40), 7);
        assert_eq!(popup_height(100, 40), 40);
        assert_eq!(popup_height(70_000, 1000), 1000);
        assert_eq!(popup_height(usize::MAX, u16::MAX), u16::MAX);
    }
}
