//! Line builders for every panel and modal.
//!
//! Each function turns a slice of state into styled lines; sizing is left
//! to [`Container`](super::layout::Container).

use ratatui::style::{Color, Modifier, Style, Stylize};
use ratatui::text::{Line, Span};

use super::app::{App, ExportProgress, Focus};
use super::command::ClipRow;
use super::forms::{NoteField, NoteForm, TackleForm, TackleStep};
use super::stats::{StatsRow, StatsSort, arrange, top_categories};
use crate::models::{CategoryCount, NoteItem, TackleStat};
use crate::utils::format_timestamp;

const FOCUS_COLOR: Color = Color::Cyan;

fn heading(text: impl Into<String>) -> Line<'static> {
    Line::from(Span::styled(
        text.into(),
        Style::default().add_modifier(Modifier::BOLD),
    ))
}

fn dim(text: impl Into<String>) -> Span<'static> {
    Span::styled(text.into(), Style::default().fg(Color::DarkGray))
}

fn category_color(item: &NoteItem) -> Color {
    if item.is_tackle() {
        Color::Red
    } else if item.is_clip() {
        Color::Yellow
    } else {
        Color::Cyan
    }
}

// --- Status column ---

/// Playback status and the timeline.
pub fn status_lines(app: &App, width: usize) -> Vec<Line<'static>> {
    let status = app.status();
    let name = app
        .video_path()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let state = if status.paused { "⏸ Paused" } else { "▶ Playing" };

    let mut lines = vec![
        heading(name),
        Line::from(vec![
            Span::raw(format!("{state}  ")),
            Span::raw(format!(
                "{} / {}",
                format_timestamp(status.time_pos),
                format_timestamp(status.duration)
            )),
        ]),
        Line::from(format!("Speed {}x  Step {}s", status.speed, app.step_size())),
    ];
    let mut flags = Vec::new();
    if status.muted {
        flags.push("Muted");
    }
    if app.overlay_enabled() {
        flags.push("Overlay");
    }
    if !flags.is_empty() {
        lines.push(Line::from(flags.join("  ")));
    }
    if let Some(start) = app.clip_start() {
        lines.push(Line::from(Span::styled(
            format!("● Clip from {}", format_timestamp(start)),
            Style::default().fg(Color::Yellow),
        )));
    }
    if let Some(error) = &app.player_error {
        lines.push(Line::from(Span::styled(
            format!("Player: {error}"),
            Style::default().fg(Color::Red),
        )));
    }
    lines.push(Line::default());
    lines.push(timeline(width, status.duration, status.time_pos, app.items()));
    lines.push(Line::from(vec![
        dim("Focus: "),
        Span::styled(
            match app.focus() {
                Focus::Video => "Video",
                Focus::Search => "Search",
                Focus::Notes => "Notes",
            },
            Style::default().fg(FOCUS_COLOR),
        ),
    ]));
    lines
}

/// Horizontal timeline with a marker per note and the play head.
pub fn timeline(width: usize, duration: f64, time_pos: f64, items: &[NoteItem]) -> Line<'static> {
    if width == 0 {
        return Line::default();
    }
    let mut cells: Vec<(char, Style)> = vec![('─', Style::default().fg(Color::DarkGray)); width];
    if duration > 0.0 {
        let column = |t: f64| -> usize {
            let ratio = (t / duration).clamp(0.0, 1.0);
            ((ratio * (width - 1) as f64).round() as usize).min(width - 1)
        };
        for item in items {
            let symbol = if item.is_tackle() {
                'x'
            } else if item.is_clip() {
                '='
            } else {
                '•'
            };
            cells[column(item.start_s)] = (symbol, Style::default().fg(category_color(item)));
        }
        cells[column(time_pos)] = ('┃', Style::default().add_modifier(Modifier::BOLD));
    }
    Line::from(
        cells
            .into_iter()
            .map(|(c, style)| Span::styled(c.to_string(), style))
            .collect::<Vec<_>>(),
    )
}

// --- List column ---

/// Search box followed by the note rows, scrolled to keep the selection
/// in view.
pub fn list_lines(app: &App, height: usize) -> Vec<Line<'static>> {
    let search = app.search();
    let focused = app.focus() == Focus::Search;
    let mut search_line = vec![
        Span::styled(
            "/ ",
            if focused {
                Style::default().fg(FOCUS_COLOR)
            } else {
                Style::default().fg(Color::DarkGray)
            },
        ),
        Span::raw(search.query.clone()),
    ];
    if focused {
        search_line.push(Span::raw("█"));
    }
    if !search.query.is_empty() {
        let position = search.cursor.map(|c| c + 1).unwrap_or(0);
        search_line.push(dim(format!("  {position}/{}", search.matches.len())));
    }

    let mut lines = vec![Line::from(search_line)];
    if app.items().is_empty() {
        lines.push(Line::from(dim("No notes yet. n: note  t: tackle")));
        return lines;
    }

    let rows = height.saturating_sub(2).max(1);
    let offset = app
        .selected_index()
        .map(|selected| (selected + 1).saturating_sub(rows))
        .unwrap_or(0);
    let notes_focused = app.focus() == Focus::Notes;
    for (index, item) in app.items().iter().enumerate().skip(offset) {
        let selected = app.selected_index() == Some(index);
        let matched = search.matches.contains(&index);
        let mut spans = vec![
            dim(format!("{:>3} ", index + 1)),
            Span::raw(format!("{} ", format_timestamp(item.start_s))),
            Span::styled(
                format!("[{}] ", item.category),
                Style::default().fg(category_color(item)),
            ),
            Span::raw(item.summary()),
        ];
        if item.starred {
            spans.push(Span::styled(" ★", Style::default().fg(Color::Yellow)));
        }
        let mut line = Line::from(spans);
        if selected {
            line = line.style(if notes_focused {
                Style::default().add_modifier(Modifier::REVERSED)
            } else {
                Style::default().bg(Color::DarkGray)
            });
        } else if matched {
            line = line.style(Style::default().fg(Color::Yellow));
        }
        lines.push(line);
    }
    lines
}

// --- Stats ---

fn stats_header(name_width: usize, sort: StatsSort) -> Line<'static> {
    let columns = [
        (StatsSort::Player, format!("{:<name_width$}", "Player")),
        (StatsSort::Total, format!("{:>4}", "Tot")),
        (StatsSort::Completed, format!("{:>4}", "C")),
        (StatsSort::Missed, format!("{:>4}", "M")),
        (StatsSort::Possible, format!("{:>4}", "P")),
        (StatsSort::Percentage, format!("{:>5}", "%")),
        (StatsSort::Starred, format!("{:>3}", "★")),
    ];
    Line::from(
        columns
            .into_iter()
            .map(|(key, text)| {
                let style = Style::default().add_modifier(Modifier::BOLD);
                if key == sort {
                    Span::styled(text, style.fg(FOCUS_COLOR).add_modifier(Modifier::UNDERLINED))
                } else {
                    Span::styled(text, style)
                }
            })
            .collect::<Vec<_>>(),
    )
}

fn stats_row(stat: &TackleStat, name_width: usize) -> String {
    let name: String = stat.player.chars().take(name_width).collect();
    format!(
        "{name:<name_width$}{:>4}{:>4}{:>4}{:>4}{:>5}{:>3}",
        stat.total,
        stat.completed,
        stat.missed,
        stat.possible,
        stat.percentage_label(),
        stat.starred
    )
}

fn name_width(width: usize) -> usize {
    width.saturating_sub(24).max(6)
}

/// Stats table: header, the pinned TOTAL row, then one row per player.
pub fn stats_table(rows: &[StatsRow], sort: StatsSort, width: usize) -> Vec<Line<'static>> {
    let name_width = name_width(width);
    let total = TackleStat::total(rows.iter().filter(|r| !r.dimmed).map(|r| &r.stat));
    let mut lines = vec![
        stats_header(name_width, sort),
        Line::from(Span::styled(
            stats_row(&total, name_width),
            Style::default().add_modifier(Modifier::BOLD),
        )),
    ];
    for row in rows {
        let text = stats_row(&row.stat, name_width);
        lines.push(if row.dimmed {
            Line::from(dim(text))
        } else {
            Line::from(text)
        });
    }
    lines
}

/// Bar graph of the most frequent categories.
pub fn category_bars(counts: &[CategoryCount], width: usize) -> Vec<Line<'static>> {
    let top = top_categories(counts);
    let max = top.iter().map(|c| c.count).max().unwrap_or(0);
    let label_width = 10;
    let bar_room = width.saturating_sub(label_width + 6).max(1);
    top.iter()
        .map(|c| {
            let len = if max > 0 {
                ((c.count as f64 / max as f64) * bar_room as f64).round().max(1.0) as usize
            } else {
                0
            };
            let label: String = c.category.chars().take(label_width).collect();
            Line::from(vec![
                Span::raw(format!("{label:<label_width$} ")),
                Span::styled("█".repeat(len), Style::default().fg(FOCUS_COLOR)),
                Span::raw(format!(" {}", c.count)),
            ])
        })
        .collect()
}

/// Live stats column for the current video.
pub fn stats_panel_lines(app: &App, width: usize) -> Vec<Line<'static>> {
    let rows: Vec<StatsRow> = app
        .live_stats()
        .iter()
        .cloned()
        .map(|stat| StatsRow { stat, dimmed: false })
        .collect();
    let mut lines = vec![heading("Tackles")];
    lines.extend(stats_table(&rows, app.live_sort(), width));
    lines.push(Line::default());
    lines.push(heading("Categories"));
    if app.categories.is_empty() {
        lines.push(Line::from(dim("none")));
    } else {
        lines.extend(category_bars(&app.categories, width));
    }
    lines
}

/// Full-screen stats with filter input.
pub fn stats_view_lines(app: &App, width: usize) -> Vec<Line<'static>> {
    let view = &app.stats_view;
    let scope = if view.all_videos { "all videos" } else { "this video" };
    let rows = arrange(&app.full_stats, &view.filter, view.sort);
    let mut lines = vec![
        heading(format!("Tackle stats ({scope}), sorted by {}", view.sort.label())),
        Line::from(vec![
            Span::styled("Filter: ", Style::default().fg(FOCUS_COLOR)),
            Span::raw(view.input.clone()),
            Span::raw("█"),
        ]),
        Line::default(),
    ];
    if rows.is_empty() {
        lines.push(Line::from(dim("No tackles recorded")));
    } else {
        lines.extend(stats_table(&rows, view.sort, width));
    }
    lines.push(Line::default());
    lines.push(Line::from(dim(
        "Enter filter  Tab sort  Ctrl+A scope  Ctrl+R reset  Esc close",
    )));
    lines
}

// --- Controls and help ---

const VIDEO_KEYS: &[(&str, &str)] = &[
    ("Space", "play/pause"),
    ("h / l", "seek -/+ step"),
    ("Ctrl+H/L", "frame back/forward"),
    (", / .", "step size"),
    ("[ / ]", "speed"),
    ("\\", "reset speed"),
    ("m", "mute"),
    ("o", "overlay"),
    ("x", "stats sort"),
];

const NOTES_KEYS: &[(&str, &str)] = &[
    ("j / k", "move"),
    ("gg / G", "first / last"),
    ("nG", "go to row n"),
    ("Enter", "seek to note"),
    ("e", "edit tackle"),
    ("x", "delete"),
    ("Ctrl+E", "export clips"),
];

const SEARCH_KEYS: &[(&str, &str)] = &[
    ("type", "filter"),
    ("Tab", "next match"),
    ("Enter", "to list"),
    ("Esc", "clear"),
];

const GLOBAL_KEYS: &[(&str, &str)] = &[
    ("Tab", "focus"),
    ("n / t", "note / tackle"),
    ("s", "stats"),
    (":", "command"),
    ("?", "help"),
    ("Ctrl+C", "quit"),
];

const COMMANDS: &[(&str, &str)] = &[
    ("note add <text>", "note at play head (nn)"),
    ("note list | goto <id>", "list or jump"),
    ("tackle add -p -t -a -o", "quick tackle"),
    ("nt <p> <t> <a> <o>", "tackle shorthand"),
    ("tackle list", "list tackles"),
    ("clip start | end [name]", "record clip (cs / ce)"),
    ("clip list | play <id> | stop", "review clips"),
    ("pause | play | mute", "playback"),
    ("seek <ts> | speed [f]", "position, rate"),
    ("help | quit", ""),
];

fn key_lines(keys: &[(&str, &str)], key_width: usize) -> Vec<Line<'static>> {
    keys.iter()
        .map(|(key, action)| {
            Line::from(vec![
                Span::styled(format!("{key:<key_width$} "), Style::default().fg(FOCUS_COLOR)),
                Span::raw(action.to_string()),
            ])
        })
        .collect()
}

/// Keys for the focused panel, then the global ones.
pub fn controls_lines(focus: Focus) -> Vec<Line<'static>> {
    let (title, keys) = match focus {
        Focus::Video => ("Video", VIDEO_KEYS),
        Focus::Search => ("Search", SEARCH_KEYS),
        Focus::Notes => ("Notes", NOTES_KEYS),
    };
    let mut lines = vec![heading(title)];
    lines.extend(key_lines(keys, 9));
    lines.push(Line::default());
    lines.push(heading("Global"));
    lines.extend(key_lines(GLOBAL_KEYS, 9));
    lines
}

pub fn help_lines() -> Vec<Line<'static>> {
    let mut lines = vec![heading("Video")];
    lines.extend(key_lines(VIDEO_KEYS, 9));
    lines.push(Line::default());
    lines.push(heading("Notes"));
    lines.extend(key_lines(NOTES_KEYS, 9));
    lines.push(Line::default());
    lines.push(heading("Search"));
    lines.extend(key_lines(SEARCH_KEYS, 9));
    lines.push(Line::default());
    lines.push(heading("Global"));
    lines.extend(key_lines(GLOBAL_KEYS, 9));
    lines.push(Line::default());
    lines.push(heading("Commands"));
    lines.extend(key_lines(COMMANDS, 29));
    lines.push(Line::default());
    lines.push(Line::from(dim("Press any key to close")));
    lines
}

// --- Forms ---

fn field_line(active: bool, label: &str, value: String) -> Line<'static> {
    let marker = if active { "> " } else { "  " };
    let label_style = if active {
        Style::default().fg(FOCUS_COLOR).add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };
    let mut spans = vec![
        Span::styled(format!("{marker}{label:<18}"), label_style),
        Span::raw(value),
    ];
    if active {
        spans.push(Span::raw("█"));
    }
    Line::from(spans)
}

fn star_value(starred: bool) -> String {
    if starred { "[★]".to_string() } else { "[ ]".to_string() }
}

pub fn note_form_lines(form: &NoteForm) -> Vec<Line<'static>> {
    vec![
        heading(format!("New note at {}", format_timestamp(form.time_pos))),
        Line::default(),
        field_line(form.field == NoteField::Category, "Category", form.category.clone()),
        field_line(form.field == NoteField::Text, "Text", form.text.clone()),
        field_line(form.field == NoteField::Star, "Star", star_value(form.starred)),
        Line::default(),
        Line::from(dim("Tab next  Enter advance  Ctrl+S save  Esc cancel")),
    ]
}

/// Current value of one wizard step.
pub fn tackle_step_value(form: &TackleForm, step: TackleStep) -> String {
    match step {
        TackleStep::Player => form.player.clone(),
        TackleStep::Team => form.team.clone(),
        TackleStep::Attempt => form.attempt.clone(),
        TackleStep::Outcome => format!("< {} >", form.outcome),
        TackleStep::Followed => form.followed.clone(),
        TackleStep::Notes => form.notes.clone(),
        TackleStep::ZoneHorizontal => form.zone_horizontal.clone(),
        TackleStep::ZoneVertical => form.zone_vertical.clone(),
        TackleStep::Star => star_value(form.starred),
    }
}

pub fn tackle_form_lines(form: &TackleForm) -> Vec<Line<'static>> {
    let title = match form.editing {
        Some(id) => format!("Edit tackle #{id}"),
        None => format!("New tackle at {}", format_timestamp(form.time_pos)),
    };
    let mut lines = vec![heading(title), Line::default()];
    for step in TackleStep::ALL {
        lines.push(field_line(
            form.step == step,
            step.label(),
            tackle_step_value(form, step),
        ));
    }
    lines.push(Line::default());
    if let Some(error) = &form.error {
        lines.push(Line::from(error.clone().red()));
    }
    let hint = match form.step {
        TackleStep::Outcome => "←/→ cycle  c/m/p/o pick  Enter next  Esc cancel",
        TackleStep::Star => "Space toggle  Enter save  Esc cancel",
        _ => "Enter next  Shift+Tab back  Ctrl+S save  Esc cancel",
    };
    lines.push(Line::from(dim(hint)));
    lines
}

pub fn confirm_lines() -> Vec<Line<'static>> {
    vec![
        heading("Discard unsaved changes?"),
        Line::default(),
        Line::from(vec![
            Span::styled("y", Style::default().fg(Color::Red)),
            Span::raw(" discard   "),
            Span::styled("n", Style::default().fg(FOCUS_COLOR)),
            Span::raw(" keep editing"),
        ]),
    ]
}

// --- Clips and export ---

pub fn clips_lines(clips: &[ClipRow], scroll: usize) -> Vec<Line<'static>> {
    let mut lines = vec![heading(format!("Clips ({})", clips.len())), Line::default()];
    if clips.is_empty() {
        lines.push(Line::from(dim("No clips. Use `clip start` and `clip end`.")));
    }
    for clip in clips.iter().skip(scroll) {
        lines.push(Line::from(vec![
            Span::styled(format!("#{:<4}", clip.id), Style::default().fg(Color::Yellow)),
            Span::raw(format!(
                "{}-{} ",
                format_timestamp(clip.start_s),
                format_timestamp(clip.end_s)
            )),
            dim(format!("{:>6.1}s ", clip.duration_s())),
            Span::raw(clip.name.clone()),
        ]));
    }
    lines
}

/// Progress bar with a clip counter.
pub fn export_lines(progress: &ExportProgress, width: usize) -> Vec<Line<'static>> {
    let bar_width = width.saturating_sub(2).max(1);
    let filled = if progress.total == 0 {
        0
    } else {
        progress.current * bar_width / progress.total
    };
    let counter = format!("{}/{} clips", progress.current, progress.total);
    let mut lines = vec![
        heading("Exporting tackle clips"),
        Line::default(),
        Line::from(vec![
            Span::raw("["),
            Span::styled("#".repeat(filled), Style::default().fg(Color::Green)),
            Span::raw(" ".repeat(bar_width - filled)),
            Span::raw("]"),
        ]),
        Line::from(counter),
        Line::default(),
    ];
    match &progress.finished {
        None => lines.push(Line::from(dim("Working..."))),
        Some(Ok(dir)) => {
            lines.push(Line::from(format!("Saved to {}", dir.display()).green()));
            lines.push(Line::from(dim("Enter or Esc to close")));
        }
        Some(Err(message)) => {
            lines.push(Line::from(format!("Failed: {message}").red()));
            lines.push(Line::from(dim("Enter or Esc to close")));
        }
    }
    lines
}

/// Bottom line: command input, banner or a short hint.
pub fn bottom_line(app: &App) -> Line<'static> {
    if app.mode() == super::app::Mode::CommandInput {
        return Line::from(vec![
            Span::styled(":", Style::default().fg(FOCUS_COLOR)),
            Span::raw(app.command_input.clone()),
            Span::raw("█"),
        ]);
    }
    match app.banner() {
        Some(banner) if banner.is_error => Line::from(banner.text.clone().red()),
        Some(banner) => Line::from(banner.text.clone().green()),
        None => Line::from(dim("? help  : command  Tab focus  Ctrl+C quit")),
    }
}
