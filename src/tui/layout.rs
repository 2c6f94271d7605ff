//! Column allocation and fixed-size text containers.
//!
//! Views produce unbounded lists of styled lines; [`Container`] packs them
//! into an exact `width x height` block measured in display cells, so wide
//! graphemes (emoji, CJK) never push a column out of alignment.

use ratatui::style::Style;
use ratatui::text::{Line, Span};

/// Width of the status column and the controls column.
pub const FIXED_COLUMN_WIDTH: u16 = 30;
/// Smallest width at which the controls column is shown.
pub const CONTROLS_MIN_TERMINAL_WIDTH: u16 = 170;
/// Minimum width of the list and stats columns.
pub const MIN_FLEX_WIDTH: u16 = 30;
/// Target width ratio of list : stats.
pub const FLEX_RATIO: (u16, u16) = (80, 60);
/// Replaces the last visible line when content overflows.
pub const MORE_SENTINEL: &str = "↓ More...";

/// Widths of the visible columns. A separator cell sits between neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Columns {
    pub status: u16,
    pub list: Option<u16>,
    pub stats: Option<u16>,
    pub controls: Option<u16>,
}

impl Columns {
    /// Widths in left-to-right order.
    pub fn widths(&self) -> Vec<u16> {
        [Some(self.status), self.list, self.stats, self.controls]
            .into_iter()
            .flatten()
            .collect()
    }

    /// Total cells used, separators included.
    pub fn total_width(&self) -> u16 {
        let widths = self.widths();
        widths.iter().sum::<u16>() + widths.len().saturating_sub(1) as u16
    }
}

/// Allocates columns for a terminal `width` cells wide.
///
/// # Examples
///
/// ```
/// use tagging_rugby::tui::layout::allocate_columns;
///
/// let wide = allocate_columns(200);
/// assert_eq!(wide.status, 30);
/// assert_eq!(wide.controls, Some(30));
/// assert_eq!(wide.total_width(), 200);
///
/// let narrow = allocate_columns(80);
/// assert_eq!(narrow.list, Some(49));
/// assert_eq!(narrow.stats, None);
/// ```
pub fn allocate_columns(width: u16) -> Columns {
    let status = width.min(FIXED_COLUMN_WIDTH);
    let controls = (width >= CONTROLS_MIN_TERMINAL_WIDTH).then_some(FIXED_COLUMN_WIDTH);

    let mut available = width - status;
    if let Some(controls) = controls {
        available -= controls + 1;
    }

    let (list, stats) = if available >= 2 * MIN_FLEX_WIDTH + 2 {
        let flex = available - 2;
        let (list_ratio, stats_ratio) = FLEX_RATIO;
        let target_list = (u32::from(flex) * u32::from(list_ratio)
            / u32::from(list_ratio + stats_ratio)) as u16;
        let stats = (flex - target_list).max(MIN_FLEX_WIDTH);
        let list = flex - stats;
        (Some(list), Some(stats))
    } else if available >= MIN_FLEX_WIDTH + 1 {
        (Some(available - 1), None)
    } else {
        (None, None)
    };

    Columns {
        status,
        list,
        stats,
        controls,
    }
}

/// Fixed-size block of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Container {
    pub width: u16,
    pub height: u16,
}

impl Container {
    pub fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }

    /// Returns exactly `height` lines, each exactly `width` cells wide.
    ///
    /// Overflowing content keeps the first `height - 1` lines and ends with
    /// [`MORE_SENTINEL`].
    pub fn render(&self, lines: Vec<Line<'_>>) -> Vec<Line<'static>> {
        let width = usize::from(self.width);
        let height = usize::from(self.height);
        let overflow = lines.len() > height;
        let keep = if overflow { height.saturating_sub(1) } else { lines.len() };

        let mut out: Vec<Line<'static>> = lines
            .into_iter()
            .take(keep)
            .map(|line| fit_line(&line, width))
            .collect();
        if overflow && height > 0 {
            out.push(fit_line(
                &Line::styled(MORE_SENTINEL, Style::default()),
                width,
            ));
        }
        while out.len() < height {
            out.push(fit_line(&Line::default(), width));
        }
        out
    }
}

/// Truncates or pads a line to exactly `width` display cells.
///
/// A wide grapheme that would straddle the edge is dropped and the gap is
/// filled with spaces.
pub fn fit_line(line: &Line<'_>, width: usize) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::with_capacity(line.spans.len() + 1);
    let mut used = 0;

    'spans: for span in &line.spans {
        let mut text = String::new();
        for grapheme in span.styled_graphemes(Style::default()) {
            let cells = Span::raw(grapheme.symbol).width();
            if used + cells > width {
                if !text.is_empty() {
                    spans.push(Span::styled(text, span.style));
                }
                break 'spans;
            }
            text.push_str(grapheme.symbol);
            used += cells;
        }
        if !text.is_empty() {
            spans.push(Span::styled(text, span.style));
        }
    }

    if used < width {
        spans.push(Span::raw(" ".repeat(width - used)));
    }
    Line::from(spans).style(line.style)
}
