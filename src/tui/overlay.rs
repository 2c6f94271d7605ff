//! On-video overlay of notes near the play head.

use crate::config::OVERLAY_WINDOW_S;
use crate::models::NoteItem;

const ASS_HEADER: &str = "{\\an7}{\\fs22}{\\bord2}{\\3c&H000000&}";
const ASS_TAG: &str = "{\\1c&H00D7FF&}";
const ASS_RESET: &str = "{\\1c&HFFFFFF&}";

/// Non-tackle notes whose start lies within the overlay window before
/// `time_pos`.
pub fn visible_notes(items: &[NoteItem], time_pos: f64) -> Vec<&NoteItem> {
    items
        .iter()
        .filter(|item| !item.is_tackle())
        .filter(|item| item.start_s <= time_pos && time_pos <= item.start_s + OVERLAY_WINDOW_S)
        .collect()
}

/// Display string for one note: category tag, player/team, body.
pub fn overlay_text(item: &NoteItem) -> String {
    let mut parts = vec![format!("[{}]", item.category.to_uppercase())];
    match (item.player.as_deref(), item.team.as_deref()) {
        (Some(player), Some(team)) if !team.is_empty() => parts.push(format!("{player}/{team}")),
        (Some(player), _) if !player.is_empty() => parts.push(player.to_string()),
        _ => {}
    }
    if !item.text.is_empty() {
        parts.push(item.text.clone());
    }
    parts.join(" ")
}

/// Builds the styled payload, `None` when nothing is visible.
pub fn overlay_payload(items: &[&NoteItem]) -> Option<String> {
    if items.is_empty() {
        return None;
    }
    let lines: Vec<String> = items
        .iter()
        .map(|item| {
            let text = escape(&overlay_text(item));
            match text.split_once(' ') {
                Some((tag, rest)) => format!("{ASS_TAG}{tag}{ASS_RESET} {rest}"),
                None => format!("{ASS_TAG}{text}{ASS_RESET}"),
            }
        })
        .collect();
    Some(format!("{ASS_HEADER}{}", lines.join("\\N")))
}

fn escape(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '{' => '(',
            '}' => ')',
            '\\' => '/',
            '\n' | '\r' => ' ',
            other => other,
        })
        .collect()
}
