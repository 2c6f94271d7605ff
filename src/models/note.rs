use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::{NoteId, TackleOutcome};

/// Root of the note aggregate.
///
/// `category` is an open vocabulary; [`Note::NOTE`], [`Note::TACKLE`] and
/// [`Note::CLIP`] select the shape of the child rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub category: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Note {
    pub const NOTE: &'static str = "note";
    pub const TACKLE: &'static str = "tackle";
    pub const CLIP: &'static str = "clip";

    pub fn is_tackle(&self) -> bool {
        self.category == Self::TACKLE
    }
}

/// Flattened view of a note as shown in the list.
///
/// Built by a single joined query so the list, search, overlay and
/// timeline can all work from the same rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteItem {
    pub id: NoteId,
    pub category: String,
    pub start_s: f64,
    pub end_s: f64,
    /// Main text: the `text` detail for notes, the name for clips.
    pub text: String,
    pub player: Option<String>,
    pub team: Option<String>,
    pub attempt: Option<i64>,
    pub outcome: Option<TackleOutcome>,
    pub starred: bool,
}

impl NoteItem {
    pub fn is_tackle(&self) -> bool {
        self.category == Note::TACKLE
    }

    pub fn is_clip(&self) -> bool {
        self.category == Note::CLIP
    }

    /// One-line summary without the timestamp.
    pub fn summary(&self) -> String {
        if self.is_tackle() {
            let player = self.player.as_deref().unwrap_or("?");
            let outcome = self.outcome.map(TackleOutcome::as_str).unwrap_or("?");
            match self.team.as_deref().filter(|t| !t.is_empty()) {
                Some(team) => format!("{player} ({team}) {outcome}"),
                None => format!("{player} {outcome}"),
            }
        } else {
            self.text.clone()
        }
    }

    /// Lowercased text the incremental search matches against.
    pub fn search_text(&self) -> String {
        let mut text = format!("{} {}", self.category, self.summary());
        if self.is_tackle() && !self.text.is_empty() {
            text.push(' ');
            text.push_str(&self.text);
        }
        text.to_lowercase()
    }
}

/// A tackle joined with its timing, as needed by the clip exporter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TackleClipSource {
    pub note_id: NoteId,
    pub player: String,
    pub start_s: f64,
    pub end_s: f64,
    pub video_path: String,
}
