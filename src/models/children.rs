//! Child rows of the note aggregate.
//!
//! Each type maps onto one `note_*` table. A note is written and rewritten
//! through [`NoteChildren`], which carries a vector per child kind.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

/// Position of a note within its video, in seconds.
///
/// Point events (tackles, plain notes) have `start_s == end_s`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoteTiming {
    pub start_s: f64,
    pub end_s: f64,
}

impl NoteTiming {
    /// Creates a timing covering `start_s..end_s`.
    pub fn new(start_s: f64, end_s: f64) -> Self {
        Self { start_s, end_s }
    }

    /// Creates a zero-length timing for a point event.
    pub fn point(at_s: f64) -> Self {
        Self::new(at_s, at_s)
    }

    /// Returns true when the range is a single instant.
    pub fn is_point(&self) -> bool {
        self.start_s == self.end_s
    }

    /// Returns the length of the range in seconds.
    pub fn duration_s(&self) -> f64 {
        self.end_s - self.start_s
    }

    /// Returns true when `0 <= start_s <= end_s` holds.
    pub fn is_valid(&self) -> bool {
        self.start_s.is_finite()
            && self.end_s.is_finite()
            && self.start_s >= 0.0
            && self.start_s <= self.end_s
    }
}

/// The video a note was captured against, cached at capture time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteVideo {
    pub path: String,
    pub duration_s: f64,
    pub format: String,
}

/// Result of a tackle attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TackleOutcome {
    Completed,
    Missed,
    Possible,
    Other,
}

impl TackleOutcome {
    /// All outcomes in display order.
    pub const ALL: [TackleOutcome; 4] = [
        TackleOutcome::Completed,
        TackleOutcome::Missed,
        TackleOutcome::Possible,
        TackleOutcome::Other,
    ];

    /// Returns the stored string form.
    pub fn as_str(self) -> &'static str {
        match self {
            TackleOutcome::Completed => "completed",
            TackleOutcome::Missed => "missed",
            TackleOutcome::Possible => "possible",
            TackleOutcome::Other => "other",
        }
    }

    /// Returns the next outcome in display order, wrapping around.
    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|o| *o == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }

    /// Returns the previous outcome in display order, wrapping around.
    pub fn previous(self) -> Self {
        let idx = Self::ALL.iter().position(|o| *o == self).unwrap_or(0);
        Self::ALL[(idx + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

impl fmt::Display for TackleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not one of the known outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid outcome '{0}' (expected completed, missed, possible or other)")]
pub struct ParseOutcomeError(pub String);

impl FromStr for TackleOutcome {
    type Err = ParseOutcomeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "completed" => Ok(TackleOutcome::Completed),
            "missed" => Ok(TackleOutcome::Missed),
            "possible" => Ok(TackleOutcome::Possible),
            "other" => Ok(TackleOutcome::Other),
            _ => Err(ParseOutcomeError(s.to_string())),
        }
    }
}

/// Tackle event details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteTackle {
    pub player: String,
    pub team: String,
    pub attempt: i64,
    pub outcome: TackleOutcome,
}

/// Spatial field region a note refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteZone {
    pub horizontal: String,
    pub vertical: String,
}

/// Keyed free-text annotation attached to a note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteDetail {
    #[serde(rename = "type")]
    pub kind: String,
    pub body: String,
}

impl NoteDetail {
    pub const TEXT: &'static str = "text";
    pub const FOLLOWED: &'static str = "followed";
    pub const NOTES: &'static str = "notes";

    pub fn new(kind: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            body: body.into(),
        }
    }
}

/// Tag attached to a note, such as `star`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteHighlight {
    #[serde(rename = "type")]
    pub kind: String,
}

impl NoteHighlight {
    pub const STAR: &'static str = "star";

    pub fn star() -> Self {
        Self {
            kind: Self::STAR.to_string(),
        }
    }
}

/// Export bookkeeping for a `clip` note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteClip {
    pub name: String,
    pub duration_s: f64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub started_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub finished_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub error_at: Option<OffsetDateTime>,
    pub error_text: Option<String>,
}

impl NoteClip {
    /// Creates a clip row with no export history.
    pub fn named(name: impl Into<String>, duration_s: f64) -> Self {
        Self {
            name: name.into(),
            duration_s,
            started_at: None,
            finished_at: None,
            error_at: None,
            error_text: None,
        }
    }
}

/// Child rows written together with a note.
///
/// Used both for the atomic insert and for the rewrite-on-edit path, where
/// only `details`, `zones`, `highlights` and `tackles` are replaced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteChildren {
    pub timings: Vec<NoteTiming>,
    pub videos: Vec<NoteVideo>,
    pub tackles: Vec<NoteTackle>,
    pub zones: Vec<NoteZone>,
    pub details: Vec<NoteDetail>,
    pub highlights: Vec<NoteHighlight>,
    pub clips: Vec<NoteClip>,
}
