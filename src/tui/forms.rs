//! Note and tackle entry forms.
//!
//! Forms own their field values, so pushing a confirmation dialog above a
//! form and popping it again leaves every field and the current step intact.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::models::{
    Note, NoteChildren, NoteDetail, NoteHighlight, NoteId, NoteTackle, NoteTiming, NoteVideo,
    NoteZone, TackleOutcome,
};

/// What a keystroke asks of the enclosing loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormAction {
    None,
    Submit,
    Cancel,
}

fn is_submit(key: &KeyEvent) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL) && matches!(key.code, KeyCode::Char('s' | 'S'))
}

fn is_text_input(key: &KeyEvent) -> bool {
    matches!(key.code, KeyCode::Char(_))
        && !key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
}

fn edit_text(value: &mut String, key: &KeyEvent) -> bool {
    match key.code {
        KeyCode::Char(c) if is_text_input(key) => {
            value.push(c);
            true
        }
        KeyCode::Backspace => {
            value.pop();
            true
        }
        _ => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteField {
    Category,
    Text,
    Star,
}

/// Free-form note captured at a point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteForm {
    pub category: String,
    pub text: String,
    pub starred: bool,
    pub field: NoteField,
    pub time_pos: f64,
}

impl NoteForm {
    pub fn new(time_pos: f64) -> Self {
        Self {
            category: Note::NOTE.to_string(),
            text: String::new(),
            starred: false,
            field: NoteField::Text,
            time_pos,
        }
    }

    /// True if anything differs from a freshly opened form.
    pub fn is_dirty(&self) -> bool {
        !self.text.trim().is_empty() || self.starred || self.category.trim() != Note::NOTE
    }

    /// Category to save under; blank means `note`.
    pub fn category(&self) -> &str {
        match self.category.trim() {
            "" => Note::NOTE,
            category => category,
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> FormAction {
        if is_submit(&key) {
            return FormAction::Submit;
        }
        match key.code {
            KeyCode::Esc => return FormAction::Cancel,
            KeyCode::Tab | KeyCode::Down => self.field = self.next_field(),
            KeyCode::BackTab | KeyCode::Up => self.field = self.previous_field(),
            KeyCode::Enter => {
                if self.field == NoteField::Star {
                    return FormAction::Submit;
                }
                self.field = self.next_field();
            }
            _ => match self.field {
                NoteField::Category => {
                    edit_text(&mut self.category, &key);
                }
                NoteField::Text => {
                    edit_text(&mut self.text, &key);
                }
                NoteField::Star => {
                    if matches!(key.code, KeyCode::Char(' ' | 'y' | 'Y' | 'n' | 'N' | 's' | 'S')) {
                        self.starred = match key.code {
                            KeyCode::Char('y' | 'Y') => true,
                            KeyCode::Char('n' | 'N') => false,
                            _ => !self.starred,
                        };
                    }
                }
            },
        }
        FormAction::None
    }

    fn next_field(&self) -> NoteField {
        match self.field {
            NoteField::Category => NoteField::Text,
            NoteField::Text => NoteField::Star,
            NoteField::Star => NoteField::Category,
        }
    }

    fn previous_field(&self) -> NoteField {
        match self.field {
            NoteField::Category => NoteField::Star,
            NoteField::Text => NoteField::Category,
            NoteField::Star => NoteField::Text,
        }
    }

    /// Builds the children for a new note on `video`.
    pub fn to_children(&self, video: NoteVideo) -> NoteChildren {
        let mut children = NoteChildren {
            timings: vec![NoteTiming::point(self.time_pos)],
            videos: vec![video],
            ..NoteChildren::default()
        };
        let text = self.text.trim();
        if !text.is_empty() {
            children.details.push(NoteDetail::new(NoteDetail::TEXT, text));
        }
        if self.starred {
            children.highlights.push(NoteHighlight::star());
        }
        children
    }
}

/// Steps of the tackle wizard, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TackleStep {
    Player,
    Team,
    Attempt,
    Outcome,
    Followed,
    Notes,
    ZoneHorizontal,
    ZoneVertical,
    Star,
}

impl TackleStep {
    pub const ALL: [TackleStep; 9] = [
        TackleStep::Player,
        TackleStep::Team,
        TackleStep::Attempt,
        TackleStep::Outcome,
        TackleStep::Followed,
        TackleStep::Notes,
        TackleStep::ZoneHorizontal,
        TackleStep::ZoneVertical,
        TackleStep::Star,
    ];

    fn index(self) -> usize {
        Self::ALL.iter().position(|s| *s == self).unwrap_or(0)
    }

    pub fn label(self) -> &'static str {
        match self {
            TackleStep::Player => "Player",
            TackleStep::Team => "Team",
            TackleStep::Attempt => "Attempt",
            TackleStep::Outcome => "Outcome",
            TackleStep::Followed => "Followed by",
            TackleStep::Notes => "Notes",
            TackleStep::ZoneHorizontal => "Zone (horizontal)",
            TackleStep::ZoneVertical => "Zone (vertical)",
            TackleStep::Star => "Star",
        }
    }

    pub fn is_last(self) -> bool {
        self == TackleStep::Star
    }
}

/// Multi-step tackle entry, also used to edit an existing tackle.
#[derive(Debug, Clone, PartialEq)]
pub struct TackleForm {
    pub player: String,
    pub team: String,
    pub attempt: String,
    pub outcome: TackleOutcome,
    pub followed: String,
    pub notes: String,
    pub zone_horizontal: String,
    pub zone_vertical: String,
    pub starred: bool,
    pub step: TackleStep,
    pub time_pos: f64,
    /// Set when editing an existing note.
    pub editing: Option<NoteId>,
    /// Details and highlights of kinds this form does not edit, written
    /// back unchanged.
    pub kept_details: Vec<NoteDetail>,
    pub kept_highlights: Vec<NoteHighlight>,
    /// Validation message for the current step.
    pub error: Option<String>,
}

impl TackleForm {
    pub fn new(time_pos: f64) -> Self {
        Self {
            player: String::new(),
            team: String::new(),
            attempt: "1".to_string(),
            outcome: TackleOutcome::Completed,
            followed: String::new(),
            notes: String::new(),
            zone_horizontal: String::new(),
            zone_vertical: String::new(),
            starred: false,
            step: TackleStep::Player,
            time_pos,
            editing: None,
            kept_details: Vec::new(),
            kept_highlights: Vec::new(),
            error: None,
        }
    }

    /// Loads an existing tackle for editing.
    pub fn from_existing(note_id: NoteId, children: &NoteChildren) -> Self {
        let time_pos = children.timings.first().map(|t| t.start_s).unwrap_or(0.0);
        let mut form = Self::new(time_pos);
        form.editing = Some(note_id);
        if let Some(tackle) = children.tackles.first() {
            form.player = tackle.player.clone();
            form.team = tackle.team.clone();
            form.attempt = tackle.attempt.to_string();
            form.outcome = tackle.outcome;
        }
        let detail = |kind: &str| {
            children
                .details
                .iter()
                .find(|d| d.kind == kind)
                .map(|d| d.body.clone())
                .unwrap_or_default()
        };
        form.followed = detail(NoteDetail::FOLLOWED);
        form.notes = detail(NoteDetail::NOTES);
        if let Some(zone) = children.zones.first() {
            form.zone_horizontal = zone.horizontal.clone();
            form.zone_vertical = zone.vertical.clone();
        }
        form.starred = children
            .highlights
            .iter()
            .any(|h| h.kind == NoteHighlight::STAR);
        form.kept_details = children
            .details
            .iter()
            .filter(|d| d.kind != NoteDetail::FOLLOWED && d.kind != NoteDetail::NOTES)
            .cloned()
            .collect();
        form.kept_highlights = children
            .highlights
            .iter()
            .filter(|h| h.kind != NoteHighlight::STAR)
            .cloned()
            .collect();
        form
    }

    pub fn is_dirty(&self) -> bool {
        self.editing.is_some()
            || [
                &self.player,
                &self.team,
                &self.followed,
                &self.notes,
                &self.zone_horizontal,
                &self.zone_vertical,
            ]
            .iter()
            .any(|v| !v.trim().is_empty())
            || self.attempt.trim() != "1"
            || self.outcome != TackleOutcome::Completed
            || self.starred
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> FormAction {
        if is_submit(&key) {
            return self.try_submit();
        }
        match key.code {
            KeyCode::Esc => return FormAction::Cancel,
            KeyCode::Enter | KeyCode::Tab => {
                if let Err(message) = self.validate_step(self.step) {
                    self.error = Some(message);
                    return FormAction::None;
                }
                self.error = None;
                if self.step.is_last() {
                    return self.try_submit();
                }
                self.step = TackleStep::ALL[self.step.index() + 1];
            }
            KeyCode::BackTab | KeyCode::Up => {
                self.error = None;
                self.step = TackleStep::ALL[self.step.index().saturating_sub(1)];
            }
            _ => self.edit_step(key),
        }
        FormAction::None
    }

    fn edit_step(&mut self, key: KeyEvent) {
        match self.step {
            TackleStep::Player => {
                edit_text(&mut self.player, &key);
            }
            TackleStep::Team => {
                edit_text(&mut self.team, &key);
            }
            TackleStep::Attempt => {
                if matches!(key.code, KeyCode::Char(c) if c.is_ascii_digit())
                    || key.code == KeyCode::Backspace
                {
                    edit_text(&mut self.attempt, &key);
                }
            }
            TackleStep::Outcome => {
                self.outcome = match key.code {
                    KeyCode::Left | KeyCode::Char('h') => self.outcome.previous(),
                    KeyCode::Right | KeyCode::Char('l' | ' ') => self.outcome.next(),
                    KeyCode::Char('c') => TackleOutcome::Completed,
                    KeyCode::Char('m') => TackleOutcome::Missed,
                    KeyCode::Char('p') => TackleOutcome::Possible,
                    KeyCode::Char('o') => TackleOutcome::Other,
                    _ => self.outcome,
                };
            }
            TackleStep::Followed => {
                edit_text(&mut self.followed, &key);
            }
            TackleStep::Notes => {
                edit_text(&mut self.notes, &key);
            }
            TackleStep::ZoneHorizontal => {
                edit_text(&mut self.zone_horizontal, &key);
            }
            TackleStep::ZoneVertical => {
                edit_text(&mut self.zone_vertical, &key);
            }
            TackleStep::Star => {
                if matches!(key.code, KeyCode::Char(' ' | 's' | 'S')) {
                    self.starred = !self.starred;
                } else if matches!(key.code, KeyCode::Char('y' | 'Y')) {
                    self.starred = true;
                } else if matches!(key.code, KeyCode::Char('n' | 'N')) {
                    self.starred = false;
                }
            }
        }
    }

    fn validate_step(&self, step: TackleStep) -> Result<(), String> {
        match step {
            TackleStep::Player if self.player.trim().is_empty() => {
                Err("player is required".to_string())
            }
            TackleStep::Attempt => self.attempt_number().map(|_| ()),
            _ => Ok(()),
        }
    }

    fn attempt_number(&self) -> Result<i64, String> {
        match self.attempt.trim().parse::<i64>() {
            Ok(n) if n >= 1 => Ok(n),
            _ => Err("attempt must be a number of at least 1".to_string()),
        }
    }

    fn try_submit(&mut self) -> FormAction {
        for step in TackleStep::ALL {
            if let Err(message) = self.validate_step(step) {
                self.step = step;
                self.error = Some(message);
                return FormAction::None;
            }
        }
        self.error = None;
        FormAction::Submit
    }

    /// The tackle row described by the form.
    pub fn tackle(&self) -> Result<NoteTackle, String> {
        self.validate_step(TackleStep::Player)?;
        Ok(NoteTackle {
            player: self.player.trim().to_string(),
            team: self.team.trim().to_string(),
            attempt: self.attempt_number()?,
            outcome: self.outcome,
        })
    }

    /// Children replaced by an edit: tackle, details, zone and highlight.
    pub fn editable_children(&self) -> Result<NoteChildren, String> {
        let mut children = NoteChildren {
            tackles: vec![self.tackle()?],
            ..NoteChildren::default()
        };
        let followed = self.followed.trim();
        if !followed.is_empty() {
            children.details.push(NoteDetail::new(NoteDetail::FOLLOWED, followed));
        }
        let notes = self.notes.trim();
        if !notes.is_empty() {
            children.details.push(NoteDetail::new(NoteDetail::NOTES, notes));
        }
        let (h, v) = (self.zone_horizontal.trim(), self.zone_vertical.trim());
        if !h.is_empty() || !v.is_empty() {
            children.zones.push(NoteZone {
                horizontal: h.to_string(),
                vertical: v.to_string(),
            });
        }
        if self.starred {
            children.highlights.push(NoteHighlight::star());
        }
        children.details.extend(self.kept_details.iter().cloned());
        children.highlights.extend(self.kept_highlights.iter().cloned());
        Ok(children)
    }

    /// Full children for a new tackle note on `video`.
    pub fn to_children(&self, video: NoteVideo) -> Result<NoteChildren, String> {
        let mut children = self.editable_children()?;
        children.timings.push(NoteTiming::point(self.time_pos));
        children.videos.push(video);
        Ok(children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text<F: FnMut(KeyEvent) -> FormAction>(mut send: F, text: &str) {
        for c in text.chars() {
            send(key(KeyCode::Char(c)));
        }
    }

    fn video() -> NoteVideo {
        NoteVideo {
            path: "/v/match.mp4".into(),
            duration_s: 600.0,
            format: "mp4".into(),
        }
    }

    #[test]
    fn note_form_starts_clean_and_tracks_edits() {
        let mut form = NoteForm::new(12.0);
        assert!(!form.is_dirty());

        type_text(|k| form.handle_key(k), "Good line speed");
        assert!(form.is_dirty());
        assert_eq!(form.text, "Good line speed");

        assert_eq!(form.handle_key(key(KeyCode::Enter)), FormAction::None);
        assert_eq!(form.field, NoteField::Star);
        form.handle_key(key(KeyCode::Char(' ')));
        assert!(form.starred);
        assert_eq!(form.handle_key(key(KeyCode::Enter)), FormAction::Submit);

        let children = form.to_children(video());
        assert_eq!(children.timings, vec![NoteTiming::point(12.0)]);
        assert_eq!(children.details[0].body, "Good line speed");
        assert_eq!(children.highlights, vec![NoteHighlight::star()]);
    }

    #[test]
    fn note_form_category_defaults_to_note() {
        let mut form = NoteForm::new(0.0);
        form.handle_key(key(KeyCode::BackTab));
        assert_eq!(form.field, NoteField::Category);
        for _ in 0..4 {
            form.handle_key(key(KeyCode::Backspace));
        }
        assert_eq!(form.category(), "note");
        type_text(|k| form.handle_key(k), "ruck");
        assert_eq!(form.category(), "ruck");
        assert!(form.is_dirty());
    }

    #[test]
    fn tackle_wizard_requires_player_before_advancing() {
        let mut form = TackleForm::new(72.5);
        assert!(!form.is_dirty());

        form.handle_key(key(KeyCode::Enter));
        assert_eq!(form.step, TackleStep::Player);
        assert!(form.error.is_some());

        type_text(|k| form.handle_key(k), "Smith");
        form.handle_key(key(KeyCode::Enter));
        assert_eq!(form.step, TackleStep::Team);
        assert!(form.error.is_none());
    }

    #[test]
    fn tackle_wizard_walks_every_step_to_submit() {
        let mut form = TackleForm::new(72.5);
        type_text(|k| form.handle_key(k), "Smith");
        let mut last = FormAction::None;
        for _ in 0..TackleStep::ALL.len() {
            last = form.handle_key(key(KeyCode::Enter));
        }
        assert_eq!(last, FormAction::Submit);

        let children = form.to_children(video()).unwrap();
        assert_eq!(
            children.tackles,
            vec![NoteTackle {
                player: "Smith".into(),
                team: String::new(),
                attempt: 1,
                outcome: TackleOutcome::Completed,
            }]
        );
        assert_eq!(children.timings, vec![NoteTiming::point(72.5)]);
        assert!(children.zones.is_empty() && children.details.is_empty());
    }

    #[test]
    fn attempt_accepts_digits_only() {
        let mut form = TackleForm::new(0.0);
        form.step = TackleStep::Attempt;
        form.handle_key(key(KeyCode::Backspace));
        type_text(|k| form.handle_key(k), "x0");
        assert_eq!(form.attempt, "0");
        form.handle_key(key(KeyCode::Enter));
        assert_eq!(form.step, TackleStep::Attempt);
        assert!(form.error.is_some());
    }

    #[test]
    fn submit_shortcut_jumps_to_first_invalid_step() {
        let mut form = TackleForm::new(0.0);
        form.step = TackleStep::Star;
        let ctrl_s = KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL);
        assert_eq!(form.handle_key(ctrl_s), FormAction::None);
        assert_eq!(form.step, TackleStep::Player);

        form.player = "Jones".into();
        assert_eq!(form.handle_key(ctrl_s), FormAction::Submit);
    }

    #[test]
    fn outcome_step_cycles_and_selects_by_letter() {
        let mut form = TackleForm::new(0.0);
        form.step = TackleStep::Outcome;
        form.handle_key(key(KeyCode::Right));
        assert_eq!(form.outcome, TackleOutcome::Missed);
        form.handle_key(key(KeyCode::Char('o')));
        assert_eq!(form.outcome, TackleOutcome::Other);
        form.handle_key(key(KeyCode::Left));
        assert_eq!(form.outcome, TackleOutcome::Possible);
    }

    #[test]
    fn existing_tackle_loads_into_form() {
        let children = NoteChildren {
            timings: vec![NoteTiming::point(30.0)],
            tackles: vec![NoteTackle {
                player: "Doe".into(),
                team: "Blues".into(),
                attempt: 2,
                outcome: TackleOutcome::Missed,
            }],
            details: vec![
                NoteDetail::new(NoteDetail::FOLLOWED, "offload"),
                NoteDetail::new(NoteDetail::NOTES, "high"),
            ],
            zones: vec![NoteZone {
                horizontal: "left".into(),
                vertical: "22".into(),
            }],
            highlights: vec![NoteHighlight::star()],
            ..NoteChildren::default()
        };
        let form = TackleForm::from_existing(NoteId::new(9), &children);
        assert_eq!(form.editing, Some(NoteId::new(9)));
        assert_eq!(form.time_pos, 30.0);
        assert!(form.is_dirty());

        let rebuilt = form.editable_children().unwrap();
        assert_eq!(rebuilt.tackles, children.tackles);
        assert_eq!(rebuilt.details, children.details);
        assert_eq!(rebuilt.zones, children.zones);
        assert_eq!(rebuilt.highlights, children.highlights);
    }

    #[test]
    fn editing_keeps_details_the_form_does_not_show() {
        let children = NoteChildren {
            timings: vec![NoteTiming::point(12.0)],
            tackles: vec![NoteTackle {
                player: "Jones".into(),
                team: String::new(),
                attempt: 1,
                outcome: TackleOutcome::Missed,
            }],
            details: vec![
                NoteDetail::new(NoteDetail::NOTES, "late"),
                NoteDetail::new("referee", "penalty advantage"),
            ],
            highlights: vec![NoteHighlight {
                kind: "review".into(),
            }],
            ..NoteChildren::default()
        };
        let mut form = TackleForm::from_existing(NoteId::new(4), &children);
        form.notes = "very late".into();
        form.starred = true;

        let rebuilt = form.editable_children().unwrap();
        assert_eq!(
            rebuilt.details,
            vec![
                NoteDetail::new(NoteDetail::NOTES, "very late"),
                NoteDetail::new("referee", "penalty advantage"),
            ]
        );
        assert_eq!(
            rebuilt.highlights,
            vec![
                NoteHighlight::star(),
                NoteHighlight {
                    kind: "review".into()
                },
            ]
        );
    }
}
