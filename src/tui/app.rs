use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use super::command::ClipRow;
use super::forms::{NoteForm, TackleForm};
use super::message::{Cmd, Msg};
use super::overlay::{overlay_payload, visible_notes};
use super::stats::{StatsSort, StatsView, sort_stats};
use crate::config::{RESULT_DISPLAY_DURATION, TICK_INTERVAL};
use crate::export::{ClipEncoder, ExportMessage, prepare_export, spawn_export};
use crate::models::{CategoryCount, NoteId, NoteItem, NoteVideo, TackleStat};
use crate::mpv::{NOTE_OVERLAY_ID, PlayerControl, PlayerError};
use crate::repository::NoteRepository;
use crate::utils::{format_timestamp, video_format};

/// Seek step sizes in seconds, cycled with `,` and `.`.
pub const STEP_SIZES: [f64; 7] = [0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0];
/// Playback speeds, cycled with `[` and `]`.
pub const SPEEDS: [f64; 6] = [0.5, 0.75, 1.0, 1.25, 1.5, 2.0];
const DEFAULT_STEP_INDEX: usize = 2;

/// Panel receiving keys while no modal is open.
///
/// Tab order: `Video` -> `Search` -> `Notes` -> `Video`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    /// Playback keys.
    Video,
    /// Typing edits the incremental search query.
    Search,
    /// List navigation and mutation.
    Notes,
}

/// One layer of the modal stack. `Main` is always at the bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Main,
    Help,
    Stats,
    NoteForm,
    TackleForm,
    ConfirmDiscard,
    CommandInput,
    ClipsView,
    ExportProgress,
}

/// Last known player state. Fields keep their previous value when a poll
/// fails.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerStatus {
    pub paused: bool,
    pub muted: bool,
    pub time_pos: f64,
    pub duration: f64,
    pub speed: f64,
}

impl Default for PlayerStatus {
    fn default() -> Self {
        Self {
            paused: false,
            muted: false,
            time_pos: 0.0,
            duration: 0.0,
            speed: 1.0,
        }
    }
}

/// Incremental search over the note list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchState {
    pub query: String,
    /// Indices of matching list rows, in list order.
    pub matches: Vec<usize>,
    /// Position in `matches` selected by the last Tab.
    pub cursor: Option<usize>,
}

/// Export progress shown in the progress overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportProgress {
    pub current: usize,
    pub total: usize,
    /// `Ok(output_dir)` on completion, `Err(message)` on failure.
    pub finished: Option<Result<PathBuf, String>>,
}

impl ExportProgress {
    pub fn is_running(&self) -> bool {
        self.finished.is_none()
    }
}

/// Transient message in the bottom line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    pub text: String,
    pub is_error: bool,
}

/// Model of the event loop.
///
/// Every state change happens inside [`App::update`]; I/O the model cannot
/// perform inline is returned as a [`Cmd`].
pub struct App {
    pub(super) repo: NoteRepository,
    pub(super) player: Box<dyn PlayerControl>,
    pub(super) encoder: Arc<dyn ClipEncoder>,
    pub(super) encoder_name: String,
    pub(super) video: PathBuf,
    pub(super) video_key: String,
    pub(super) video_format: String,
    pub(super) status: PlayerStatus,
    pub(super) player_error: Option<String>,
    duration_saved: bool,
    pub(super) items: Vec<NoteItem>,
    pub(super) selected: usize,
    pub(super) focus: Focus,
    pub(super) modes: Vec<Mode>,
    pub(super) search: SearchState,
    pub(super) number_buffer: String,
    pub(super) pending_g: bool,
    pub(super) step_index: usize,
    pub(super) overlay_enabled: bool,
    pub(super) overlay_payload: Option<String>,
    pub(super) live_stats: Vec<TackleStat>,
    pub(super) live_sort: StatsSort,
    pub(super) categories: Vec<CategoryCount>,
    pub(super) stats_view: StatsView,
    pub(super) full_stats: Vec<TackleStat>,
    pub(super) note_form: Option<NoteForm>,
    pub(super) tackle_form: Option<TackleForm>,
    pub(super) command_input: String,
    pub(super) clip_start: Option<f64>,
    pub(super) banner: Option<Banner>,
    banner_generation: u64,
    pub(super) clips: Vec<ClipRow>,
    pub(super) clips_scroll: usize,
    pub(super) export: Option<ExportProgress>,
    pub(super) size: (u16, u16),
}

impl App {
    /// Creates the model for one video and registers the video in the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the video cannot be registered or its notes
    /// cannot be loaded.
    pub fn new(
        repo: NoteRepository,
        player: Box<dyn PlayerControl>,
        encoder: Arc<dyn ClipEncoder>,
        encoder_name: impl Into<String>,
        video: impl Into<PathBuf>,
    ) -> Result<Self> {
        let video = video.into();
        let video_key = video.to_string_lossy().into_owned();
        let format = video_format(&video);
        let size = std::fs::metadata(&video).map(|m| m.len() as i64).unwrap_or(0);
        repo.upsert_video(&video_key, 0.0, &format, size)
            .context("Failed to register video")?;

        let mut app = Self {
            repo,
            player,
            encoder,
            encoder_name: encoder_name.into(),
            video,
            video_key,
            video_format: format,
            status: PlayerStatus::default(),
            player_error: None,
            duration_saved: false,
            items: Vec::new(),
            selected: 0,
            focus: Focus::Video,
            modes: vec![Mode::Main],
            search: SearchState::default(),
            number_buffer: String::new(),
            pending_g: false,
            step_index: DEFAULT_STEP_INDEX,
            overlay_enabled: false,
            overlay_payload: None,
            live_stats: Vec::new(),
            live_sort: StatsSort::default(),
            categories: Vec::new(),
            stats_view: StatsView::default(),
            full_stats: Vec::new(),
            note_form: None,
            tackle_form: None,
            command_input: String::new(),
            clip_start: None,
            banner: None,
            banner_generation: 0,
            clips: Vec::new(),
            clips_scroll: 0,
            export: None,
            size: (0, 0),
        };
        app.reload_items().context("Failed to load notes")?;
        Ok(app)
    }

    /// Command to run before the first message.
    pub fn init(&self) -> Cmd {
        Cmd::Tick(std::time::Duration::ZERO)
    }

    /// Consumes one message.
    pub fn update(&mut self, msg: Msg) -> Cmd {
        match msg {
            Msg::Key(key) => super::event::handle_key_event(self, key),
            Msg::Resize(width, height) => {
                self.size = (width, height);
                Cmd::None
            }
            Msg::Tick => self.on_tick(),
            Msg::ClearResult(generation) => {
                if generation == self.banner_generation {
                    self.banner = None;
                }
                Cmd::None
            }
            Msg::Export(message) => self.on_export(message),
        }
    }

    // --- Accessors ---

    pub fn focus(&self) -> Focus {
        self.focus
    }

    /// The topmost mode.
    pub fn mode(&self) -> Mode {
        self.modes.last().copied().unwrap_or(Mode::Main)
    }

    pub fn modes(&self) -> &[Mode] {
        &self.modes
    }

    pub fn items(&self) -> &[NoteItem] {
        &self.items
    }

    /// Index of the selected list row, `None` when the list is empty.
    pub fn selected_index(&self) -> Option<usize> {
        (!self.items.is_empty()).then_some(self.selected)
    }

    pub fn selected_item(&self) -> Option<&NoteItem> {
        self.items.get(self.selected)
    }

    pub fn banner(&self) -> Option<&Banner> {
        self.banner.as_ref()
    }

    pub fn status(&self) -> &PlayerStatus {
        &self.status
    }

    pub fn step_size(&self) -> f64 {
        STEP_SIZES[self.step_index]
    }

    pub fn search(&self) -> &SearchState {
        &self.search
    }

    pub fn note_form(&self) -> Option<&NoteForm> {
        self.note_form.as_ref()
    }

    pub fn tackle_form(&self) -> Option<&TackleForm> {
        self.tackle_form.as_ref()
    }

    pub fn export_progress(&self) -> Option<&ExportProgress> {
        self.export.as_ref()
    }

    pub fn clip_start(&self) -> Option<f64> {
        self.clip_start
    }

    pub fn live_stats(&self) -> &[TackleStat] {
        &self.live_stats
    }

    pub fn live_sort(&self) -> StatsSort {
        self.live_sort
    }

    pub fn overlay_enabled(&self) -> bool {
        self.overlay_enabled
    }

    pub fn repository(&self) -> &NoteRepository {
        &self.repo
    }

    pub fn video_path(&self) -> &Path {
        &self.video
    }

    // --- Modal stack ---

    pub(super) fn push_mode(&mut self, mode: Mode) {
        if self.mode() != mode {
            self.modes.push(mode);
        }
    }

    pub(super) fn pop_mode(&mut self) {
        if self.modes.len() > 1 {
            self.modes.pop();
        }
    }

    // --- Banner ---

    pub(super) fn set_banner(&mut self, text: impl Into<String>) -> Cmd {
        self.show_banner(text.into(), false)
    }

    pub(super) fn set_error(&mut self, text: impl Into<String>) -> Cmd {
        self.show_banner(text.into(), true)
    }

    fn show_banner(&mut self, text: String, is_error: bool) -> Cmd {
        self.banner_generation += 1;
        self.banner = Some(Banner { text, is_error });
        Cmd::ClearResultAfter {
            after: RESULT_DISPLAY_DURATION,
            generation: self.banner_generation,
        }
    }

    pub(super) fn player_failure(&mut self, action: &str, err: PlayerError) -> Cmd {
        warn!("{action} failed: {err}");
        let hint = match err {
            PlayerError::NotConnected | PlayerError::SocketNotFound(_) => {
                format!("{action}: {err} (is the player running?)")
            }
            other => format!("{action}: {other}"),
        };
        self.set_error(hint)
    }

    // --- Tick ---

    fn on_tick(&mut self) -> Cmd {
        self.poll_player();
        if !self.duration_saved && self.status.duration > 0.0 {
            match self
                .repo
                .update_video_duration(&self.video_key, self.status.duration)
            {
                Ok(()) => self.duration_saved = true,
                Err(err) => warn!("failed to store duration: {err}"),
            }
        }
        self.refresh_stats();
        if self.overlay_enabled {
            self.refresh_overlay();
        }
        Cmd::Tick(TICK_INTERVAL)
    }

    fn poll_player(&mut self) {
        let mut failure = None;
        keep(&mut self.status.paused, self.player.is_paused(), &mut failure);
        keep(&mut self.status.muted, self.player.is_muted(), &mut failure);
        keep(&mut self.status.time_pos, self.player.time_pos(), &mut failure);
        keep(&mut self.status.duration, self.player.duration(), &mut failure);
        keep(&mut self.status.speed, self.player.speed(), &mut failure);
        self.player_error = failure.map(|err| err.to_string());
    }

    /// Reads the play head now. Fails when the player does not answer.
    pub(super) fn live_time(&mut self) -> Result<f64, PlayerError> {
        let pos = self.player.time_pos()?;
        self.status.time_pos = pos;
        Ok(pos)
    }

    /// Reads the play head now, falling back to the last polled value.
    pub(super) fn current_time(&mut self) -> f64 {
        match self.player.time_pos() {
            Ok(pos) => {
                self.status.time_pos = pos;
                pos
            }
            Err(err) => {
                debug!("time-pos unavailable: {err}");
                self.status.time_pos
            }
        }
    }

    pub(super) fn refresh_stats(&mut self) {
        match self.repo.tackle_stats(Some(&self.video_key)) {
            Ok(mut stats) => {
                sort_stats(&mut stats, self.live_sort);
                self.live_stats = stats;
            }
            Err(err) => warn!("failed to load tackle stats: {err}"),
        }
        match self.repo.category_counts(Some(&self.video_key)) {
            Ok(counts) => self.categories = counts,
            Err(err) => warn!("failed to load category counts: {err}"),
        }
        if self.mode() == Mode::Stats {
            self.refresh_full_stats();
        }
    }

    pub(super) fn refresh_full_stats(&mut self) {
        let scope = (!self.stats_view.all_videos).then_some(self.video_key.as_str());
        match self.repo.tackle_stats(scope) {
            Ok(stats) => self.full_stats = stats,
            Err(err) => warn!("failed to load tackle stats: {err}"),
        }
    }

    fn refresh_overlay(&mut self) {
        let payload = overlay_payload(&visible_notes(&self.items, self.status.time_pos));
        if payload == self.overlay_payload {
            return;
        }
        let result = match &payload {
            Some(data) => self.player.show_overlay(NOTE_OVERLAY_ID, data),
            None => self.player.hide_overlay(NOTE_OVERLAY_ID),
        };
        match result {
            Ok(()) => self.overlay_payload = payload,
            Err(err) => debug!("overlay update failed: {err}"),
        }
    }

    pub(super) fn toggle_overlay(&mut self) -> Cmd {
        self.overlay_enabled = !self.overlay_enabled;
        if self.overlay_enabled {
            self.refresh_overlay();
            self.set_banner("Overlay on")
        } else {
            if self.overlay_payload.take().is_some()
                && let Err(err) = self.player.hide_overlay(NOTE_OVERLAY_ID)
            {
                debug!("overlay hide failed: {err}");
            }
            self.set_banner("Overlay off")
        }
    }

    // --- Notes list ---

    /// Reloads list rows from the store, keeping the selection in range.
    pub(super) fn reload_items(&mut self) -> Result<()> {
        self.items = self.repo.list_video_items(&self.video_key)?;
        if self.selected >= self.items.len() {
            self.selected = self.items.len().saturating_sub(1);
        }
        self.recompute_matches();
        self.refresh_stats();
        Ok(())
    }

    pub(super) fn select_index(&mut self, index: usize) {
        if !self.items.is_empty() {
            self.selected = index.min(self.items.len() - 1);
        }
    }

    pub(super) fn select_next(&mut self) {
        self.select_index(self.selected + 1);
    }

    pub(super) fn select_previous(&mut self) {
        self.select_index(self.selected.saturating_sub(1));
    }

    pub(super) fn select_first(&mut self) {
        self.select_index(0);
    }

    pub(super) fn select_last(&mut self) {
        self.select_index(self.items.len().saturating_sub(1));
    }

    fn select_note(&mut self, id: NoteId) -> bool {
        match self.items.iter().position(|item| item.id == id) {
            Some(index) => {
                self.selected = index;
                true
            }
            None => false,
        }
    }

    /// Seeks to the selected row and describes it in the banner.
    pub(super) fn open_selected(&mut self) -> Cmd {
        let Some(item) = self.selected_item().cloned() else {
            return Cmd::None;
        };
        if let Err(err) = self.player.seek_absolute(item.start_s) {
            return self.player_failure("seek", err);
        }
        self.status.time_pos = item.start_s;
        let mut text = format!(
            "#{} {} [{}] {}",
            item.id,
            format_timestamp(item.start_s),
            item.category,
            item.summary()
        );
        if item.is_tackle() {
            if let Some(attempt) = item.attempt {
                text.push_str(&format!(" attempt {attempt}"));
            }
            if !item.text.is_empty() {
                text.push_str(&format!(" - {}", item.text));
            }
        }
        if item.starred {
            text.push_str(" *");
        }
        self.set_banner(text)
    }

    /// Seeks to a note by id and selects it.
    pub(super) fn goto_note(&mut self, id: NoteId) -> Result<String> {
        if !self.select_note(id) {
            anyhow::bail!("note {id} not found on this video");
        }
        let start = self.items[self.selected].start_s;
        self.player
            .seek_absolute(start)
            .context("Failed to seek")?;
        self.status.time_pos = start;
        self.focus = Focus::Notes;
        Ok(format!("Note {id} at {}", format_timestamp(start)))
    }

    pub(super) fn delete_selected(&mut self) -> Cmd {
        let Some(item) = self.selected_item().cloned() else {
            return Cmd::None;
        };
        if let Err(err) = self.repo.delete_note(item.id) {
            return self.set_error(format!("Delete failed: {err}"));
        }
        info!(note_id = item.id.get(), "deleted note");
        if let Err(err) = self.reload_items() {
            return self.set_error(format!("{err:#}"));
        }
        self.set_banner(format!("Deleted {} #{}", item.category, item.id))
    }

    pub(super) fn edit_selected(&mut self) -> Cmd {
        let Some(item) = self.selected_item().cloned() else {
            return Cmd::None;
        };
        if !item.is_tackle() {
            return self.set_error("Only tackles can be edited");
        }
        match self.repo.select_note_children(item.id) {
            Ok(children) => {
                self.tackle_form = Some(TackleForm::from_existing(item.id, &children));
                self.push_mode(Mode::TackleForm);
                Cmd::None
            }
            Err(err) => self.set_error(format!("Failed to load tackle: {err}")),
        }
    }

    // --- Search ---

    pub(super) fn push_search_char(&mut self, c: char) {
        self.search.query.push(c);
        self.recompute_matches();
    }

    pub(super) fn pop_search_char(&mut self) {
        self.search.query.pop();
        self.recompute_matches();
    }

    pub(super) fn clear_search(&mut self) {
        self.search = SearchState::default();
    }

    fn recompute_matches(&mut self) {
        let query = self.search.query.trim().to_lowercase();
        self.search.cursor = None;
        self.search.matches = if query.is_empty() {
            Vec::new()
        } else {
            self.items
                .iter()
                .enumerate()
                .filter(|(_, item)| item.search_text().contains(&query))
                .map(|(index, _)| index)
                .collect()
        };
    }

    /// Moves to the next match, wrapping, and selects its row.
    pub(super) fn advance_match(&mut self) {
        if self.search.matches.is_empty() {
            return;
        }
        let next = match self.search.cursor {
            Some(cursor) => (cursor + 1) % self.search.matches.len(),
            None => 0,
        };
        self.search.cursor = Some(next);
        self.selected = self.search.matches[next];
    }

    // --- Focus ---

    pub(super) fn next_focus(&mut self) {
        self.focus = match self.focus {
            Focus::Video => Focus::Search,
            Focus::Search => Focus::Notes,
            Focus::Notes => Focus::Video,
        };
    }

    pub(super) fn previous_focus(&mut self) {
        self.focus = match self.focus {
            Focus::Video => Focus::Notes,
            Focus::Search => Focus::Video,
            Focus::Notes => Focus::Search,
        };
    }

    pub(super) fn set_focus(&mut self, focus: Focus) {
        self.focus = focus;
    }

    // --- Playback ---

    pub(super) fn toggle_pause(&mut self) -> Cmd {
        if let Err(err) = self.player.toggle_pause() {
            return self.player_failure("pause", err);
        }
        self.status.paused = !self.status.paused;
        self.persist_stopped_at();
        Cmd::None
    }

    pub(super) fn set_paused(&mut self, paused: bool) -> Result<()> {
        self.player.set_pause(paused)?;
        self.status.paused = paused;
        self.persist_stopped_at();
        Ok(())
    }

    pub(super) fn toggle_mute(&mut self) -> Cmd {
        let muted = !self.status.muted;
        match self.player.set_mute(muted) {
            Ok(()) => {
                self.status.muted = muted;
                self.set_banner(if muted { "Muted" } else { "Unmuted" })
            }
            Err(err) => self.player_failure("mute", err),
        }
    }

    pub(super) fn seek_by(&mut self, direction: f64) -> Cmd {
        let offset = direction * self.step_size();
        match self.player.seek_relative(offset) {
            Ok(()) => {
                self.status.time_pos = (self.status.time_pos + offset).max(0.0);
                Cmd::None
            }
            Err(err) => self.player_failure("seek", err),
        }
    }

    pub(super) fn seek_to(&mut self, position: f64) -> Result<()> {
        self.player.seek_absolute(position)?;
        self.status.time_pos = position;
        Ok(())
    }

    pub(super) fn frame_step(&mut self, forward: bool) -> Cmd {
        let result = if forward {
            self.player.frame_step()
        } else {
            self.player.frame_back_step()
        };
        match result {
            Ok(()) => {
                self.status.paused = true;
                Cmd::None
            }
            Err(err) => self.player_failure("frame step", err),
        }
    }

    pub(super) fn cycle_step(&mut self, up: bool) -> Cmd {
        self.step_index = if up {
            (self.step_index + 1).min(STEP_SIZES.len() - 1)
        } else {
            self.step_index.saturating_sub(1)
        };
        self.set_banner(format!("Step {}s", self.step_size()))
    }

    pub(super) fn cycle_speed(&mut self, up: bool) -> Cmd {
        let speed = self.status.speed;
        let next = if up {
            SPEEDS
                .iter()
                .find(|s| **s > speed + 1e-6)
                .copied()
                .unwrap_or(SPEEDS[SPEEDS.len() - 1])
        } else {
            SPEEDS
                .iter()
                .rev()
                .find(|s| **s < speed - 1e-6)
                .copied()
                .unwrap_or(SPEEDS[0])
        };
        self.apply_speed(next)
    }

    pub(super) fn apply_speed(&mut self, speed: f64) -> Cmd {
        match self.player.set_speed(speed) {
            Ok(()) => {
                self.status.speed = speed;
                self.set_banner(format!("Speed {speed}x"))
            }
            Err(err) => self.player_failure("speed", err),
        }
    }

    pub(super) fn persist_stopped_at(&mut self) {
        let position = self.current_time();
        if let Err(err) = self.repo.update_stopped_at(&self.video_key, position) {
            warn!("failed to store stop position: {err}");
        }
    }

    /// Stores the stop position and asks the loop to exit.
    pub(super) fn quit(&mut self) -> Cmd {
        self.persist_stopped_at();
        info!("quitting");
        Cmd::Quit
    }

    /// Asks the player process to exit.
    pub fn quit_player(&self) {
        if let Err(err) = self.player.quit() {
            debug!("player quit failed: {err}");
        }
    }

    // --- Forms ---

    pub(super) fn note_video(&self) -> NoteVideo {
        NoteVideo {
            path: self.video_key.clone(),
            duration_s: self.status.duration,
            format: self.video_format.clone(),
        }
    }

    pub(super) fn open_note_form(&mut self) -> Cmd {
        let time_pos = self.current_time();
        self.note_form = Some(NoteForm::new(time_pos));
        self.push_mode(Mode::NoteForm);
        Cmd::None
    }

    pub(super) fn open_tackle_form(&mut self) -> Cmd {
        let time_pos = self.current_time();
        self.tackle_form = Some(TackleForm::new(time_pos));
        self.push_mode(Mode::TackleForm);
        Cmd::None
    }

    pub(super) fn submit_note_form(&mut self) -> Cmd {
        let Some(form) = self.note_form.clone() else {
            return Cmd::None;
        };
        let children = form.to_children(self.note_video());
        match self.repo.insert_note_with_children(form.category(), &children) {
            Ok(id) => {
                self.note_form = None;
                self.pop_mode();
                self.after_write(id, format!("Note {id} saved at {}", format_timestamp(form.time_pos)))
            }
            Err(err) => self.set_error(format!("Save failed: {err}")),
        }
    }

    pub(super) fn submit_tackle_form(&mut self) -> Cmd {
        let Some(form) = self.tackle_form.clone() else {
            return Cmd::None;
        };
        let result = match form.editing {
            Some(id) => form
                .editable_children()
                .map_err(anyhow::Error::msg)
                .and_then(|children| {
                    self.repo.update_note_with_children(id, &children)?;
                    Ok((id, format!("Tackle {id} updated")))
                }),
            None => form
                .to_children(self.note_video())
                .map_err(anyhow::Error::msg)
                .and_then(|children| {
                    let id = self
                        .repo
                        .insert_note_with_children(crate::models::Note::TACKLE, &children)?;
                    Ok((id, format!("Tackle {id} saved at {}", format_timestamp(form.time_pos))))
                }),
        };
        match result {
            Ok((id, message)) => {
                self.tackle_form = None;
                self.pop_mode();
                self.after_write(id, message)
            }
            Err(err) => self.set_error(format!("Save failed: {err:#}")),
        }
    }

    /// Reloads the list after a write and selects the written note.
    pub(super) fn after_write(&mut self, id: NoteId, message: String) -> Cmd {
        if let Err(err) = self.reload_items() {
            return self.set_error(format!("{err:#}"));
        }
        self.select_note(id);
        self.set_banner(message)
    }

    /// Esc inside a form: confirm when there is something to lose.
    pub(super) fn cancel_form(&mut self) -> Cmd {
        let dirty = match self.mode() {
            Mode::NoteForm => self.note_form.as_ref().is_some_and(NoteForm::is_dirty),
            Mode::TackleForm => self.tackle_form.as_ref().is_some_and(TackleForm::is_dirty),
            _ => false,
        };
        if dirty {
            self.push_mode(Mode::ConfirmDiscard);
        } else {
            self.discard_form();
        }
        Cmd::None
    }

    /// Drops the form under the confirmation (or on top) and returns to it.
    pub(super) fn discard_form(&mut self) {
        if self.mode() == Mode::ConfirmDiscard {
            self.pop_mode();
        }
        match self.mode() {
            Mode::NoteForm => self.note_form = None,
            Mode::TackleForm => self.tackle_form = None,
            _ => return,
        }
        self.pop_mode();
    }

    // --- Export ---

    pub(super) fn start_export(&mut self) -> Cmd {
        if self.export.as_ref().is_some_and(ExportProgress::is_running) {
            return self.set_error("An export is already running");
        }
        if let Ok(duration) = self.player.duration() {
            self.status.duration = duration;
        }
        let plan = match prepare_export(
            &self.repo,
            self.encoder.as_ref(),
            &self.encoder_name,
            &self.video,
            self.status.duration,
        ) {
            Ok(plan) => plan,
            Err(err) => return self.set_error(format!("Export failed: {err}")),
        };
        self.export = Some(ExportProgress {
            current: 0,
            total: plan.total(),
            finished: None,
        });
        self.push_mode(Mode::ExportProgress);
        Cmd::WatchExport(spawn_export(plan, Arc::clone(&self.encoder)))
    }

    fn on_export(&mut self, message: ExportMessage) -> Cmd {
        let Some(progress) = self.export.as_mut() else {
            return Cmd::None;
        };
        match message {
            ExportMessage::Progress { current, total } => {
                progress.current = current;
                progress.total = total;
                Cmd::ReceiveExport
            }
            ExportMessage::Complete { count, output_dir } => {
                progress.current = count;
                progress.total = count;
                let text = format!("Exported {count} clips to {}", output_dir.display());
                progress.finished = Some(Ok(output_dir));
                self.set_banner(text)
            }
            ExportMessage::Error(message) => {
                progress.finished = Some(Err(message.clone()));
                self.set_error(format!("Export failed: {message}"))
            }
        }
    }
}

fn keep<T>(slot: &mut T, value: Result<T, PlayerError>, failure: &mut Option<PlayerError>) {
    match value {
        Ok(value) => *slot = value,
        Err(err) => {
            if failure.is_none() {
                *failure = Some(err);
            }
        }
    }
}
