use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde_json::{Value, json};
use tempfile::TempDir;

use super::app::{App, Focus, Mode};
use super::message::{Cmd, Msg};
use crate::Database;
use crate::export::{ClipEncoder, ExportError, ExportMessage};
use crate::models::{NoteHighlight, TackleOutcome};
use crate::mpv::{PlayerControl, PlayerError};
use crate::repository::NoteRepository;

/// Scripted player state shared between the test and the app.
#[derive(Debug)]
struct PlayerState {
    time_pos: f64,
    duration: f64,
    speed: f64,
    paused: bool,
    muted: bool,
    offline: bool,
    commands: Vec<Vec<Value>>,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            time_pos: 0.0,
            duration: 600.0,
            speed: 1.0,
            paused: false,
            muted: false,
            offline: false,
            commands: Vec::new(),
        }
    }
}

struct FakePlayer(Rc<RefCell<PlayerState>>);

impl PlayerControl for FakePlayer {
    fn send_command(&self, command: Vec<Value>) -> Result<Value, PlayerError> {
        let mut state = self.0.borrow_mut();
        if state.offline {
            return Err(PlayerError::NotConnected);
        }
        state.commands.push(command.clone());
        let verb = command[0].as_str().unwrap_or_default();
        let name = command.get(1).and_then(Value::as_str).unwrap_or_default();
        let reply = match verb {
            "get_property" => match name {
                "time-pos" => json!(state.time_pos),
                "duration" => json!(state.duration),
                "speed" => json!(state.speed),
                "pause" => json!(state.paused),
                "mute" => json!(state.muted),
                _ => Value::Null,
            },
            "set_property" => {
                let value = &command[2];
                match name {
                    "speed" => state.speed = value.as_f64().unwrap(),
                    "pause" => state.paused = value.as_bool().unwrap(),
                    "mute" => state.muted = value.as_bool().unwrap(),
                    _ => {}
                }
                Value::Null
            }
            "cycle" => {
                state.paused = !state.paused;
                Value::Null
            }
            "seek" => {
                let offset = command[1].as_f64().unwrap();
                if command[2] == "relative" {
                    state.time_pos = (state.time_pos + offset).max(0.0);
                } else {
                    state.time_pos = offset;
                }
                Value::Null
            }
            _ => Value::Null,
        };
        Ok(reply)
    }
}

/// Encoder that writes a placeholder file per clip.
struct TouchEncoder;

impl ClipEncoder for TouchEncoder {
    fn is_available(&self) -> bool {
        true
    }

    fn encode(&self, _input: &Path, _start_s: f64, _end_s: f64, output: &Path) -> Result<(), ExportError> {
        std::fs::write(output, b"clip").map_err(|source| ExportError::Io {
            context: output.display().to_string(),
            source,
        })
    }
}

struct Harness {
    app: App,
    player: Rc<RefCell<PlayerState>>,
    video: PathBuf,
    _dir: TempDir,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("match.mp4");
        std::fs::write(&video, b"not really a video").unwrap();

        let player = Rc::new(RefCell::new(PlayerState::default()));
        let repo = NoteRepository::new(Database::in_memory().unwrap());
        let app = App::new(
            repo,
            Box::new(FakePlayer(Rc::clone(&player))),
            Arc::new(TouchEncoder),
            "touch",
            &video,
        )
        .unwrap();
        Self {
            app,
            player,
            video,
            _dir: dir,
        }
    }

    fn at(&self, time_pos: f64) {
        self.player.borrow_mut().time_pos = time_pos;
    }

    fn press(&mut self, code: KeyCode) -> Cmd {
        self.app.update(Msg::Key(KeyEvent::new(code, KeyModifiers::NONE)))
    }

    fn ctrl(&mut self, c: char) -> Cmd {
        self.app
            .update(Msg::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)))
    }

    fn type_text(&mut self, text: &str) {
        for c in text.chars() {
            self.press(KeyCode::Char(c));
        }
    }

    fn command(&mut self, line: &str) -> Cmd {
        self.press(KeyCode::Char(':'));
        assert_eq!(self.app.mode(), Mode::CommandInput);
        self.type_text(line);
        self.press(KeyCode::Enter)
    }

    fn banner(&self) -> String {
        self.app.banner().map(|b| b.text.clone()).unwrap_or_default()
    }

    fn focus_notes(&mut self) {
        while self.app.focus() != Focus::Notes {
            self.press(KeyCode::Tab);
        }
    }

    fn sent(&self, verb: &str) -> usize {
        self.player
            .borrow()
            .commands
            .iter()
            .filter(|c| c[0] == verb)
            .count()
    }
}

#[test]
fn tackle_wizard_saves_with_defaults() {
    let mut h = Harness::new();
    h.at(83.0);

    h.press(KeyCode::Char('t'));
    assert_eq!(h.app.mode(), Mode::TackleForm);
    h.type_text("Smith");
    for _ in 0..9 {
        h.press(KeyCode::Enter);
    }

    assert_eq!(h.app.mode(), Mode::Main);
    assert!(h.app.tackle_form().is_none());
    let items = h.app.items();
    assert_eq!(items.len(), 1);
    let tackle = &items[0];
    assert_eq!(tackle.player.as_deref(), Some("Smith"));
    assert_eq!(tackle.outcome, Some(TackleOutcome::Completed));
    assert_eq!(tackle.attempt, Some(1));
    assert_eq!(tackle.start_s, 83.0);
    assert!(!tackle.starred);
    assert!(h.banner().starts_with("Tackle"), "{}", h.banner());
}

#[test]
fn editing_a_tackle_rewrites_it_in_place() {
    let mut h = Harness::new();
    h.at(83.0);
    h.command("nt Smith Blue 1 completed");
    let id = h.app.items()[0].id;

    h.focus_notes();
    h.press(KeyCode::Char('e'));
    assert_eq!(h.app.mode(), Mode::TackleForm);
    assert_eq!(h.app.tackle_form().unwrap().editing, Some(id));

    // Player -> Team -> Attempt -> Outcome
    for _ in 0..3 {
        h.press(KeyCode::Enter);
    }
    h.press(KeyCode::Right);
    // Outcome -> ... -> Star
    for _ in 0..5 {
        h.press(KeyCode::Enter);
    }
    h.press(KeyCode::Char(' '));
    h.press(KeyCode::Enter);

    assert_eq!(h.app.mode(), Mode::Main);
    let items = h.app.items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, id);
    assert_eq!(items[0].outcome, Some(TackleOutcome::Missed));
    assert!(items[0].starred);

    let children = h.app.repository().select_note_children(id).unwrap();
    assert_eq!(children.tackles[0].team, "Blue");
    assert_eq!(children.timings[0].start_s, 83.0);
    assert_eq!(children.videos.len(), 1);
    assert!(children.highlights.iter().any(|hl| hl.kind == NoteHighlight::STAR));
}

#[test]
fn only_tackles_are_editable() {
    let mut h = Harness::new();
    h.command("note add kick off");
    h.focus_notes();
    h.press(KeyCode::Char('e'));
    assert_eq!(h.app.mode(), Mode::Main);
    assert!(h.app.banner().unwrap().is_error);
}

#[test]
fn clip_is_recorded_between_marks() {
    let mut h = Harness::new();
    h.at(10.0);
    h.command("cs");
    assert_eq!(h.app.clip_start(), Some(10.0));

    h.at(25.0);
    h.command("ce quick break");
    assert_eq!(h.app.clip_start(), None);
    let clip = h.app.items().iter().find(|i| i.is_clip()).unwrap().clone();
    assert_eq!((clip.start_s, clip.end_s), (10.0, 25.0));
    assert_eq!(clip.text, "quick break");
    assert_eq!(h.banner(), format!("Clip {} saved (15.0s)", clip.id));
}

#[test]
fn clip_end_before_start_keeps_the_mark() {
    let mut h = Harness::new();
    h.command("ce");
    assert!(h.app.banner().unwrap().is_error);

    h.at(30.0);
    h.command("clip start");
    h.at(20.0);
    h.command("clip end");
    assert!(h.app.banner().unwrap().is_error);
    assert_eq!(h.app.clip_start(), Some(30.0));
    assert!(h.app.items().is_empty());
}

#[test]
fn clip_marks_fail_while_player_is_offline() {
    let mut h = Harness::new();
    h.at(10.0);
    h.command("cs");
    h.at(25.0);
    h.app.update(Msg::Tick);
    assert_eq!(h.app.status().time_pos, 25.0);

    h.player.borrow_mut().offline = true;
    h.command("ce");
    assert!(h.app.banner().unwrap().is_error, "{}", h.banner());
    assert_eq!(h.app.clip_start(), Some(10.0));
    assert!(h.app.items().is_empty());

    h.command("cs");
    assert!(h.app.banner().unwrap().is_error);
    assert_eq!(h.app.clip_start(), Some(10.0));

    h.player.borrow_mut().offline = false;
    h.command("ce");
    assert_eq!(h.app.clip_start(), None);
    assert_eq!(h.app.items().len(), 1);
}

#[test]
fn clip_play_loops_and_stop_clears() {
    let mut h = Harness::new();
    h.at(10.0);
    h.command("cs");
    h.at(25.0);
    h.command("ce");
    let id = h.app.items()[0].id;

    h.command(&format!("clip play {id}"));
    {
        let state = h.player.borrow();
        assert_eq!(state.time_pos, 10.0);
        assert!(!state.paused);
        assert!(state.commands.contains(&vec![json!("set_property"), json!("ab-loop-b"), json!(25.0)]));
    }

    h.command("clip stop");
    let state = h.player.borrow();
    assert!(state.commands.contains(&vec![json!("set_property"), json!("ab-loop-a"), json!("no")]));
}

#[test]
fn clip_list_opens_clips_view() {
    let mut h = Harness::new();
    h.at(1.0);
    h.command("cs");
    h.at(4.0);
    h.command("ce first");
    h.command("clip list");
    assert_eq!(h.app.mode(), Mode::ClipsView);
    h.press(KeyCode::Esc);
    assert_eq!(h.app.mode(), Mode::Main);
}

#[test]
fn tab_cycles_search_matches() {
    let mut h = Harness::new();
    for (t, text) in [
        (10.0, "pass left"),
        (20.0, "kick"),
        (30.0, "pass right"),
        (40.0, "ruck"),
        (50.0, "long pass"),
    ] {
        h.at(t);
        h.command(&format!("note add {text}"));
    }

    h.press(KeyCode::Tab);
    assert_eq!(h.app.focus(), Focus::Search);
    h.type_text("pass");
    assert_eq!(h.app.search().matches, [0, 2, 4]);
    assert_eq!(h.app.search().cursor, None);

    let mut visited = Vec::new();
    for _ in 0..4 {
        h.press(KeyCode::Tab);
        visited.push(h.app.selected_index().unwrap());
    }
    assert_eq!(visited, [0, 2, 4, 0]);
    assert_eq!(h.app.focus(), Focus::Search);

    h.press(KeyCode::Esc);
    assert!(h.app.search().query.is_empty());
    h.press(KeyCode::Tab);
    assert_eq!(h.app.focus(), Focus::Notes);
}

#[test]
fn vim_navigation_in_notes() {
    let mut h = Harness::new();
    for t in 1..=5 {
        h.at(f64::from(t));
        h.command(&format!("note add n{t}"));
    }
    h.focus_notes();

    h.press(KeyCode::Char('G'));
    assert_eq!(h.app.selected_index(), Some(4));
    h.press(KeyCode::Char('g'));
    h.press(KeyCode::Char('g'));
    assert_eq!(h.app.selected_index(), Some(0));
    h.press(KeyCode::Char('3'));
    h.press(KeyCode::Char('G'));
    assert_eq!(h.app.selected_index(), Some(2));
    h.press(KeyCode::Char('j'));
    assert_eq!(h.app.selected_index(), Some(3));
    h.press(KeyCode::Char('0'));
    assert_eq!(h.app.selected_index(), Some(0));
    h.press(KeyCode::Char('k'));
    assert_eq!(h.app.selected_index(), Some(0));

    h.press(KeyCode::Char('9'));
    h.press(KeyCode::Char('j'));
    h.press(KeyCode::Char('G'));
    assert_eq!(h.app.selected_index(), Some(4));

    h.press(KeyCode::Enter);
    assert_eq!(h.player.borrow().time_pos, 5.0);

    h.press(KeyCode::Char('x'));
    assert_eq!(h.app.items().len(), 4);
    assert_eq!(h.app.selected_index(), Some(3));

    h.press(KeyCode::Char('3'));
    h.press(KeyCode::Char('g'));
    h.press(KeyCode::Char('G'));
    assert_eq!(h.app.selected_index(), Some(2), "g keeps the count");
}

#[test]
fn step_and_speed_clamp_at_the_ends() {
    let mut h = Harness::new();
    assert_eq!(h.app.step_size(), 1.0);
    for _ in 0..5 {
        h.press(KeyCode::Char(','));
    }
    assert_eq!(h.app.step_size(), 0.1);
    for _ in 0..10 {
        h.press(KeyCode::Char('.'));
    }
    assert_eq!(h.app.step_size(), 30.0);

    for _ in 0..8 {
        h.press(KeyCode::Char(']'));
    }
    assert_eq!(h.app.status().speed, 2.0);
    assert_eq!(h.player.borrow().speed, 2.0);
    h.press(KeyCode::Char('['));
    assert_eq!(h.app.status().speed, 1.5);
    for _ in 0..8 {
        h.press(KeyCode::Char('['));
    }
    assert_eq!(h.app.status().speed, 0.5);
    h.press(KeyCode::Char('\\'));
    assert_eq!(h.app.status().speed, 1.0);
}

#[test]
fn seek_uses_current_step() {
    let mut h = Harness::new();
    h.at(100.0);
    h.press(KeyCode::Char('.'));
    h.press(KeyCode::Char('l'));
    assert_eq!(h.player.borrow().time_pos, 102.0);
    h.press(KeyCode::Char('h'));
    h.press(KeyCode::Char('h'));
    assert_eq!(h.player.borrow().time_pos, 98.0);
    h.ctrl('l');
    assert_eq!(h.sent("frame-step"), 1);
}

#[test]
fn pause_toggle_persists_stop_position() {
    let mut h = Harness::new();
    h.at(42.0);
    h.press(KeyCode::Char(' '));
    assert!(h.player.borrow().paused);
    let video = h
        .app
        .repository()
        .get_video_by_path(&h.video.to_string_lossy())
        .unwrap()
        .unwrap();
    assert_eq!(video.stopped_at_s, 42.0);
}

#[test]
fn quit_persists_stop_position() {
    let mut h = Harness::new();
    h.at(77.0);
    let cmd = h.ctrl('c');
    assert!(cmd.is_quit());
    let video = h
        .app
        .repository()
        .get_video_by_path(&h.video.to_string_lossy())
        .unwrap()
        .unwrap();
    assert_eq!(video.stopped_at_s, 77.0);
}

#[test]
fn dirty_form_asks_before_discarding() {
    let mut h = Harness::new();
    h.press(KeyCode::Char('n'));
    h.type_text("abc");
    h.press(KeyCode::Esc);
    assert_eq!(h.app.modes(), [Mode::Main, Mode::NoteForm, Mode::ConfirmDiscard]);

    h.press(KeyCode::Char('n'));
    assert_eq!(h.app.mode(), Mode::NoteForm);
    assert_eq!(h.app.note_form().unwrap().text, "abc");

    h.press(KeyCode::Esc);
    h.press(KeyCode::Char('y'));
    assert_eq!(h.app.mode(), Mode::Main);
    assert!(h.app.note_form().is_none());
    assert!(h.app.items().is_empty());
}

#[test]
fn clean_form_closes_without_confirmation() {
    let mut h = Harness::new();
    h.press(KeyCode::Char('t'));
    h.press(KeyCode::Esc);
    assert_eq!(h.app.mode(), Mode::Main);
}

#[test]
fn note_form_saves_on_ctrl_s() {
    let mut h = Harness::new();
    h.at(12.5);
    h.press(KeyCode::Char('n'));
    h.type_text("great line");
    h.ctrl('s');
    assert_eq!(h.app.mode(), Mode::Main);
    let item = &h.app.items()[0];
    assert_eq!(item.text, "great line");
    assert_eq!(item.start_s, 12.5);
}

#[test]
fn tick_keeps_last_values_when_player_is_gone() {
    let mut h = Harness::new();
    h.at(33.0);
    let cmd = h.app.update(Msg::Tick);
    assert!(matches!(cmd, Cmd::Tick(_)));
    assert_eq!(h.app.status().time_pos, 33.0);
    assert_eq!(h.app.status().duration, 600.0);

    h.player.borrow_mut().offline = true;
    h.app.update(Msg::Tick);
    assert_eq!(h.app.status().time_pos, 33.0);
    assert_eq!(h.app.status().duration, 600.0);

    let video = h
        .app
        .repository()
        .get_video_by_path(&h.video.to_string_lossy())
        .unwrap()
        .unwrap();
    assert_eq!(video.duration_s, 600.0);
}

#[test]
fn player_failure_shows_error_banner() {
    let mut h = Harness::new();
    h.player.borrow_mut().offline = true;
    h.press(KeyCode::Char(' '));
    let banner = h.app.banner().unwrap();
    assert!(banner.is_error);
    assert!(banner.text.contains("player"), "{}", banner.text);
}

#[test]
fn banner_clears_only_for_latest_generation() {
    let mut h = Harness::new();
    let first = h.command("seek 10");
    let Cmd::ClearResultAfter { generation: old, .. } = first else {
        panic!("expected a clear timer, got {first:?}");
    };
    let second = h.command("seek 20");
    let Cmd::ClearResultAfter { generation: new, .. } = second else {
        panic!("expected a clear timer, got {second:?}");
    };

    h.app.update(Msg::ClearResult(old));
    assert_eq!(h.banner(), "Seek to 00:20");
    h.app.update(Msg::ClearResult(new));
    assert!(h.app.banner().is_none());
}

#[test]
fn overlay_is_sent_only_on_change() {
    let mut h = Harness::new();
    h.at(10.0);
    h.command("note add kick off");
    h.at(0.0);
    h.press(KeyCode::Char('o'));
    assert!(h.app.overlay_enabled());
    assert_eq!(h.sent("osd-overlay"), 0);

    h.at(11.0);
    h.app.update(Msg::Tick);
    h.app.update(Msg::Tick);
    assert_eq!(h.sent("osd-overlay"), 1);

    h.at(20.0);
    h.app.update(Msg::Tick);
    h.app.update(Msg::Tick);
    assert_eq!(h.sent("osd-overlay"), 2);
    let state = h.player.borrow();
    let last = state.commands.iter().rev().find(|c| c[0] == "osd-overlay").unwrap();
    assert_eq!(last[2], "none");
}

#[test]
fn stats_view_filters_and_scopes() {
    let mut h = Harness::new();
    h.command("nt 'John Doe' Blue 1 completed");
    h.command("nt Smith Blue 1 missed");

    h.press(KeyCode::Char('s'));
    assert_eq!(h.app.mode(), Mode::Stats);
    h.type_text("jd");
    h.press(KeyCode::Enter);
    assert!(h.app.stats_view.filter.contains("John Doe"));
    assert!(h.app.stats_view.input.is_empty());

    h.press(KeyCode::Tab);
    assert_ne!(h.app.stats_view.sort, super::stats::StatsSort::Player);
    h.ctrl('a');
    assert!(h.app.stats_view.all_videos);

    h.press(KeyCode::Esc);
    assert_eq!(h.app.mode(), Mode::Main);
}

#[test]
fn live_stats_follow_tackles() {
    let mut h = Harness::new();
    h.command("nt Smith Blue 1 completed");
    h.command("nt Smith Blue 2 missed");
    let stats = h.app.live_stats();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].total, 2);
    assert_eq!(stats[0].percentage(), Some(50.0));
}

#[test]
fn export_reports_progress_then_completion() {
    let mut h = Harness::new();
    for (t, player) in [(10.0, "Smith"), (20.0, "Jones"), (30.0, "Smith")] {
        h.at(t);
        h.command(&format!("nt {player} Blue 1 completed"));
    }
    h.focus_notes();

    let Cmd::WatchExport(rx) = h.ctrl('e') else {
        panic!("export did not start: {}", h.banner());
    };
    assert_eq!(h.app.mode(), Mode::ExportProgress);

    let mut progress = Vec::new();
    for message in rx.iter() {
        if let ExportMessage::Progress { current, .. } = &message {
            progress.push(*current);
        }
        h.app.update(Msg::Export(message));
    }
    assert_eq!(progress, [1, 2, 3]);

    let export = h.app.export_progress().unwrap();
    assert_eq!((export.current, export.total), (3, 3));
    let clips = h.video.parent().unwrap().join("match-clips");
    assert!(matches!(&export.finished, Some(Ok(dir)) if *dir == clips));
    assert_eq!(std::fs::read_dir(clips.join("Smith")).unwrap().count(), 2);
    assert_eq!(std::fs::read_dir(clips.join("Jones")).unwrap().count(), 1);

    h.press(KeyCode::Esc);
    assert_eq!(h.app.mode(), Mode::Main);
}

#[test]
fn export_without_tackles_reports_error() {
    let mut h = Harness::new();
    h.command("note add nothing to cut");
    h.focus_notes();
    let cmd = h.ctrl('e');
    assert!(!matches!(cmd, Cmd::WatchExport(_)));
    assert!(h.app.banner().unwrap().is_error);
    assert_eq!(h.app.mode(), Mode::Main);
}

#[test]
fn help_closes_on_any_key() {
    let mut h = Harness::new();
    h.press(KeyCode::Char('?'));
    assert_eq!(h.app.mode(), Mode::Help);
    h.press(KeyCode::Char('z'));
    assert_eq!(h.app.mode(), Mode::Main);

    h.command("help");
    assert_eq!(h.app.mode(), Mode::Help);
}

#[test]
fn unknown_command_reports_error_and_closes_input() {
    let mut h = Harness::new();
    h.command("launch rockets");
    assert_eq!(h.app.mode(), Mode::Main);
    assert!(h.banner().contains("unknown command"));

    h.press(KeyCode::Char(':'));
    h.press(KeyCode::Backspace);
    assert_eq!(h.app.mode(), Mode::Main);
}
