//! Keyboard event handling for the TUI.
//!
//! The topmost mode receives the key first; in the main view behavior
//! depends on which panel has focus.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use super::app::{App, Focus, Mode};
use super::command::{self, CommandOutput};
use super::forms::FormAction;
use super::message::Cmd;

/// Handles a keyboard event and returns the follow-up command.
///
/// # Event Handling
///
/// - `Ctrl+C`: store the play position and quit (from any mode)
/// - `Tab` / `Shift+Tab`: cycle focus between Video, Search and Notes
/// - `?`, `s`, `n`, `t`, `:`: help, stats, note form, tackle form, command
///   line (outside the search box)
/// - Video focus: playback keys
/// - Notes focus: vim-style navigation, edit, delete and export
/// - Search focus: typing edits the query, Tab cycles matches
pub fn handle_key_event(app: &mut App, key: KeyEvent) -> Cmd {
    if is_ctrl(&key, 'c') {
        return app.quit();
    }

    match app.mode() {
        Mode::Main => handle_main(app, key),
        Mode::Help => {
            app.pop_mode();
            Cmd::None
        }
        Mode::Stats => handle_stats(app, key),
        Mode::NoteForm => {
            let action = match app.note_form.as_mut() {
                Some(form) => form.handle_key(key),
                None => FormAction::Cancel,
            };
            apply_form_action(app, action, App::submit_note_form)
        }
        Mode::TackleForm => {
            let action = match app.tackle_form.as_mut() {
                Some(form) => form.handle_key(key),
                None => FormAction::Cancel,
            };
            apply_form_action(app, action, App::submit_tackle_form)
        }
        Mode::ConfirmDiscard => {
            match key.code {
                KeyCode::Char('y' | 'Y') => app.discard_form(),
                KeyCode::Char('n' | 'N') | KeyCode::Esc => app.pop_mode(),
                _ => {}
            }
            Cmd::None
        }
        Mode::CommandInput => handle_command_input(app, key),
        Mode::ClipsView => {
            match key.code {
                KeyCode::Char('j') | KeyCode::Down => {
                    app.clips_scroll = (app.clips_scroll + 1).min(app.clips.len().saturating_sub(1));
                }
                KeyCode::Char('k') | KeyCode::Up => {
                    app.clips_scroll = app.clips_scroll.saturating_sub(1);
                }
                KeyCode::Esc | KeyCode::Char('q') | KeyCode::Enter => app.pop_mode(),
                _ => {}
            }
            Cmd::None
        }
        Mode::ExportProgress => {
            let finished = app.export.as_ref().is_some_and(|e| !e.is_running());
            if finished && matches!(key.code, KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q')) {
                app.pop_mode();
            }
            Cmd::None
        }
    }
}

fn is_ctrl(key: &KeyEvent, c: char) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL)
        && matches!(key.code, KeyCode::Char(k) if k.eq_ignore_ascii_case(&c))
}

fn plain_char(key: &KeyEvent) -> Option<char> {
    match key.code {
        KeyCode::Char(c) if !key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) => {
            Some(c)
        }
        _ => None,
    }
}

fn apply_form_action(app: &mut App, action: FormAction, submit: fn(&mut App) -> Cmd) -> Cmd {
    match action {
        FormAction::None => Cmd::None,
        FormAction::Submit => submit(app),
        FormAction::Cancel => app.cancel_form(),
    }
}

fn handle_main(app: &mut App, key: KeyEvent) -> Cmd {
    match key.code {
        KeyCode::Tab => {
            if app.focus() == Focus::Search && !app.search().matches.is_empty() {
                app.advance_match();
            } else {
                app.next_focus();
            }
            return Cmd::None;
        }
        KeyCode::BackTab => {
            app.previous_focus();
            return Cmd::None;
        }
        _ => {}
    }

    if app.focus() == Focus::Search {
        return handle_search(app, key);
    }

    if app.focus() == Focus::Notes {
        let keeps_count = matches!(
            plain_char(&key),
            Some(c) if c.is_ascii_digit() || c == 'G' || c == 'g'
        );
        if !keeps_count {
            app.number_buffer.clear();
        }
        if plain_char(&key) != Some('g') {
            app.pending_g = false;
        }
    }

    if let Some(c) = plain_char(&key) {
        match c {
            '?' => {
                app.push_mode(Mode::Help);
                return Cmd::None;
            }
            's' | 'S' => {
                app.stats_view.input.clear();
                app.push_mode(Mode::Stats);
                app.refresh_full_stats();
                return Cmd::None;
            }
            'n' | 'N' => return app.open_note_form(),
            't' | 'T' => return app.open_tackle_form(),
            ':' => {
                app.command_input.clear();
                app.push_mode(Mode::CommandInput);
                return Cmd::None;
            }
            _ => {}
        }
    }

    match app.focus() {
        Focus::Video => handle_video(app, key),
        Focus::Notes => handle_notes(app, key),
        Focus::Search => Cmd::None,
    }
}

fn handle_video(app: &mut App, key: KeyEvent) -> Cmd {
    if is_ctrl(&key, 'h') || key.code == KeyCode::Backspace {
        return app.frame_step(false);
    }
    if is_ctrl(&key, 'l') {
        return app.frame_step(true);
    }
    match key.code {
        KeyCode::Left => return app.seek_by(-1.0),
        KeyCode::Right => return app.seek_by(1.0),
        _ => {}
    }
    let Some(c) = plain_char(&key) else {
        return Cmd::None;
    };
    match c.to_ascii_lowercase() {
        ' ' => app.toggle_pause(),
        'm' => app.toggle_mute(),
        'h' => app.seek_by(-1.0),
        'l' => app.seek_by(1.0),
        ',' | '<' => app.cycle_step(false),
        '.' | '>' => app.cycle_step(true),
        '[' | '{' => app.cycle_speed(false),
        ']' | '}' => app.cycle_speed(true),
        '\\' => app.apply_speed(1.0),
        'o' => app.toggle_overlay(),
        'x' => {
            app.live_sort = app.live_sort.next();
            app.refresh_stats();
            app.set_banner(format!("Sort by {}", app.live_sort.label()))
        }
        _ => Cmd::None,
    }
}

fn handle_notes(app: &mut App, key: KeyEvent) -> Cmd {
    if is_ctrl(&key, 'e') {
        return app.start_export();
    }
    match key.code {
        KeyCode::Down => {
            app.select_next();
            return Cmd::None;
        }
        KeyCode::Up => {
            app.select_previous();
            return Cmd::None;
        }
        KeyCode::Enter => return app.open_selected(),
        KeyCode::Delete => return app.delete_selected(),
        _ => {}
    }
    let Some(c) = plain_char(&key) else {
        return Cmd::None;
    };
    match c {
        '0' if app.number_buffer.is_empty() => app.select_first(),
        d if d.is_ascii_digit() => app.number_buffer.push(d),
        'G' => {
            let row = app.number_buffer.parse::<usize>().ok();
            app.number_buffer.clear();
            match row {
                Some(n) if n > 0 => app.select_index(n - 1),
                _ => app.select_last(),
            }
        }
        'g' => {
            if app.pending_g {
                app.pending_g = false;
                app.select_first();
            } else {
                app.pending_g = true;
            }
        }
        'j' | 'J' => app.select_next(),
        'k' | 'K' => app.select_previous(),
        'e' | 'E' => return app.edit_selected(),
        'x' | 'X' => return app.delete_selected(),
        _ => {}
    }
    Cmd::None
}

fn handle_search(app: &mut App, key: KeyEvent) -> Cmd {
    match key.code {
        KeyCode::Enter => app.set_focus(Focus::Notes),
        KeyCode::Esc => app.clear_search(),
        KeyCode::Backspace => app.pop_search_char(),
        _ => {
            if let Some(c) = plain_char(&key) {
                app.push_search_char(c);
            }
        }
    }
    Cmd::None
}

fn handle_stats(app: &mut App, key: KeyEvent) -> Cmd {
    if is_ctrl(&key, 'a') {
        app.stats_view.all_videos = !app.stats_view.all_videos;
        app.refresh_full_stats();
        return Cmd::None;
    }
    if is_ctrl(&key, 'r') {
        app.stats_view.filter.clear();
        return Cmd::None;
    }
    match key.code {
        KeyCode::Esc => {
            if app.stats_view.input.is_empty() {
                app.pop_mode();
            } else {
                app.stats_view.input.clear();
            }
        }
        KeyCode::Tab => app.stats_view.sort = app.stats_view.sort.next(),
        KeyCode::Enter => {
            let query = std::mem::take(&mut app.stats_view.input);
            if !query.trim().is_empty() {
                let matched = app.stats_view.filter.apply(&app.full_stats, &query);
                if matched == 0 {
                    return app.set_error(format!("No player matches \"{}\"", query.trim()));
                }
            }
        }
        KeyCode::Backspace => {
            app.stats_view.input.pop();
        }
        _ => {
            if let Some(c) = plain_char(&key) {
                app.stats_view.input.push(c);
            }
        }
    }
    Cmd::None
}

fn handle_command_input(app: &mut App, key: KeyEvent) -> Cmd {
    match key.code {
        KeyCode::Esc => app.pop_mode(),
        KeyCode::Backspace => {
            if app.command_input.pop().is_none() {
                app.pop_mode();
            }
        }
        KeyCode::Enter => {
            let line = std::mem::take(&mut app.command_input);
            app.pop_mode();
            return execute_line(app, &line);
        }
        _ => {
            if let Some(c) = plain_char(&key) {
                app.command_input.push(c);
            }
        }
    }
    Cmd::None
}

/// Parses and runs one command line.
pub(super) fn execute_line(app: &mut App, line: &str) -> Cmd {
    let command = match command::parse(line) {
        Ok(command) => command,
        Err(message) => return app.set_error(message),
    };
    match app.run_command(command) {
        Ok(CommandOutput::Banner(text)) => app.set_banner(text),
        Ok(CommandOutput::OpenNoteInput) => app.open_note_form(),
        Ok(CommandOutput::OpenTackleInput) => app.open_tackle_form(),
        Ok(CommandOutput::ShowHelp) => {
            app.push_mode(Mode::Help);
            Cmd::None
        }
        Ok(CommandOutput::ShowClips(rows)) => {
            app.clips = rows;
            app.clips_scroll = 0;
            app.push_mode(Mode::ClipsView);
            Cmd::None
        }
        Ok(CommandOutput::Quit) => app.quit(),
        Err(err) => app.set_error(format!("{err:#}")),
    }
}
