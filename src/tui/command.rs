//! The `:` command line.
//!
//! Input is tokenized with shell-like quoting, parsed into a [`Command`]
//! and executed against the [`App`]. Execution returns a [`CommandOutput`]
//! describing what the UI should show next.

use std::fmt::Write as _;

use anyhow::{Context, Result, bail};
use tracing::info;

use super::app::App;
use crate::models::{
    Note, NoteChildren, NoteClip, NoteDetail, NoteId, NoteTackle, NoteTiming, TackleOutcome,
};
use crate::utils::{format_timestamp, parse_timestamp};

/// A parsed command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `note` or `nn` with no text opens the note form.
    NoteInput,
    NoteAdd(String),
    NoteList,
    NoteGoto(NoteId),
    /// `tackle` or `nt` with no arguments opens the tackle wizard.
    TackleInput,
    TackleAdd {
        player: String,
        team: String,
        attempt: i64,
        outcome: TackleOutcome,
    },
    TackleList,
    ClipStart,
    ClipEnd(Option<String>),
    ClipList,
    ClipPlay(NoteId),
    ClipStop,
    Pause,
    Play,
    Mute,
    Seek(f64),
    Speed(Option<f64>),
    Help,
    Quit,
}

/// A clip row for the clips view.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipRow {
    pub id: NoteId,
    pub start_s: f64,
    pub end_s: f64,
    pub name: String,
}

impl ClipRow {
    pub fn duration_s(&self) -> f64 {
        self.end_s - self.start_s
    }
}

/// What the UI does after a command ran.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutput {
    Banner(String),
    OpenNoteInput,
    OpenTackleInput,
    ShowHelp,
    ShowClips(Vec<ClipRow>),
    Quit,
}

/// Splits a command line into words.
///
/// Single and double quotes group words; a backslash escapes the next
/// character.
///
/// # Examples
///
/// ```
/// use tagging_rugby::tui::command::tokenize;
///
/// let words = tokenize(r#"note add "great line break" now"#).unwrap();
/// assert_eq!(words, ["note", "add", "great line break", "now"]);
/// ```
pub fn tokenize(input: &str) -> Result<Vec<String>, String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (_, '\\') => {
                if let Some(next) = chars.next() {
                    current.push(next);
                    in_word = true;
                }
            }
            (Some(q), c) if c == q => quote = None,
            (Some(_), c) => current.push(c),
            (None, '"' | '\'') => {
                quote = Some(c);
                in_word = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if let Some(q) = quote {
        return Err(format!("unterminated {q} quote"));
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

/// Parses a command line.
pub fn parse(input: &str) -> Result<Command, String> {
    let words = tokenize(input)?;
    let Some((head, args)) = words.split_first() else {
        return Err("empty command".to_string());
    };
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    match head.as_str() {
        "note" => parse_note(&args),
        "nn" => Ok(text_or_input(&args, Command::NoteInput, Command::NoteAdd)),
        "tackle" => parse_tackle(&args),
        "nt" => match args.as_slice() {
            [] => Ok(Command::TackleInput),
            [player, team, attempt, outcome] => tackle_add(player, team, attempt, outcome),
            _ => Err("usage: nt <player> <team> <attempt> <outcome>".to_string()),
        },
        "clip" => parse_clip(&args),
        "cs" => Ok(Command::ClipStart),
        "ce" => Ok(Command::ClipEnd(join_text(&args))),
        "pause" => Ok(Command::Pause),
        "play" => Ok(Command::Play),
        "mute" => Ok(Command::Mute),
        "seek" => match args.as_slice() {
            [ts] => parse_timestamp(ts)
                .map(Command::Seek)
                .ok_or_else(|| format!("invalid timestamp: {ts}")),
            _ => Err("usage: seek <timestamp>".to_string()),
        },
        "speed" => match args.as_slice() {
            [] => Ok(Command::Speed(None)),
            [value] => value
                .parse::<f64>()
                .ok()
                .filter(|v| *v > 0.0 && v.is_finite())
                .map(|v| Command::Speed(Some(v)))
                .ok_or_else(|| format!("invalid speed: {value}")),
            _ => Err("usage: speed [factor]".to_string()),
        },
        "help" | "h" | "?" => Ok(Command::Help),
        "quit" | "q" => Ok(Command::Quit),
        other => Err(format!("unknown command: {other}")),
    }
}

fn join_text(args: &[&str]) -> Option<String> {
    let text = args.join(" ");
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn text_or_input(args: &[&str], input: Command, add: fn(String) -> Command) -> Command {
    match join_text(args) {
        Some(text) => add(text),
        None => input,
    }
}

fn parse_note(args: &[&str]) -> Result<Command, String> {
    match args {
        [] => Ok(Command::NoteInput),
        ["add", rest @ ..] => Ok(text_or_input(rest, Command::NoteInput, Command::NoteAdd)),
        ["list"] => Ok(Command::NoteList),
        ["goto", id] => parse_id(id).map(Command::NoteGoto),
        ["goto"] => Err("usage: note goto <id>".to_string()),
        [sub, ..] => Err(format!("unknown note command: {sub}")),
    }
}

fn parse_tackle(args: &[&str]) -> Result<Command, String> {
    match args {
        [] => Ok(Command::TackleInput),
        ["list"] => Ok(Command::TackleList),
        ["add"] => Ok(Command::TackleInput),
        ["add", rest @ ..] => parse_tackle_flags(rest),
        [sub, ..] => Err(format!("unknown tackle command: {sub}")),
    }
}

fn parse_tackle_flags(args: &[&str]) -> Result<Command, String> {
    let mut player = None;
    let mut team = String::new();
    let mut attempt = "1".to_string();
    let mut outcome = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) if flag.starts_with("--") => (flag, Some(value.to_string())),
            _ => (*arg, None),
        };
        let mut value = || {
            inline
                .clone()
                .or_else(|| iter.next().map(|v| v.to_string()))
                .ok_or_else(|| format!("missing value for {flag}"))
        };
        match flag {
            "-p" | "--player" => player = Some(value()?),
            "-t" | "--team" => team = value()?,
            "-a" | "--attempt" => attempt = value()?,
            "-o" | "--outcome" => outcome = Some(value()?),
            other => return Err(format!("unknown flag: {other}")),
        }
    }

    let player = player.ok_or("tackle add needs --player")?;
    let outcome = outcome.ok_or("tackle add needs --outcome")?;
    tackle_add(&player, &team, &attempt, &outcome)
}

fn tackle_add(player: &str, team: &str, attempt: &str, outcome: &str) -> Result<Command, String> {
    let player = player.trim();
    if player.is_empty() {
        return Err("player is required".to_string());
    }
    let attempt = attempt
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|a| *a >= 1)
        .ok_or_else(|| format!("invalid attempt: {attempt}"))?;
    let outcome = outcome.parse::<TackleOutcome>().map_err(|e| e.to_string())?;
    Ok(Command::TackleAdd {
        player: player.to_string(),
        team: team.trim().to_string(),
        attempt,
        outcome,
    })
}

fn parse_clip(args: &[&str]) -> Result<Command, String> {
    match args {
        ["start"] => Ok(Command::ClipStart),
        ["end", rest @ ..] => Ok(Command::ClipEnd(join_text(rest))),
        ["list"] => Ok(Command::ClipList),
        ["play", id] => parse_id(id).map(Command::ClipPlay),
        ["stop"] => Ok(Command::ClipStop),
        [] => Err("usage: clip start|end|list|play|stop".to_string()),
        [sub, ..] => Err(format!("unknown clip command: {sub}")),
    }
}

fn parse_id(value: &str) -> Result<NoteId, String> {
    value
        .trim_start_matches('#')
        .parse::<i64>()
        .map(NoteId::new)
        .map_err(|_| format!("invalid id: {value}"))
}

impl App {
    /// Runs a parsed command.
    ///
    /// # Errors
    ///
    /// Returns an error when the player or the store rejects the action.
    pub fn run_command(&mut self, command: Command) -> Result<CommandOutput> {
        info!(?command, "command");
        let output = match command {
            Command::NoteInput => CommandOutput::OpenNoteInput,
            Command::TackleInput => CommandOutput::OpenTackleInput,
            Command::NoteAdd(text) => {
                let at = self.current_time();
                let children = NoteChildren {
                    timings: vec![NoteTiming::point(at)],
                    videos: vec![self.note_video()],
                    details: vec![NoteDetail::new(NoteDetail::TEXT, text)],
                    ..NoteChildren::default()
                };
                let id = self.repo.insert_note_with_children(Note::NOTE, &children)?;
                self.reload_items()?;
                CommandOutput::Banner(format!("Note {id} saved at {}", format_timestamp(at)))
            }
            Command::NoteList => CommandOutput::Banner(self.describe_notes(|item| !item.is_tackle())),
            Command::NoteGoto(id) => CommandOutput::Banner(self.goto_note(id)?),
            Command::TackleAdd {
                player,
                team,
                attempt,
                outcome,
            } => {
                let at = self.current_time();
                let children = NoteChildren {
                    timings: vec![NoteTiming::point(at)],
                    videos: vec![self.note_video()],
                    tackles: vec![NoteTackle {
                        player: player.clone(),
                        team,
                        attempt,
                        outcome,
                    }],
                    ..NoteChildren::default()
                };
                let id = self.repo.insert_note_with_children(Note::TACKLE, &children)?;
                self.reload_items()?;
                CommandOutput::Banner(format!(
                    "Tackle {id} saved: {player} {outcome} at {}",
                    format_timestamp(at)
                ))
            }
            Command::TackleList => CommandOutput::Banner(self.describe_notes(|item| item.is_tackle())),
            Command::ClipStart => {
                let at = self.live_time()?;
                self.clip_start = Some(at);
                CommandOutput::Banner(format!("Clip started at {}", format_timestamp(at)))
            }
            Command::ClipEnd(name) => self.finish_clip(name)?,
            Command::ClipList => CommandOutput::ShowClips(self.clip_rows()),
            Command::ClipPlay(id) => {
                let clip = self
                    .clip_rows()
                    .into_iter()
                    .find(|clip| clip.id == id)
                    .with_context(|| format!("clip {id} not found"))?;
                self.player.set_ab_loop(clip.start_s, clip.end_s)?;
                self.seek_to(clip.start_s)?;
                self.set_paused(false)?;
                CommandOutput::Banner(format!(
                    "Looping clip {id} {}-{}",
                    format_timestamp(clip.start_s),
                    format_timestamp(clip.end_s)
                ))
            }
            Command::ClipStop => {
                self.player.clear_ab_loop()?;
                CommandOutput::Banner("Loop cleared".to_string())
            }
            Command::Pause => {
                self.set_paused(true)?;
                CommandOutput::Banner("Paused".to_string())
            }
            Command::Play => {
                self.set_paused(false)?;
                CommandOutput::Banner("Playing".to_string())
            }
            Command::Mute => {
                let muted = !self.status.muted;
                self.player.set_mute(muted)?;
                self.status.muted = muted;
                CommandOutput::Banner(if muted { "Muted" } else { "Unmuted" }.to_string())
            }
            Command::Seek(position) => {
                self.seek_to(position)?;
                CommandOutput::Banner(format!("Seek to {}", format_timestamp(position)))
            }
            Command::Speed(None) => {
                CommandOutput::Banner(format!("Speed {}x", self.status.speed))
            }
            Command::Speed(Some(speed)) => {
                self.player.set_speed(speed)?;
                self.status.speed = speed;
                CommandOutput::Banner(format!("Speed {speed}x"))
            }
            Command::Help => CommandOutput::ShowHelp,
            Command::Quit => CommandOutput::Quit,
        };
        Ok(output)
    }

    /// Closes the pending clip. The start mark is kept if reading the play
    /// head or the write fails.
    fn finish_clip(&mut self, name: Option<String>) -> Result<CommandOutput> {
        let Some(start) = self.clip_start else {
            bail!("no clip started; use `clip start` first");
        };
        let end = self.live_time()?;
        if end <= start {
            bail!(
                "clip end {} must be after start {}",
                format_timestamp(end),
                format_timestamp(start)
            );
        }
        let duration = end - start;
        let name = name.unwrap_or_else(|| format!("clip {}", format_timestamp(start)));
        let children = NoteChildren {
            timings: vec![NoteTiming::new(start, end)],
            videos: vec![self.note_video()],
            clips: vec![NoteClip::named(name, duration)],
            ..NoteChildren::default()
        };
        let id = self.repo.insert_note_with_children(Note::CLIP, &children)?;
        self.clip_start = None;
        self.reload_items()?;
        Ok(CommandOutput::Banner(format!("Clip {id} saved ({duration:.1}s)")))
    }

    pub(super) fn clip_rows(&self) -> Vec<ClipRow> {
        self.items
            .iter()
            .filter(|item| item.is_clip())
            .map(|item| ClipRow {
                id: item.id,
                start_s: item.start_s,
                end_s: item.end_s,
                name: item.text.clone(),
            })
            .collect()
    }

    fn describe_notes(&self, keep: impl Fn(&crate::models::NoteItem) -> bool) -> String {
        let mut out = String::new();
        let mut count = 0;
        for item in self.items.iter().filter(|item| keep(*item)) {
            if count > 0 {
                out.push_str(" | ");
            }
            let _ = write!(out, "#{} {} {}", item.id, format_timestamp(item.start_s), item.summary());
            count += 1;
        }
        if count == 0 {
            "Nothing recorded yet".to_string()
        } else {
            format!("{count}: {out}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_group_words_and_unterminated_quotes_fail() {
        assert_eq!(
            tokenize("ce 'quick break' left").unwrap(),
            ["ce", "quick break", "left"]
        );
        assert_eq!(tokenize(r#"a "" b"#).unwrap(), ["a", "", "b"]);
        assert_eq!(tokenize(r"say it\'s").unwrap(), ["say", "it's"]);
        assert!(tokenize("note add \"open").is_err());
        assert!(tokenize("   ").unwrap().is_empty());
    }

    #[test]
    fn note_commands_parse() {
        assert_eq!(parse("note").unwrap(), Command::NoteInput);
        assert_eq!(parse("nn").unwrap(), Command::NoteInput);
        assert_eq!(
            parse("note add good ruck").unwrap(),
            Command::NoteAdd("good ruck".into())
        );
        assert_eq!(parse("nn \"kick off\"").unwrap(), Command::NoteAdd("kick off".into()));
        assert_eq!(parse("note goto #7").unwrap(), Command::NoteGoto(NoteId::new(7)));
        assert!(parse("note goto seven").is_err());
        assert!(parse("note frobnicate").is_err());
    }

    #[test]
    fn tackle_flags_accept_short_long_and_inline_forms() {
        let expected = Command::TackleAdd {
            player: "John Smith".into(),
            team: "Blue".into(),
            attempt: 2,
            outcome: TackleOutcome::Missed,
        };
        assert_eq!(
            parse("tackle add -p 'John Smith' -t Blue -a 2 -o missed").unwrap(),
            expected
        );
        assert_eq!(
            parse("tackle add --player=\"John Smith\" --team Blue --attempt=2 --outcome Missed")
                .unwrap(),
            expected
        );
        assert_eq!(parse("nt 'John Smith' Blue 2 missed").unwrap(), expected);
    }

    #[test]
    fn tackle_add_defaults_and_validation() {
        assert_eq!(
            parse("tackle add -p Jones -o completed").unwrap(),
            Command::TackleAdd {
                player: "Jones".into(),
                team: String::new(),
                attempt: 1,
                outcome: TackleOutcome::Completed,
            }
        );
        assert!(parse("tackle add -o completed").is_err());
        assert!(parse("tackle add -p Jones").is_err());
        assert!(parse("tackle add -p Jones -o tackled").is_err());
        assert!(parse("tackle add -p Jones -o missed -a 0").is_err());
        assert!(parse("tackle add -p Jones -o missed -x 1").is_err());
        assert!(parse("tackle add -p").is_err());
        assert!(parse("nt Jones Blue").is_err());
        assert_eq!(parse("nt").unwrap(), Command::TackleInput);
    }

    #[test]
    fn clip_and_playback_commands_parse() {
        assert_eq!(parse("cs").unwrap(), Command::ClipStart);
        assert_eq!(parse("clip start").unwrap(), Command::ClipStart);
        assert_eq!(parse("ce").unwrap(), Command::ClipEnd(None));
        assert_eq!(
            parse("clip end quick break").unwrap(),
            Command::ClipEnd(Some("quick break".into()))
        );
        assert_eq!(parse("clip play 3").unwrap(), Command::ClipPlay(NoteId::new(3)));
        assert_eq!(parse("clip stop").unwrap(), Command::ClipStop);
        assert_eq!(parse("seek 1:05").unwrap(), Command::Seek(65.0));
        assert!(parse("seek 1:75").is_err());
        assert_eq!(parse("speed").unwrap(), Command::Speed(None));
        assert_eq!(parse("speed 1.5").unwrap(), Command::Speed(Some(1.5)));
        assert!(parse("speed -1").is_err());
        assert_eq!(parse("q").unwrap(), Command::Quit);
        assert!(parse("").is_err());
        assert!(parse("launch").is_err());
    }
}
