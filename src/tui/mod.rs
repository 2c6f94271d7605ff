//! Terminal User Interface for tagging a match video.
//!
//! A single-threaded loop feeds [`Msg`]s to [`App::update`] and performs the
//! [`Cmd`]s it returns: timers, the export stream and quitting. Rendering
//! uses ratatui, terminal management uses crossterm.

use std::io;
use std::panic;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::{
    event::{self as crossterm_event, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::{info, warn};

use crate::config::{Config, SOCKET_WAIT};
use crate::export::{ExportMessage, Ffmpeg};
use crate::mpv::{MpvClient, PlayerProcess};
use crate::repository::NoteRepository;

mod app;
pub mod command;
pub mod event;
pub mod forms;
pub mod layout;
mod message;
pub mod overlay;
pub mod stats;
mod ui;
pub mod views;

#[cfg(test)]
mod tests;

pub use app::{App, Banner, ExportProgress, Focus, Mode, PlayerStatus, SPEEDS, STEP_SIZES};
pub use message::{Cmd, Msg};

/// Idle poll interval when no timer is due sooner.
const IDLE_POLL: Duration = Duration::from_millis(100);
/// Poll interval while an export message is awaited.
const EXPORT_POLL: Duration = Duration::from_millis(20);

/// Initializes the terminal for TUI rendering.
///
/// Enables raw mode and enters the alternate screen.
///
/// # Errors
///
/// Returns an error if terminal initialization fails.
fn init_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend).context("failed to create terminal")?;
    Ok(terminal)
}

/// Restores the terminal to its original state.
///
/// # Errors
///
/// Returns an error if terminal restoration fails.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to show cursor")?;
    Ok(())
}

/// Minimal terminal restoration for the panic hook.
fn restore_terminal_panic() {
    let _ = disable_raw_mode();
    let _ = execute!(io::stdout(), LeaveAlternateScreen);
}

/// Restores the terminal before the original panic hook runs.
fn init_panic_hook() {
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        restore_terminal_panic();
        original_hook(panic_info);
    }));
}

/// Pending work scheduled by [`Cmd`]s.
#[derive(Default)]
struct Runtime {
    timers: Vec<(Instant, Msg)>,
    export: Option<Receiver<ExportMessage>>,
    export_wanted: bool,
    quit: bool,
}

impl Runtime {
    fn schedule(&mut self, cmd: Cmd, now: Instant) {
        match cmd {
            Cmd::None => {}
            Cmd::Quit => self.quit = true,
            Cmd::Tick(after) => self.timers.push((now + after, Msg::Tick)),
            Cmd::ClearResultAfter { after, generation } => {
                self.timers.push((now + after, Msg::ClearResult(generation)));
            }
            Cmd::WatchExport(receiver) => {
                self.export = Some(receiver);
                self.export_wanted = true;
            }
            Cmd::ReceiveExport => self.export_wanted = self.export.is_some(),
            Cmd::Batch(cmds) => {
                for cmd in cmds {
                    self.schedule(cmd, now);
                }
            }
        }
    }

    /// Removes and returns the earliest timer due at `now`.
    fn next_due(&mut self, now: Instant) -> Option<Msg> {
        let index = self
            .timers
            .iter()
            .enumerate()
            .filter(|(_, (deadline, _))| *deadline <= now)
            .min_by_key(|(_, (deadline, _))| *deadline)
            .map(|(index, _)| index)?;
        Some(self.timers.swap_remove(index).1)
    }

    /// Reads one export message if one is awaited and ready.
    fn poll_export(&mut self) -> Option<Msg> {
        if !self.export_wanted {
            return None;
        }
        let receiver = self.export.as_ref()?;
        match receiver.try_recv() {
            Ok(message) => {
                self.export_wanted = false;
                Some(Msg::Export(message))
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                warn!("export worker exited without a final message");
                self.export = None;
                self.export_wanted = false;
                None
            }
        }
    }

    fn poll_timeout(&self, now: Instant) -> Duration {
        let ceiling = if self.export_wanted { EXPORT_POLL } else { IDLE_POLL };
        self.timers
            .iter()
            .map(|(deadline, _)| deadline.saturating_duration_since(now))
            .min()
            .map_or(ceiling, |until| until.min(ceiling))
    }

    fn dispatch(&mut self, app: &mut App, msg: Msg) {
        let cmd = app.update(msg);
        self.schedule(cmd, Instant::now());
    }
}

/// Runs the event loop until the model asks to quit.
///
/// # Errors
///
/// Returns an error if event polling, rendering, or terminal operations fail.
/// Terminal state is always restored, even on error.
pub fn run_event_loop(app: &mut App) -> Result<()> {
    let mut terminal = init_terminal()?;

    let result = run_event_loop_internal(app, &mut terminal);

    if let Err(e) = restore_terminal(&mut terminal) {
        eprintln!("Error restoring terminal: {e}");
    }

    result
}

fn run_event_loop_internal(
    app: &mut App,
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
) -> Result<()> {
    let mut runtime = Runtime::default();
    runtime.schedule(app.init(), Instant::now());
    let size = terminal.size()?;
    runtime.dispatch(app, Msg::Resize(size.width, size.height));

    while !runtime.quit {
        terminal.draw(|frame| ui::draw(frame, app))?;

        if crossterm_event::poll(runtime.poll_timeout(Instant::now()))? {
            match crossterm_event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    runtime.dispatch(app, Msg::Key(key));
                }
                Event::Resize(width, height) => runtime.dispatch(app, Msg::Resize(width, height)),
                _ => {}
            }
        }
        while !runtime.quit
            && let Some(msg) = runtime.next_due(Instant::now())
        {
            runtime.dispatch(app, msg);
        }
        if let Some(msg) = runtime.poll_export() {
            runtime.dispatch(app, msg);
        }
    }

    Ok(())
}

/// Entry point for the TUI application.
///
/// Opens the store, starts or attaches to the player, resumes from the
/// stored position and runs the event loop. The player is told to quit on
/// exit when this process launched it.
///
/// # Errors
///
/// Returns an error if:
/// - The video file does not exist
/// - The database cannot be opened or migrated
/// - The player cannot be launched or reached
/// - Terminal initialization or the event loop fails
pub fn run(config: &Config) -> Result<()> {
    init_panic_hook();

    let video = config
        .video_path
        .canonicalize()
        .with_context(|| format!("Video not found: {}", config.video_path.display()))?;
    let video_key = video.to_string_lossy().into_owned();

    crate::utils::ensure_parent_directory(&config.db_path)
        .context("Failed to ensure database directory")?;
    let db = crate::Database::open(&config.db_path).context("Failed to open database")?;
    let repo = NoteRepository::new(db);

    let resume = repo
        .get_video_by_path(&video_key)
        .context("Failed to read video")?
        .map(|v| v.stopped_at_s)
        .filter(|s| *s > 0.0);

    let process = if config.launch_player {
        Some(PlayerProcess::spawn(
            &config.player,
            &config.socket_path,
            &video,
            resume,
            SOCKET_WAIT,
        )?)
    } else {
        None
    };

    let client = MpvClient::new(&config.socket_path);
    client
        .connect()
        .with_context(|| format!("Failed to connect to {}", config.socket_path.display()))?;
    if !config.launch_player
        && let Some(at) = resume
        && let Err(err) = crate::mpv::PlayerControl::seek_absolute(&client, at)
    {
        warn!("failed to resume at {at}: {err}");
    }

    let encoder = Ffmpeg::new(config.encoder.clone()).stream_copy(config.stream_copy);
    let mut app = App::new(
        repo,
        Box::new(client),
        Arc::new(encoder),
        config.encoder.clone(),
        video,
    )?;
    info!(video = %video_key, resume = ?resume, "starting");

    let result = run_event_loop(&mut app).context("TUI event loop failed");

    if config.launch_player {
        app.quit_player();
    }
    drop(process);
    result
}
