//! Runtime configuration.
//!
//! Every setting is resolved as: explicit builder value, then environment
//! variable, then default.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

use crate::utils::get_database_path;

/// Environment variable overriding the database path.
pub const ENV_DB: &str = "TAGGING_RUGBY_DB";
/// Environment variable overriding the player socket path.
pub const ENV_SOCKET: &str = "TAGGING_RUGBY_SOCKET";
/// Environment variable overriding the player binary.
pub const ENV_PLAYER: &str = "TAGGING_RUGBY_PLAYER";
/// Environment variable overriding the encoder binary.
pub const ENV_ENCODER: &str = "TAGGING_RUGBY_ENCODER";

pub const DEFAULT_SOCKET: &str = "/tmp/tagging-rugby-mpv.sock";
pub const DEFAULT_PLAYER: &str = "mpv";
pub const DEFAULT_ENCODER: &str = "ffmpeg";

/// Player poll interval.
pub const TICK_INTERVAL: Duration = Duration::from_millis(100);
/// How long a result banner stays visible.
pub const RESULT_DISPLAY_DURATION: Duration = Duration::from_secs(3);
/// How long to wait for a freshly launched player to create its socket.
pub const SOCKET_WAIT: Duration = Duration::from_secs(5);
/// Seconds after a note's start during which it is drawn on the overlay.
pub const OVERLAY_WINDOW_S: f64 = 2.0;

/// Resolved settings for one session.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub video_path: PathBuf,
    pub db_path: PathBuf,
    pub socket_path: PathBuf,
    pub player: String,
    pub encoder: String,
    pub stream_copy: bool,
    pub launch_player: bool,
}

/// Builder for [`Config`].
///
/// # Examples
///
/// ```
/// use tagging_rugby::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new("match.mp4")
///     .db_path("/tmp/tagging.db")
///     .socket_path("/tmp/player.sock")
///     .build()
///     .expect("Failed to resolve config");
/// assert_eq!(config.socket_path.to_str(), Some("/tmp/player.sock"));
/// ```
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    video_path: PathBuf,
    db_path: Option<PathBuf>,
    socket_path: Option<PathBuf>,
    player: Option<String>,
    encoder: Option<String>,
    stream_copy: bool,
    launch_player: bool,
}

impl ConfigBuilder {
    pub fn new(video_path: impl Into<PathBuf>) -> Self {
        Self {
            video_path: video_path.into(),
            launch_player: true,
            ..Self::default()
        }
    }

    pub fn db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = Some(path.into());
        self
    }

    pub fn socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.socket_path = Some(path.into());
        self
    }

    pub fn player(mut self, program: impl Into<String>) -> Self {
        self.player = Some(program.into());
        self
    }

    pub fn encoder(mut self, program: impl Into<String>) -> Self {
        self.encoder = Some(program.into());
        self
    }

    /// Copies streams on export instead of re-encoding.
    pub fn stream_copy(mut self, enabled: bool) -> Self {
        self.stream_copy = enabled;
        self
    }

    /// Whether to start the player or attach to a running one.
    pub fn launch_player(mut self, enabled: bool) -> Self {
        self.launch_player = enabled;
        self
    }

    /// Resolves every unset value from the environment or its default.
    ///
    /// # Errors
    ///
    /// Returns an error if the default database path is needed and the
    /// platform data directory cannot be determined.
    pub fn build(self) -> Result<Config> {
        let db_path = match self.db_path.or_else(|| env_value(ENV_DB).map(PathBuf::from)) {
            Some(path) => path,
            None => get_database_path()?,
        };
        let socket_path = self
            .socket_path
            .or_else(|| env_value(ENV_SOCKET).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SOCKET));
        let player = self
            .player
            .or_else(|| env_value(ENV_PLAYER))
            .unwrap_or_else(|| DEFAULT_PLAYER.to_string());
        let encoder = self
            .encoder
            .or_else(|| env_value(ENV_ENCODER))
            .unwrap_or_else(|| DEFAULT_ENCODER.to_string());

        Ok(Config {
            video_path: self.video_path,
            db_path,
            socket_path,
            player,
            encoder,
            stream_copy: self.stream_copy,
            launch_player: self.launch_player,
        })
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
