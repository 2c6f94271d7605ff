//! Media-player control channel.
//!
//! The player (mpv) is an external process reached over a Unix domain
//! socket carrying newline-delimited JSON. [`ipc`] frames and correlates
//! requests; [`client`] layers typed playback operations on top; [`launch`]
//! starts the player process.
mod client;
mod ipc;
mod launch;

pub use client::{MpvClient, PlayerControl, coerce_bool, coerce_f64};
pub use ipc::{IpcTransport, PlayerError, next_request_id};
pub use launch::{PlayerProcess, find_executable, player_args, wait_for_socket};

/// Overlay id used for the note overlay.
pub const NOTE_OVERLAY_ID: i64 = 1;
