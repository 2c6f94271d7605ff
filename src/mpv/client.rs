//! Typed player operations.
//!
//! [`PlayerControl`] exposes every playback operation the event loop needs
//! as provided methods over a single `send_command` primitive, so tests can
//! substitute a scripted player for the real socket client.
use std::path::{Path, PathBuf};

use serde_json::{Value, json};

use super::ipc::{IpcTransport, PlayerError};

/// Coerces a decoded value to `f64`, accepting integer and float numbers.
pub fn coerce_f64(value: &Value) -> Result<f64, PlayerError> {
    value
        .as_f64()
        .ok_or_else(|| PlayerError::Protocol(format!("expected a number, got {value}")))
}

/// Coerces a decoded value to `bool`.
pub fn coerce_bool(value: &Value) -> Result<bool, PlayerError> {
    value
        .as_bool()
        .ok_or_else(|| PlayerError::Protocol(format!("expected a boolean, got {value}")))
}

/// Trait for player control operations.
///
/// Implementors only provide [`PlayerControl::send_command`]; every typed
/// operation is built on top of it.
pub trait PlayerControl {
    /// Sends a raw command (`[verb, args...]`) and returns its `data`.
    fn send_command(&self, command: Vec<Value>) -> Result<Value, PlayerError>;

    fn get_property(&self, name: &str) -> Result<Value, PlayerError> {
        self.send_command(vec![json!("get_property"), json!(name)])
    }

    fn set_property(&self, name: &str, value: Value) -> Result<(), PlayerError> {
        self.send_command(vec![json!("set_property"), json!(name), value])
            .map(|_| ())
    }

    fn get_f64(&self, name: &str) -> Result<f64, PlayerError> {
        coerce_f64(&self.get_property(name)?)
    }

    fn get_bool(&self, name: &str) -> Result<bool, PlayerError> {
        coerce_bool(&self.get_property(name)?)
    }

    fn time_pos(&self) -> Result<f64, PlayerError> {
        self.get_f64("time-pos")
    }

    fn duration(&self) -> Result<f64, PlayerError> {
        self.get_f64("duration")
    }

    fn speed(&self) -> Result<f64, PlayerError> {
        self.get_f64("speed")
    }

    fn is_paused(&self) -> Result<bool, PlayerError> {
        self.get_bool("pause")
    }

    fn is_muted(&self) -> Result<bool, PlayerError> {
        self.get_bool("mute")
    }

    fn set_pause(&self, paused: bool) -> Result<(), PlayerError> {
        self.set_property("pause", json!(paused))
    }

    fn toggle_pause(&self) -> Result<(), PlayerError> {
        self.send_command(vec![json!("cycle"), json!("pause")])
            .map(|_| ())
    }

    fn set_mute(&self, muted: bool) -> Result<(), PlayerError> {
        self.set_property("mute", json!(muted))
    }

    fn set_speed(&self, speed: f64) -> Result<(), PlayerError> {
        self.set_property("speed", json!(speed))
    }

    /// Seeks by `offset_s` relative to the current position.
    fn seek_relative(&self, offset_s: f64) -> Result<(), PlayerError> {
        self.send_command(vec![json!("seek"), json!(offset_s), json!("relative")])
            .map(|_| ())
    }

    /// Seeks to an absolute position in seconds.
    fn seek_absolute(&self, position_s: f64) -> Result<(), PlayerError> {
        self.send_command(vec![json!("seek"), json!(position_s), json!("absolute")])
            .map(|_| ())
    }

    fn frame_step(&self) -> Result<(), PlayerError> {
        self.send_command(vec![json!("frame-step")]).map(|_| ())
    }

    fn frame_back_step(&self) -> Result<(), PlayerError> {
        self.send_command(vec![json!("frame-back-step")])
            .map(|_| ())
    }

    /// Loops playback between `a_s` and `b_s`.
    fn set_ab_loop(&self, a_s: f64, b_s: f64) -> Result<(), PlayerError> {
        self.set_property("ab-loop-a", json!(a_s))?;
        self.set_property("ab-loop-b", json!(b_s))
    }

    fn clear_ab_loop(&self) -> Result<(), PlayerError> {
        self.set_property("ab-loop-a", json!("no"))?;
        self.set_property("ab-loop-b", json!("no"))
    }

    /// Draws an opaque ASS-styled payload in overlay slot `id`.
    fn show_overlay(&self, id: i64, payload: &str) -> Result<(), PlayerError> {
        self.send_command(vec![
            json!("osd-overlay"),
            json!(id),
            json!("ass-events"),
            json!(payload),
        ])
        .map(|_| ())
    }

    fn hide_overlay(&self, id: i64) -> Result<(), PlayerError> {
        self.send_command(vec![json!("osd-overlay"), json!(id), json!("none"), json!("")])
            .map(|_| ())
    }

    fn quit(&self) -> Result<(), PlayerError> {
        self.send_command(vec![json!("quit")]).map(|_| ())
    }
}

/// Player client over the mpv JSON IPC socket.
///
/// # Examples
///
/// ```no_run
/// use tagging_rugby::mpv::{MpvClient, PlayerControl};
///
/// let client = MpvClient::new("/tmp/tagging-rugby-mpv.sock");
/// client.connect().expect("is the player running?");
/// let position = client.time_pos().unwrap_or(0.0);
/// println!("at {position}s");
/// ```
pub struct MpvClient {
    transport: IpcTransport,
}

impl MpvClient {
    /// Creates an unconnected client for the given socket path.
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            transport: IpcTransport::new(socket_path),
        }
    }

    /// Wraps an already configured transport.
    pub fn with_transport(transport: IpcTransport) -> Self {
        Self { transport }
    }

    pub fn socket_path(&self) -> &Path {
        self.transport.socket_path()
    }

    pub fn connect(&self) -> Result<(), PlayerError> {
        self.transport.connect()
    }

    pub fn close(&self) {
        self.transport.close();
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }
}

impl PlayerControl for MpvClient {
    fn send_command(&self, command: Vec<Value>) -> Result<Value, PlayerError> {
        self.transport.send_command(&command)
    }
}
