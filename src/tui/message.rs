//! Messages consumed by the event loop and commands it hands back.

use std::fmt;
use std::sync::mpsc::Receiver;
use std::time::Duration;

use crossterm::event::KeyEvent;

use crate::export::ExportMessage;

/// An input to [`App::update`](super::App::update).
#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    Key(KeyEvent),
    Resize(u16, u16),
    /// Periodic poll of the player.
    Tick,
    /// Clears the result banner if its generation still equals the payload.
    ClearResult(u64),
    /// One message drained from the export worker.
    Export(ExportMessage),
}

/// Work the runtime performs on behalf of the model.
///
/// Each command eventually produces at most one [`Msg`], except `Batch`
/// which runs its members in order.
pub enum Cmd {
    None,
    Quit,
    /// Deliver [`Msg::Tick`] after the delay.
    Tick(Duration),
    /// Deliver [`Msg::ClearResult`] after the delay.
    ClearResultAfter { after: Duration, generation: u64 },
    /// Adopt a new export stream and read its first message.
    WatchExport(Receiver<ExportMessage>),
    /// Read the next message from the current export stream.
    ReceiveExport,
    Batch(Vec<Cmd>),
}

impl Cmd {
    /// Combines two commands, dropping `None`s.
    pub fn and(self, other: Cmd) -> Cmd {
        match (self, other) {
            (Cmd::None, other) => other,
            (this, Cmd::None) => this,
            (Cmd::Batch(mut cmds), other) => {
                cmds.push(other);
                Cmd::Batch(cmds)
            }
            (this, other) => Cmd::Batch(vec![this, other]),
        }
    }

    pub fn is_quit(&self) -> bool {
        match self {
            Cmd::Quit => true,
            Cmd::Batch(cmds) => cmds.iter().any(Cmd::is_quit),
            _ => false,
        }
    }
}

impl fmt::Debug for Cmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cmd::None => write!(f, "None"),
            Cmd::Quit => write!(f, "Quit"),
            Cmd::Tick(after) => f.debug_tuple("Tick").field(after).finish(),
            Cmd::ClearResultAfter { after, generation } => f
                .debug_struct("ClearResultAfter")
                .field("after", after)
                .field("generation", generation)
                .finish(),
            Cmd::WatchExport(_) => write!(f, "WatchExport(..)"),
            Cmd::ReceiveExport => write!(f, "ReceiveExport"),
            Cmd::Batch(cmds) => f.debug_tuple("Batch").field(cmds).finish(),
        }
    }
}
