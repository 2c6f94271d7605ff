pub mod config;
pub mod db;
pub mod export;
pub mod logging;
pub mod models;
pub mod mpv;
pub mod repository;
pub mod tui;
pub mod utils;

pub use config::{Config, ConfigBuilder};
pub use db::Database;
pub use export::{ClipEncoder, ExportError, ExportMessage, Ffmpeg};
pub use models::{Note, NoteChildren, NoteId, NoteItem, TackleOutcome, TackleStat};
pub use mpv::{MpvClient, PlayerControl, PlayerError};
pub use repository::{NoteRepository, RepoError, RepoResult};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_accessible_from_crate_root() {
        let db = Database::in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn repository_accessible_from_crate_root() {
        let repo = NoteRepository::new(Database::in_memory().unwrap());
        assert!(repo.list_notes().unwrap().is_empty());
        assert_eq!(Note::TACKLE, "tackle");
        assert_eq!("missed".parse(), Ok(TackleOutcome::Missed));
    }
}
