mod children;
mod ids;
mod note;
mod stats;
mod video;

pub use children::{
    NoteChildren, NoteClip, NoteDetail, NoteHighlight, NoteTackle, NoteTiming, NoteVideo, NoteZone,
    ParseOutcomeError, TackleOutcome,
};
pub use ids::{NoteId, VideoId};
pub use note::{Note, NoteItem, TackleClipSource};
pub use stats::{CategoryCount, TackleStat};
pub use video::Video;
