//! Tackle clip export.
//!
//! [`prepare_export`] checks prerequisites and loads the work items;
//! [`spawn_export`] runs the encoder for each item on a worker thread and
//! streams [`ExportMessage`]s back through a rendezvous-sized channel, so the
//! producer only advances as fast as the event loop drains it.

use std::ffi::OsString;
use std::fs::DirBuilder;
use std::io;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread;

use thiserror::Error;
use tracing::{info, warn};

use crate::models::TackleClipSource;
use crate::mpv::find_executable;
use crate::repository::{NoteRepository, RepoError};
use crate::utils::format_file_timestamp;

/// Seconds of lead-in before a point tackle.
pub const CLIP_LEAD_S: f64 = 4.0;
/// Seconds of follow-through after a point tackle.
pub const CLIP_TAIL_S: f64 = 10.0;

/// Errors raised while preparing or running an export.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("encoder '{0}' not found in PATH (install ffmpeg to export clips)")]
    EncoderMissing(String),

    #[error("video file not found: {}", .0.display())]
    VideoMissing(PathBuf),

    #[error("no tackles to export")]
    NoTackles,

    #[error("video duration is unknown (start playback once before exporting)")]
    DurationUnknown,

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("encoder failed: {stderr}")]
    Encoder { stderr: String },

    #[error(transparent)]
    Repository(#[from] RepoError),
}

/// Message streamed from the export worker to the event loop.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportMessage {
    /// Sent before clip `current` (1-based) of `total` is encoded.
    Progress { current: usize, total: usize },
    /// All clips were written under `output_dir`.
    Complete { count: usize, output_dir: PathBuf },
    /// The export stopped at the failing clip.
    Error(String),
}

/// Cuts one clip out of a video.
pub trait ClipEncoder: Send + Sync {
    /// Returns true if the encoder can be invoked.
    fn is_available(&self) -> bool;

    /// Writes `input[start_s..end_s]` to `output`.
    fn encode(
        &self,
        input: &Path,
        start_s: f64,
        end_s: f64,
        output: &Path,
    ) -> Result<(), ExportError>;
}

/// The `ffmpeg` command-line encoder.
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    program: String,
    stream_copy: bool,
}

impl Ffmpeg {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            stream_copy: false,
        }
    }

    /// Copies streams instead of re-encoding.
    pub fn stream_copy(mut self, enabled: bool) -> Self {
        self.stream_copy = enabled;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Builds the encoder argument list.
    pub fn args(&self, input: &Path, start_s: f64, end_s: f64, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-y".into(),
            "-ss".into(),
            format!("{start_s:.3}").into(),
            "-i".into(),
            input.into(),
            "-t".into(),
            format!("{:.3}", end_s - start_s).into(),
        ];
        if self.stream_copy {
            args.extend(["-c".into(), "copy".into()]);
        } else {
            args.extend(
                ["-c:v", "libx264", "-c:a", "aac", "-preset", "fast"]
                    .into_iter()
                    .map(OsString::from),
            );
        }
        args.push(output.into());
        args
    }
}

impl ClipEncoder for Ffmpeg {
    fn is_available(&self) -> bool {
        find_executable(&self.program).is_some()
    }

    fn encode(
        &self,
        input: &Path,
        start_s: f64,
        end_s: f64,
        output: &Path,
    ) -> Result<(), ExportError> {
        let result = Command::new(&self.program)
            .args(self.args(input, start_s, end_s, output))
            .stdin(Stdio::null())
            .output()
            .map_err(|source| ExportError::Io {
                context: format!("failed to run {}", self.program),
                source,
            })?;

        if !result.status.success() {
            return Err(ExportError::Encoder {
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

/// Computes the clip range for a tackle.
///
/// Explicit bounds are used when `clip_start_s != clip_end_s`; otherwise the
/// range is `ts - 4 .. ts + 10`. The result always satisfies
/// `0 <= start <= end <= duration_s`; a negative duration counts as zero.
///
/// # Examples
///
/// ```
/// use tagging_rugby::export::calculate_clip_bounds;
///
/// assert_eq!(calculate_clip_bounds(30.0, 30.0, 30.0, 600.0), (26.0, 40.0));
/// assert_eq!(calculate_clip_bounds(2.0, 2.0, 2.0, 600.0), (0.0, 12.0));
/// assert_eq!(calculate_clip_bounds(595.0, 595.0, 595.0, 600.0), (591.0, 600.0));
/// ```
pub fn calculate_clip_bounds(ts: f64, clip_start_s: f64, clip_end_s: f64, duration_s: f64) -> (f64, f64) {
    let (start, end) = if clip_start_s != clip_end_s {
        (clip_start_s, clip_end_s)
    } else {
        (ts - CLIP_LEAD_S, ts + CLIP_TAIL_S)
    };
    let upper = duration_s.max(0.0);
    let start = start.clamp(0.0, upper);
    let end = end.clamp(0.0, upper);
    if start <= end { (start, end) } else { (end, start) }
}

/// Makes a player name safe to use as a path component.
///
/// Spaces become `_`; `/ \ : * ? " < > |` are removed; an empty result
/// becomes `Unknown`.
pub fn sanitize_player_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .map(|c| if c == ' ' { '_' } else { c })
        .collect();
    if cleaned.is_empty() {
        "Unknown".to_string()
    } else {
        cleaned
    }
}

/// Directory receiving all clips of `video`: `<dir>/<stem>-clips`.
pub fn clips_directory(video: &Path) -> PathBuf {
    let stem = video
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string());
    let parent = video.parent().unwrap_or_else(|| Path::new(""));
    parent.join(format!("{stem}-clips"))
}

/// Output file for one tackle clip.
pub fn clip_output_path(output_dir: &Path, player: &str, ts: f64) -> PathBuf {
    let player = sanitize_player_name(player);
    let file = format!("{player}_{}_tackle.mp4", format_file_timestamp(ts));
    output_dir.join(&player).join(file)
}

/// Checked export work for one video.
#[derive(Debug, Clone)]
pub struct ExportPlan {
    pub video_path: PathBuf,
    pub duration_s: f64,
    pub output_dir: PathBuf,
    pub tackles: Vec<TackleClipSource>,
}

impl ExportPlan {
    pub fn total(&self) -> usize {
        self.tackles.len()
    }
}

/// Validates prerequisites and loads the tackles to export.
///
/// # Errors
///
/// `EncoderMissing` if the encoder cannot be run, `VideoMissing` if the
/// input is gone, `NoTackles` if the video has no tackles and
/// `DurationUnknown` if neither `duration_s` nor the stored video row gives
/// a positive duration.
pub fn prepare_export(
    repo: &NoteRepository,
    encoder: &dyn ClipEncoder,
    encoder_name: &str,
    video_path: &Path,
    duration_s: f64,
) -> Result<ExportPlan, ExportError> {
    if !encoder.is_available() {
        return Err(ExportError::EncoderMissing(encoder_name.to_string()));
    }
    if !video_path.is_file() {
        return Err(ExportError::VideoMissing(video_path.to_path_buf()));
    }

    let key = video_path.to_string_lossy();
    let tackles = repo.tackles_for_export(&key)?;
    if tackles.is_empty() {
        return Err(ExportError::NoTackles);
    }

    let duration_s = if duration_s > 0.0 {
        duration_s
    } else {
        match repo.get_video_by_path(&key)? {
            Some(video) if video.duration_s > 0.0 => video.duration_s,
            _ => return Err(ExportError::DurationUnknown),
        }
    };

    Ok(ExportPlan {
        video_path: video_path.to_path_buf(),
        duration_s,
        output_dir: clips_directory(video_path),
        tackles,
    })
}

/// Runs `plan` on a worker thread and returns the message stream.
///
/// The channel holds at most one undelivered message.
pub fn spawn_export(plan: ExportPlan, encoder: Arc<dyn ClipEncoder>) -> Receiver<ExportMessage> {
    let (tx, rx) = mpsc::sync_channel(1);
    thread::spawn(move || run_export(&plan, encoder.as_ref(), &tx));
    rx
}

/// Producer body. Stops after the first failure.
pub fn run_export(plan: &ExportPlan, encoder: &dyn ClipEncoder, tx: &SyncSender<ExportMessage>) {
    let total = plan.total();
    info!(total, video = %plan.video_path.display(), "export started");

    for (index, tackle) in plan.tackles.iter().enumerate() {
        let (start, end) =
            calculate_clip_bounds(tackle.start_s, tackle.start_s, tackle.end_s, plan.duration_s);
        let output = clip_output_path(&plan.output_dir, &tackle.player, tackle.start_s);

        let step = create_parent(&output).and_then(|()| {
            if tx
                .send(ExportMessage::Progress {
                    current: index + 1,
                    total,
                })
                .is_err()
            {
                return Ok(false);
            }
            encoder
                .encode(&plan.video_path, start, end, &output)
                .map(|()| true)
        });

        match step {
            Ok(true) => {}
            Ok(false) => {
                warn!("export receiver dropped, stopping");
                return;
            }
            Err(err) => {
                warn!(clip = index + 1, "export failed: {err}");
                let _ = tx.send(ExportMessage::Error(err.to_string()));
                return;
            }
        }
    }

    info!(count = total, "export finished");
    let _ = tx.send(ExportMessage::Complete {
        count: total,
        output_dir: plan.output_dir.clone(),
    });
}

fn create_parent(output: &Path) -> Result<(), ExportError> {
    let Some(dir) = output.parent() else {
        return Ok(());
    };
    DirBuilder::new()
        .recursive(true)
        .mode(0o755)
        .create(dir)
        .map_err(|source| ExportError::Io {
            context: format!("failed to create {}", dir.display()),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use crate::models::{NoteChildren, NoteTackle, NoteTiming, NoteVideo, TackleOutcome};
    use std::fs;
    use std::sync::Mutex;

    /// Writes an empty file per clip, failing on the chosen 1-based clip.
    struct FakeEncoder {
        available: bool,
        fail_on: Option<usize>,
        calls: Mutex<Vec<(f64, f64, PathBuf)>>,
    }

    impl FakeEncoder {
        fn new() -> Self {
            Self {
                available: true,
                fail_on: None,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl ClipEncoder for FakeEncoder {
        fn is_available(&self) -> bool {
            self.available
        }

        fn encode(
            &self,
            _input: &Path,
            start_s: f64,
            end_s: f64,
            output: &Path,
        ) -> Result<(), ExportError> {
            let mut calls = self.calls.lock().unwrap();
            calls.push((start_s, end_s, output.to_path_buf()));
            if self.fail_on == Some(calls.len()) {
                return Err(ExportError::Encoder {
                    stderr: "Invalid data found when processing input".to_string(),
                });
            }
            fs::write(output, b"clip").unwrap();
            Ok(())
        }
    }

    fn tackle_children(video: &str, player: &str, ts: f64) -> NoteChildren {
        NoteChildren {
            timings: vec![NoteTiming::point(ts)],
            videos: vec![NoteVideo {
                path: video.to_string(),
                duration_s: 600.0,
                format: "mp4".to_string(),
            }],
            tackles: vec![NoteTackle {
                player: player.to_string(),
                team: String::new(),
                attempt: 1,
                outcome: TackleOutcome::Completed,
            }],
            ..NoteChildren::default()
        }
    }

    fn setup(players: &[(&str, f64)]) -> (tempfile::TempDir, PathBuf, NoteRepository) {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("final.mp4");
        fs::write(&video, b"not really a video").unwrap();
        let repo = NoteRepository::new(Database::in_memory().unwrap());
        let path = video.to_string_lossy().into_owned();
        for (player, ts) in players {
            repo.insert_note_with_children("tackle", &tackle_children(&path, player, *ts))
                .unwrap();
        }
        (dir, video, repo)
    }

    fn drain(rx: Receiver<ExportMessage>) -> Vec<ExportMessage> {
        rx.iter().collect()
    }

    #[test]
    fn clip_bounds_stay_inside_the_video() {
        let cases = [
            (30.0, 30.0, 30.0, 600.0),
            (1.0, 1.0, 1.0, 600.0),
            (598.0, 598.0, 598.0, 600.0),
            (50.0, -3.0, 700.0, 600.0),
            (50.0, 80.0, 20.0, 600.0),
            (900.0, 900.0, 900.0, 600.0),
            (30.0, 30.0, 30.0, 0.0),
        ];
        for (ts, a, b, duration) in cases {
            let (start, end) = calculate_clip_bounds(ts, a, b, duration);
            assert!(
                0.0 <= start && start <= end && end <= duration,
                "bounds ({start}, {end}) escape [0, {duration}] for {ts}"
            );
        }
    }

    #[test]
    fn explicit_clip_bounds_pass_through() {
        assert_eq!(calculate_clip_bounds(10.0, 10.0, 25.0, 600.0), (10.0, 25.0));
        assert_eq!(calculate_clip_bounds(10.0, 10.0, 25.0, 20.0), (10.0, 20.0));
        assert_eq!(calculate_clip_bounds(10.0, 10.0, 25.0, 0.0), (0.0, 0.0));
    }

    #[test]
    fn unknown_live_duration_falls_back_to_stored_video() {
        let (_dir, video, repo) = setup(&[("Smith", 95.0)]);
        let encoder = Arc::new(FakeEncoder::new());

        assert!(matches!(
            prepare_export(&repo, encoder.as_ref(), "ffmpeg", &video, 0.0),
            Err(ExportError::DurationUnknown)
        ));

        repo.upsert_video(&video.to_string_lossy(), 100.0, "mp4", 18)
            .unwrap();
        let plan = prepare_export(&repo, encoder.as_ref(), "ffmpeg", &video, 0.0).unwrap();
        assert_eq!(plan.duration_s, 100.0);

        drain(spawn_export(plan, encoder.clone()));
        let calls = encoder.calls.lock().unwrap();
        assert_eq!((calls[0].0, calls[0].1), (91.0, 100.0));
    }

    #[test]
    fn player_names_are_sanitized() {
        assert_eq!(sanitize_player_name("John Doe"), "John_Doe");
        assert_eq!(sanitize_player_name("A/B\\C:D*E?F\"G<H>I|J"), "ABCDEFGHIJ");
        assert_eq!(sanitize_player_name("  "), "Unknown");
        assert_eq!(sanitize_player_name("???"), "Unknown");
    }

    #[test]
    fn output_paths_follow_the_clip_layout() {
        let dir = clips_directory(Path::new("/games/final.mp4"));
        assert_eq!(dir, PathBuf::from("/games/final-clips"));
        assert_eq!(
            clip_output_path(&dir, "John Doe", 3725.0),
            PathBuf::from("/games/final-clips/John_Doe/John_Doe_1-02-05_tackle.mp4")
        );
    }

    #[test]
    fn ffmpeg_arguments_reencode_or_copy() {
        let args = Ffmpeg::new("ffmpeg").args(Path::new("in.mp4"), 26.0, 40.0, Path::new("out.mp4"));
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            [
                "-y", "-ss", "26.000", "-i", "in.mp4", "-t", "14.000", "-c:v", "libx264", "-c:a",
                "aac", "-preset", "fast", "out.mp4"
            ]
        );

        let copy = Ffmpeg::new("ffmpeg")
            .stream_copy(true)
            .args(Path::new("in.mp4"), 0.0, 1.5, Path::new("out.mp4"));
        let copy: Vec<String> = copy.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(copy[7..], ["-c", "copy", "out.mp4"]);
    }

    #[test]
    fn prepare_reports_missing_prerequisites() {
        let (_dir, video, repo) = setup(&[]);

        let mut encoder = FakeEncoder::new();
        encoder.available = false;
        assert!(matches!(
            prepare_export(&repo, &encoder, "ffmpeg", &video, 600.0),
            Err(ExportError::EncoderMissing(name)) if name == "ffmpeg"
        ));

        let encoder = FakeEncoder::new();
        assert!(matches!(
            prepare_export(&repo, &encoder, "ffmpeg", Path::new("/nope/gone.mp4"), 600.0),
            Err(ExportError::VideoMissing(_))
        ));
        assert!(matches!(
            prepare_export(&repo, &encoder, "ffmpeg", &video, 600.0),
            Err(ExportError::NoTackles)
        ));
    }

    #[test]
    fn export_streams_progress_then_completion() {
        let (_dir, video, repo) = setup(&[("Smith", 30.0), ("John Doe", 120.0), ("Smith", 500.0)]);
        let encoder = Arc::new(FakeEncoder::new());
        let plan = prepare_export(&repo, encoder.as_ref(), "ffmpeg", &video, 600.0).unwrap();
        let output_dir = plan.output_dir.clone();

        let messages = drain(spawn_export(plan, encoder.clone()));
        assert_eq!(
            messages,
            vec![
                ExportMessage::Progress { current: 1, total: 3 },
                ExportMessage::Progress { current: 2, total: 3 },
                ExportMessage::Progress { current: 3, total: 3 },
                ExportMessage::Complete {
                    count: 3,
                    output_dir: output_dir.clone()
                },
            ]
        );

        assert!(output_dir.join("Smith/Smith_0-00-30_tackle.mp4").is_file());
        assert!(output_dir.join("John_Doe/John_Doe_0-02-00_tackle.mp4").is_file());
        assert!(output_dir.join("Smith/Smith_0-08-20_tackle.mp4").is_file());

        let calls = encoder.calls.lock().unwrap();
        assert_eq!((calls[0].0, calls[0].1), (26.0, 40.0));
        assert_eq!((calls[2].0, calls[2].1), (496.0, 510.0));
    }

    #[test]
    fn export_stops_at_first_encoder_failure() {
        let (_dir, video, repo) = setup(&[("Smith", 30.0), ("Jones", 120.0), ("Brown", 500.0)]);
        let mut encoder = FakeEncoder::new();
        encoder.fail_on = Some(2);
        let encoder = Arc::new(encoder);
        let plan = prepare_export(&repo, encoder.as_ref(), "ffmpeg", &video, 600.0).unwrap();
        let output_dir = plan.output_dir.clone();

        let messages = drain(spawn_export(plan, encoder.clone()));
        let errors: Vec<_> = messages
            .iter()
            .filter(|m| matches!(m, ExportMessage::Error(_)))
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(matches!(messages.last(), Some(ExportMessage::Error(msg)) if msg.contains("Invalid data")));
        assert!(!messages.iter().any(|m| matches!(m, ExportMessage::Complete { .. })));

        assert_eq!(encoder.calls.lock().unwrap().len(), 2);
        assert!(output_dir.join("Smith").join("Smith_0-00-30_tackle.mp4").is_file());
        assert!(!output_dir.join("Brown").exists());
    }

    #[test]
    fn missing_player_directories_are_created() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("clips").join("Smith").join("x.mp4");
        create_parent(&output).unwrap();
        create_parent(&output).unwrap();
        assert!(output.parent().unwrap().is_dir());
    }
}
