//! End-to-end tackle clip export with a stand-in encoder.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use tagging_rugby::export::{prepare_export, spawn_export};
use tagging_rugby::models::{NoteChildren, NoteTackle, NoteTiming, NoteVideo};
use tagging_rugby::{ClipEncoder, Database, ExportError, ExportMessage, Ffmpeg, NoteRepository, TackleOutcome};

/// Records requested ranges and writes a placeholder file per clip.
#[derive(Default)]
struct RecordingEncoder {
    fail_on: Option<usize>,
    ranges: Mutex<Vec<(f64, f64)>>,
}

impl ClipEncoder for RecordingEncoder {
    fn is_available(&self) -> bool {
        true
    }

    fn encode(&self, _input: &Path, start_s: f64, end_s: f64, output: &Path) -> Result<(), ExportError> {
        let mut ranges = self.ranges.lock().unwrap();
        ranges.push((start_s, end_s));
        if self.fail_on == Some(ranges.len()) {
            return Err(ExportError::Encoder {
                stderr: "moov atom not found".to_string(),
            });
        }
        fs::write(output, b"clip").map_err(|source| ExportError::Io {
            context: "write".to_string(),
            source,
        })
    }
}

fn setup(tackles: &[(&str, f64)]) -> Result<(tempfile::TempDir, PathBuf, NoteRepository)> {
    let dir = tempfile::tempdir()?;
    let video = dir.path().join("final.mp4");
    fs::write(&video, b"frames")?;
    let path = video.to_string_lossy().into_owned();

    let repo = NoteRepository::new(Database::in_memory()?);
    for (player, at) in tackles {
        repo.insert_note_with_children(
            "tackle",
            &NoteChildren {
                timings: vec![NoteTiming::point(*at)],
                videos: vec![NoteVideo {
                    path: path.clone(),
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
            },
        )?;
    }
    Ok((dir, video, repo))
}

#[test]
fn three_tackles_produce_three_clips() -> Result<()> {
    let (dir, video, repo) = setup(&[("Smith", 120.0), ("Le Roux", 30.0), ("Smith", 500.0)])?;
    let encoder = Arc::new(RecordingEncoder::default());

    let plan = prepare_export(&repo, encoder.as_ref(), "fake", &video, 600.0)?;
    let messages: Vec<_> = spawn_export(plan, encoder.clone()).into_iter().collect();

    let clips_dir = dir.path().join("final-clips");
    assert_eq!(
        messages,
        vec![
            ExportMessage::Progress { current: 1, total: 3 },
            ExportMessage::Progress { current: 2, total: 3 },
            ExportMessage::Progress { current: 3, total: 3 },
            ExportMessage::Complete {
                count: 3,
                output_dir: clips_dir.clone(),
            },
        ]
    );
    assert_eq!(
        *encoder.ranges.lock().unwrap(),
        vec![(26.0, 40.0), (116.0, 130.0), (496.0, 510.0)]
    );
    assert!(clips_dir.join("Le_Roux/Le_Roux_0-00-30_tackle.mp4").is_file());
    assert!(clips_dir.join("Smith/Smith_0-02-00_tackle.mp4").is_file());
    assert!(clips_dir.join("Smith/Smith_0-08-20_tackle.mp4").is_file());
    Ok(())
}

#[test]
fn failure_stops_after_one_error() -> Result<()> {
    let (dir, video, repo) = setup(&[("Smith", 30.0), ("Jones", 120.0), ("Brown", 500.0)])?;
    let encoder = Arc::new(RecordingEncoder {
        fail_on: Some(2),
        ..RecordingEncoder::default()
    });

    let plan = prepare_export(&repo, encoder.as_ref(), "fake", &video, 600.0)?;
    let messages: Vec<_> = spawn_export(plan, encoder.clone()).into_iter().collect();

    let errors: Vec<_> = messages
        .iter()
        .filter(|m| matches!(m, ExportMessage::Error(_)))
        .collect();
    assert_eq!(errors.len(), 1);
    assert!(matches!(messages.last(), Some(ExportMessage::Error(e)) if e.contains("moov atom")));
    assert!(!messages.iter().any(|m| matches!(m, ExportMessage::Complete { .. })));
    assert_eq!(encoder.ranges.lock().unwrap().len(), 2);
    assert!(!dir.path().join("final-clips/Brown").exists());
    Ok(())
}

#[test]
fn missing_encoder_binary_is_reported_before_any_work() -> Result<()> {
    let (_dir, video, repo) = setup(&[("Smith", 30.0)])?;
    let encoder = Ffmpeg::new("definitely-not-an-encoder-binary");

    let err = prepare_export(&repo, &encoder, encoder.program(), &video, 600.0).unwrap_err();
    assert!(matches!(err, ExportError::EncoderMissing(ref name) if name == "definitely-not-an-encoder-binary"));
    assert!(err.to_string().contains("not found"));
    Ok(())
}
