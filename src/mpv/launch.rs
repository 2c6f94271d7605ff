//! Spawning the player process and waiting for its IPC socket.
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

/// Returns the full path of `program` if it is an existing file, or is
/// found in one of the `PATH` directories.
pub fn find_executable(program: &str) -> Option<PathBuf> {
    let direct = Path::new(program);
    if direct.components().count() > 1 {
        return direct.is_file().then(|| direct.to_path_buf());
    }
    env::var_os("PATH").and_then(|paths| {
        env::split_paths(&paths)
            .map(|dir| dir.join(program))
            .find(|candidate| candidate.is_file())
    })
}

/// Blocks until `path` exists or `timeout` elapses.
pub fn wait_for_socket(path: &Path, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if path.exists() {
            return true;
        }
        thread::sleep(Duration::from_millis(50));
    }
    path.exists()
}

/// Builds the player argument list.
pub fn player_args(socket: &Path, video: &Path, start_s: Option<f64>) -> Vec<String> {
    let mut args = vec![
        format!("--input-ipc-server={}", socket.display()),
        "--keep-open=yes".to_string(),
    ];
    if let Some(start) = start_s.filter(|s| *s > 0.0) {
        args.push(format!("--start={start:.3}"));
    }
    args.push(video.display().to_string());
    args
}

/// A player child process owned by this program.
pub struct PlayerProcess {
    child: Child,
}

impl PlayerProcess {
    /// Starts the player on `video` and waits for its socket.
    ///
    /// A stale socket file left by an earlier run is removed first.
    pub fn spawn(
        program: &str,
        socket: &Path,
        video: &Path,
        start_s: Option<f64>,
        wait: Duration,
    ) -> Result<Self> {
        let binary = find_executable(program)
            .with_context(|| format!("player '{program}' was not found in PATH"))?;

        if socket.exists() {
            fs::remove_file(socket)
                .with_context(|| format!("failed to remove stale socket {}", socket.display()))?;
        }

        let child = Command::new(&binary)
            .args(player_args(socket, video, start_s))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to start {}", binary.display()))?;
        info!(player = %binary.display(), pid = child.id(), "player started");

        let mut process = Self { child };
        if !wait_for_socket(socket, wait) {
            process.kill();
            bail!(
                "player did not create {} within {}s",
                socket.display(),
                wait.as_secs()
            );
        }
        Ok(process)
    }

    /// Waits for the child to exit, killing it if it is still running.
    fn reap(&mut self) {
        match self.child.try_wait() {
            Ok(Some(_)) => {}
            Ok(None) => {
                thread::sleep(Duration::from_millis(200));
                if !matches!(self.child.try_wait(), Ok(Some(_))) {
                    self.kill();
                }
            }
            Err(err) => warn!("failed to query player status: {err}"),
        }
    }

    /// OS process id of the player.
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    fn kill(&mut self) {
        if let Err(err) = self.child.kill() {
            warn!("failed to stop player: {err}");
        }
        let _ = self.child.wait();
    }
}

impl Drop for PlayerProcess {
    fn drop(&mut self) {
        self.reap();
    }
}
