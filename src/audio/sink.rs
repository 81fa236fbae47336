//! Audio playback.
//!
//! Two paths, per the redesign in spec.md §9 / SPEC_FULL.md §3.5:
//!
//! - **Speech playback** goes through an external player subprocess
//!   (`aplay`/`afplay`/a configured bundled binary) fed a temp WAV file,
//!   while this process holds the cross-process [`AudioLock`] for the
//!   subprocess's lifetime. This replaces the teacher's in-process
//!   `rodio::Sink` for the main speech path, so sibling processes never
//!   talk over each other even though they don't share an audio device
//!   handle.
//! - **Ready cues** (the short tone played when `listen()` starts
//!   recording) stay in-process via `rodio`, since they're too brief to
//!   justify a subprocess spawn and aren't subject to cross-process
//!   mutual exclusion.

use std::io::Write;
use std::process::{Child, Command, Stdio};

use rodio::{OutputStream, OutputStreamHandle, Sink, Source};
use tracing::{info, warn};

use super::lock::AudioLock;
use crate::wav::encode_wav;

/// A running playback subprocess, holding the audio lock until dropped.
pub struct PlaybackHandle {
    child: Child,
    _lock: AudioLock,
    temp_path: std::path::PathBuf,
}

impl PlaybackHandle {
    /// Block until the player subprocess exits.
    pub fn wait(mut self) -> anyhow::Result<()> {
        let status = self.child.wait()?;
        if !status.success() {
            warn!(?status, "playback subprocess exited non-zero");
        }
        Ok(())
    }

    /// Kill the subprocess immediately (e.g. on `stop`).
    pub fn kill(&mut self) {
        let _ = self.child.kill();
    }
}

impl Drop for PlaybackHandle {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.temp_path);
    }
}

/// Candidate player binaries, tried in order, first found wins.
fn player_candidates(configured: Option<&str>) -> Vec<String> {
    let mut candidates = Vec::new();
    if let Some(bin) = configured {
        candidates.push(bin.to_string());
    }
    if cfg!(target_os = "macos") {
        candidates.push("afplay".to_string());
    } else if cfg!(target_os = "windows") {
        candidates.push("powershell".to_string());
    } else {
        candidates.push("aplay".to_string());
        candidates.push("paplay".to_string());
    }
    candidates
}

fn build_command(player: &str, wav_path: &std::path::Path) -> Command {
    if player == "powershell" {
        let mut cmd = Command::new(player);
        cmd.args([
            "-NoProfile",
            "-Command",
            &format!(
                "(New-Object Media.SoundPlayer '{}').PlaySync()",
                wav_path.display()
            ),
        ]);
        cmd
    } else {
        let mut cmd = Command::new(player);
        cmd.arg(wav_path);
        cmd
    }
}

/// Encode `samples` as a WAV, acquire the cross-process audio lock, and
/// spawn a player subprocess against it. The caller decides whether to
/// block on [`PlaybackHandle::wait`] or hold onto the handle for
/// cancellation.
pub fn spawn_playback(
    samples: &[f32],
    sample_rate: u32,
    configured_player: Option<&str>,
) -> anyhow::Result<PlaybackHandle> {
    let lock = AudioLock::acquire()?;

    let wav_bytes = encode_wav(samples, sample_rate);
    let temp_path = std::env::temp_dir().join(format!("voxd-speak-{}.wav", uuid::Uuid::new_v4()));
    {
        let mut file_ = std::fs::File::create(&temp_path)?;
        file_.write_all(&wav_bytes)?;
    }

    let mut last_err = None;
    for player in player_candidates(configured_player) {
        match build_command(&player, &temp_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => {
                info!(player = %player, "started playback subprocess");
                return Ok(PlaybackHandle {
                    child,
                    _lock: lock,
                    temp_path,
                });
            }
            Err(e) => last_err = Some(e),
        }
    }

    let _ = std::fs::remove_file(&temp_path);
    Err(anyhow::anyhow!(
        "no playback subprocess available: {}",
        last_err.map(|e| e.to_string()).unwrap_or_default()
    ))
}

/// In-process player for the short, non-exclusive ready cue.
pub struct ReadyCue {
    _stream: OutputStream,
    _stream_handle: OutputStreamHandle,
    sink: Sink,
}

impl ReadyCue {
    pub fn new() -> anyhow::Result<Self> {
        let (stream, stream_handle) = OutputStream::try_default()
            .map_err(|e| anyhow::anyhow!("failed to open audio output for ready cue: {e}"))?;
        let sink = Sink::try_new(&stream_handle)
            .map_err(|e| anyhow::anyhow!("failed to create ready cue sink: {e}"))?;
        Ok(Self {
            _stream: stream,
            _stream_handle: stream_handle,
            sink,
        })
    }

    /// Play a short sine-wave blip, non-blocking.
    pub fn play(&self, freq_hz: f32, duration_ms: u32) {
        let source = rodio::source::SineWave::new(freq_hz)
            .take_duration(std::time::Duration::from_millis(duration_ms as u64))
            .amplify(0.2);
        self.sink.append(source);
    }
}

// SAFETY: ReadyCue is only ever touched from the thread that owns the
// listen pipeline; rodio's OutputStream carries a raw pointer marker on
// some platforms that otherwise blocks auto-Send.
unsafe impl Send for ReadyCue {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_candidates_include_configured_first() {
        let candidates = player_candidates(Some("/opt/voxd/player"));
        assert_eq!(candidates[0], "/opt/voxd/player");
    }
}
