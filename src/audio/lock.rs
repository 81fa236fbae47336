//! Cross-process audio playback lock.
//!
//! Every process speaking through this crate competes for the same
//! physical output device. Before handing audio to the playback
//! subprocess, a process takes an exclusive `fs2` lock on a well-known
//! file in the system temp directory, and holds it for the subprocess's
//! lifetime so a sibling process's `speak()` call blocks rather than
//! talking over it.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::PathBuf;

use fs2::FileExt;

fn lock_path() -> PathBuf {
    std::env::temp_dir().join("voxd-audio.lock")
}

/// An acquired lock; playback may proceed while this is held, and the
/// lock releases automatically on drop (including on panic unwind).
pub struct AudioLock {
    _file: File,
}

impl AudioLock {
    /// Block until the lock is free, then take it.
    pub fn acquire() -> io::Result<Self> {
        let file_ = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path())?;
        file_.lock_exclusive()?;
        Ok(Self { _file: file_ })
    }

    /// Try to take the lock without blocking; `None` if another process
    /// (or another caller in this process) currently holds it.
    pub fn try_acquire() -> io::Result<Option<Self>> {
        let file_ = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path())?;
        match file_.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { _file: file_ })),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl Drop for AudioLock {
    fn drop(&mut self) {
        let _ = self._file.unlock();
    }
}
