//! Session registry: tracks every live voice process sharing this
//! machine's state directory, persisted at `<state>/sessions.json`
//! under an `fs2` exclusive lock so concurrent processes never
//! interleave a read-modify-write cycle.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::catalogue;
use crate::config::get_sessions_path;
use crate::voice_registry::VoiceRegistry;

/// How long an HTTP-silent entry is tolerated before `sweep` reaps it,
/// even if its PID still reports alive (spec.md §4.2).
pub const HTTP_ORPHAN_THRESHOLD_SECS: i64 = 300;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEntry {
    pub name: String,
    pub voice_id: String,
    pub port: u16,
    pub pid: u32,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub tmux_session: Option<String>,
    pub started_at: DateTime<Utc>,
    /// Last time this entry's HTTP side-channel was confirmed alive.
    /// Absent until the first successful `sweep` probe.
    #[serde(default)]
    pub last_seen_http: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionFile {
    sessions: Vec<SessionEntry>,
}

/// Result of `SessionRegistry::rename`.
#[derive(Debug, Clone)]
pub enum RenameOutcome {
    Renamed,
    NotFound,
    NameOccupied(SessionEntry),
}

pub struct SessionRegistry {
    path: PathBuf,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            path: get_sessions_path(),
        }
    }

    /// Register a new session, reconciling against any existing sibling
    /// entries (spec.md §4.2): a sibling with the same `session_id`
    /// shares `name`/`voice_id` rather than creating a second identity.
    pub fn register(
        &self,
        name: &str,
        voice_id: &str,
        port: u16,
        session_id: Option<&str>,
        tmux_session: Option<&str>,
    ) -> std::io::Result<SessionEntry> {
        self.with_locked_file(|file_| {
            let mut data = read_file(file_)?;
            reap_dead(&mut data);

            if let Some(sid) = session_id {
                if let Some(sibling) = data.sessions.iter().find(|e| e.session_id.as_deref() == Some(sid))
                {
                    let entry = SessionEntry {
                        name: sibling.name.clone(),
                        voice_id: sibling.voice_id.clone(),
                        port,
                        pid: std::process::id(),
                        session_id: Some(sid.to_string()),
                        tmux_session: tmux_session.map(String::from),
                        started_at: Utc::now(),
                        last_seen_http: None,
                    };
                    data.sessions.push(entry.clone());
                    write_file(file_, &data)?;
                    return Ok(entry);
                }
            }

            let entry = SessionEntry {
                name: name.to_string(),
                voice_id: voice_id.to_string(),
                port,
                pid: std::process::id(),
                session_id: session_id.map(String::from),
                tmux_session: tmux_session.map(String::from),
                started_at: Utc::now(),
                last_seen_http: None,
            };
            data.sessions.push(entry.clone());
            write_file(file_, &data)?;
            Ok(entry)
        })
    }

    /// Register this process, working out its identity from scratch
    /// (spec.md §4.2 reconciliation rules 1-4): the preferred name wins if
    /// free; otherwise the next unclaimed voice (by `catalogue::priority_order`)
    /// is picked and the session is named after it
    /// (`catalogue::implied_name`). The chosen name/voice pair is also
    /// pinned into `voice_registry` so this process's own `speak()` calls
    /// resolve to the same voice. Sibling reconciliation by `session_id`
    /// still takes priority when one is supplied.
    pub fn register_reconciled(
        &self,
        preferred_name: &str,
        voice_registry: &VoiceRegistry,
        http_port_base: u16,
        session_id: Option<&str>,
        tmux_session: Option<&str>,
    ) -> std::io::Result<SessionEntry> {
        self.with_locked_file(|file_| {
            let mut data = read_file(file_)?;
            reap_dead(&mut data);

            if let Some(sid) = session_id {
                if let Some(sibling) = data.sessions.iter().find(|e| e.session_id.as_deref() == Some(sid)) {
                    let port = lowest_free_port(&data.sessions, http_port_base);
                    let entry = SessionEntry {
                        name: sibling.name.clone(),
                        voice_id: sibling.voice_id.clone(),
                        port,
                        pid: std::process::id(),
                        session_id: Some(sid.to_string()),
                        tmux_session: tmux_session.map(String::from),
                        started_at: Utc::now(),
                        last_seen_http: None,
                    };
                    voice_registry.set(&entry.name, &entry.voice_id).ok();
                    data.sessions.push(entry.clone());
                    write_file(file_, &data)?;
                    return Ok(entry);
                }
            }

            let used_names: std::collections::HashSet<&str> =
                data.sessions.iter().map(|e| e.name.as_str()).collect();
            let used_voices: std::collections::HashSet<&str> =
                data.sessions.iter().map(|e| e.voice_id.as_str()).collect();

            let (name, voice_id) = if !used_names.contains(preferred_name) {
                let voice = suffix_or_pool_voice(preferred_name, &used_voices);
                (preferred_name.to_string(), voice)
            } else {
                let voice = catalogue::priority_order()
                    .into_iter()
                    .find(|v| !used_voices.contains(v.id))
                    .map(|v| v.id)
                    .unwrap_or_else(|| {
                        warn!("voice pool exhausted during session reconciliation, aliasing an in-use voice");
                        catalogue::priority_order()[0].id
                    });
                (catalogue::implied_name(voice), voice.to_string())
            };

            let port = lowest_free_port(&data.sessions, http_port_base);
            let entry = SessionEntry {
                name: name.clone(),
                voice_id: voice_id.clone(),
                port,
                pid: std::process::id(),
                session_id: session_id.map(String::from),
                tmux_session: tmux_session.map(String::from),
                started_at: Utc::now(),
                last_seen_http: None,
            };
            voice_registry.set(&name, &voice_id).ok();
            data.sessions.push(entry.clone());
            write_file(file_, &data)?;
            Ok(entry)
        })
    }

    /// Attach this process's session_id to an existing name's entry
    /// (resume path): inherits `name`/`voice_id` from the most recent
    /// live entry sharing that `session_id`, if one is found.
    pub fn attach_session_id(&self, pid: u32, session_id: &str) -> std::io::Result<Option<SessionEntry>> {
        self.with_locked_file(|file_| {
            let mut data = read_file(file_)?;
            reap_dead(&mut data);
            let sibling = data
                .sessions
                .iter()
                .filter(|e| e.session_id.as_deref() == Some(session_id))
                .max_by_key(|e| e.started_at)
                .cloned();
            if let (Some(sibling), Some(mine)) = (
                sibling.clone(),
                data.sessions.iter_mut().find(|e| e.pid == pid),
            ) {
                mine.name = sibling.name.clone();
                mine.voice_id = sibling.voice_id.clone();
                mine.session_id = Some(session_id.to_string());
            }
            write_file(file_, &data)?;
            Ok(sibling)
        })
    }

    /// Rename `pid`'s entry, checking name uniqueness and writing the
    /// result inside the same locked critical section (spec.md §8's
    /// "name is globally unique across live entries" invariant) so two
    /// concurrent renames to the same name can't both observe it free.
    pub fn rename(&self, pid: u32, new_name: &str) -> std::io::Result<RenameOutcome> {
        self.with_locked_file(|file_| {
            let mut data = read_file(file_)?;
            if let Some(holder) = data
                .sessions
                .iter()
                .find(|e| e.pid != pid && e.name.eq_ignore_ascii_case(new_name))
            {
                return Ok(RenameOutcome::NameOccupied(holder.clone()));
            }
            let Some(entry) = data.sessions.iter_mut().find(|e| e.pid == pid) else {
                return Ok(RenameOutcome::NotFound);
            };
            entry.name = new_name.to_string();
            write_file(file_, &data)?;
            Ok(RenameOutcome::Renamed)
        })
    }

    pub fn unregister(&self, pid: u32) -> std::io::Result<()> {
        self.with_locked_file(|file_| {
            let mut data = read_file(file_)?;
            data.sessions.retain(|e| e.pid != pid);
            write_file(file_, &data)
        })
    }

    /// Remove entries whose process has died, and (separately) entries
    /// whose HTTP side-channel has been silent past the orphan
    /// threshold. These are independent checks per spec.md §4.2.
    pub fn sweep(&self) -> std::io::Result<Vec<SessionEntry>> {
        self.with_locked_file(|file_| {
            let mut data = read_file(file_)?;
            reap_dead(&mut data);
            let now = Utc::now();
            data.sessions.retain(|e| {
                e.last_seen_http
                    .map(|last| (now - last).num_seconds() < HTTP_ORPHAN_THRESHOLD_SECS)
                    .unwrap_or(true)
            });
            write_file(file_, &data)?;
            Ok(data.sessions.clone())
        })
    }

    /// Mark that `pid`'s HTTP side-channel answered a probe just now.
    pub fn mark_seen(&self, pid: u32) -> std::io::Result<()> {
        self.with_locked_file(|file_| {
            let mut data = read_file(file_)?;
            if let Some(entry) = data.sessions.iter_mut().find(|e| e.pid == pid) {
                entry.last_seen_http = Some(Utc::now());
            }
            write_file(file_, &data)
        })
    }

    pub fn snapshot(&self) -> std::io::Result<Vec<SessionEntry>> {
        self.with_locked_file(|file_| Ok(read_file(file_)?.sessions))
    }

    /// Find the session entry most likely to be the main listening
    /// session for wake-word routing: the live entry with the latest
    /// `started_at` (spec.md §9 open question 2).
    pub fn most_recently_started(&self, exclude_pid: u32) -> std::io::Result<Option<SessionEntry>> {
        let entries = self.snapshot()?;
        Ok(entries
            .into_iter()
            .filter(|e| e.pid != exclude_pid && pid_alive(e.pid))
            .max_by_key(|e| e.started_at))
    }

    fn with_locked_file<T>(
        &self,
        f: impl FnOnce(&mut File) -> std::io::Result<T>,
    ) -> std::io::Result<T> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file_ = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&self.path)?;
        file_.lock_exclusive()?;
        let result = f(&mut file_);
        let _ = file_.unlock();
        result
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn read_file(file_: &mut File) -> std::io::Result<SessionFile> {
    let mut contents = String::new();
    file_.read_to_string(&mut contents)?;
    if contents.trim().is_empty() {
        return Ok(SessionFile::default());
    }
    serde_json::from_str(&contents).or_else(|e| {
        warn!("sessions.json malformed, resetting: {e}");
        Ok(SessionFile::default())
    })
}

fn write_file(file_: &mut File, data: &SessionFile) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(data)?;
    file_.set_len(0)?;
    file_.seek_to_start()?;
    file_.write_all(json.as_bytes())?;
    file_.flush()
}

trait SeekToStart {
    fn seek_to_start(&mut self) -> std::io::Result<()>;
}

impl SeekToStart for File {
    fn seek_to_start(&mut self) -> std::io::Result<()> {
        use std::io::Seek;
        self.seek(std::io::SeekFrom::Start(0)).map(|_| ())
    }
}

fn reap_dead(data: &mut SessionFile) {
    let before = data.sessions.len();
    data.sessions.retain(|e| pid_alive(e.pid));
    if data.sessions.len() != before {
        info!(
            "reaped {} dead session entr{}",
            before - data.sessions.len(),
            if before - data.sessions.len() == 1 { "y" } else { "ies" }
        );
    }
}

/// Lowest port at or above `base` not already claimed by a live entry.
fn lowest_free_port(sessions: &[SessionEntry], base: u16) -> u16 {
    let used: std::collections::HashSet<u16> = sessions.iter().map(|e| e.port).collect();
    let mut port = base;
    while used.contains(&port) {
        port += 1;
    }
    port
}

/// Voice for a session whose preferred name is free: an exact
/// `{name}`-suffix match in the catalogue if unused, else the first
/// unclaimed voice in priority order, else a stable hash pick.
fn suffix_or_pool_voice(preferred_name: &str, used_voices: &std::collections::HashSet<&str>) -> String {
    let lower = preferred_name.to_lowercase();
    if let Some(v) = catalogue::VOICES
        .iter()
        .find(|v| v.id.ends_with(&format!("_{lower}")) && !used_voices.contains(v.id))
    {
        return v.id.to_string();
    }
    if let Some(v) = catalogue::priority_order().into_iter().find(|v| !used_voices.contains(v.id)) {
        return v.id.to_string();
    }
    catalogue::priority_order()[0].id.to_string()
}

/// `kill(pid, 0)` sends no signal, just checks existence/permission.
fn pid_alive(pid: u32) -> bool {
    if pid == std::process::id() {
        return true;
    }
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn registry_in(dir: &std::path::Path) -> SessionRegistry {
        SessionRegistry {
            path: dir.join("sessions.json"),
        }
    }

    #[test]
    fn register_then_snapshot_roundtrips() {
        let dir = tempdir().unwrap();
        let reg = registry_in(dir.path());
        let entry = reg.register("Adam", "am_adam", 7865, None, None).unwrap();
        let snap = reg.snapshot().unwrap();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].name, entry.name);
    }

    #[test]
    fn unregister_removes_entry() {
        let dir = tempdir().unwrap();
        let reg = registry_in(dir.path());
        reg.register("Adam", "am_adam", 7865, None, None).unwrap();
        reg.unregister(std::process::id()).unwrap();
        assert!(reg.snapshot().unwrap().is_empty());
    }

    #[test]
    fn sibling_reconciliation_shares_name_and_voice() {
        let dir = tempdir().unwrap();
        let reg = registry_in(dir.path());
        reg.register("Adam", "am_adam", 7865, Some("sess-1"), None)
            .unwrap();
        let second = reg
            .register("Ignored", "ignored_voice", 7866, Some("sess-1"), None)
            .unwrap();
        assert_eq!(second.name, "Adam");
        assert_eq!(second.voice_id, "am_adam");
    }

    #[test]
    fn rename_updates_matching_pid() {
        let dir = tempdir().unwrap();
        let reg = registry_in(dir.path());
        reg.register("Adam", "am_adam", 7865, None, None).unwrap();
        let renamed = reg.rename(std::process::id(), "Eric").unwrap();
        assert!(matches!(renamed, RenameOutcome::Renamed));
        assert_eq!(reg.snapshot().unwrap()[0].name, "Eric");
    }

    #[test]
    fn rename_rejects_occupied_name() {
        let dir = tempdir().unwrap();
        let reg = registry_in(dir.path());
        reg.register("Adam", "am_adam", 7865, None, None).unwrap();
        // Simulate a second live process by writing a second entry directly.
        reg.with_locked_file(|file_| {
            let mut data = read_file(file_)?;
            data.sessions.push(SessionEntry {
                name: "Bella".to_string(),
                voice_id: "af_bella".to_string(),
                port: 7866,
                pid: std::process::id().wrapping_add(1),
                session_id: None,
                tmux_session: None,
                started_at: Utc::now(),
                last_seen_http: None,
            });
            write_file(file_, &data)
        })
        .unwrap();

        let outcome = reg.rename(std::process::id(), "Bella").unwrap();
        assert!(matches!(outcome, RenameOutcome::NameOccupied(ref e) if e.name == "Bella"));
    }
}
