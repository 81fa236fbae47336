//! Voice registry: resolves agent names to catalogue voice ids and
//! persists the assignment inside `config.json`.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

use tracing::warn;

use crate::catalogue::{self, Gender, VOICES};
use crate::config::{self, Config};

/// In-memory view of `agent_name -> voice_id`, mirrored to `config.json`
/// on every mutation.
pub struct VoiceRegistry {
    inner: Mutex<HashMap<String, String>>,
}

impl VoiceRegistry {
    /// Load from the config's pre-seeded `voice_registry` map.
    pub fn load(cfg: &Config) -> Self {
        Self {
            inner: Mutex::new(cfg.voice_registry.clone()),
        }
    }

    /// Look up the voice currently assigned to `agent_name`, if any.
    pub fn get(&self, agent_name: &str) -> Option<String> {
        self.inner.lock().unwrap().get(agent_name).cloned()
    }

    /// Resolve `agent_name` to a voice id, assigning a fresh one from
    /// the catalogue on first use. Assignment policy (spec.md §4.1):
    /// 1. An exact `{agent_name}`-suffix match in the catalogue (e.g.
    ///    agent "eric" -> "am_eric") if unused.
    /// 2. The first unused voice in the priority pools, in order.
    /// 3. A stable hash of `agent_name` into the remaining unused
    ///    voices, deterministic across restarts.
    /// 4. If every voice is in use, reuse the hash pick anyway and log
    ///    pool exhaustion — callers never get `None` back.
    pub fn resolve(&self, agent_name: &str) -> String {
        let mut map = self.inner.lock().unwrap();
        if let Some(existing) = map.get(agent_name) {
            return existing.clone();
        }

        let used: std::collections::HashSet<&str> =
            map.values().map(|s| s.as_str()).collect();

        let assigned = suffix_match(agent_name, &used)
            .or_else(|| priority_pool_match(&used))
            .or_else(|| hash_match(agent_name, &used))
            .unwrap_or_else(|| {
                warn!(
                    "voice pool exhausted, reusing an in-use voice for '{}'",
                    agent_name
                );
                hash_fallback(agent_name)
            });

        map.insert(agent_name.to_string(), assigned.to_string());
        assigned.to_string()
    }

    /// Explicitly set the voice for `agent_name`, bypassing assignment.
    pub fn set(&self, agent_name: &str, voice_id: &str) -> Result<(), String> {
        if !catalogue::is_known(voice_id) {
            return Err(format!("'{voice_id}' is not a known voice id"));
        }
        self.inner
            .lock()
            .unwrap()
            .insert(agent_name.to_string(), voice_id.to_string());
        Ok(())
    }

    /// Rename an agent, carrying its voice assignment forward.
    pub fn rename(&self, old_name: &str, new_name: &str) {
        let mut map = self.inner.lock().unwrap();
        if let Some(voice) = map.remove(old_name) {
            map.insert(new_name.to_string(), voice);
        }
    }

    /// Snapshot the whole registry, e.g. for `get_voice_registry`.
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.inner.lock().unwrap().clone()
    }

    /// Persist the current registry into `config.json`.
    pub fn save(&self) -> std::io::Result<()> {
        let mut cfg = config::read_config();
        cfg.voice_registry = self.snapshot();
        config::write_config(&cfg)
    }
}

fn suffix_match(agent_name: &str, used: &std::collections::HashSet<&str>) -> Option<&'static str> {
    let lower = agent_name.to_lowercase();
    VOICES
        .iter()
        .find(|v| v.id.ends_with(&format!("_{lower}")) && !used.contains(v.id))
        .map(|v| v.id)
}

/// First unused voice in spec.md §4.1's full tier order (American-English
/// male, American-English female, British-English, then everything
/// else), not just a hand-picked subset — exhausting one tier moves on
/// to the next rather than falling through to a cross-locale hash pick.
fn priority_pool_match(used: &std::collections::HashSet<&str>) -> Option<&'static str> {
    catalogue::priority_order().into_iter().find(|v| !used.contains(v.id)).map(|v| v.id)
}

fn hash_match(agent_name: &str, used: &std::collections::HashSet<&str>) -> Option<&'static str> {
    let unused: Vec<&'static str> = VOICES
        .iter()
        .map(|v| v.id)
        .filter(|id| !used.contains(id))
        .collect();
    if unused.is_empty() {
        return None;
    }
    let idx = stable_hash(agent_name) as usize % unused.len();
    Some(unused[idx])
}

fn hash_fallback(agent_name: &str) -> &'static str {
    let idx = stable_hash(agent_name) as usize % VOICES.len();
    VOICES[idx].id
}

fn stable_hash(s: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    s.hash(&mut hasher);
    hasher.finish()
}

/// Prefer a voice matching `lang`/`gender` when assigning; currently
/// unused by `resolve` (which only keys off the agent name) but kept
/// for callers that want a filtered view, e.g. `list_voices`.
pub fn filter(lang: Option<&str>, gender: Option<Gender>) -> Vec<&'static catalogue::VoiceInfo> {
    VOICES
        .iter()
        .filter(|v| lang.map_or(true, |l| v.lang == l))
        .filter(|v| gender.map_or(true, |g| v.gender == g))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_config() -> Config {
        Config::default()
    }

    #[test]
    fn resolve_is_idempotent() {
        let reg = VoiceRegistry::load(&empty_config());
        let first = reg.resolve("eric");
        let second = reg.resolve("eric");
        assert_eq!(first, second);
    }

    #[test]
    fn resolve_prefers_suffix_match() {
        let reg = VoiceRegistry::load(&empty_config());
        assert_eq!(reg.resolve("eric"), "am_eric");
    }

    #[test]
    fn set_rejects_unknown_voice() {
        let reg = VoiceRegistry::load(&empty_config());
        assert!(reg.set("agent", "not_a_voice").is_err());
    }

    #[test]
    fn rename_carries_assignment() {
        let reg = VoiceRegistry::load(&empty_config());
        let voice = reg.resolve("eric");
        reg.rename("eric", "erica");
        assert_eq!(reg.get("erica"), Some(voice));
        assert_eq!(reg.get("eric"), None);
    }

    #[test]
    fn distinct_agents_get_distinct_voices() {
        let reg = VoiceRegistry::load(&empty_config());
        let a = reg.resolve("alpha");
        let b = reg.resolve("beta");
        assert_ne!(a, b);
    }
}
