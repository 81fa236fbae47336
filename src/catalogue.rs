//! Static voice catalogue.
//!
//! Every voice id follows the `{lang}_{name}` convention used by the
//! local synthesis engine's bundled voice packs. This list is the
//! closed universe `voice_registry::resolve` assigns from — it never
//! grows at runtime.

/// A single catalogue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceInfo {
    pub id: &'static str,
    pub lang: &'static str,
    pub gender: Gender,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
}

/// All voice ids known to this process, in catalogue order.
pub const VOICES: &[VoiceInfo] = &[
    // American English, female
    v("af_heart", "en-US", Gender::Female),
    v("af_bella", "en-US", Gender::Female),
    v("af_nicole", "en-US", Gender::Female),
    v("af_aoede", "en-US", Gender::Female),
    v("af_kore", "en-US", Gender::Female),
    v("af_sarah", "en-US", Gender::Female),
    v("af_nova", "en-US", Gender::Female),
    v("af_sky", "en-US", Gender::Female),
    v("af_alloy", "en-US", Gender::Female),
    v("af_jessica", "en-US", Gender::Female),
    v("af_river", "en-US", Gender::Female),
    // American English, male
    v("am_adam", "en-US", Gender::Male),
    v("am_michael", "en-US", Gender::Male),
    v("am_eric", "en-US", Gender::Male),
    v("am_fenrir", "en-US", Gender::Male),
    v("am_liam", "en-US", Gender::Male),
    v("am_onyx", "en-US", Gender::Male),
    v("am_puck", "en-US", Gender::Male),
    v("am_echo", "en-US", Gender::Male),
    v("am_santa", "en-US", Gender::Male),
    // British English, female
    v("bf_emma", "en-GB", Gender::Female),
    v("bf_isabella", "en-GB", Gender::Female),
    v("bf_alice", "en-GB", Gender::Female),
    v("bf_lily", "en-GB", Gender::Female),
    // British English, male
    v("bm_george", "en-GB", Gender::Male),
    v("bm_lewis", "en-GB", Gender::Male),
    v("bm_daniel", "en-GB", Gender::Male),
    v("bm_fable", "en-GB", Gender::Male),
    // Japanese
    v("jf_alpha", "ja-JP", Gender::Female),
    v("jf_gongitsune", "ja-JP", Gender::Female),
    v("jf_nezumi", "ja-JP", Gender::Female),
    v("jf_tebukuro", "ja-JP", Gender::Female),
    v("jm_kumo", "ja-JP", Gender::Male),
    // Mandarin
    v("zf_xiaobei", "zh-CN", Gender::Female),
    v("zf_xiaoni", "zh-CN", Gender::Female),
    v("zf_xiaoxiao", "zh-CN", Gender::Female),
    v("zf_xiaoyi", "zh-CN", Gender::Female),
    v("zm_yunjian", "zh-CN", Gender::Male),
    v("zm_yunxi", "zh-CN", Gender::Male),
    v("zm_yunxia", "zh-CN", Gender::Male),
    v("zm_yunyang", "zh-CN", Gender::Male),
    // Spanish
    v("ef_dora", "es-ES", Gender::Female),
    v("em_alex", "es-ES", Gender::Male),
    v("em_santa", "es-ES", Gender::Male),
    // French
    v("ff_siwis", "fr-FR", Gender::Female),
    // Hindi
    v("hf_alpha", "hi-IN", Gender::Female),
    v("hf_beta", "hi-IN", Gender::Female),
    v("hm_omega", "hi-IN", Gender::Male),
    v("hm_psi", "hi-IN", Gender::Male),
    // Italian
    v("if_sara", "it-IT", Gender::Female),
    v("im_nicola", "it-IT", Gender::Male),
    // Brazilian Portuguese
    v("pf_dora", "pt-BR", Gender::Female),
    v("pm_alex", "pt-BR", Gender::Male),
    v("pm_santa", "pt-BR", Gender::Male),
];

const fn v(id: &'static str, lang: &'static str, gender: Gender) -> VoiceInfo {
    VoiceInfo { id, lang, gender }
}

/// Look up a voice id in the catalogue.
pub fn find(voice_id: &str) -> Option<&'static VoiceInfo> {
    VOICES.iter().find(|v| v.id == voice_id)
}

pub fn is_known(voice_id: &str) -> bool {
    find(voice_id).is_some()
}

/// Catalogue order, re-ranked into the tiers spec.md §4.1 names:
/// American-English male, American-English female, British-English,
/// then everything else. Within a tier, catalogue order is preserved.
/// Used by the session registry when a preferred name collides with a
/// live sibling and a fresh identity has to be picked (SPEC_FULL.md
/// §3.6) — a policy over *live session* voice usage, distinct from
/// `voice_registry`'s own per-process pool (which tracks usage across
/// `agent_name`s within one process).
pub fn priority_order() -> Vec<&'static VoiceInfo> {
    let mut tier1 = Vec::new();
    let mut tier2 = Vec::new();
    let mut tier3 = Vec::new();
    let mut tier4 = Vec::new();
    for voice in VOICES {
        match (voice.lang, voice.gender) {
            ("en-US", Gender::Male) => tier1.push(voice),
            ("en-US", Gender::Female) => tier2.push(voice),
            ("en-GB", _) => tier3.push(voice),
            _ => tier4.push(voice),
        }
    }
    tier1.into_iter().chain(tier2).chain(tier3).chain(tier4).collect()
}

/// The agent name a voice id implies by its naming convention
/// (`{lang}_{name}` -> `Name`), e.g. `am_adam` -> `Adam`. Used to name a
/// session after the voice it was assigned when no preferred name is
/// available (spec.md §3/§8 scenario 2).
pub fn implied_name(voice_id: &str) -> String {
    let suffix = voice_id.split('_').nth(1).unwrap_or(voice_id);
    let mut chars = suffix.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => suffix.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_has_no_duplicate_ids() {
        let mut ids: Vec<&str> = VOICES.iter().map(|v| v.id).collect();
        ids.sort_unstable();
        let before = ids.len();
        ids.dedup();
        assert_eq!(before, ids.len());
    }

    #[test]
    fn find_roundtrips_known_ids() {
        assert!(find("am_eric").is_some());
        assert!(find("not_a_voice").is_none());
    }

    #[test]
    fn priority_order_puts_american_male_first() {
        let order = priority_order();
        assert_eq!(order[0].lang, "en-US");
        assert_eq!(order[0].gender, Gender::Male);
        assert_eq!(order.len(), VOICES.len());
    }

    #[test]
    fn implied_name_capitalizes_suffix() {
        assert_eq!(implied_name("am_adam"), "Adam");
        assert_eq!(implied_name("bf_emma"), "Emma");
    }
}
