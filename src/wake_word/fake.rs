//! Deterministic wake-word fake: triggers once chunk energy crosses a
//! fixed threshold, with no model loading required.

use crate::vad::energy;

pub struct FakeWakeWord {
    threshold: f32,
}

impl FakeWakeWord {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }
}

impl Default for FakeWakeWord {
    fn default() -> Self {
        Self::new(0.2)
    }
}

impl super::WakeWordEngine for FakeWakeWord {
    fn load(&mut self, _model_dir: &std::path::Path) -> bool {
        true
    }

    fn reset(&mut self) {}

    fn process(&mut self, chunk: &[i16]) -> (bool, f32) {
        let samples: Vec<f32> = chunk.iter().map(|&s| s as f32 / 32768.0).collect();
        let e = energy::detect(&samples);
        (e > self.threshold, e)
    }
}

#[cfg(test)]
mod tests {
    use super::super::WakeWordEngine;
    use super::*;

    #[test]
    fn quiet_chunk_never_triggers() {
        let mut ww = FakeWakeWord::default();
        let chunk = vec![0i16; 1280];
        let (triggered, _) = ww.process(&chunk);
        assert!(!triggered);
    }
}
