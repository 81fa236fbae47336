//! Deterministic in-memory VAD fake for tests.
//!
//! Triggers whenever the frame's energy matches real amplitude (mirrors
//! `energy::detect`), independent of any ONNX runtime.

use super::energy;

pub struct FakeVad {
    threshold: f32,
}

impl FakeVad {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }
}

impl Default for FakeVad {
    fn default() -> Self {
        Self::new(0.01)
    }
}

impl super::VadEngine for FakeVad {
    fn load(&mut self, _model_dir: &std::path::Path) -> bool {
        true
    }

    fn reset(&mut self) {}

    fn process(&mut self, frame: &[f32], carry: &[f32], _mode: &str) -> (bool, f32, Vec<f32>) {
        let mut combined = Vec::with_capacity(carry.len() + frame.len());
        combined.extend_from_slice(carry);
        combined.extend_from_slice(frame);
        let e = energy::detect(&combined);
        let new_carry = frame[frame.len().saturating_sub(64)..].to_vec();
        (e > self.threshold, e, new_carry)
    }
}

#[cfg(test)]
mod tests {
    use super::super::VadEngine;
    use super::*;

    #[test]
    fn silent_frame_does_not_trigger() {
        let mut vad = FakeVad::default();
        let frame = vec![0.0f32; 512];
        let carry = vec![0.0f32; 64];
        let (triggered, _, new_carry) = vad.process(&frame, &carry, "recording");
        assert!(!triggered);
        assert_eq!(new_carry.len(), 64);
    }

    #[test]
    fn loud_frame_triggers() {
        let mut vad = FakeVad::default();
        let frame = vec![0.5f32; 512];
        let carry = vec![0.0f32; 64];
        let (triggered, prob, _) = vad.process(&frame, &carry, "recording");
        assert!(triggered);
        assert!(prob > 0.01);
    }
}
