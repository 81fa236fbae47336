//! Voice activity detection adapter.
//!
//! `(frame[512 samples], carry[64 samples]) -> (probability, new_carry)`
//! (spec.md §6). The capture loop hands each adapter exactly one 512
//! sample frame at a time, prepending the 64-sample carry from the
//! previous call for continuity.

pub mod energy;
pub mod fake;
pub mod silero;

pub use fake::FakeVad;
pub use silero::SileroVad;

pub const FRAME_SAMPLES: usize = 512;
pub const CARRY_SAMPLES: usize = 64;

/// Engine-agnostic VAD contract. `SileroVad` implements this directly;
/// `FakeVad` is the deterministic test double.
pub trait VadEngine: Send {
    fn load(&mut self, model_dir: &std::path::Path) -> bool;
    fn reset(&mut self);
    fn process(&mut self, frame: &[f32], carry: &[f32], mode: &str) -> (bool, f32, Vec<f32>);
}

impl VadEngine for SileroVad {
    fn load(&mut self, model_dir: &std::path::Path) -> bool {
        SileroVad::load(self, model_dir)
    }

    fn reset(&mut self) {
        SileroVad::reset(self)
    }

    fn process(&mut self, frame: &[f32], carry: &[f32], mode: &str) -> (bool, f32, Vec<f32>) {
        SileroVad::process(self, frame, carry, mode)
    }
}
