pub mod pipeline;
pub mod queue;

pub use pipeline::{SpeakResult, SpeechPipeline};
pub use queue::{spawn_worker, SpeechQueue};
