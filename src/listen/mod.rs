pub mod pipeline;

pub use pipeline::{ListenConfig, ListenOutcome, ListenPipeline};
