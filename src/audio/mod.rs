//! Audio capture, mic ownership arbitration, the ring buffer, the
//! cross-process playback lock, and output.

pub mod capture;
pub mod lock;
pub mod mic_arbiter;
pub mod ring_buffer;
pub mod sink;

pub use capture::{list_devices, list_output_devices, start_capture, start_capture_i16};
pub use lock::AudioLock;
pub use mic_arbiter::MicArbiter;
pub use ring_buffer::{audio_ring_buffer, i16_ring_buffer, AudioConsumer, AudioProducer, Int16Consumer, Int16Producer};
pub use sink::{spawn_playback, PlaybackHandle, ReadyCue};
